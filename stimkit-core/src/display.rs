use crate::element::{Element, ElementHandle, MediaCommand};
use crate::param::{ParamTable, ParamValue};
use crate::policy::TimerPolicy;
use crate::topic::Topics;
use anyhow::{bail, Result};

/// The display family as tagged variants. Each kind knows the parameter
/// set it requires and the timing it defaults to when none is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayKind {
    /// Full-field photometric switching test.
    Switching,
    /// A single bar covering the whole viewport.
    FillScreen,
    /// A wrapped block of text.
    TextParagraph,
    /// A playback-device command, nothing drawable.
    MediaControl,
    /// One centered line of text.
    Message,
}

impl DisplayKind {
    pub fn name(&self) -> &'static str {
        match self {
            DisplayKind::Switching => "switching",
            DisplayKind::FillScreen => "fill-screen",
            DisplayKind::TextParagraph => "text-paragraph",
            DisplayKind::MediaControl => "media-control",
            DisplayKind::Message => "message",
        }
    }

    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            DisplayKind::Switching => {
                &["FieldColor", "BackgroundColor", "OnDuration", "OffDuration"]
            }
            DisplayKind::FillScreen => &["Color"],
            DisplayKind::TextParagraph => &["Text", "FontSize", "WrapFraction"],
            DisplayKind::MediaControl => &["Command"],
            DisplayKind::Message => &["Text", "FontSize"],
        }
    }

    pub fn default_timing(&self) -> TimerPolicy {
        match self {
            DisplayKind::Switching => TimerPolicy::ReleaseResponse,
            DisplayKind::FillScreen => TimerPolicy::NoTimer,
            DisplayKind::TextParagraph => TimerPolicy::ReleaseResponse,
            DisplayKind::MediaControl => TimerPolicy::NoTimer,
            DisplayKind::Message => TimerPolicy::FixedDelay { ms: 1000 },
        }
    }
}

/// On/off schedule of a switching display. The renderer asks which field
/// is up for a given elapsed time instead of owning a clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchingSchedule {
    pub on_ms: u64,
    pub off_ms: u64,
}

impl SwitchingSchedule {
    /// True while the field color is up.
    pub fn field_at(&self, elapsed_ns: u64) -> bool {
        let cycle_ns = (self.on_ms + self.off_ms) * 1_000_000;
        if cycle_ns == 0 {
            return true;
        }
        elapsed_ns % cycle_ns < self.on_ms * 1_000_000
    }
}

/// A configured unit of stimulus presentation.
///
/// Lifecycle: constructed by a catalog function, optionally reassigned
/// parameters, then handed to the presentation queue, which owns it from
/// enqueue to retirement.
#[derive(Debug, Clone)]
pub struct Display {
    pub title: String,
    pub topics: Topics,
    pub kind: DisplayKind,
    pub params: ParamTable,
    pub elements: Vec<Element>,
}

impl Display {
    pub fn new(title: &str, topics: Topics, kind: DisplayKind) -> Self {
        Self {
            title: title.to_string(),
            topics,
            kind,
            params: ParamTable::new(),
            elements: Vec::new(),
        }
    }

    /// Non-empty title, at least one topic flag, required parameters all
    /// defined. The queue refuses displays that fail this.
    pub fn validate(&self) -> Result<()> {
        if self.title.is_empty() {
            bail!("display has an empty title");
        }
        if self.topics.is_empty() {
            bail!("display {} has no topic flags", self.title);
        }
        for name in self.kind.required_params() {
            if !self.params.contains(name) {
                bail!("display {} is missing parameter {name}", self.title);
            }
        }
        Ok(())
    }

    /// Register a drawable element, returning its handle.
    pub fn enter_element(&mut self, element: Element) -> ElementHandle {
        self.elements.push(element);
        ElementHandle(self.elements.len() - 1)
    }

    /// Build the element list for this display's kind against a viewport
    /// and apply the kind's default timing when no `Timer` parameter was
    /// configured. Returns the handle of the primary element. Re-running
    /// rebuilds the list, which is what a viewport change needs.
    pub fn create(&mut self, viewport: (u32, u32)) -> Result<ElementHandle> {
        self.validate()?;
        self.elements.clear();

        let (w, h) = (viewport.0 as f32, viewport.1 as f32);
        let handle = match self.kind {
            DisplayKind::Switching => {
                let color = self.params.color("FieldColor")?;
                self.enter_element(Element::Bar {
                    x: 0.0,
                    y: 0.0,
                    width: w,
                    height: h,
                    color,
                })
            }
            DisplayKind::FillScreen => {
                let color = self.params.color("Color")?;
                self.enter_element(Element::Bar {
                    x: 0.0,
                    y: 0.0,
                    width: w,
                    height: h,
                    color,
                })
            }
            DisplayKind::TextParagraph => {
                let content = self.params.text("Text")?.to_string();
                let size_px = self.params.number("FontSize")? as f32;
                let wrap = self.params.number("WrapFraction")? as f32;
                self.enter_element(Element::Text {
                    content,
                    size_px,
                    color: [255, 255, 255, 255],
                    x: w * 0.5,
                    y: h * 0.5,
                    max_width: Some(w * wrap),
                })
            }
            DisplayKind::MediaControl => {
                let raw = self.params.text("Command")?;
                let Some(command) = MediaCommand::parse(raw) else {
                    bail!("display {} has unknown media command {raw}", self.title);
                };
                self.enter_element(Element::Command { command })
            }
            DisplayKind::Message => {
                let content = self.params.text("Text")?.to_string();
                let size_px = self.params.number("FontSize")? as f32;
                self.enter_element(Element::Text {
                    content,
                    size_px,
                    color: [255, 255, 255, 255],
                    x: w * 0.5,
                    y: h * 0.5,
                    max_width: None,
                })
            }
        };

        if !self.params.contains("Timer") {
            self.params
                .define("Timer", ParamValue::Timer(self.kind.default_timing()))?;
        }

        Ok(handle)
    }

    /// The timing policy governing this display. Falls back to the kind
    /// default until `create` has run.
    pub fn timing(&self) -> TimerPolicy {
        self.params
            .timer("Timer")
            .unwrap_or_else(|_| self.kind.default_timing())
    }

    /// On/off schedule, for switching displays only.
    pub fn switching_schedule(&self) -> Option<SwitchingSchedule> {
        if self.kind != DisplayKind::Switching {
            return None;
        }
        let on_ms = self.params.integer("OnDuration").ok()? as u64;
        let off_ms = self.params.integer("OffDuration").ok()? as u64;
        Some(SwitchingSchedule { on_ms, off_ms })
    }

    /// Background color behind the elements. Switching displays alternate
    /// toward this color; everything else clears to black.
    pub fn background_color(&self) -> [u8; 4] {
        self.params
            .color("BackgroundColor")
            .unwrap_or([0, 0, 0, 255])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn switching_fixture() -> Display {
        let mut d = Display::new("Field Test", Topics::DISPLAY_TEST, DisplayKind::Switching);
        d.params
            .define("FieldColor", ParamValue::Color([255, 255, 255, 255]))
            .unwrap();
        d.params
            .define("BackgroundColor", ParamValue::Color([0, 0, 0, 255]))
            .unwrap();
        d.params.define("OnDuration", ParamValue::Integer(500)).unwrap();
        d.params.define("OffDuration", ParamValue::Integer(500)).unwrap();
        d
    }

    #[test]
    fn validate_rejects_empty_title() {
        let d = Display::new("", Topics::CLEAR, DisplayKind::FillScreen);
        assert!(d.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_topics() {
        let d = Display::new("Blank", Topics::empty(), DisplayKind::FillScreen);
        assert!(d.validate().is_err());
    }

    #[test]
    fn validate_requires_kind_parameters() {
        let d = Display::new("Blank", Topics::CLEAR, DisplayKind::FillScreen);
        assert!(d.validate().is_err());
        let mut d = d;
        d.params
            .define("Color", ParamValue::Color([10, 10, 10, 255]))
            .unwrap();
        assert!(d.validate().is_ok());
    }

    #[test]
    fn create_applies_default_timing_once() {
        let mut d = switching_fixture();
        d.create((800, 600)).unwrap();
        assert_eq!(d.timing(), TimerPolicy::ReleaseResponse);

        // An explicit timer set before create survives it.
        let mut d = switching_fixture();
        d.params
            .define("Timer", ParamValue::Timer(TimerPolicy::FixedDelay { ms: 50 }))
            .unwrap();
        d.create((800, 600)).unwrap();
        assert_eq!(d.timing(), TimerPolicy::FixedDelay { ms: 50 });
    }

    #[test]
    fn create_is_rebuildable_for_resize() {
        let mut d = switching_fixture();
        d.create((800, 600)).unwrap();
        d.create((1024, 768)).unwrap();
        assert_eq!(d.elements.len(), 1);
        match &d.elements[0] {
            Element::Bar { width, height, .. } => {
                assert_eq!(*width, 1024.0);
                assert_eq!(*height, 768.0);
            }
            other => panic!("unexpected element {other:?}"),
        }
    }

    #[test]
    fn media_control_rejects_unknown_command() {
        let mut d = Display::new("Player", Topics::MEDIA, DisplayKind::MediaControl);
        d.params
            .define("Command", ParamValue::Text("rewind".into()))
            .unwrap();
        assert!(d.create((800, 600)).is_err());
    }

    #[test]
    fn switching_schedule_alternates_fields() {
        let d = switching_fixture();
        let schedule = d.switching_schedule().unwrap();
        assert!(schedule.field_at(0));
        assert!(schedule.field_at(499_000_000));
        assert!(!schedule.field_at(500_000_000));
        assert!(!schedule.field_at(999_000_000));
        assert!(schedule.field_at(1_000_000_000));
    }

    #[test]
    fn non_switching_display_has_no_schedule() {
        let mut d = Display::new("Blank", Topics::CLEAR, DisplayKind::FillScreen);
        d.params
            .define("Color", ParamValue::Color([0, 0, 0, 255]))
            .unwrap();
        assert!(d.switching_schedule().is_none());
    }
}
