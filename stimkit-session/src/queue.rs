use crate::config::SessionConfig;
use anyhow::{Context, Result};
use rand::Rng;
use std::path::Path;
use std::time::Duration;
use stimkit_core::{
    Display, DisplayKind, Element, ParamTable, ParamValue, PresentationRecord, TimerPolicy,
};
use stimkit_timing::Timer;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    CalibrationComplete,
    Response { code: u32 },
    DisplayRetired,
    QueueExhausted,
}

struct Entry {
    display: Display,
    begins_trial: bool,
}

struct Showing {
    index: usize,
    shown_at_ns: u64,
    response_at_ns: Option<u64>,
    response_code: Option<u32>,
}

/// What the renderer needs for the current frame.
pub struct FrameView<'a> {
    pub display: &'a Display,
    /// False while a switching display sits in its background half-cycle.
    pub field_on: bool,
}

/// Runs enqueued displays through their lifecycle: validated on enqueue,
/// element lists built by `prepare`, presented in order, retired per their
/// timing policy, every presentation recorded.
pub struct PresentationQueue<T, R>
where
    T: Timer,
    R: Rng,
{
    pub timer: T,
    pub rng: R,
    pub config: SessionConfig,
    entries: Vec<Entry>,
    next_index: usize,
    showing: Option<Showing>,
    runtime: ParamTable,
    records: Vec<PresentationRecord>,
    calibrated: bool,
    safe_margin_ns: u64,
    trial: usize,
    finished: bool,
}

impl<T, R> PresentationQueue<T, R>
where
    T: Timer<Timestamp = u64>,
    R: Rng,
{
    pub fn new(config: SessionConfig, timer: T, rng: R) -> Self {
        let mut runtime = ParamTable::new();
        runtime
            .define("TrialCounter", ParamValue::Integer(0))
            .expect("fresh runtime table");
        runtime
            .define("BlockCounter", ParamValue::Integer(1))
            .expect("fresh runtime table");
        Self {
            timer,
            rng,
            config,
            entries: Vec::new(),
            next_index: 0,
            showing: None,
            runtime,
            records: Vec::new(),
            calibrated: false,
            safe_margin_ns: 0,
            trial: 0,
            finished: false,
        }
    }

    /// Append a display. The queue owns it from here on.
    pub fn enqueue(&mut self, display: Display) -> Result<()> {
        self.enqueue_entry(display, false)
    }

    /// Append a display that opens a new trial: the trial counter advances
    /// and the inter-trial gap is inserted before it is shown.
    pub fn enqueue_trial_start(&mut self, display: Display) -> Result<()> {
        self.enqueue_entry(display, true)
    }

    fn enqueue_entry(&mut self, display: Display, begins_trial: bool) -> Result<()> {
        display
            .validate()
            .with_context(|| format!("refusing to enqueue display {}", display.title))?;
        self.entries.push(Entry {
            display,
            begins_trial,
        });
        Ok(())
    }

    /// Build (or rebuild, after a resize) every element list.
    pub fn prepare(&mut self, viewport: (u32, u32)) -> Result<()> {
        for entry in &mut self.entries {
            entry.display.create(viewport)?;
        }
        if let Some(showing) = &self.showing {
            let index = showing.index;
            self.expand_elements(index);
        }
        Ok(())
    }

    /// Time-driven transitions. Call once per frame.
    pub fn update(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        if !self.calibrated {
            if self.timer.frame_count() >= self.config.calibration_frames {
                events.push(SessionEvent::CalibrationComplete);
            }
            return events;
        }

        let now_ns = self.timer.now();
        match &self.showing {
            Some(showing) => {
                let display = &self.entries[showing.index].display;
                match display.timing() {
                    TimerPolicy::NoTimer => events.push(SessionEvent::DisplayRetired),
                    TimerPolicy::FixedDelay { ms } | TimerPolicy::ResponseDeadline { ms } => {
                        let due_ns = ms * 1_000_000 + self.safe_margin_ns;
                        if now_ns.saturating_sub(showing.shown_at_ns) >= due_ns {
                            events.push(SessionEvent::DisplayRetired);
                        }
                    }
                    TimerPolicy::ReleaseResponse => {}
                }
            }
            None => {
                if self.next_index >= self.entries.len() {
                    events.push(SessionEvent::QueueExhausted);
                }
            }
        }

        events
    }

    pub fn handle_event(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::CalibrationComplete => {
                if self.calibrated {
                    return false;
                }
                self.apply_calibration();
                self.present_next();
                true
            }
            SessionEvent::Response { code } => {
                let now_ns = self.timer.now();
                let accepts = match &self.showing {
                    Some(s) => {
                        self.entries[s.index].display.timing().waits_for_response()
                            && s.response_at_ns.is_none()
                    }
                    None => false,
                };
                if !accepts {
                    return false;
                }
                if let Some(showing) = &mut self.showing {
                    showing.response_at_ns = Some(now_ns);
                    showing.response_code = Some(code);
                    let rt_ns = now_ns.saturating_sub(showing.shown_at_ns);
                    println!("Response {code} received, RT = {:.3} ms", rt_ns as f64 / 1e6);
                }
                self.retire_current();
                true
            }
            SessionEvent::DisplayRetired => {
                if self.showing.is_none() {
                    return false;
                }
                self.retire_current();
                true
            }
            SessionEvent::QueueExhausted => {
                if self.finished {
                    return false;
                }
                self.finished = true;
                println!("Presentation queue exhausted, {} records", self.records.len());
                true
            }
        }
    }

    fn apply_calibration(&mut self) {
        let stats = self.timer.calibration_stats();
        self.safe_margin_ns = (stats.jitter_ns * 3.0) as u64;
        self.calibrated = true;
        println!(
            "Calibration: {:.3} ms/frame, {:.1} Hz, jitter {:.3} ms, safe margin {} ns",
            stats.average_frame_time_ns / 1e6,
            stats.effective_fps,
            stats.jitter_ns / 1e6,
            self.safe_margin_ns,
        );
    }

    fn present_next(&mut self) {
        if self.next_index >= self.entries.len() {
            // Nothing left to show; update() reports exhaustion.
            return;
        }
        let index = self.next_index;
        self.next_index += 1;

        if self.entries[index].begins_trial {
            self.trial += 1;
            if self.trial > 1 {
                let (lo, hi) = self.config.inter_trial_interval_ms;
                let gap_ms = if hi > lo {
                    self.rng.random_range(lo..=hi)
                } else {
                    lo
                };
                self.timer.sleep(Duration::from_millis(gap_ms));
            }
            self.runtime
                .assign("TrialCounter", ParamValue::Integer(self.trial as i64))
                .expect("runtime table owns TrialCounter");
        }

        self.expand_elements(index);

        let display = &self.entries[index].display;
        if display.kind == DisplayKind::MediaControl {
            if let Some(Element::Command { command }) = display.elements.first() {
                println!("Media command: {}", command.name());
            }
        }

        let shown_at_ns = self.timer.now();
        println!("Showing {} at {} ns", display.title, shown_at_ns);
        self.showing = Some(Showing {
            index,
            shown_at_ns,
            response_at_ns: None,
            response_code: None,
        });
    }

    fn expand_elements(&mut self, index: usize) {
        let runtime = &self.runtime;
        for element in &mut self.entries[index].display.elements {
            if let Element::Text { content, .. } = element {
                *content = runtime.expand(content);
            }
        }
    }

    fn retire_current(&mut self) {
        let Some(showing) = self.showing.take() else {
            return;
        };
        let retired_at_ns = self.timer.now();
        let display = &self.entries[showing.index].display;
        let reaction_time_ns = showing
            .response_at_ns
            .map(|r| r.saturating_sub(showing.shown_at_ns));

        println!(
            "Retired {} after {:.3} ms",
            display.title,
            retired_at_ns.saturating_sub(showing.shown_at_ns) as f64 / 1e6,
        );

        self.records.push(PresentationRecord {
            title: display.title.clone(),
            kind: display.kind.name().to_string(),
            trial: self.trial,
            timer: display.timing(),
            shown_at_ns: showing.shown_at_ns,
            retired_at_ns,
            reaction_time_ns,
            responded: showing.response_at_ns.is_some(),
            response_code: showing.response_code,
        });

        self.present_next();
    }

    /// The frame to draw right now, if a display is up.
    pub fn frame_view(&self) -> Option<FrameView<'_>> {
        let showing = self.showing.as_ref()?;
        let display = &self.entries[showing.index].display;
        let field_on = match display.switching_schedule() {
            Some(schedule) => {
                schedule.field_at(self.timer.now().saturating_sub(showing.shown_at_ns))
            }
            None => true,
        };
        Some(FrameView { display, field_on })
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn trial(&self) -> usize {
        self.trial
    }

    pub fn records(&self) -> &[PresentationRecord] {
        &self.records
    }

    pub fn save_records(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(&self.records)?;
        std::fs::write(path, raw)
            .with_context(|| format!("writing records {}", path.display()))
    }
}
