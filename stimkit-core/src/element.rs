use stimkit_cache::intern_text;

/// Handle returned when an element is registered with a display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHandle(pub usize);

/// Playback-device commands. These carry no media I/O, they only mark the
/// record stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCommand {
    Open,
    Start,
    Stop,
    Close,
}

impl MediaCommand {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(MediaCommand::Open),
            "start" => Some(MediaCommand::Start),
            "stop" => Some(MediaCommand::Stop),
            "close" => Some(MediaCommand::Close),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MediaCommand::Open => "open",
            MediaCommand::Start => "start",
            MediaCommand::Stop => "stop",
            MediaCommand::Close => "close",
        }
    }
}

/// A drawable (or, for media commands, recordable) unit of a display.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Bar {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: [u8; 4],
    },
    Text {
        content: String,
        size_px: f32,
        color: [u8; 4],
        x: f32,
        y: f32,
        /// Wrap width in pixels; single-line when absent.
        max_width: Option<f32>,
    },
    Command { command: MediaCommand },
}

impl Element {
    /// Slot identity for the render caches. Text shares the process-wide
    /// interner so equal strings hit the same cached pixmap.
    pub fn cache_id(&self) -> usize {
        match self {
            Element::Bar { .. } => 0,
            Element::Command { .. } => 1,
            Element::Text { content, .. } => 2 + intern_text(content),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Element::Text { .. })
    }

    pub fn is_drawable(&self) -> bool {
        !matches!(self, Element::Command { .. })
    }
}
