pub mod config;
pub mod queue;

pub use config::SessionConfig;
pub use queue::{FrameView, PresentationQueue, SessionEvent};
