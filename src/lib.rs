pub mod camera;
pub mod config;
pub mod detection;
pub mod error;
pub mod logging;
pub mod pose;
pub mod presence;
pub mod render;

pub use detection::{Committed, CycleEvent, DetectionLoop, LoopHandle};
pub use presence::{classify, PresenceState};
