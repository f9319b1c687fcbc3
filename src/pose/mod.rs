#[cfg(feature = "desktop")]
pub mod detector;
pub mod keypoint;
pub mod model;
#[cfg(feature = "desktop")]
pub mod preprocess;

#[cfg(feature = "desktop")]
pub use detector::MoveNetModel;
pub use keypoint::{Keypoint, PartName, Position, PoseResult};
pub use model::PoseModel;
#[cfg(feature = "desktop")]
pub use preprocess::preprocess_for_movenet;
