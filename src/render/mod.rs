pub mod overlay;
pub mod skeleton;
pub mod surface;
#[cfg(feature = "desktop")]
pub mod window;

pub use overlay::OverlayRenderer;
pub use skeleton::SKELETON_CONNECTIONS;
pub use surface::{DrawingSurface, OverlayFrame, PixelSurface};
#[cfg(feature = "desktop")]
pub use window::MinifbRenderer;
