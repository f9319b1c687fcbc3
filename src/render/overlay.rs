use crate::config::OverlayConfig;
use crate::pose::PoseResult;

use super::skeleton::SKELETON_CONNECTIONS;
use super::surface::DrawingSurface;

/// Markers drawn at or above this score.
pub const KEYPOINT_THRESHOLD: f32 = 0.6;

/// Edges drawn only when both endpoints reach this score.
pub const SKELETON_THRESHOLD: f32 = 0.7;

/// Draws keypoints and skeleton edges, sized to the source frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayRenderer {
    keypoint_threshold: f32,
    skeleton_threshold: f32,
}

impl OverlayRenderer {
    pub fn new(keypoint_threshold: f32, skeleton_threshold: f32) -> Self {
        Self {
            keypoint_threshold,
            skeleton_threshold,
        }
    }

    pub fn from_config(config: &OverlayConfig) -> Self {
        Self::new(config.keypoint_threshold, config.skeleton_threshold)
    }

    /// Resizes (and so clears) the surface on every call, then draws.
    pub fn render<S: DrawingSurface + ?Sized>(&self, pose: &PoseResult, width: u32, height: u32, surface: &mut S) {
        surface.resize(width, height);

        for kp in pose.iter().filter(|kp| kp.is_valid(self.keypoint_threshold)) {
            surface.draw_marker(kp.position.x, kp.position.y);
        }

        for (a, b) in SKELETON_CONNECTIONS.iter() {
            let (Some(start), Some(end)) = (pose.get(*a), pose.get(*b)) else {
                continue;
            };
            if start.is_valid(self.skeleton_threshold) && end.is_valid(self.skeleton_threshold) {
                surface.draw_line(start.position.x, start.position.y, end.position.x, end.position.y);
            }
        }
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(KEYPOINT_THRESHOLD, SKELETON_THRESHOLD)
    }
}
