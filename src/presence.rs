//! Face-confidence presence classification.
//!
//! Only `nose`, `leftEye` and `rightEye` are consulted. A confident wrist or
//! hip elsewhere in frame never flips presence on its own.

use std::fmt;

use crate::error::PoseError;
use crate::pose::{PartName, PoseResult};

/// Below this score a facial keypoint counts as not seen.
pub const LOWEST_SCORE: f32 = 0.1;

const FACE_PARTS: [PartName; 3] = [PartName::Nose, PartName::LeftEye, PartName::RightEye];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresenceState {
    /// No cycle has committed yet.
    #[default]
    Unknown,
    Absent,
    Present,
}

impl fmt::Display for PresenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresenceState::Present => f.write_str("User in frame"),
            PresenceState::Absent | PresenceState::Unknown => f.write_str("User not in the frame"),
        }
    }
}

/// Classify with the default threshold.
pub fn classify(pose: &PoseResult) -> Result<PresenceState, PoseError> {
    PresenceClassifier::default().classify(pose)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresenceClassifier {
    lowest_score: f32,
}

impl PresenceClassifier {
    pub fn new(lowest_score: f32) -> Self {
        Self { lowest_score }
    }

    /// Absent only when every facial keypoint is strictly below the threshold.
    pub fn classify(&self, pose: &PoseResult) -> Result<PresenceState, PoseError> {
        let mut any_seen = false;
        for part in FACE_PARTS {
            if pose.require(part)?.score >= self.lowest_score {
                any_seen = true;
            }
        }

        Ok(if any_seen {
            PresenceState::Present
        } else {
            PresenceState::Absent
        })
    }
}

impl Default for PresenceClassifier {
    fn default() -> Self {
        Self::new(LOWEST_SCORE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Keypoint;

    fn face(nose: f32, left_eye: f32, right_eye: f32) -> PoseResult {
        PoseResult::new(vec![
            Keypoint::new(PartName::Nose, 320.0, 200.0, nose),
            Keypoint::new(PartName::LeftEye, 340.0, 180.0, left_eye),
            Keypoint::new(PartName::RightEye, 300.0, 180.0, right_eye),
            Keypoint::new(PartName::LeftWrist, 100.0, 400.0, 0.99),
        ])
        .unwrap()
    }

    #[test]
    fn test_all_faint_is_absent() {
        let pose = face(0.05, 0.02, 0.09);
        assert_eq!(classify(&pose), Ok(PresenceState::Absent));
    }

    #[test]
    fn test_one_eye_seen_is_present() {
        let pose = face(0.05, 0.02, 0.15);
        assert_eq!(classify(&pose), Ok(PresenceState::Present));
    }

    #[test]
    fn test_threshold_is_inclusive_for_presence() {
        assert_eq!(classify(&face(0.1, 0.0, 0.0)), Ok(PresenceState::Present));
        assert_eq!(classify(&face(0.0, 0.0, 0.099)), Ok(PresenceState::Absent));
    }

    #[test]
    fn test_each_face_part_alone_flips_presence() {
        assert_eq!(classify(&face(0.5, 0.0, 0.0)), Ok(PresenceState::Present));
        assert_eq!(classify(&face(0.0, 0.5, 0.0)), Ok(PresenceState::Present));
        assert_eq!(classify(&face(0.0, 0.0, 0.5)), Ok(PresenceState::Present));
    }

    #[test]
    fn test_confident_body_does_not_imply_presence() {
        // left wrist is 0.99 in the fixture
        assert_eq!(classify(&face(0.0, 0.0, 0.0)), Ok(PresenceState::Absent));
    }

    #[test]
    fn test_classify_is_pure() {
        let pose = face(0.05, 0.3, 0.01);
        let first = classify(&pose);
        let second = classify(&pose);
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_face_part_fails_loudly() {
        let pose = PoseResult::new(vec![
            Keypoint::new(PartName::Nose, 0.0, 0.0, 0.0),
            Keypoint::new(PartName::RightEye, 0.0, 0.0, 0.0),
        ])
        .unwrap();
        assert_eq!(
            classify(&pose),
            Err(PoseError::MissingKeypoint(PartName::LeftEye))
        );
    }

    #[test]
    fn test_custom_threshold() {
        let classifier = PresenceClassifier::new(0.5);
        assert_eq!(classifier.classify(&face(0.4, 0.4, 0.4)), Ok(PresenceState::Absent));
        assert_eq!(classifier.classify(&face(0.4, 0.5, 0.4)), Ok(PresenceState::Present));
    }

    #[test]
    fn test_display_labels() {
        assert_eq!(PresenceState::Present.to_string(), "User in frame");
        assert_eq!(PresenceState::Absent.to_string(), "User not in the frame");
        assert_eq!(PresenceState::Unknown.to_string(), "User not in the frame");
    }
}
