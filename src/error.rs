//! Error taxonomy for the sampling pipeline.
//!
//! Every variant here is local to one detection cycle. None of them stop the loop.

use crate::pose::PartName;

/// Failures coming from the pose estimator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("failed to load pose model: {0}")]
    Load(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("failed to decode frame: {0}")]
    Decode(String),
}

/// Malformed pose results.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PoseError {
    /// A keypoint the classifier needs is absent. The upstream model broke its contract.
    #[error("pose result has no `{0}` keypoint")]
    MissingKeypoint(PartName),

    #[error("pose result has more than one `{0}` keypoint")]
    DuplicatePart(PartName),

    #[error("unknown body part: {0}")]
    UnknownPart(String),
}

/// Why a single detection cycle did not commit.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CycleError {
    #[error("video source is not ready")]
    SourceNotReady,

    #[error("invalid frame dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Pose(#[from] PoseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uses_part_name() {
        let err = CycleError::from(PoseError::MissingKeypoint(PartName::LeftEye));
        assert_eq!(err.to_string(), "pose result has no `leftEye` keypoint");
    }

    #[test]
    fn test_model_error_is_transparent() {
        let err = CycleError::from(ModelError::Inference("boom".into()));
        assert_eq!(err.to_string(), "inference failed: boom");
        let err = CycleError::InvalidDimensions { width: 0, height: 480 };
        assert_eq!(err.to_string(), "invalid frame dimensions 0x480");
    }
}
