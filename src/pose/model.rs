use async_trait::async_trait;

use super::keypoint::PoseResult;
use crate::error::ModelError;

/// A loaded pose estimator.
///
/// `estimate` may take longer than the sampling interval. The detection loop
/// runs it on a spawned task and never waits for it before the next tick.
#[async_trait]
pub trait PoseModel<F>: Send + Sync
where
    F: Send + 'static,
{
    async fn estimate(&self, frame: F) -> Result<PoseResult, ModelError>;
}
