use anyhow::{Context, Result};
use async_trait::async_trait;
use ndarray::Array4;
use opencv::core::Mat;
use opencv::prelude::*;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::keypoint::{PartName, PoseResult};
use super::model::PoseModel;
use super::preprocess::preprocess_for_movenet;
use crate::error::ModelError;

fn build_session(model_path: &Path) -> Result<Session> {
    let builder = Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;

    #[cfg(feature = "cuda")]
    let builder = {
        tracing::info!("[ort] Attempting CUDA execution provider...");
        builder.with_execution_providers([ort::execution_providers::CUDAExecutionProvider::default().build()])?
    };

    builder
        .commit_from_file(model_path)
        .context("Failed to load ONNX model")
}

/// MoveNet (ONNX) を使用した姿勢推定
///
/// 推論はブロッキングなので `spawn_blocking` で回す
#[derive(Clone)]
pub struct MoveNetModel {
    session: Arc<Mutex<Session>>,
}

impl MoveNetModel {
    /// ONNXモデルを同期的に読み込む
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let session = build_session(model_path.as_ref())?;
        Ok(Self {
            session: Arc::new(Mutex::new(session)),
        })
    }

    /// 別スレッドで読み込む。ループの開始条件として渡す。
    pub async fn load(model_path: PathBuf) -> Result<Self, ModelError> {
        let shown = model_path.display().to_string();
        let loaded = tokio::task::spawn_blocking(move || Self::new(&model_path))
            .await
            .map_err(|e| ModelError::Load(e.to_string()))?;
        let model = loaded.map_err(|e| ModelError::Load(format!("{:#}", e)))?;
        tracing::info!("pose model loaded from {}", shown);
        Ok(model)
    }

    /// 前処理済みテンソルから正規化座標のキーポイントを得る
    ///
    /// 出力: [1, 1, 17, 3] (y, x, score)
    fn infer(session: &Mutex<Session>, input: Array4<f32>) -> Result<[[f32; 3]; PartName::COUNT]> {
        let input_tensor = Tensor::from_array(input)?;
        let mut session = session
            .lock()
            .map_err(|_| anyhow::anyhow!("session lock poisoned"))?;
        let outputs = session
            .run(ort::inputs!["serving_default_input_0" => input_tensor])
            .context("Inference failed")?;

        let output: ndarray::ArrayViewD<f32> = outputs["StatefulPartitionedCall_0"]
            .try_extract_array()
            .context("Failed to extract output tensor")?;

        let mut raw = [[0.0f32; 3]; PartName::COUNT];
        for (i, slot) in raw.iter_mut().enumerate() {
            *slot = [output[[0, 0, i, 0]], output[[0, 0, i, 1]], output[[0, 0, i, 2]]];
        }
        Ok(raw)
    }
}

#[async_trait]
impl PoseModel<Mat> for MoveNetModel {
    async fn estimate(&self, frame: Mat) -> Result<PoseResult, ModelError> {
        let session = Arc::clone(&self.session);
        tokio::task::spawn_blocking(move || {
            let width = frame.cols().max(0) as u32;
            let height = frame.rows().max(0) as u32;
            let input = preprocess_for_movenet(&frame).map_err(|e| ModelError::Decode(format!("{:#}", e)))?;
            let raw = Self::infer(&session, input).map_err(|e| ModelError::Inference(format!("{:#}", e)))?;
            Ok(PoseResult::from_normalized(&raw, width, height))
        })
        .await
        .map_err(|e| ModelError::Inference(e.to_string()))?
    }
}
