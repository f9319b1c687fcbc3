use anyhow::{Context, Result};
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureAPIs},
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::{ReadyState, VideoFrameMeta, VideoSource};
use crate::config::CameraConfig;

/// OpenCVを使用したカメラキャプチャ
pub struct OpenCvCamera {
    capture: VideoCapture,
}

impl OpenCvCamera {
    /// 解像度を指定してカメラを開く
    pub fn open(index: i32, width: u32, height: u32) -> Result<Self> {
        let mut capture =
            VideoCapture::new(index, VideoCaptureAPIs::CAP_ANY as i32).context("Failed to open camera")?;

        if !capture.is_opened()? {
            anyhow::bail!("Camera {} is not available", index);
        }

        capture.set(videoio::CAP_PROP_FRAME_WIDTH, width as f64)?;
        capture.set(videoio::CAP_PROP_FRAME_HEIGHT, height as f64)?;
        capture.set(videoio::CAP_PROP_BUFFERSIZE, 1.0)?;

        let actual_width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32;
        let actual_height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32;
        tracing::info!(
            "camera {} opened (requested {}x{}, got {}x{})",
            index, width, height, actual_width, actual_height
        );

        Ok(Self { capture })
    }

    /// フレームを読み込む（BGR形式）
    pub fn read_frame(&mut self) -> Result<Mat> {
        let mut frame = Mat::default();
        self.capture
            .read(&mut frame)
            .context("Failed to read frame")?;

        if frame.empty() {
            anyhow::bail!("Empty frame received");
        }

        Ok(frame)
    }
}

/// 別スレッドでカメラキャプチャを行い、最新フレームを提供する
///
/// 最初のフレームが届くまでは NotReady。サイズは最新フレームから読む。
pub struct ThreadedCamera {
    latest: Arc<Mutex<Option<Mat>>>,
    running: Arc<AtomicBool>,
    _handle: thread::JoinHandle<()>,
}

impl ThreadedCamera {
    pub fn start(config: &CameraConfig) -> Result<Self> {
        let mut camera = OpenCvCamera::open(config.index, config.width, config.height)?;
        let index = config.index;
        let latest = Arc::new(Mutex::new(None::<Mat>));
        let latest_ref = Arc::clone(&latest);
        let running = Arc::new(AtomicBool::new(true));
        let running_ref = Arc::clone(&running);

        let handle = thread::spawn(move || {
            while running_ref.load(Ordering::Relaxed) {
                match camera.read_frame() {
                    Ok(frame) => {
                        let Ok(mut slot) = latest_ref.lock() else { break };
                        *slot = Some(frame);
                    }
                    Err(e) => {
                        tracing::debug!("[cam{}] read error: {:#}", index, e);
                        thread::sleep(Duration::from_millis(100));
                    }
                }
            }
        });

        Ok(Self {
            latest,
            running,
            _handle: handle,
        })
    }

    /// 最新フレームを取得。初回フレーム到着前のみNone。
    pub fn get_frame(&self) -> Option<Mat> {
        let guard = self.latest.lock().ok()?;
        guard.as_ref().map(|m| m.clone())
    }
}

fn meta_of(frame: &Mat) -> VideoFrameMeta {
    VideoFrameMeta {
        width: frame.cols().max(0) as u32,
        height: frame.rows().max(0) as u32,
        ready_state: ReadyState::Ready,
    }
}

impl VideoSource for ThreadedCamera {
    type Frame = Mat;

    fn meta(&self) -> VideoFrameMeta {
        let Ok(guard) = self.latest.lock() else {
            return VideoFrameMeta::default();
        };
        guard.as_ref().map(meta_of).unwrap_or_default()
    }

    /// サイズとフレームを同じロックの中で取る
    fn snapshot(&self) -> Option<(VideoFrameMeta, Mat)> {
        let guard = self.latest.lock().ok()?;
        guard.as_ref().map(|frame| (meta_of(frame), frame.clone()))
    }
}

impl Drop for ThreadedCamera {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}
