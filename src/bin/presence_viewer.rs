//! Live camera view with skeleton overlay and presence status.
//!
//! Reads `presence.toml` from the working directory (defaults if missing).

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use presence_overlay::camera::ThreadedCamera;
use presence_overlay::config::Config;
use presence_overlay::logging::init_logging;
use presence_overlay::pose::MoveNetModel;
use presence_overlay::render::{MinifbRenderer, PixelSurface};
use presence_overlay::{CycleEvent, DetectionLoop};

const CONFIG_PATH: &str = "presence.toml";

/// ウィンドウの更新間隔 (~60fps)
const DISPLAY_INTERVAL: Duration = Duration::from_millis(16);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load_or_default(CONFIG_PATH);
    let _guard = init_logging(&config.log)?;
    tracing::info!("presence viewer {}", env!("GIT_VERSION"));

    let camera = Arc::new(ThreadedCamera::start(&config.camera)?);

    let overlay = &config.overlay;
    let mut surface = PixelSurface::new().with_style(
        overlay.keypoint_color,
        overlay.skeleton_color,
        overlay.marker_radius,
        overlay.line_width,
    );
    let overlay_rx = surface.publish();

    let detection = DetectionLoop::from_config(&config);
    let mut handle = detection.start_when_loaded(
        MoveNetModel::load(PathBuf::from(&config.model.path)),
        Arc::clone(&camera),
        surface,
    );
    let mut events = handle.take_events();

    let mut renderer = MinifbRenderer::new(
        "Presence Viewer",
        config.camera.width as usize,
        config.camera.height as usize,
    )?;

    // 1秒ごとのサイクル集計
    let mut committed = 0u32;
    let mut failed = 0u32;
    let mut stats_timer = Instant::now();

    while renderer.is_open() {
        if let Some(frame) = camera.get_frame() {
            renderer.draw_frame(&frame)?;
        }
        renderer.draw_overlay(&overlay_rx.borrow());
        renderer.set_status(handle.presence());
        renderer.update()?;

        let mut load_failed = false;
        if let Some(rx) = events.as_mut() {
            while let Ok(event) = rx.try_recv() {
                match event {
                    CycleEvent::Committed { .. } => committed += 1,
                    CycleEvent::Failed { .. } => failed += 1,
                    CycleEvent::Stale { .. } => {}
                    CycleEvent::LoadFailed(e) => {
                        tracing::error!("cannot start detection: {}", e);
                        load_failed = true;
                    }
                }
            }
        }
        if load_failed {
            // カメラ映像だけ表示し続ける
            events = None;
        }

        let elapsed = stats_timer.elapsed().as_secs_f32();
        if elapsed >= 1.0 {
            tracing::info!(
                "cycles/s: {:.1} committed, {:.1} failed, presence: {}",
                committed as f32 / elapsed,
                failed as f32 / elapsed,
                handle.presence()
            );
            committed = 0;
            failed = 0;
            stats_timer = Instant::now();
        }

        tokio::time::sleep(DISPLAY_INTERVAL).await;
    }

    tracing::info!("Shutting down...");
    handle.stop().await?;
    Ok(())
}
