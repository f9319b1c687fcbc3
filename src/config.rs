use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::presence::LOWEST_SCORE;
use crate::render::overlay::{KEYPOINT_THRESHOLD, SKELETON_THRESHOLD};
use crate::render::skeleton::{KEYPOINT_COLOR, KEYPOINT_RADIUS, LINE_WIDTH, SKELETON_COLOR};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectionConfig {
    /// サンプリング間隔 (ミリ秒)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// 顔キーポイントをこの値未満なら不在とみなす
    #[serde(default = "default_lowest_score")]
    pub lowest_score: f32,
    /// イベントチャネルの容量
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// 同時に走らせる推定の上限。埋まっている間のティックは捨てる
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OverlayConfig {
    #[serde(default = "default_keypoint_threshold")]
    pub keypoint_threshold: f32,
    #[serde(default = "default_skeleton_threshold")]
    pub skeleton_threshold: f32,
    #[serde(default = "default_marker_radius")]
    pub marker_radius: u32,
    #[serde(default = "default_line_width")]
    pub line_width: u32,
    /// RGB (0x00FFFF など)。0 は透明扱いになるので使わない
    #[serde(default = "default_keypoint_color")]
    pub keypoint_color: u32,
    #[serde(default = "default_skeleton_color")]
    pub skeleton_color: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CameraConfig {
    #[serde(default)]
    pub index: i32,
    #[serde(default = "default_camera_width")]
    pub width: u32,
    #[serde(default = "default_camera_height")]
    pub height: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_model_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// ファイルにも書き出すか
    #[serde(default = "default_log_file")]
    pub file: bool,
}

fn default_interval_ms() -> u64 { 100 }
fn default_lowest_score() -> f32 { LOWEST_SCORE }
fn default_event_capacity() -> usize { 32 }
fn default_max_in_flight() -> usize { 4 }
fn default_keypoint_threshold() -> f32 { KEYPOINT_THRESHOLD }
fn default_skeleton_threshold() -> f32 { SKELETON_THRESHOLD }
fn default_marker_radius() -> u32 { KEYPOINT_RADIUS }
fn default_line_width() -> u32 { LINE_WIDTH }
fn default_keypoint_color() -> u32 { KEYPOINT_COLOR }
fn default_skeleton_color() -> u32 { SKELETON_COLOR }
fn default_camera_width() -> u32 { 640 }
fn default_camera_height() -> u32 { 480 }
fn default_model_path() -> String { "models/movenet_lightning.onnx".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_log_dir() -> String { "logs".to_string() }
fn default_log_file() -> bool { true }

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            lowest_score: default_lowest_score(),
            event_capacity: default_event_capacity(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            keypoint_threshold: default_keypoint_threshold(),
            skeleton_threshold: default_skeleton_threshold(),
            marker_radius: default_marker_radius(),
            line_width: default_line_width(),
            keypoint_color: default_keypoint_color(),
            skeleton_color: default_skeleton_color(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: default_camera_width(),
            height: default_camera_height(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: default_log_dir(),
            file: default_log_file(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 読めなければデフォルト値で続行
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("config {}: {:#}, using defaults", path.as_ref().display(), e);
                Self::default()
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.detection.interval_ms == 0 {
            anyhow::bail!("detection.interval_ms must be positive");
        }
        if self.detection.event_capacity == 0 {
            anyhow::bail!("detection.event_capacity must be positive");
        }
        if self.detection.max_in_flight == 0 {
            anyhow::bail!("detection.max_in_flight must be positive");
        }
        for (name, value) in [
            ("detection.lowest_score", self.detection.lowest_score),
            ("overlay.keypoint_threshold", self.overlay.keypoint_threshold),
            ("overlay.skeleton_threshold", self.overlay.skeleton_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{} must be within 0.0..=1.0 (got {})", name, value);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.detection.interval_ms, 100);
        assert_eq!(config.detection.lowest_score, 0.1);
        assert_eq!(config.detection.max_in_flight, 4);
        assert_eq!(config.overlay.keypoint_threshold, 0.6);
        assert_eq!(config.overlay.skeleton_threshold, 0.7);
        assert_eq!(config.overlay.marker_radius, 3);
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.camera.height, 480);
        assert!(config.log.file);
    }

    #[test]
    fn test_partial_override() {
        let config = Config::parse(
            r#"
            [detection]
            interval_ms = 250

            [overlay]
            skeleton_color = 0xFF8800
            "#,
        )
        .unwrap();
        assert_eq!(config.detection.interval_ms, 250);
        assert_eq!(config.detection.lowest_score, 0.1);
        assert_eq!(config.overlay.skeleton_color, 0xFF8800);
        assert_eq!(config.overlay.keypoint_color, 0x00FFFF);
    }

    #[test]
    fn test_rejects_zero_interval() {
        assert!(Config::parse("[detection]\ninterval_ms = 0\n").is_err());
    }

    #[test]
    fn test_rejects_zero_in_flight() {
        assert!(Config::parse("[detection]\nmax_in_flight = 0\n").is_err());
        let config = Config::parse("[detection]\nmax_in_flight = 1\n").unwrap();
        assert_eq!(config.detection.max_in_flight, 1);
    }

    #[test]
    fn test_rejects_threshold_out_of_range() {
        assert!(Config::parse("[overlay]\nkeypoint_threshold = 1.5\n").is_err());
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = Config::load_or_default("does/not/exist.toml");
        assert_eq!(config.detection.interval_ms, 100);
        assert!(Config::load("does/not/exist.toml").is_err());
    }
}
