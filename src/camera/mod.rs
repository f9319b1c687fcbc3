#[cfg(feature = "desktop")]
pub mod capture;

#[cfg(feature = "desktop")]
pub use capture::ThreadedCamera;

/// 映像ソースの準備状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadyState {
    #[default]
    NotReady,
    Ready,
}

/// 現在のフレームのメタ情報
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VideoFrameMeta {
    pub width: u32,
    pub height: u32,
    pub ready_state: ReadyState,
}

impl VideoFrameMeta {
    pub fn ready(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ready_state: ReadyState::Ready,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready_state == ReadyState::Ready
    }

    pub fn has_valid_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// ライブ映像ソース。状態とサイズは毎回読み直す。
pub trait VideoSource: Send + Sync {
    type Frame: Send + 'static;

    fn meta(&self) -> VideoFrameMeta;

    /// 最新フレームとそのメタ情報を一度に取る。まだ無ければ None
    ///
    /// `meta()` とは別の読み取りなので、その間にサイズが変わっていてもよい。
    fn snapshot(&self) -> Option<(VideoFrameMeta, Self::Frame)>;
}
