use anyhow::Result;
use minifb::{Key, Window, WindowOptions};
use opencv::core::{Mat, Vec3b, Vec4b};
use opencv::prelude::*;

use super::surface::OverlayFrame;
use crate::presence::PresenceState;

/// minifbを使用したレンダラー
///
/// カメラ映像の上にオーバーレイを重ね、在席状態をタイトルに出す
pub struct MinifbRenderer {
    window: Window,
    title: String,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
}

impl MinifbRenderer {
    /// ウィンドウを作成
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: true,
                ..WindowOptions::default()
            },
        )?;

        Ok(Self {
            window,
            title: title.to_string(),
            buffer: vec![0u32; width * height],
            width,
            height,
        })
    }

    /// ウィンドウが開いているか
    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(Key::Escape)
    }

    /// 映像サイズが変わったらバッファを作り直す
    fn ensure_size(&mut self, width: usize, height: usize) {
        if width != self.width || height != self.height {
            self.width = width;
            self.height = height;
            self.buffer = vec![0u32; width * height];
        }
    }

    /// BGR / BGRA / グレースケールの Mat をバッファにコピー
    pub fn draw_frame(&mut self, frame: &Mat) -> Result<()> {
        let channels = frame.channels();
        if !matches!(channels, 1 | 3 | 4) {
            anyhow::bail!("unsupported channel count: {}", channels);
        }
        let frame_width = frame.cols().max(0) as usize;
        let frame_height = frame.rows().max(0) as usize;
        self.ensure_size(frame_width, frame_height);

        for y in 0..frame_height {
            for x in 0..frame_width {
                let (row, col) = (y as i32, x as i32);
                let (b, g, r) = match channels {
                    4 => {
                        let p = frame.at_2d::<Vec4b>(row, col)?;
                        (p[0], p[1], p[2])
                    }
                    3 => {
                        let p = frame.at_2d::<Vec3b>(row, col)?;
                        (p[0], p[1], p[2])
                    }
                    _ => {
                        let v = *frame.at_2d::<u8>(row, col)?;
                        (v, v, v)
                    }
                };
                self.buffer[y * self.width + x] = pack_rgb(r, g, b);
            }
        }

        Ok(())
    }

    /// オーバーレイの不透明ピクセルだけを重ねる
    ///
    /// 映像とサイズが違う (解像度変更直後の) オーバーレイは捨てる
    pub fn draw_overlay(&mut self, overlay: &OverlayFrame) {
        if overlay.width as usize != self.width || overlay.height as usize != self.height {
            return;
        }
        for (dst, &src) in self.buffer.iter_mut().zip(overlay.pixels.iter()) {
            if src != 0 {
                *dst = src;
            }
        }
    }

    pub fn set_status(&mut self, presence: PresenceState) {
        let title = format!("{} - {}", self.title, presence);
        self.window.set_title(&title);
    }

    /// バッファをウィンドウに表示
    pub fn update(&mut self) -> Result<()> {
        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)?;
        Ok(())
    }
}

fn pack_rgb(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}
