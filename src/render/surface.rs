use tokio::sync::watch;

use super::skeleton::{KEYPOINT_COLOR, KEYPOINT_RADIUS, LINE_WIDTH, SKELETON_COLOR};

/// オーバーレイの描画先
///
/// `resize` はキャンバスと同じく中身も消去する。
pub trait DrawingSurface: Send {
    fn resize(&mut self, width: u32, height: u32);
    fn draw_marker(&mut self, x: f32, y: f32);
    fn draw_line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32);

    /// コミットされた描画のたびに呼ばれる
    fn present(&mut self) {}
}

/// 描画済みオーバーレイのスナップショット (0 = 透明)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u32>,
}

impl OverlayFrame {
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x < self.width && y < self.height {
            self.pixels.get((y * self.width + x) as usize).copied()
        } else {
            None
        }
    }
}

/// ソフトウェアラスタライザ
pub struct PixelSurface {
    frame: OverlayFrame,
    keypoint_color: u32,
    skeleton_color: u32,
    marker_radius: i64,
    line_width: i64,
    publisher: Option<watch::Sender<OverlayFrame>>,
}

impl PixelSurface {
    pub fn new() -> Self {
        Self {
            frame: OverlayFrame::default(),
            keypoint_color: KEYPOINT_COLOR,
            skeleton_color: SKELETON_COLOR,
            marker_radius: KEYPOINT_RADIUS as i64,
            line_width: LINE_WIDTH as i64,
            publisher: None,
        }
    }

    pub fn with_style(mut self, keypoint_color: u32, skeleton_color: u32, marker_radius: u32, line_width: u32) -> Self {
        self.keypoint_color = keypoint_color;
        self.skeleton_color = skeleton_color;
        self.marker_radius = marker_radius as i64;
        self.line_width = line_width.max(1) as i64;
        self
    }

    /// `present` のたびにスナップショットを送るチャネルを作る
    pub fn publish(&mut self) -> watch::Receiver<OverlayFrame> {
        let (tx, rx) = watch::channel(self.frame.clone());
        self.publisher = Some(tx);
        rx
    }

    pub fn frame(&self) -> &OverlayFrame {
        &self.frame
    }

    pub fn width(&self) -> u32 {
        self.frame.width
    }

    pub fn height(&self) -> u32 {
        self.frame.height
    }

    /// 円を描画（塗りつぶし）
    fn fill_circle(&mut self, cx: i64, cy: i64, radius: i64, color: u32) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.set_pixel(cx + dx, cy + dy, color);
                }
            }
        }
    }

    /// 太さ分の正方形を置く
    fn stamp(&mut self, x: i64, y: i64, color: u32) {
        let lo = -(self.line_width - 1) / 2;
        let hi = lo + self.line_width - 1;
        for dy in lo..=hi {
            for dx in lo..=hi {
                self.set_pixel(x + dx, y + dy, color);
            }
        }
    }

    /// ピクセルをセット（境界チェック付き）
    fn set_pixel(&mut self, x: i64, y: i64, color: u32) {
        let w = self.frame.width as i64;
        let h = self.frame.height as i64;
        if x >= 0 && x < w && y >= 0 && y < h {
            self.frame.pixels[(y * w + x) as usize] = color;
        }
    }
}

/// Liang-Barsky で線分を [0, w-1] x [0, h-1] に切り詰める。完全に外なら None
///
/// 座標は任意の f32 が来るので f64 で計算する
fn clip_segment(x0: f64, y0: f64, x1: f64, y1: f64, w: u32, h: u32) -> Option<(f64, f64, f64, f64)> {
    if w == 0 || h == 0 || ![x0, y0, x1, y1].iter().all(|v| v.is_finite()) {
        return None;
    }
    let x_max = (w - 1) as f64;
    let y_max = (h - 1) as f64;
    let dx = x1 - x0;
    let dy = y1 - y0;
    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;

    for (p, q) in [(-dx, x0), (dx, x_max - x0), (-dy, y0), (dy, y_max - y0)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    Some((x0 + t0 * dx, y0 + t0 * dy, x0 + t1 * dx, y0 + t1 * dy))
}

impl Default for PixelSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawingSurface for PixelSurface {
    fn resize(&mut self, width: u32, height: u32) {
        self.frame.width = width;
        self.frame.height = height;
        self.frame.pixels.clear();
        self.frame.pixels.resize(width as usize * height as usize, 0);
    }

    fn draw_marker(&mut self, x: f32, y: f32) {
        let r = self.marker_radius as f32;
        let (w, h) = (self.frame.width as f32, self.frame.height as f32);
        if !x.is_finite() || !y.is_finite() || x < -r || y < -r || x > w + r || y > h + r {
            return;
        }
        let color = self.keypoint_color;
        self.fill_circle(x.round() as i64, y.round() as i64, self.marker_radius, color);
    }

    /// 切り詰めてから Bresenham で線を描画
    fn draw_line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) {
        let Some((cx0, cy0, cx1, cy1)) = clip_segment(
            x1 as f64,
            y1 as f64,
            x2 as f64,
            y2 as f64,
            self.frame.width,
            self.frame.height,
        ) else {
            return;
        };
        let color = self.skeleton_color;
        let x_max = self.frame.width as i64 - 1;
        let y_max = self.frame.height as i64 - 1;
        let x0 = (cx0.round() as i64).clamp(0, x_max);
        let y0 = (cy0.round() as i64).clamp(0, y_max);
        let x1 = (cx1.round() as i64).clamp(0, x_max);
        let y1 = (cy1.round() as i64).clamp(0, y_max);

        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        let mut x = x0;
        let mut y = y0;

        loop {
            self.stamp(x, y, color);

            if x == x1 && y == y1 {
                break;
            }

            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn present(&mut self) {
        if let Some(tx) = &self.publisher {
            tx.send_replace(self.frame.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_clears() {
        let mut s = PixelSurface::new();
        s.resize(10, 10);
        s.draw_marker(5.0, 5.0);
        assert_eq!(s.frame().pixel(5, 5), Some(KEYPOINT_COLOR));

        s.resize(4, 3);
        assert_eq!(s.width(), 4);
        assert_eq!(s.height(), 3);
        assert!(s.frame().pixels.iter().all(|&p| p == 0));
        assert_eq!(s.frame().pixels.len(), 12);
    }

    #[test]
    fn test_marker_is_filled_circle() {
        let mut s = PixelSurface::new().with_style(0xFF0000, 0x00FF00, 2, 1);
        s.resize(20, 20);
        s.draw_marker(10.0, 10.0);
        assert_eq!(s.frame().pixel(10, 10), Some(0xFF0000));
        assert_eq!(s.frame().pixel(12, 10), Some(0xFF0000));
        assert_eq!(s.frame().pixel(12, 12), Some(0));
        assert_eq!(s.frame().pixel(13, 10), Some(0));
    }

    #[test]
    fn test_line_endpoints() {
        let mut s = PixelSurface::new().with_style(0xFF0000, 0x00FF00, 1, 1);
        s.resize(20, 20);
        s.draw_line(2.0, 3.0, 15.0, 9.0);
        assert_eq!(s.frame().pixel(2, 3), Some(0x00FF00));
        assert_eq!(s.frame().pixel(15, 9), Some(0x00FF00));
    }

    #[test]
    fn test_out_of_bounds_is_clipped() {
        let mut s = PixelSurface::new();
        s.resize(8, 8);
        s.draw_marker(-50.0, 100.0);
        s.draw_line(-10.0, -10.0, 20.0, 20.0);
        assert_eq!(s.frame().pixels.len(), 64);
        assert_eq!(s.frame().pixel(4, 4), Some(SKELETON_COLOR));
    }

    #[test]
    fn test_extreme_line_is_clipped_to_surface() {
        let mut s = PixelSurface::new().with_style(0xFF0000, 0x00FF00, 1, 1);
        s.resize(8, 8);
        s.draw_line(-3.0e9, 4.0, 3.0e9, 4.0);
        for x in 0..8 {
            assert_eq!(s.frame().pixel(x, 4), Some(0x00FF00));
        }
        assert_eq!(s.frame().pixel(0, 3), Some(0));

        s.resize(8, 8);
        s.draw_line(0.0, 0.0, 2.0e8, 0.0);
        assert_eq!(s.frame().pixel(0, 0), Some(0x00FF00));
        assert_eq!(s.frame().pixel(7, 0), Some(0x00FF00));

        // 端点が f32 の極値でも落ちない
        s.draw_line(f32::MIN, f32::MIN, f32::MAX, f32::MAX);
        assert_eq!(s.frame().pixels.len(), 64);
    }

    #[test]
    fn test_line_fully_outside_draws_nothing() {
        let mut s = PixelSurface::new();
        s.resize(8, 8);
        s.draw_line(-100.0, -100.0, -50.0, -10.0);
        s.draw_line(20.0, 0.0, 1.0e9, 7.0);
        s.draw_line(f32::NAN, 1.0, 4.0, 4.0);
        assert!(s.frame().pixels.iter().all(|&p| p == 0));
    }

    #[test]
    fn test_far_marker_is_ignored() {
        let mut s = PixelSurface::new();
        s.resize(8, 8);
        s.draw_marker(f32::MAX, f32::MIN);
        s.draw_marker(f32::INFINITY, 2.0);
        assert!(s.frame().pixels.iter().all(|&p| p == 0));

        // 中心が外でも半径内なら縁だけ描く
        s.draw_marker(-2.0, 4.0);
        assert_eq!(s.frame().pixel(0, 4), Some(KEYPOINT_COLOR));
    }

    #[test]
    fn test_present_publishes_snapshot() {
        let mut s = PixelSurface::new();
        let rx = s.publish();
        s.resize(6, 6);
        s.draw_marker(3.0, 3.0);
        assert_eq!(rx.borrow().width, 0);

        s.present();
        let published = rx.borrow().clone();
        assert_eq!(published.width, 6);
        assert_eq!(published.pixel(3, 3), Some(KEYPOINT_COLOR));
    }
}
