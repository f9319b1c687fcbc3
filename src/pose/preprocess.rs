use anyhow::Result;
use ndarray::Array4;
use opencv::{
    core::{AlgorithmHint, Mat, Size, Vec3f, CV_32FC3},
    imgproc,
    prelude::*,
};

/// MoveNet用の入力サイズ
pub const MOVENET_INPUT_SIZE: i32 = 192;

/// カメラフレーム (BGR / BGRA / グレースケール) を MoveNet 入力テンソル [1, 192, 192, 3] に変換
///
/// 値は RGB の 0.0〜255.0。座標は後でフレームサイズに戻すので縦横比は保持しない。
pub fn preprocess_for_movenet(frame: &Mat) -> Result<Array4<f32>> {
    let code = match frame.channels() {
        4 => imgproc::COLOR_BGRA2RGB,
        3 => imgproc::COLOR_BGR2RGB,
        1 => imgproc::COLOR_GRAY2RGB,
        n => anyhow::bail!("unsupported channel count: {}", n),
    };
    let mut rgb = Mat::default();
    imgproc::cvt_color(frame, &mut rgb, code, 0, AlgorithmHint::ALGO_HINT_DEFAULT)?;

    let mut resized = Mat::default();
    imgproc::resize(
        &rgb,
        &mut resized,
        Size::new(MOVENET_INPUT_SIZE, MOVENET_INPUT_SIZE),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )?;

    let mut float_mat = Mat::default();
    resized.convert_to(&mut float_mat, CV_32FC3, 1.0, 0.0)?;

    let side = MOVENET_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, side, side, 3));
    for y in 0..MOVENET_INPUT_SIZE {
        for x in 0..MOVENET_INPUT_SIZE {
            let pixel = float_mat.at_2d::<Vec3f>(y, x)?;
            for c in 0..3 {
                tensor[[0, y as usize, x as usize, c]] = pixel[c];
            }
        }
    }

    Ok(tensor)
}
