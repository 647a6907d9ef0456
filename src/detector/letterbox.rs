// 该文件是 Weibei （渭北春树） 项目的一部分。
// src/detector/letterbox.rs - letterbox 预处理
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use tracing::debug;

use crate::detector::DetectError;
use crate::geometry::Rect;
use crate::image::{ImageView, PixelFormat};

/// letterbox 填充像素，中性灰
const PAD_VALUE: f32 = 128.0 / 255.0;

/// 单次调用的 letterbox 变换参数，坐标反变换依赖它。
/// 仅在一帧范围内有效，不得跨并发检测共享。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxTransform {
  pub scale: f32,
  pub x_offset: u32,
  pub y_offset: u32,
}

impl LetterboxTransform {
  /// 模型输入空间 → 源图像空间。
  /// 减去填充偏移再除以缩放系数，左上角钳制到非负。
  pub fn unmap_rect(&self, r: &Rect) -> Rect {
    let x_min = ((r.x - self.x_offset as f32) / self.scale).max(0.0);
    let y_min = ((r.y - self.y_offset as f32) / self.scale).max(0.0);
    let x_max = (r.right() - self.x_offset as f32) / self.scale;
    let y_max = (r.bottom() - self.y_offset as f32) / self.scale;
    Rect::new(x_min, y_min, x_max - x_min, y_max - y_min)
  }
}

/// 等比缩放 + 居中填充的预处理器。
///
/// 源图像按 `scale = min(W/w, H/h)` 等比缩放后双线性重采样到
/// 模型输入中央，其余区域填充中性灰；输出为 RGB 顺序、`/255`
/// 归一化的 NHWC f32 缓冲。
pub struct Letterbox {
  input_w: usize,
  input_h: usize,
}

impl Letterbox {
  pub fn new(input_h: usize, input_w: usize) -> Self {
    Self { input_w, input_h }
  }

  /// 只计算缩放与偏移，不触碰像素。
  pub fn transform_for(&self, src_w: u32, src_h: u32) -> Result<LetterboxTransform, DetectError> {
    let scale = (self.input_w as f32 / src_w as f32).min(self.input_h as f32 / src_h as f32);
    let scaled_w = (src_w as f32 * scale).round() as u32;
    let scaled_h = (src_h as f32 * scale).round() as u32;

    if scaled_w == 0 || scaled_h == 0 {
      return Err(DetectError::InvalidImage(format!(
        "缩放后区域为空: {}x{} -> {}x{}",
        src_w, src_h, scaled_w, scaled_h
      )));
    }

    Ok(LetterboxTransform {
      scale,
      x_offset: (self.input_w as u32 - scaled_w) / 2,
      y_offset: (self.input_h as u32 - scaled_h) / 2,
    })
  }

  /// 将源图像写入模型输入缓冲，返回本帧的变换参数。
  pub fn apply(
    &self,
    image: &ImageView<'_>,
    dst: &mut [f32],
  ) -> Result<LetterboxTransform, DetectError> {
    let expected = self.input_w * self.input_h * 3;
    if dst.len() != expected {
      return Err(DetectError::InvalidImage(format!(
        "输入缓冲大小不匹配: {} != {}",
        dst.len(),
        expected
      )));
    }

    let transform = self.transform_for(image.width(), image.height())?;
    let scaled_w = (image.width() as f32 * transform.scale).round() as usize;
    let scaled_h = (image.height() as f32 * transform.scale).round() as usize;

    debug!(
      "letterbox: {}x{} -> {}x{} @ ({}, {}), scale={:.4}",
      image.width(),
      image.height(),
      scaled_w,
      scaled_h,
      transform.x_offset,
      transform.y_offset,
      transform.scale
    );

    dst.fill(PAD_VALUE);

    // 双线性重采样。BGR 源在取样时交换通道，输出统一为 RGB。
    let (r_idx, b_idx) = match image.format() {
      PixelFormat::Rgb => (0usize, 2usize),
      PixelFormat::Bgr => (2, 0),
    };
    let src_w = image.width() as usize;
    let src_h = image.height() as usize;
    let inv_scale = 1.0 / transform.scale;

    for dy in 0..scaled_h {
      let sy = ((dy as f32 + 0.5) * inv_scale - 0.5).clamp(0.0, (src_h - 1) as f32);
      let y0 = sy.floor() as usize;
      let y1 = (y0 + 1).min(src_h - 1);
      let fy = sy - y0 as f32;
      let row0 = image.row(y0 as u32);
      let row1 = image.row(y1 as u32);

      for dx in 0..scaled_w {
        let sx = ((dx as f32 + 0.5) * inv_scale - 0.5).clamp(0.0, (src_w - 1) as f32);
        let x0 = sx.floor() as usize;
        let x1 = (x0 + 1).min(src_w - 1);
        let fx = sx - x0 as f32;

        let out = ((transform.y_offset as usize + dy) * self.input_w
          + transform.x_offset as usize
          + dx)
          * 3;

        for (c_out, c_src) in [(0usize, r_idx), (1, 1), (2, b_idx)] {
          let p00 = row0[x0 * 3 + c_src] as f32;
          let p01 = row0[x1 * 3 + c_src] as f32;
          let p10 = row1[x0 * 3 + c_src] as f32;
          let p11 = row1[x1 * 3 + c_src] as f32;
          let top = p00 + (p01 - p00) * fx;
          let bottom = p10 + (p11 - p10) * fx;
          dst[out + c_out] = (top + (bottom - top) * fy) / 255.0;
        }
      }
    }

    Ok(transform)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::image::PixelFormat;

  fn solid_image(w: u32, h: u32, rgb: [u8; 3]) -> Vec<u8> {
    let mut data = Vec::with_capacity((w * h * 3) as usize);
    for _ in 0..w * h {
      data.extend_from_slice(&rgb);
    }
    data
  }

  #[test]
  fn transform_stays_inside_model_input() {
    let lb = Letterbox::new(640, 640);
    for (w, h) in [(1920u32, 1080u32), (720, 1280), (640, 640), (33, 1017)] {
      let t = lb.transform_for(w, h).unwrap();
      let scaled_w = (w as f32 * t.scale).round() as u32;
      let scaled_h = (h as f32 * t.scale).round() as u32;
      assert!(scaled_w <= 640 && scaled_h <= 640, "{}x{}", w, h);
      assert!(t.x_offset + scaled_w <= 640);
      assert!(t.y_offset + scaled_h <= 640);
    }
  }

  #[test]
  fn known_transform_for_720p() {
    let lb = Letterbox::new(640, 640);
    let t = lb.transform_for(1280, 720).unwrap();
    assert!((t.scale - 0.5).abs() < 1e-6);
    assert_eq!(t.x_offset, 0);
    assert_eq!(t.y_offset, 140);
  }

  #[test]
  fn padding_is_neutral_gray_and_content_is_normalized() {
    let lb = Letterbox::new(64, 64);
    let data = solid_image(32, 16, [200, 100, 50]);
    let view = ImageView::packed(&data, 32, 16, PixelFormat::Rgb).unwrap();
    let mut dst = vec![0.0f32; 64 * 64 * 3];
    let t = lb.apply(&view, &mut dst).unwrap();

    // 32x16 -> 64x32，垂直居中
    assert_eq!((t.x_offset, t.y_offset), (0, 16));

    // 填充区
    let corner = &dst[0..3];
    for v in corner {
      assert!((v - 128.0 / 255.0).abs() < 1e-6);
    }

    // 内容区中心
    let mid = ((32 * 64) + 32) * 3;
    assert!((dst[mid] - 200.0 / 255.0).abs() < 1e-3);
    assert!((dst[mid + 1] - 100.0 / 255.0).abs() < 1e-3);
    assert!((dst[mid + 2] - 50.0 / 255.0).abs() < 1e-3);
  }

  #[test]
  fn bgr_source_is_swapped_to_rgb() {
    let lb = Letterbox::new(32, 32);
    let data = solid_image(32, 32, [50, 100, 200]); // BGR 排布
    let view = ImageView::packed(&data, 32, 32, PixelFormat::Bgr).unwrap();
    let mut dst = vec![0.0f32; 32 * 32 * 3];
    lb.apply(&view, &mut dst).unwrap();

    assert!((dst[0] - 200.0 / 255.0).abs() < 1e-3);
    assert!((dst[2] - 50.0 / 255.0).abs() < 1e-3);
  }

  #[test]
  fn unmap_round_trips_within_one_pixel() {
    let lb = Letterbox::new(640, 640);
    let t = lb.transform_for(1280, 720).unwrap();

    // 源空间的一个框映射进模型空间，再反变换回来
    let src = Rect::new(200.0, 200.0, 100.0, 60.0);
    let mapped = Rect::new(
      src.x * t.scale + t.x_offset as f32,
      src.y * t.scale + t.y_offset as f32,
      src.width * t.scale,
      src.height * t.scale,
    );
    let back = t.unmap_rect(&mapped);

    assert!((back.x - src.x).abs() <= 1.0);
    assert!((back.y - src.y).abs() <= 1.0);
    assert!((back.width - src.width).abs() <= 1.0);
    assert!((back.height - src.height).abs() <= 1.0);
  }

  #[test]
  fn degenerate_scale_is_rejected() {
    let lb = Letterbox::new(640, 640);
    // 1x20000 的极端长条，等比缩放后高度取整为 0
    assert!(matches!(
      lb.transform_for(20000, 1),
      Err(DetectError::InvalidImage(_))
    ));
  }
}
