// 该文件是 Weibei （渭北春树） 项目的一部分。
// src/image.rs - 图像借用视图
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use thiserror::Error;

use crate::geometry::PixelRect;

const CHANNELS: usize = 3;

/// 像素格式，每通道 8 位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
  Rgb,
  Bgr,
}

#[derive(Error, Debug)]
pub enum ImageViewError {
  #[error("图像为空: {0}x{1}")]
  Empty(u32, u32),
  #[error("行跨度过小: stride={stride}, 至少需要 {min}")]
  StrideTooSmall { stride: usize, min: usize },
  #[error("像素数据不足: 提供 {actual} 字节, 至少需要 {min} 字节")]
  DataTooShort { actual: usize, min: usize },
  #[error("ROI 超出图像范围: roi={roi:?}, 图像 {width}x{height}")]
  RoiOutOfBounds {
    roi: PixelRect,
    width: u32,
    height: u32,
  },
}

/// 对外部帧缓冲的只读借用视图。
///
/// 本类型不持有像素所有权，仅在一次检测调用期间有效，
/// 与帧的生产者（解码器、采集管线）解耦。
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a> {
  data: &'a [u8],
  width: u32,
  height: u32,
  stride: usize,
  format: PixelFormat,
}

impl<'a> ImageView<'a> {
  /// 以显式行跨度包裹一段像素缓冲。stride 以字节计，须不小于 width*3。
  pub fn new(
    data: &'a [u8],
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
  ) -> Result<Self, ImageViewError> {
    if width == 0 || height == 0 {
      return Err(ImageViewError::Empty(width, height));
    }
    let row_bytes = width as usize * CHANNELS;
    if stride < row_bytes {
      return Err(ImageViewError::StrideTooSmall {
        stride,
        min: row_bytes,
      });
    }
    let min_len = stride * (height as usize - 1) + row_bytes;
    if data.len() < min_len {
      return Err(ImageViewError::DataTooShort {
        actual: data.len(),
        min: min_len,
      });
    }
    Ok(Self {
      data,
      width,
      height,
      stride,
      format,
    })
  }

  /// 紧凑排布（stride == width*3）的便捷构造
  pub fn packed(
    data: &'a [u8],
    width: u32,
    height: u32,
    format: PixelFormat,
  ) -> Result<Self, ImageViewError> {
    Self::new(data, width, height, width as usize * CHANNELS, format)
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn stride(&self) -> usize {
    self.stride
  }

  pub fn format(&self) -> PixelFormat {
    self.format
  }

  /// 返回第 y 行的紧凑像素数据（不含行尾填充）
  pub fn row(&self, y: u32) -> &'a [u8] {
    let start = y as usize * self.stride;
    &self.data[start..start + self.width as usize * CHANNELS]
  }

  /// 裁剪出 ROI 子视图（浅拷贝，仍借用原缓冲）。
  /// ROI 必须完全落在图像内。
  pub fn roi(&self, roi: PixelRect) -> Result<ImageView<'a>, ImageViewError> {
    if roi.x < 0
      || roi.y < 0
      || roi.width <= 0
      || roi.height <= 0
      || roi.x as i64 + roi.width as i64 > self.width as i64
      || roi.y as i64 + roi.height as i64 > self.height as i64
    {
      return Err(ImageViewError::RoiOutOfBounds {
        roi,
        width: self.width,
        height: self.height,
      });
    }

    let offset = roi.y as usize * self.stride + roi.x as usize * CHANNELS;
    Ok(ImageView {
      data: &self.data[offset..],
      width: roi.width as u32,
      height: roi.height as u32,
      stride: self.stride,
      format: self.format,
    })
  }

  /// 借用 `image` crate 解码出的 RGB 图像
  #[cfg(feature = "read_image_file")]
  pub fn of_rgb_image(img: &'a image::RgbImage) -> Self {
    Self {
      data: img.as_raw().as_slice(),
      width: img.width(),
      height: img.height(),
      stride: img.width() as usize * CHANNELS,
      format: PixelFormat::Rgb,
    }
  }
}
