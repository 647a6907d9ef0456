// 该文件是 Weibei （渭北春树） 项目的一部分。
// src/geometry.rs - 几何基础类型
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

/// 二维点
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
  pub x: f32,
  pub y: f32,
}

/// 轴对齐矩形，x/y 为左上角
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

impl Rect {
  pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  pub fn right(&self) -> f32 {
    self.x + self.width
  }

  pub fn bottom(&self) -> f32 {
    self.y + self.height
  }

  pub fn is_empty(&self) -> bool {
    self.width <= 0.0 || self.height <= 0.0
  }

  /// 判断 other 是否完全落在本矩形内部
  pub fn contains(&self, other: &Rect) -> bool {
    other.x >= self.x
      && other.y >= self.y
      && other.right() <= self.right()
      && other.bottom() <= self.bottom()
  }
}

/// 整数像素矩形，用于 ROI 等图像域参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelRect {
  pub x: i32,
  pub y: i32,
  pub width: i32,
  pub height: i32,
}

impl PixelRect {
  pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }
}

/// 离散像素约定下的 IoU。
///
/// 重叠与面积都按 `+1` 约定计算（宽 w 的框覆盖 w+1 个像素列），
/// 与边界框以闭区间像素坐标表示的习惯一致。NMS 依赖该约定。
pub fn calc_iou(a: &Rect, b: &Rect) -> f32 {
  let x_overlap = (a.right().min(b.right()) - a.x.max(b.x) + 1.0).max(0.0);
  let y_overlap = (a.bottom().min(b.bottom()) - a.y.max(b.y) + 1.0).max(0.0);
  let intersection = x_overlap * y_overlap;
  let union = (a.width + 1.0) * (a.height + 1.0) + (b.width + 1.0) * (b.height + 1.0) - intersection;
  intersection / union
}
