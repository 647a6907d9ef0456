// 该文件是 Weibei （渭北春树） 项目的一部分。
// src/detector/decode.rs - 锚框网格解码
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use crate::backend::TensorShape;

/// 每个网格单元的锚框数
pub(crate) const ANCHORS_PER_CELL: usize = 3;
/// 框回归 4 通道 + objectness 1 通道
pub(crate) const BOX_CHANNELS: usize = 5;

/// 锚框先验，模型输入空间像素
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorPair {
  pub width: f32,
  pub height: f32,
}

impl AnchorPair {
  pub const fn new(width: f32, height: f32) -> Self {
    Self { width, height }
  }
}

/// 输出特征图的下采样步长，与 `YOLOV5S_ANCHORS` 逐级对应
pub const YOLOV5S_STRIDES: [usize; 3] = [8, 16, 32];

/// YOLOv5s COCO 锚框表，模型设计期固定
pub const YOLOV5S_ANCHORS: [[AnchorPair; 3]; 3] = [
  [
    AnchorPair::new(10.0, 13.0),
    AnchorPair::new(16.0, 30.0),
    AnchorPair::new(33.0, 23.0),
  ],
  [
    AnchorPair::new(30.0, 61.0),
    AnchorPair::new(62.0, 45.0),
    AnchorPair::new(59.0, 119.0),
  ],
  [
    AnchorPair::new(116.0, 90.0),
    AnchorPair::new(156.0, 198.0),
    AnchorPair::new(373.0, 326.0),
  ],
];

/// 一个输出检测头：命名张量 + 步长 + 该级的锚框
#[derive(Debug, Clone)]
pub struct OutputHead {
  pub name: String,
  pub stride: usize,
  pub anchors: [AnchorPair; ANCHORS_PER_CELL],
}

impl OutputHead {
  pub fn new(name: &str, stride: usize, anchors: [AnchorPair; ANCHORS_PER_CELL]) -> Self {
    Self {
      name: name.to_string(),
      stride,
      anchors,
    }
  }
}

pub(crate) fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}

/// 解码一个检测头的原始输出到暂存区。
///
/// 张量为 NHWC 排布，通道维编码 `3 锚框 × (4 框回归 + 1 objectness +
/// num_classes)`；网格尺寸取自张量声明形状，不做任何硬编码假设。
/// 每个单元/锚框追加一行 `5 + num_classes` 宽的解码向量：
/// 中心式边界框（cx, cy, w, h，模型输入像素）、objectness、各类别概率。
///
/// 框解码采用 YOLOv5 的网格敏感形式：
/// `cx = (σx·2 − 0.5 + col)·stride`，`bw = (σw·2)²·anchor_w`，
/// 中心可越出所在单元，宽高上限为锚框先验的 4 倍。
///
/// `apply_sigmoid` 为 true 时由本函数施加 sigmoid（默认，后端输出
/// 原始 logit）；若后端已在导出图中融合 sigmoid，调用方须置 false，
/// 两种模型混用会产出貌似合理却整体偏移的框。
pub(crate) fn decode_head(
  head: &OutputHead,
  shape: &TensorShape,
  data: &[f32],
  num_classes: usize,
  apply_sigmoid: bool,
  arena: &mut Vec<f32>,
) {
  let grid_h = shape.height;
  let grid_w = shape.width;
  let cell_width = BOX_CHANNELS + num_classes;
  let channels = ANCHORS_PER_CELL * cell_width;
  let stride = head.stride as f32;

  let act = |v: f32| if apply_sigmoid { sigmoid(v) } else { v };

  for j in 0..grid_h {
    for k in 0..grid_w {
      let cell_base = (j * grid_w + k) * channels;
      for (a, anchor) in head.anchors.iter().enumerate() {
        let base = cell_base + a * cell_width;

        let sx = act(data[base]);
        let sy = act(data[base + 1]);
        let sw = act(data[base + 2]);
        let sh = act(data[base + 3]);

        let cx = (sx * 2.0 - 0.5 + k as f32) * stride;
        let cy = (sy * 2.0 - 0.5 + j as f32) * stride;
        let bw = (sw * 2.0) * (sw * 2.0) * anchor.width;
        let bh = (sh * 2.0) * (sh * 2.0) * anchor.height;

        arena.push(cx);
        arena.push(cy);
        arena.push(bw);
        arena.push(bh);
        arena.push(act(data[base + 4]));
        for c in 0..num_classes {
          arena.push(act(data[base + BOX_CHANNELS + c]));
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const NC: usize = 2;

  fn head8() -> OutputHead {
    OutputHead::new("out0", 8, YOLOV5S_ANCHORS[0])
  }

  #[test]
  fn arena_row_count_follows_grid_shape() {
    let shape = TensorShape::new(1, 4, 6, ANCHORS_PER_CELL * (BOX_CHANNELS + NC));
    let data = vec![0.0f32; shape.element_count()];
    let mut arena = Vec::new();
    decode_head(&head8(), &shape, &data, NC, true, &mut arena);
    assert_eq!(arena.len(), 4 * 6 * 3 * (BOX_CHANNELS + NC));
  }

  #[test]
  fn grid_sensitive_center_decode() {
    // sigmoid 输入全 0 → σ = 0.5 → 中心恰为单元中心
    let shape = TensorShape::new(1, 2, 2, ANCHORS_PER_CELL * (BOX_CHANNELS + NC));
    let data = vec![0.0f32; shape.element_count()];
    let mut arena = Vec::new();
    decode_head(&head8(), &shape, &data, NC, true, &mut arena);

    let row = BOX_CHANNELS + NC;
    // 单元 (j=1, k=1)，锚框 0：行号 (1*2+1)*3
    let at = (1 * 2 + 1) * 3 * row;
    assert!((arena[at] - 12.0).abs() < 1e-5); // (0.5*2-0.5+1)*8
    assert!((arena[at + 1] - 12.0).abs() < 1e-5);
    // (0.5*2)^2 * anchor = anchor
    assert!((arena[at + 2] - 10.0).abs() < 1e-5);
    assert!((arena[at + 3] - 13.0).abs() < 1e-5);
    // objectness = σ(0) = 0.5
    assert!((arena[at + 4] - 0.5).abs() < 1e-5);
  }

  #[test]
  fn size_decode_is_bounded_by_four_anchors() {
    // σ → 1 的极限下 (2σ)² = 4
    let shape = TensorShape::new(1, 1, 1, ANCHORS_PER_CELL * (BOX_CHANNELS + NC));
    let mut data = vec![0.0f32; shape.element_count()];
    data[2] = 100.0; // tw 的 logit 极大
    data[3] = 100.0;
    let mut arena = Vec::new();
    decode_head(&head8(), &shape, &data, NC, true, &mut arena);

    assert!((arena[2] - 4.0 * 10.0).abs() < 1e-3);
    assert!((arena[3] - 4.0 * 13.0).abs() < 1e-3);
  }

  #[test]
  fn pre_sigmoided_outputs_pass_through() {
    let shape = TensorShape::new(1, 1, 1, ANCHORS_PER_CELL * (BOX_CHANNELS + NC));
    let mut data = vec![0.0f32; shape.element_count()];
    data[4] = 0.9; // 后端已融合 sigmoid 的 objectness
    let mut arena = Vec::new();
    decode_head(&head8(), &shape, &data, NC, false, &mut arena);
    assert!((arena[4] - 0.9).abs() < 1e-6);
  }
}
