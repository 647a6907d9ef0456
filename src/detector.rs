// 该文件是 Weibei （渭北春树） 项目的一部分。
// src/detector.rs - 检测器模块与公共类型
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use thiserror::Error;

use crate::backend::BackendError;
use crate::geometry::Rect;

/// 最终检测结果，坐标为源图像像素
#[derive(Debug, Clone)]
pub struct Detection {
  /// 边界框左上角 x 坐标
  pub x: f32,
  /// 边界框左上角 y 坐标
  pub y: f32,
  /// 边界框宽度
  pub width: f32,
  /// 边界框高度
  pub height: f32,
  /// 置信度（objectness × 类别概率）
  pub confidence: f32,
  /// 类别索引
  pub class_id: usize,
}

/// 候选检测，坐标为模型输入空间。
/// 解码阶段产生，NMS 消费，幸存者经反变换成为 [`Detection`]。
#[derive(Debug, Clone)]
pub struct Candidate {
  pub rect: Rect,
  pub confidence: f32,
  pub class_id: usize,
}

#[derive(Error, Debug)]
pub enum DetectError {
  /// 帧级错误：图像无效。detect 内部消化为该帧空结果，
  /// 检测器保持可用。
  #[error("无效图像: {0}")]
  InvalidImage(String),
  /// 帧级错误：后端推理失败。仅影响当前帧，下一帧照常进行。
  #[error("推理后端错误: {0}")]
  Backend(#[from] BackendError),
  /// 配置级错误：输出张量通道数与配置的类别数不符。
  /// 模型与配置不匹配不会跨帧自愈，构建阶段即拒绝。
  #[error("张量 {name} 形状不匹配: 通道数为 {channels}, 期望 {expected}")]
  ShapeMismatch {
    name: String,
    channels: usize,
    expected: usize,
  },
}

mod decode;
mod letterbox;
mod nms;
mod yolov5;

pub use self::decode::{AnchorPair, OutputHead, YOLOV5S_ANCHORS, YOLOV5S_STRIDES};
pub use self::letterbox::{Letterbox, LetterboxTransform};
pub use self::nms::non_max_suppression;
pub use self::yolov5::{Yolov5Builder, Yolov5Detector};
