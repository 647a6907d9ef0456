// 该文件是 Weibei （渭北春树） 项目的一部分。
// src/detector/yolov5.rs - YOLOv5 检测器
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use tracing::{debug, info, warn};

use crate::backend::InferenceBackend;
use crate::detector::decode::{
  ANCHORS_PER_CELL, AnchorPair, BOX_CHANNELS, OutputHead, YOLOV5S_ANCHORS, YOLOV5S_STRIDES,
  decode_head,
};
use crate::detector::letterbox::{Letterbox, LetterboxTransform};
use crate::detector::nms::{collect_candidates, min_box_filter, non_max_suppression};
use crate::detector::{DetectError, Detection};
use crate::geometry::PixelRect;
use crate::image::ImageView;

const DEFAULT_INPUT_NAME: &str = "images";
const DEFAULT_OUTPUT_NAMES: [&str; 3] = ["out0", "out1", "out2"];
const DEFAULT_CLASS_NUM: usize = 80;
const DEFAULT_CONF_THRESH: f32 = 0.5;
const DEFAULT_NMS_THRESH: f32 = 0.5;
const DEFAULT_MIN_BOX_BORDER: f32 = 16.0;

/// YOLOv5 检测器构建器。
///
/// `build` 阶段向后端查询并校验全部张量形状：输出通道数与配置的
/// 类别数不符说明模型与配置不匹配，这类错误不会跨帧自愈，
/// 因此在进入稳态前直接拒绝。
pub struct Yolov5Builder {
  input_name: String,
  output_names: [String; 3],
  num_classes: usize,
  anchors: [[AnchorPair; ANCHORS_PER_CELL]; 3],
  confidence_threshold: f32,
  nms_threshold: f32,
  min_box_border: f32,
  sigmoid_applied_by_backend: bool,
}

impl Default for Yolov5Builder {
  fn default() -> Self {
    Self {
      input_name: DEFAULT_INPUT_NAME.to_string(),
      output_names: DEFAULT_OUTPUT_NAMES.map(str::to_string),
      num_classes: DEFAULT_CLASS_NUM,
      anchors: YOLOV5S_ANCHORS,
      confidence_threshold: DEFAULT_CONF_THRESH,
      nms_threshold: DEFAULT_NMS_THRESH,
      min_box_border: DEFAULT_MIN_BOX_BORDER,
      sigmoid_applied_by_backend: false,
    }
  }
}

impl Yolov5Builder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn input_name(mut self, name: &str) -> Self {
    self.input_name = name.to_string();
    self
  }

  pub fn output_names(mut self, names: [&str; 3]) -> Self {
    self.output_names = names.map(str::to_string);
    self
  }

  pub fn num_classes(mut self, num_classes: usize) -> Self {
    self.num_classes = num_classes;
    self
  }

  pub fn anchors(mut self, anchors: [[AnchorPair; ANCHORS_PER_CELL]; 3]) -> Self {
    self.anchors = anchors;
    self
  }

  pub fn thresholds(mut self, confidence: f32, nms: f32) -> Self {
    self.confidence_threshold = confidence;
    self.nms_threshold = nms;
    self
  }

  pub fn min_box_border(mut self, border: f32) -> Self {
    self.min_box_border = border;
    self
  }

  /// 声明后端已在导出图中融合 sigmoid，解码阶段不再重复施加。
  /// 默认 false（后端输出原始 logit）。两种导出混用会得到貌似
  /// 合理但系统性偏移的框，务必与模型导出方式一致。
  pub fn sigmoid_applied_by_backend(mut self, applied: bool) -> Self {
    self.sigmoid_applied_by_backend = applied;
    self
  }

  pub fn build<B: InferenceBackend>(self, backend: B) -> Result<Yolov5Detector<B>, DetectError> {
    let input_shape = backend.input_shape(&self.input_name)?;
    if input_shape.channels != 3 {
      return Err(DetectError::ShapeMismatch {
        name: self.input_name.clone(),
        channels: input_shape.channels,
        expected: 3,
      });
    }
    info!(
      "模型输入 {}: {}x{}x{}",
      self.input_name, input_shape.height, input_shape.width, input_shape.channels
    );

    let expected_channels = ANCHORS_PER_CELL * (BOX_CHANNELS + self.num_classes);
    let mut heads = Vec::with_capacity(3);
    let mut arena_capacity = 0usize;

    for (name, (&stride, &anchors)) in self
      .output_names
      .iter()
      .zip(YOLOV5S_STRIDES.iter().zip(self.anchors.iter()))
    {
      let shape = backend.output_shape(name)?;
      if shape.channels != expected_channels {
        return Err(DetectError::ShapeMismatch {
          name: name.clone(),
          channels: shape.channels,
          expected: expected_channels,
        });
      }
      debug!(
        "检测头 {} (步长 {}): 网格 {}x{}",
        name, stride, shape.height, shape.width
      );
      arena_capacity +=
        shape.height * shape.width * ANCHORS_PER_CELL * (BOX_CHANNELS + self.num_classes);
      heads.push(OutputHead::new(name, stride, anchors));
    }

    Ok(Yolov5Detector {
      backend,
      letterbox: Letterbox::new(input_shape.height, input_shape.width),
      input_name: self.input_name,
      heads,
      num_classes: self.num_classes,
      confidence_threshold: self.confidence_threshold,
      nms_threshold: self.nms_threshold,
      min_box_border: self.min_box_border,
      sigmoid_applied_by_backend: self.sigmoid_applied_by_backend,
      roi: None,
      arena: Vec::with_capacity(arena_capacity),
      last_transform: None,
    })
  }
}

/// YOLOv5 检测器。
///
/// 单次 `detect` 调用是同步的单线程管线：预处理 → 推理 → 解码 →
/// 过滤/NMS → 坐标反变换。变换状态随调用更新，因此单个实例不支持
/// 并发调用（`&mut self` 即此约束）；多个实例各持有自己的后端与
/// 暂存区时可以并行运行。
pub struct Yolov5Detector<B> {
  backend: B,
  letterbox: Letterbox,
  input_name: String,
  heads: Vec<OutputHead>,
  num_classes: usize,
  confidence_threshold: f32,
  nms_threshold: f32,
  min_box_border: f32,
  sigmoid_applied_by_backend: bool,
  roi: Option<PixelRect>,
  // 解码暂存区，构建时按各头网格总量定容，跨帧复用
  arena: Vec<f32>,
  last_transform: Option<LetterboxTransform>,
}

impl<B: InferenceBackend> Yolov5Detector<B> {
  /// 调整阈值，自下一次 `detect` 起生效
  pub fn set_thresholds(&mut self, confidence: f32, nms: f32) {
    self.confidence_threshold = confidence;
    self.nms_threshold = nms;
  }

  /// 限定检测区域；None 恢复全图。输出坐标会补偿回全图坐标系。
  pub fn set_roi(&mut self, roi: Option<PixelRect>) {
    self.roi = roi;
  }

  /// 最近一次成功预处理的 letterbox 变换参数
  pub fn last_transform(&self) -> Option<LetterboxTransform> {
    self.last_transform
  }

  /// 对一帧图像运行检测。
  ///
  /// 帧级失败不会破坏检测器：无效图像（空图、ROI 越界、缩放后
  /// 区域为空）记录日志并返回该帧空结果；后端执行失败以 `Err`
  /// 上抛，仅影响当前帧，重试策略由调用方决定。
  pub fn detect(&mut self, image: &ImageView<'_>) -> Result<Vec<Detection>, DetectError> {
    let view = match self.roi {
      Some(roi) => match image.roi(roi) {
        Ok(v) => v,
        Err(e) => {
          warn!("ROI 无效, 本帧返回空结果: {}", e);
          return Ok(Vec::new());
        }
      },
      None => *image,
    };

    let input = self.backend.input_buffer(&self.input_name)?;
    let transform = match self.letterbox.apply(&view, input) {
      Ok(t) => t,
      Err(DetectError::InvalidImage(msg)) => {
        warn!("无效图像, 本帧返回空结果: {}", msg);
        return Ok(Vec::new());
      }
      Err(e) => return Err(e),
    };
    self.last_transform = Some(transform);

    self.backend.execute()?;

    self.arena.clear();
    for head in &self.heads {
      let shape = self.backend.output_shape(&head.name)?;
      let data = self.backend.output_buffer(&head.name)?;
      decode_head(
        head,
        &shape,
        data,
        self.num_classes,
        !self.sigmoid_applied_by_backend,
        &mut self.arena,
      );
    }

    let candidates = collect_candidates(&self.arena, self.num_classes, self.confidence_threshold);
    debug!("候选检测: {}", candidates.len());

    // NMS 在统一的模型空间中比较几何，先抑制再反变换
    let survivors = non_max_suppression(candidates, self.nms_threshold);
    let survivors = min_box_filter(survivors, self.min_box_border);

    let (roi_x, roi_y) = match self.roi {
      Some(r) => (r.x as f32, r.y as f32),
      None => (0.0, 0.0),
    };

    let detections: Vec<Detection> = survivors
      .iter()
      .map(|c| {
        let r = transform.unmap_rect(&c.rect);
        Detection {
          x: r.x + roi_x,
          y: r.y + roi_y,
          width: r.width,
          height: r.height,
          confidence: c.confidence,
          class_id: c.class_id,
        }
      })
      .collect();

    debug!("检测到 {} 个物体", detections.len());
    Ok(detections)
  }
}
