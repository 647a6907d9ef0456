// 该文件是 Weibei （渭北春树） 项目的一部分。
// src/backend.rs - 推理运行时抽象
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use thiserror::Error;
use tracing::debug;

/// NHWC 张量形状
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorShape {
  pub batch: usize,
  pub height: usize,
  pub width: usize,
  pub channels: usize,
}

impl TensorShape {
  pub fn new(batch: usize, height: usize, width: usize, channels: usize) -> Self {
    Self {
      batch,
      height,
      width,
      channels,
    }
  }

  pub fn element_count(&self) -> usize {
    self.batch * self.height * self.width * self.channels
  }
}

#[derive(Error, Debug)]
pub enum BackendError {
  #[error("未知张量: {0}")]
  UnknownTensor(String),
  #[error("推理执行失败: {0}")]
  ExecutionFailed(String),
  #[error("张量数据读取失败: {0}")]
  Io(#[from] std::io::Error),
  #[error("张量 {name} 数据大小不匹配: 形状 {shape:?} 需要 {expected} 个元素, 实际 {actual} 个")]
  SizeMismatch {
    name: String,
    shape: TensorShape,
    expected: usize,
    actual: usize,
  },
}

/// 推理运行时的能力集合。
///
/// 检测核心只依赖这五个操作：查询输入/输出形状、写输入缓冲、
/// 读输出缓冲、同步执行。具体运行时（NPU SDK、ONNX Runtime 等）
/// 由外部实现本 trait 接入，核心不参与运行时选择。
///
/// 形状在运行时生命周期内不变；`execute` 同步阻塞直至该帧推理完成。
pub trait InferenceBackend {
  fn input_shape(&self, name: &str) -> Result<TensorShape, BackendError>;

  /// 输入张量的可写缓冲，预处理阶段直接写入
  fn input_buffer(&mut self, name: &str) -> Result<&mut [f32], BackendError>;

  fn output_shape(&self, name: &str) -> Result<TensorShape, BackendError>;

  /// 输出张量的只读缓冲，仅在 `execute` 成功后内容有效
  fn output_buffer(&self, name: &str) -> Result<&[f32], BackendError>;

  fn execute(&mut self) -> Result<(), BackendError>;
}

/// 张量回放运行时：输出张量由内存或文件预先装载，`execute` 为空操作。
///
/// 用于离线验证导出模型的原始输出，以及在没有硬件运行时的环境下
/// 驱动完整的检测管线（演示程序与测试都走这条路）。
pub struct ReplayBackend {
  inputs: Vec<(String, TensorShape, Vec<f32>)>,
  outputs: Vec<(String, TensorShape, Vec<f32>)>,
}

impl ReplayBackend {
  pub fn new() -> Self {
    Self {
      inputs: Vec::new(),
      outputs: Vec::new(),
    }
  }

  /// 声明一个输入张量并分配全零缓冲
  pub fn add_input(&mut self, name: &str, shape: TensorShape) {
    let buf = vec![0.0f32; shape.element_count()];
    self.inputs.push((name.to_string(), shape, buf));
  }

  /// 以现成数据装载一个输出张量
  pub fn add_output(
    &mut self,
    name: &str,
    shape: TensorShape,
    data: Vec<f32>,
  ) -> Result<(), BackendError> {
    if data.len() != shape.element_count() {
      return Err(BackendError::SizeMismatch {
        name: name.to_string(),
        shape,
        expected: shape.element_count(),
        actual: data.len(),
      });
    }
    self.outputs.push((name.to_string(), shape, data));
    Ok(())
  }

  /// 从小端序 f32 原始转储文件装载一个输出张量
  pub fn load_output(
    &mut self,
    name: &str,
    shape: TensorShape,
    path: &Path,
  ) -> Result<(), BackendError> {
    let bytes = std::fs::read(path)?;
    debug!(
      "读取张量转储 {}: {:.2} KB",
      path.display(),
      bytes.len() as f64 / 1024.0
    );
    let data: Vec<f32> = bytes
      .chunks_exact(4)
      .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
      .collect();
    self.add_output(name, shape, data)
  }

  fn find<'a>(
    table: &'a [(String, TensorShape, Vec<f32>)],
    name: &str,
  ) -> Result<&'a (String, TensorShape, Vec<f32>), BackendError> {
    table
      .iter()
      .find(|(n, _, _)| n == name)
      .ok_or_else(|| BackendError::UnknownTensor(name.to_string()))
  }
}

impl Default for ReplayBackend {
  fn default() -> Self {
    Self::new()
  }
}

impl InferenceBackend for ReplayBackend {
  fn input_shape(&self, name: &str) -> Result<TensorShape, BackendError> {
    Self::find(&self.inputs, name).map(|(_, s, _)| *s)
  }

  fn input_buffer(&mut self, name: &str) -> Result<&mut [f32], BackendError> {
    self
      .inputs
      .iter_mut()
      .find(|(n, _, _)| n == name)
      .map(|(_, _, buf)| buf.as_mut_slice())
      .ok_or_else(|| BackendError::UnknownTensor(name.to_string()))
  }

  fn output_shape(&self, name: &str) -> Result<TensorShape, BackendError> {
    Self::find(&self.outputs, name).map(|(_, s, _)| *s)
  }

  fn output_buffer(&self, name: &str) -> Result<&[f32], BackendError> {
    Self::find(&self.outputs, name).map(|(_, _, buf)| buf.as_slice())
  }

  fn execute(&mut self) -> Result<(), BackendError> {
    debug!("回放运行时: 跳过实际推理");
    Ok(())
  }
}
