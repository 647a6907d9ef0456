// 该文件是 Weibei （渭北春树） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use clap::Parser;

use weibei::geometry::PixelRect;

fn parse_roi(s: &str) -> Result<PixelRect, String> {
  let parts: Vec<&str> = s.split(',').map(str::trim).collect();
  if parts.len() != 4 {
    return Err(format!("ROI 须为 x,y,w,h 四个整数: {}", s));
  }
  let mut values = [0i32; 4];
  for (v, p) in values.iter_mut().zip(parts) {
    *v = p.parse().map_err(|_| format!("非法 ROI 分量: {}", p))?;
  }
  Ok(PixelRect::new(values[0], values[1], values[2], values[3]))
}

/// Weibei 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入图片路径 (*.jpg, *.png 等)
  #[arg(long, value_name = "FILE")]
  pub input: String,

  /// 三个检测头的原始输出转储（小端序 f32），按步长 8/16/32 的顺序
  #[arg(long, value_name = "FILE", num_args = 3)]
  pub tensors: Vec<String>,

  /// 标注后图片的输出路径；省略则不保存图片
  #[arg(long, value_name = "OUTPUT")]
  pub output: Option<String>,

  /// 检测记录文本的输出路径
  #[arg(long, value_name = "FILE")]
  pub record: Option<String>,

  /// 标签文件路径，每行一个类别名；省略则使用内置 COCO 表
  #[arg(long, value_name = "FILE")]
  pub labels: Option<String>,

  /// 模型输入边长
  #[arg(long, default_value = "640", value_name = "SIZE")]
  pub input_size: usize,

  /// 类别数量
  #[arg(long, default_value = "80", value_name = "COUNT")]
  pub num_classes: usize,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.5", value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.5", value_name = "THRESHOLD")]
  pub nms_threshold: f32,

  /// 感兴趣区域，格式 x,y,w,h；省略则使用全图
  #[arg(long, value_parser = parse_roi, value_name = "RECT")]
  pub roi: Option<PixelRect>,

  /// 模型导出时已融合 sigmoid（张量存的是概率而非 logit）
  #[arg(long)]
  pub sigmoid_fused: bool,
}
