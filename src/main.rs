// 该文件是 Weibei （渭北春树） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;

use weibei::backend::{ReplayBackend, TensorShape};
use weibei::detector::{YOLOV5S_STRIDES, Yolov5Builder};
use weibei::image::ImageView;
use weibei::labels::{COCO_CLASSES, class_name, load_labels};
use weibei::output::{Record, results_to_json};

fn main() -> Result<()> {
  tracing_subscriber::fmt().init();

  let args = args::Args::parse();

  println!("Weibei 检测核心");
  println!("==================");
  println!("输入图片: {}", args.input);
  println!("模型输入: {0}x{0}", args.input_size);
  println!("类别数量: {}", args.num_classes);
  println!("置信度阈值: {}", args.confidence);
  println!("NMS 阈值: {}", args.nms_threshold);
  println!();

  // 装载标签
  let labels: Vec<String> = match &args.labels {
    Some(path) => load_labels(Path::new(path)).with_context(|| format!("无法读取标签文件: {}", path))?,
    None => COCO_CLASSES.iter().map(|s| s.to_string()).collect(),
  };

  // 装载张量回放后端
  println!("正在装载张量转储...");
  let mut backend = ReplayBackend::new();
  backend.add_input(
    "images",
    TensorShape::new(1, args.input_size, args.input_size, 3),
  );
  let channels = 3 * (5 + args.num_classes);
  for (idx, (path, &stride)) in args.tensors.iter().zip(YOLOV5S_STRIDES.iter()).enumerate() {
    let grid = args.input_size / stride;
    let shape = TensorShape::new(1, grid, grid, channels);
    backend
      .load_output(&format!("out{}", idx), shape, Path::new(path))
      .with_context(|| format!("无法装载张量转储: {}", path))?;
  }
  println!("张量转储装载完成");

  // 构建检测器
  println!("正在构建检测器...");
  let mut detector = Yolov5Builder::new()
    .num_classes(args.num_classes)
    .thresholds(args.confidence, args.nms_threshold)
    .sigmoid_applied_by_backend(args.sigmoid_fused)
    .build(backend)?;
  detector.set_roi(args.roi);
  println!("检测器就绪");

  // 读取输入图片
  println!("正在读取输入图片...");
  let source = image::open(&args.input)
    .with_context(|| format!("无法读取输入图片: {}", args.input))?
    .into_rgb8();
  println!("输入图片: {}x{}", source.width(), source.height());

  // 运行检测
  println!();
  println!("开始检测...");
  let now = std::time::Instant::now();
  let view = ImageView::of_rgb_image(&source);
  let detections = detector.detect(&view)?;
  println!("检测完成, 耗时: {:.2?}", now.elapsed());
  println!();

  println!("检测到 {} 个对象", detections.len());
  for det in &detections {
    println!(
      "  - {}: {:.2}% at ({:.0}, {:.0}, {:.0}x{:.0})",
      class_name(&labels, det.class_id),
      det.confidence * 100.0,
      det.x,
      det.y,
      det.width,
      det.height
    );
  }

  // JSON 结果
  println!();
  println!("{}", serde_json::to_string_pretty(&results_to_json(&detections, &labels))?);

  // 文本记录
  if let Some(record_path) = &args.record {
    let record = Record {
      label_with_name: true,
    };
    record.record(&detections, &labels, Path::new(record_path))?;
    println!("记录已写入: {}", record_path);
  }

  // 标注图片
  #[cfg(feature = "save_image_file")]
  if let Some(output_path) = &args.output {
    let mut annotated = source;
    weibei::output::draw_detections(&mut annotated, &detections);
    annotated
      .save(output_path)
      .with_context(|| format!("无法保存标注图片: {}", output_path))?;
    println!("标注图片已保存: {}", output_path);
  }

  Ok(())
}
