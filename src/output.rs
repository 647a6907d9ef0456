// 该文件是 Weibei （渭北春树） 项目的一部分。
// src/output.rs - 检测结果输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use serde_json::{Value, json};

use crate::detector::Detection;
use crate::labels::class_name;

/// 边框颜色（绿色），与 OSD 侧约定一致
#[cfg(feature = "save_image_file")]
const BOX_COLOR: [u8; 3] = [0, 255, 0];

/// 把检测结果画到 RGB 图像上（两像素宽的空心框）。
/// 标签文字属于外层 OSD 协作方，这里只画几何。
#[cfg(feature = "save_image_file")]
pub fn draw_detections(image: &mut image::RgbImage, detections: &[Detection]) {
  use imageproc::drawing::draw_hollow_rect_mut;
  use imageproc::rect::Rect as DrawRect;

  let (w, h) = (image.width() as i32, image.height() as i32);

  for det in detections {
    let x = (det.x as i32).clamp(0, w - 1);
    let y = (det.y as i32).clamp(0, h - 1);
    let bw = (det.width as i32).min(w - x).max(1) as u32;
    let bh = (det.height as i32).min(h - y).max(1) as u32;

    draw_hollow_rect_mut(
      image,
      DrawRect::at(x, y).of_size(bw, bh),
      image::Rgb(BOX_COLOR),
    );
    if bw > 2 && bh > 2 {
      draw_hollow_rect_mut(
        image,
        DrawRect::at(x + 1, y + 1).of_size(bw - 2, bh - 2),
        image::Rgb(BOX_COLOR),
      );
    }
  }
}

/// 组装检测结果的 JSON 对象：
/// `{"alg-name": "yolov5s", "alg-result": [{name, score, x, y, width, height}, ...]}`
pub fn results_to_json(detections: &[Detection], labels: &[String]) -> Value {
  let items: Vec<Value> = detections
    .iter()
    .map(|det| {
      json!({
        "name": class_name(labels, det.class_id),
        "score": det.confidence,
        "x": det.x,
        "y": det.y,
        "width": det.width,
        "height": det.height,
      })
    })
    .collect();

  json!({
    "alg-name": "yolov5s",
    "alg-result": items,
  })
}

/// 纯文本记录输出，每个检测一行
pub struct Record {
  pub label_with_name: bool,
}

impl Record {
  pub fn record(
    &self,
    detections: &[Detection],
    labels: &[String],
    path: &std::path::Path,
  ) -> Result<(), std::io::Error> {
    let mut records = vec![format!("# {}", chrono::Local::now().to_rfc3339())];
    for det in detections {
      let name = if self.label_with_name {
        class_name(labels, det.class_id)
      } else {
        format!("{}", det.class_id)
      };
      records.push(format!(
        "{}, {:.4}, {:.1}, {:.1}, {:.1}, {:.1}",
        name, det.confidence, det.x, det.y, det.width, det.height
      ));
    }
    std::fs::write(path.with_extension("txt"), records.join("\n"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn detection(class_id: usize) -> Detection {
    Detection {
      x: 10.0,
      y: 20.0,
      width: 30.0,
      height: 40.0,
      confidence: 0.85,
      class_id,
    }
  }

  #[test]
  fn json_object_carries_alg_fields() {
    let labels: Vec<String> = vec!["person".into(), "bicycle".into()];
    let value = results_to_json(&[detection(1)], &labels);

    assert_eq!(value["alg-name"], "yolov5s");
    let items = value["alg-result"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "bicycle");
    assert!((items[0]["score"].as_f64().unwrap() - 0.85).abs() < 1e-6);
  }

  #[test]
  fn unknown_class_is_reported_as_unknown() {
    let labels: Vec<String> = vec!["person".into()];
    let value = results_to_json(&[detection(42)], &labels);
    assert_eq!(value["alg-result"][0]["name"], "unknown");
  }
}
