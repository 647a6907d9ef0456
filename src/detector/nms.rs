// 该文件是 Weibei （渭北春树） 项目的一部分。
// src/detector/nms.rs - 置信度过滤与非极大值抑制
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use crate::detector::Candidate;
use crate::detector::decode::BOX_CHANNELS;
use crate::geometry::{Rect, calc_iou};

/// objectness 预过滤下限，先廉价剪枝再做逐类别打分
const OBJECTNESS_FLOOR: f32 = 0.001;

/// 从解码暂存区收集候选检测。
///
/// 两遍扫描：第一遍按 objectness 预过滤，第二遍对幸存行逐类别计算
/// `score = objectness × class_prob` 并按阈值放行。一个单元可以
/// 产出多个类别的候选（多标签是刻意行为，不做 argmax 归并）。
pub(crate) fn collect_candidates(
  arena: &[f32],
  num_classes: usize,
  conf_threshold: f32,
) -> Vec<Candidate> {
  let row = BOX_CHANNELS + num_classes;
  debug_assert_eq!(arena.len() % row, 0);

  let mut kept_rows = Vec::new();
  for i in 0..arena.len() / row {
    if arena[i * row + 4] > OBJECTNESS_FLOOR {
      kept_rows.push(i);
    }
  }

  let mut candidates = Vec::new();
  for i in kept_rows {
    let base = i * row;
    let objectness = arena[base + 4];
    for c in 0..num_classes {
      let score = objectness * arena[base + BOX_CHANNELS + c];
      if score > conf_threshold {
        let cx = arena[base];
        let cy = arena[base + 1];
        let w = arena[base + 2];
        let h = arena[base + 3];
        candidates.push(Candidate {
          rect: Rect::new(cx - w / 2.0, cy - h / 2.0, w, h),
          confidence: score,
          class_id: c,
        });
      }
    }
  }
  candidates
}

/// 贪心非极大值抑制。
///
/// 候选按置信度降序稳定排序（同分保持解码扫描顺序，保证确定性），
/// 自前向后，每个未被抑制的候选压掉其后所有 IoU 超过阈值的候选。
/// 抑制不区分类别：IoU 只看几何重叠，与原始实现保持一致；
/// 逐类别 NMS 是另一种合法设计，但会改变输出语义，这里不采用。
pub fn non_max_suppression(mut candidates: Vec<Candidate>, nms_threshold: f32) -> Vec<Candidate> {
  if candidates.is_empty() {
    return candidates;
  }

  candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

  let mut suppressed = vec![false; candidates.len()];
  for i in 0..candidates.len() {
    if suppressed[i] {
      continue;
    }
    for j in (i + 1)..candidates.len() {
      if !suppressed[j] && calc_iou(&candidates[i].rect, &candidates[j].rect) > nms_threshold {
        suppressed[j] = true;
      }
    }
  }

  candidates
    .into_iter()
    .zip(suppressed)
    .filter_map(|(c, s)| (!s).then_some(c))
    .collect()
}

/// 过小框过滤：宽与高都低于下限的幸存者丢弃（模型空间）。
pub(crate) fn min_box_filter(candidates: Vec<Candidate>, min_border: f32) -> Vec<Candidate> {
  candidates
    .into_iter()
    .filter(|c| c.rect.width >= min_border || c.rect.height >= min_border)
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn candidate(x: f32, y: f32, w: f32, h: f32, conf: f32, class_id: usize) -> Candidate {
    Candidate {
      rect: Rect::new(x, y, w, h),
      confidence: conf,
      class_id,
    }
  }

  #[test]
  fn overlapping_lower_confidence_is_suppressed() {
    let cands = vec![
      candidate(10.0, 10.0, 50.0, 50.0, 0.6, 0),
      candidate(12.0, 12.0, 50.0, 50.0, 0.9, 0),
    ];
    let kept = non_max_suppression(cands, 0.5);
    assert_eq!(kept.len(), 1);
    assert!((kept[0].confidence - 0.9).abs() < 1e-6);
  }

  #[test]
  fn non_overlapping_boxes_both_survive() {
    let cands = vec![
      candidate(0.0, 0.0, 40.0, 40.0, 0.9, 0),
      candidate(200.0, 200.0, 40.0, 40.0, 0.6, 1),
    ];
    assert_eq!(non_max_suppression(cands, 0.5).len(), 2);
  }

  #[test]
  fn suppression_ignores_class_labels() {
    // 同一位置不同类别也照样抑制
    let cands = vec![
      candidate(10.0, 10.0, 50.0, 50.0, 0.9, 0),
      candidate(10.0, 10.0, 50.0, 50.0, 0.8, 7),
    ];
    assert_eq!(non_max_suppression(cands, 0.5).len(), 1);
  }

  #[test]
  fn nms_is_idempotent() {
    let cands = vec![
      candidate(0.0, 0.0, 40.0, 40.0, 0.9, 0),
      candidate(5.0, 5.0, 40.0, 40.0, 0.8, 0),
      candidate(200.0, 0.0, 40.0, 40.0, 0.7, 1),
      candidate(0.0, 200.0, 40.0, 40.0, 0.6, 2),
    ];
    let once = non_max_suppression(cands, 0.5);
    let twice = non_max_suppression(once.clone(), 0.5);
    assert_eq!(once.len(), twice.len());
    for (a, b) in once.iter().zip(twice.iter()) {
      assert_eq!(a.rect, b.rect);
      assert_eq!(a.class_id, b.class_id);
    }
  }

  #[test]
  fn confidence_ties_keep_scan_order() {
    // 两个不重叠、同分的候选：稳定排序必须保持原始顺序
    let cands = vec![
      candidate(0.0, 0.0, 40.0, 40.0, 0.8, 3),
      candidate(200.0, 200.0, 40.0, 40.0, 0.8, 5),
    ];
    let kept = non_max_suppression(cands, 0.5);
    assert_eq!(kept[0].class_id, 3);
    assert_eq!(kept[1].class_id, 5);
  }

  #[test]
  fn cell_can_emit_multiple_classes() {
    // 一行解码向量：objectness 0.9，类别 1 与 3 都过阈值
    let row = vec![100.0, 100.0, 40.0, 40.0, 0.9, 0.1, 0.8, 0.2, 0.9];
    let cands = collect_candidates(&row, 4, 0.5);
    assert_eq!(cands.len(), 2);
    assert_eq!(cands[0].class_id, 1);
    assert_eq!(cands[1].class_id, 3);
  }

  #[test]
  fn raising_threshold_never_adds_detections() {
    let mut arena = Vec::new();
    for i in 0..8 {
      // objectness 0.2..0.9 的一组行
      let obj = 0.2 + 0.1 * i as f32;
      arena.extend_from_slice(&[50.0 * i as f32, 50.0, 20.0, 20.0, obj, 0.9, 0.4]);
    }
    let mut last = usize::MAX;
    for threshold in [0.1, 0.3, 0.5, 0.7, 0.9] {
      let n = collect_candidates(&arena, 2, threshold).len();
      assert!(n <= last);
      last = n;
    }
  }

  #[test]
  fn min_box_filter_drops_only_boxes_small_in_both_axes() {
    let cands = vec![
      candidate(0.0, 0.0, 8.0, 8.0, 0.9, 0),   // 两边都小，丢弃
      candidate(0.0, 0.0, 8.0, 100.0, 0.9, 0), // 高度达标，保留
      candidate(0.0, 0.0, 100.0, 8.0, 0.9, 0), // 宽度达标，保留
    ];
    let kept = min_box_filter(cands, 16.0);
    assert_eq!(kept.len(), 2);
  }
}
