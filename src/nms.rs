// 该文件是 Letterbox （信封填充） 项目的一部分。
// src/nms.rs - 非极大值抑制
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

use tracing::debug;

use crate::model::Candidate;

pub const IOU_THRESHOLD: f32 = 0.4;

/// 抑制时是否要求类别相同
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuppressionPolicy {
  /// 不区分类别，重叠即抑制
  #[default]
  ClassAgnostic,
  /// 只抑制同类别的重叠框
  PerClass,
}

/// 贪心非极大值抑制
///
/// 先丢弃 `score <= conf_threshold` 的候选框，再按置信度降序（相同置信度按原始顺序）
/// 依次保留，与已保留框 IoU 大于 `iou_threshold` 的候选框被丢弃。
/// 返回保留下来的候选框下标，置信度高的在前。
pub fn non_max_suppression(
  candidates: &[Candidate],
  conf_threshold: f32,
  iou_threshold: f32,
  policy: SuppressionPolicy,
) -> Vec<usize> {
  let mut order: Vec<usize> = (0..candidates.len())
    .filter(|&i| candidates[i].score > conf_threshold)
    .collect();
  // 稳定排序，相同置信度保持下标顺序
  order.sort_by(|&a, &b| candidates[b].score.total_cmp(&candidates[a].score));

  let mut suppressed = vec![false; candidates.len()];
  let mut keep = Vec::new();

  for (pos, &i) in order.iter().enumerate() {
    if suppressed[i] {
      continue;
    }
    keep.push(i);

    let best = &candidates[i];
    for &j in &order[pos + 1..] {
      if suppressed[j] {
        continue;
      }
      let other = &candidates[j];
      if policy == SuppressionPolicy::PerClass && other.class_id != best.class_id {
        continue;
      }
      if best.bbox.iou(&other.bbox) > iou_threshold {
        suppressed[j] = true;
      }
    }
  }

  debug!("NMS: {} 个候选框保留 {} 个", candidates.len(), keep.len());
  keep
}
