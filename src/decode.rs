// 该文件是 Letterbox （信封填充） 项目的一部分。
// src/decode.rs - 检测输出解码
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

use tracing::{debug, error};

use crate::{
  error::{PipelineError, Result},
  model::Candidate,
  preprocess::Letterbox,
  tensor::RawOutput,
};

pub const CONF_THRESHOLD: f32 = 0.5;

/// 检测输出的两种张量布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
  /// [batch, 检测数, 5 + 类别数]，每行为 cx, cy, w, h, objectness, 类别分数...
  DetectionMajor,
  /// [batch, 4 + 类别数, 检测数]，每列为 cx, cy, w, h, 类别分数...
  AttributeMajor,
}

impl OutputLayout {
  /// 类别分数在每个检测属性中的起始位置
  fn class_offset(&self) -> usize {
    match self {
      OutputLayout::DetectionMajor => 5,
      OutputLayout::AttributeMajor => 4,
    }
  }
}

/// 解析后的输出形状
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedShape {
  pub layout: OutputLayout,
  pub num_detections: usize,
  pub num_attributes: usize,
  element_count: usize,
}

impl ResolvedShape {
  pub fn num_classes(&self) -> usize {
    self.num_attributes - self.layout.class_offset()
  }

  /// 第 det 个检测的第 attr 个属性在扁平缓冲区中的位置
  fn index(&self, det: usize, attr: usize) -> usize {
    match self.layout {
      OutputLayout::DetectionMajor => det * self.num_attributes + attr,
      // 逻辑转置
      OutputLayout::AttributeMajor => attr * self.num_detections + det,
    }
  }

  fn element_count(&self) -> usize {
    self.element_count
  }
}

/// 根据形状判断布局：较小的非批次维是属性数，较大的是检测数
pub fn resolve_layout(shape: &[i64]) -> Result<ResolvedShape> {
  if shape.len() < 3 {
    error!("输出形状 {:?} 至少需要两个非批次维", shape);
    return Err(PipelineError::UnsupportedInputShape(format!(
      "输出形状 {:?} 至少需要两个非批次维",
      shape
    )));
  }

  let n = shape.len();
  if shape[1..n - 2].iter().any(|&d| d != 1) {
    error!("输出形状 {:?} 的中间维必须为 1", shape);
    return Err(PipelineError::UnsupportedInputShape(format!(
      "输出形状 {:?} 的中间维必须为 1",
      shape
    )));
  }

  let (d1, d2) = match (usize::try_from(shape[n - 2]), usize::try_from(shape[n - 1])) {
    (Ok(d1), Ok(d2)) if d1 > 0 && d2 > 0 => (d1, d2),
    _ => {
      error!("输出形状 {:?} 含有非正的维度", shape);
      return Err(PipelineError::UnsupportedInputShape(format!(
        "输出形状 {:?} 含有非正的维度",
        shape
      )));
    }
  };

  let Some(element_count) = d1.checked_mul(d2) else {
    error!("输出形状 {:?} 的元素总数溢出", shape);
    return Err(PipelineError::UnsupportedInputShape(format!(
      "输出形状 {:?} 的元素总数溢出",
      shape
    )));
  };

  let resolved = if d2 < d1 {
    ResolvedShape {
      layout: OutputLayout::DetectionMajor,
      num_detections: d1,
      num_attributes: d2,
      element_count,
    }
  } else {
    ResolvedShape {
      layout: OutputLayout::AttributeMajor,
      num_detections: d2,
      num_attributes: d1,
      element_count,
    }
  };

  if resolved.num_attributes <= resolved.layout.class_offset() {
    error!(
      "输出形状 {:?} 的属性数 {} 不足以容纳任何类别",
      shape, resolved.num_attributes
    );
    return Err(PipelineError::UnsupportedInputShape(format!(
      "属性数 {} 不足以容纳任何类别",
      resolved.num_attributes
    )));
  }

  debug!(
    "输出布局: {:?}, 检测数 {}, 类别数 {}",
    resolved.layout,
    resolved.num_detections,
    resolved.num_classes()
  );
  Ok(resolved)
}

/// 把原始输出解码为未去重的候选框，坐标映射回原图
///
/// frame_size 为原图 (width, height)。
pub fn decode(
  output: &RawOutput,
  frame_size: (u32, u32),
  conf_threshold: f32,
) -> Result<Vec<Candidate>> {
  if output.is_empty() {
    error!("推理结果或形状为空");
    return Err(PipelineError::shape("推理结果或形状为空"));
  }
  let (img_w, img_h) = frame_size;
  if img_w == 0 || img_h == 0 {
    return Err(PipelineError::empty("原图尺寸为 0"));
  }

  let resolved = resolve_layout(&output.shape)?;
  if output.data.len() < resolved.element_count() {
    error!(
      "输出数据长度 {} 小于形状要求的 {}",
      output.data.len(),
      resolved.element_count()
    );
    return Err(PipelineError::UnsupportedInputShape(format!(
      "输出数据长度 {} 小于形状要求的 {}",
      output.data.len(),
      resolved.element_count()
    )));
  }

  let letterbox = Letterbox::fit(img_w, img_h);
  let offset = resolved.layout.class_offset();
  let mut candidates = Vec::new();

  for det in 0..resolved.num_detections {
    let at = |attr: usize| output.data[resolved.index(det, attr)].as_f32();

    let objectness = match resolved.layout {
      OutputLayout::DetectionMajor => {
        let objectness = at(4);
        if objectness.is_nan() || objectness <= conf_threshold {
          continue;
        }
        Some(objectness)
      }
      OutputLayout::AttributeMajor => None,
    };

    let (class_id, class_score) = best_class(&at, offset, resolved.num_classes());
    if class_score == f32::NEG_INFINITY {
      // 全部类别分数都是 NaN
      continue;
    }

    let score = match objectness {
      Some(objectness) => objectness * class_score,
      None => {
        if class_score <= conf_threshold {
          continue;
        }
        class_score
      }
    };

    candidates.push(Candidate {
      bbox: letterbox.inverse(at(0), at(1), at(2), at(3)),
      score,
      class_id: class_id as u32,
      class_score,
    });
  }

  debug!("解码得到 {} 个候选框", candidates.len());
  Ok(candidates)
}

/// 类别分数的 argmax，相同分数取较小的类别编号，NaN 视为负无穷
fn best_class(at: &impl Fn(usize) -> f32, offset: usize, num_classes: usize) -> (usize, f32) {
  let score_at = |c: usize| {
    let score = at(offset + c);
    if score.is_nan() { f32::NEG_INFINITY } else { score }
  };
  let mut best = (0, score_at(0));
  for c in 1..num_classes {
    let score = score_at(c);
    if score > best.1 {
      best = (c, score);
    }
  }
  best
}
