// 该文件是 Letterbox （信封填充） 项目的一部分。
// src/classify.rs - 分类后处理
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
  model::Classification,
  tensor::RawOutput,
};

pub const CLASSIFY_THRESHOLD: f32 = 0.5;

/// 按分数降序排列并截断到阈值以上，相同分数按类别编号升序
pub fn rank_scores(scores: &[f32], threshold: f32) -> Vec<Classification> {
  let mut indices: Vec<usize> = (0..scores.len()).collect();
  indices.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

  indices
    .into_iter()
    .take_while(|&i| scores[i] > threshold)
    .map(|i| Classification {
      class_id: i as u32,
      class_confidence: scores[i],
    })
    .collect()
}

/// 分类模型输出的后处理，类别数取自形状的第二维
pub fn classify(output: &RawOutput, threshold: f32) -> Result<Vec<Classification>> {
  if output.data.is_empty() {
    error!("分类分数为空");
    return Err(PipelineError::empty("分类分数为空"));
  }
  if output.shape.len() < 2 {
    error!("分类输出形状 {:?} 无效", output.shape);
    return Err(PipelineError::UnsupportedInputShape(format!(
      "分类输出形状 {:?} 至少需要两维",
      output.shape
    )));
  }

  let num_classes = match usize::try_from(output.shape[1]) {
    Ok(n) if n > 0 && n <= output.data.len() => n,
    _ => {
      error!(
        "分类数 {} 与分数长度 {} 不符",
        output.shape[1],
        output.data.len()
      );
      return Err(PipelineError::UnsupportedInputShape(format!(
        "分类数 {} 与分数长度 {} 不符",
        output.shape[1],
        output.data.len()
      )));
    }
  };

  let scores: Vec<f32> = output.data[..num_classes]
    .iter()
    .map(|e| e.as_f32())
    .collect();
  let results = rank_scores(&scores, threshold);
  debug!("{} 个类别中 {} 个超过阈值", num_classes, results.len());
  Ok(results)
}
