// 该文件是 Letterbox （信封填充） 项目的一部分。
// src/model/classifier.rs - 图像分类任务
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

use tracing::error;

use crate::{
  classify::{CLASSIFY_THRESHOLD, classify},
  error::{PipelineError, Result},
  frame::BgrImage,
  model::{ModelInfo, Task, TaskOutput},
  preprocess::preprocess_resize,
  tensor::RawOutput,
};

/// 图像分类任务：缩放到模型输入尺寸，输出按分数排序的类别
pub struct Classifier {
  model_info: ModelInfo,
  threshold: f32,
}

impl Classifier {
  pub fn new(model_info: ModelInfo) -> Self {
    Self {
      model_info,
      threshold: CLASSIFY_THRESHOLD,
    }
  }

  pub fn with_threshold(mut self, threshold: f32) -> Self {
    self.threshold = threshold;
    self
  }
}

impl Task for Classifier {
  fn model_info(&self) -> &ModelInfo {
    &self.model_info
  }

  fn preprocess(&self, images: &[BgrImage]) -> Result<Vec<Vec<u8>>> {
    let image = images
      .first()
      .ok_or_else(|| PipelineError::empty("输入图像列表为空"))?;
    if image.is_empty() {
      return Err(PipelineError::empty("输入图像为空"));
    }

    let mut inputs = Vec::with_capacity(self.model_info.num_inputs());
    for idx in 0..self.model_info.num_inputs() {
      let Some((width, height)) = self.model_info.input_size(idx) else {
        error!(
          "模型输入 {} 的形状 {:?} 不是图像输入",
          idx, self.model_info.input_shapes[idx]
        );
        return Err(PipelineError::UnsupportedInputShape(format!(
          "模型输入 {} 的形状 {:?} 不是图像输入",
          idx, self.model_info.input_shapes[idx]
        )));
      };
      inputs.push(preprocess_resize(
        image,
        width,
        height,
        self.model_info.input_type(idx),
      )?);
    }
    Ok(inputs)
  }

  fn postprocess(&self, _frame_size: (u32, u32), outputs: &[RawOutput]) -> Result<TaskOutput> {
    let output = outputs
      .first()
      .ok_or_else(|| PipelineError::shape("推理结果为空"))?;
    classify(output, self.threshold).map(TaskOutput::Classifications)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{model::TensorFormat, tensor::ElementType};

  fn classifier_info() -> ModelInfo {
    ModelInfo {
      input_names: vec!["input_1".to_string()],
      input_shapes: vec![vec![1, 224, 224, 3]],
      input_formats: vec![TensorFormat::Nhwc],
      input_types: vec![ElementType::U8],
      output_names: vec!["predictions".to_string()],
    }
  }

  #[test]
  fn preprocess_resizes_to_model_input() {
    let classifier = Classifier::new(classifier_info());
    let image = BgrImage::new(100, 50, vec![7; 100 * 50 * 3]).unwrap();
    let inputs = classifier.preprocess(&[image]).unwrap();
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[0].len(), 224 * 224 * 3);
    assert!(inputs[0].iter().all(|&v| v == 7));
  }

  #[test]
  fn preprocess_rejects_flat_input() {
    let mut info = classifier_info();
    info.input_shapes = vec![vec![1, 1000]];
    let classifier = Classifier::new(info);
    let image = BgrImage::new(4, 4, vec![0; 48]).unwrap();
    assert!(matches!(
      classifier.preprocess(&[image]),
      Err(PipelineError::UnsupportedInputShape(_))
    ));
  }

  #[test]
  fn postprocess_ranks_scores() {
    let classifier = Classifier::new(classifier_info());
    let output = RawOutput::from_f32(vec![0.9, 0.3, 0.6, 0.2], vec![1, 4]);
    let TaskOutput::Classifications(results) = classifier.postprocess((1, 1), &[output]).unwrap()
    else {
      panic!("期望分类结果");
    };
    let ids: Vec<u32> = results.iter().map(|c| c.class_id).collect();
    assert_eq!(ids, vec![0, 2]);
  }
}
