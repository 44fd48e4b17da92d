// 该文件是 Letterbox （信封填充） 项目的一部分。
// src/model/yolo.rs - YOLO 检测任务
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

use tracing::{debug, error, warn};

use crate::{
  decode::{CONF_THRESHOLD, decode},
  error::{PipelineError, Result},
  frame::BgrImage,
  model::{Detection, ModelInfo, Task, TaskOutput},
  nms::{IOU_THRESHOLD, SuppressionPolicy, non_max_suppression},
  preprocess::{INPUT_H, INPUT_W, preprocess_letterbox},
  tensor::RawOutput,
};

/// 检测阈值配置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
  pub conf_threshold: f32,
  pub iou_threshold: f32,
  pub policy: SuppressionPolicy,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    Self {
      conf_threshold: CONF_THRESHOLD,
      iou_threshold: IOU_THRESHOLD,
      policy: SuppressionPolicy::default(),
    }
  }
}

impl DetectorConfig {
  pub fn with_conf_threshold(mut self, threshold: f32) -> Self {
    self.conf_threshold = threshold;
    self
  }

  pub fn with_iou_threshold(mut self, threshold: f32) -> Self {
    self.iou_threshold = threshold;
    self
  }

  pub fn with_policy(mut self, policy: SuppressionPolicy) -> Self {
    self.policy = policy;
    self
  }
}

/// YOLO 目标检测任务
pub struct YoloDetector {
  model_info: ModelInfo,
  config: DetectorConfig,
}

impl YoloDetector {
  pub fn new(model_info: ModelInfo) -> Self {
    for idx in 0..model_info.num_inputs() {
      if let Some(size) = model_info.input_size(idx)
        && size != (INPUT_W, INPUT_H)
      {
        warn!(
          "模型输入 {} 的尺寸为 {:?}, 前处理固定输出 {}x{}",
          idx, size, INPUT_W, INPUT_H
        );
      }
    }
    Self {
      model_info,
      config: DetectorConfig::default(),
    }
  }

  pub fn with_config(mut self, config: DetectorConfig) -> Self {
    self.config = config;
    self
  }

  pub fn config(&self) -> &DetectorConfig {
    &self.config
  }

  /// 解码 + 去重，frame_size 为原图 (width, height)
  pub fn detect(&self, frame_size: (u32, u32), output: &RawOutput) -> Result<Vec<Detection>> {
    let candidates = decode(output, frame_size, self.config.conf_threshold)?;
    let keep = non_max_suppression(
      &candidates,
      self.config.conf_threshold,
      self.config.iou_threshold,
      self.config.policy,
    );

    let detections: Vec<Detection> = keep
      .into_iter()
      .map(|idx| Detection::from(&candidates[idx]))
      .collect();
    debug!("检测到 {} 个物体", detections.len());
    Ok(detections)
  }
}

impl Task for YoloDetector {
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
    for (idx, shape) in self.model_info.input_shapes.iter().enumerate() {
      if shape.len() < 3 {
        error!("模型输入 {} 的形状 {:?} 不是图像输入", idx, shape);
        return Err(PipelineError::UnsupportedInputShape(format!(
          "模型输入 {} 的形状 {:?} 不是图像输入",
          idx, shape
        )));
      }
      inputs.push(preprocess_letterbox(image)?.into_bytes());
    }
    Ok(inputs)
  }

  fn postprocess(&self, frame_size: (u32, u32), outputs: &[RawOutput]) -> Result<TaskOutput> {
    let output = outputs
      .first()
      .ok_or_else(|| PipelineError::shape("推理结果为空"))?;
    self.detect(frame_size, output).map(TaskOutput::Detections)
  }
}
