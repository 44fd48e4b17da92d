// 该文件是 Letterbox （信封填充） 项目的一部分。
// src/model.rs - 模型元数据与结果定义
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

use serde::{Deserialize, Serialize};

use crate::{
  error::Result,
  frame::BgrImage,
  tensor::{ElementType, RawOutput},
};

/// 轴对齐边界框，原图像素坐标
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
  pub left: f32,
  pub top: f32,
  pub right: f32,
  pub bottom: f32,
}

/// 整数矩形 (x, y, width, height)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
  pub x: i32,
  pub y: i32,
  pub width: i32,
  pub height: i32,
}

impl BBox {
  pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
    Self {
      left,
      top,
      right,
      bottom,
    }
  }

  pub fn from_xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
    Self::new(x, y, x + width, y + height)
  }

  pub fn width(&self) -> f32 {
    self.right - self.left
  }

  pub fn height(&self) -> f32 {
    self.bottom - self.top
  }

  pub fn area(&self) -> f32 {
    self.width().max(0.0) * self.height().max(0.0)
  }

  /// 交并比，两者都没有面积时为 0
  pub fn iou(&self, other: &BBox) -> f32 {
    let x1 = self.left.max(other.left);
    let y1 = self.top.max(other.top);
    let x2 = self.right.min(other.right);
    let y2 = self.bottom.min(other.bottom);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = self.area() + other.area() - intersection;

    if union > 0.0 {
      intersection / union
    } else {
      0.0
    }
  }

  /// 只在这里做一次取整
  pub fn to_rect(&self) -> Rect {
    Rect {
      x: self.left.round() as i32,
      y: self.top.round() as i32,
      width: self.width().round() as i32,
      height: self.height().round() as i32,
    }
  }
}

/// 解码后、去重前的候选框
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
  pub bbox: BBox,
  /// 最终置信度（布局 A 为 objectness * 类别分数，布局 B 为最大类别分数）
  pub score: f32,
  pub class_id: u32,
  /// 最大类别分数
  pub class_score: f32,
}

/// 最终检测结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
  pub bbox: BBox,
  pub det_confidence: f32,
  pub class_id: u32,
  pub class_confidence: f32,
}

impl From<&Candidate> for Detection {
  fn from(c: &Candidate) -> Self {
    Self {
      bbox: c.bbox,
      det_confidence: c.score,
      class_id: c.class_id,
      class_confidence: c.class_score,
    }
  }
}

/// 分类结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
  pub class_id: u32,
  pub class_confidence: f32,
}

/// 一次后处理的完整结果
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutput {
  Detections(Vec<Detection>),
  Classifications(Vec<Classification>),
}

impl TaskOutput {
  pub fn len(&self) -> usize {
    match self {
      TaskOutput::Detections(items) => items.len(),
      TaskOutput::Classifications(items) => items.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// 输入张量的布局标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TensorFormat {
  #[serde(rename = "FORMAT_NCHW")]
  Nchw,
  #[serde(rename = "FORMAT_NHWC")]
  Nhwc,
  #[default]
  #[serde(rename = "FORMAT_NONE")]
  None,
}

/// 由外部模型配置加载器给出的模型几何信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
  pub input_names: Vec<String>,
  /// 批次维在前
  pub input_shapes: Vec<Vec<i64>>,
  #[serde(default)]
  pub input_formats: Vec<TensorFormat>,
  pub input_types: Vec<ElementType>,
  #[serde(default)]
  pub output_names: Vec<String>,
}

impl ModelInfo {
  /// 单输入检测模型：1x3x640x640 float32
  pub fn yolo_default() -> Self {
    Self {
      input_names: vec!["images".to_string()],
      input_shapes: vec![vec![1, 3, 640, 640]],
      input_formats: vec![TensorFormat::Nchw],
      input_types: vec![ElementType::F32],
      output_names: vec!["output0".to_string()],
    }
  }

  pub fn num_inputs(&self) -> usize {
    self.input_shapes.len()
  }

  pub fn input_format(&self, idx: usize) -> TensorFormat {
    self.input_formats.get(idx).copied().unwrap_or_default()
  }

  pub fn input_type(&self, idx: usize) -> ElementType {
    self.input_types.get(idx).copied().unwrap_or(ElementType::F32)
  }

  /// 第 idx 个输入的 (width, height)；不像图像的输入返回 None
  pub fn input_size(&self, idx: usize) -> Option<(u32, u32)> {
    let shape = self.input_shapes.get(idx)?;
    if shape.len() < 3 {
      return None;
    }
    let n = shape.len();
    let (h, w) = match self.input_format(idx) {
      // [.., C, H, W]
      TensorFormat::Nchw => (shape[n - 2], shape[n - 1]),
      // [.., H, W, C]
      TensorFormat::Nhwc | TensorFormat::None => (shape[n - 3], shape[n - 2]),
    };
    if w <= 0 || h <= 0 {
      return None;
    }
    Some((u32::try_from(w).ok()?, u32::try_from(h).ok()?))
  }

  /// 第 idx 个输入张量的字节数
  pub fn input_byte_size(&self, idx: usize) -> Option<usize> {
    let shape = self.input_shapes.get(idx)?;
    let elements = shape
      .iter()
      .try_fold(1usize, |acc, &d| acc.checked_mul(usize::try_from(d).ok()?))?;
    elements.checked_mul(self.input_type(idx).size())
  }
}

/// 一种模型任务：前处理图像，后处理推理输出
pub trait Task {
  fn model_info(&self) -> &ModelInfo;

  /// 为模型的每个输入生成一个字节缓冲区
  fn preprocess(&self, images: &[BgrImage]) -> Result<Vec<Vec<u8>>>;

  /// frame_size 为原图 (width, height)
  fn postprocess(&self, frame_size: (u32, u32), outputs: &[RawOutput]) -> Result<TaskOutput>;
}

mod classifier;
mod yolo;
pub use self::classifier::Classifier;
pub use self::yolo::{DetectorConfig, YoloDetector};
