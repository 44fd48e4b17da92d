// 该文件是 Letterbox （信封填充） 项目的一部分。
// src/tensor.rs - 推理输出张量
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

/// 张量元素类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ElementType {
  U8,
  I8,
  I32,
  I64,
  F32,
  F64,
}

impl ElementType {
  pub fn size(&self) -> usize {
    match self {
      ElementType::U8 | ElementType::I8 => 1,
      ElementType::I32 | ElementType::F32 => 4,
      ElementType::I64 | ElementType::F64 => 8,
    }
  }
}

/// 推理输出中的单个元素，不同模型可能给出不同宽度的数值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "UPPERCASE")]
pub enum TensorElement {
  U8(u8),
  I8(i8),
  I32(i32),
  I64(i64),
  F32(f32),
  F64(f64),
}

impl TensorElement {
  pub fn as_f32(&self) -> f32 {
    match *self {
      TensorElement::U8(v) => v as f32,
      TensorElement::I8(v) => v as f32,
      TensorElement::I32(v) => v as f32,
      TensorElement::I64(v) => v as f32,
      TensorElement::F32(v) => v,
      TensorElement::F64(v) => v as f32,
    }
  }

  pub fn element_type(&self) -> ElementType {
    match self {
      TensorElement::U8(_) => ElementType::U8,
      TensorElement::I8(_) => ElementType::I8,
      TensorElement::I32(_) => ElementType::I32,
      TensorElement::I64(_) => ElementType::I64,
      TensorElement::F32(_) => ElementType::F32,
      TensorElement::F64(_) => ElementType::F64,
    }
  }
}

impl From<f32> for TensorElement {
  fn from(v: f32) -> Self {
    TensorElement::F32(v)
  }
}

impl From<f64> for TensorElement {
  fn from(v: f64) -> Self {
    TensorElement::F64(v)
  }
}

impl From<i32> for TensorElement {
  fn from(v: i32) -> Self {
    TensorElement::I32(v)
  }
}

impl From<i64> for TensorElement {
  fn from(v: i64) -> Self {
    TensorElement::I64(v)
  }
}

impl From<u8> for TensorElement {
  fn from(v: u8) -> Self {
    TensorElement::U8(v)
  }
}

/// 原始推理输出：扁平数据 + 形状（批次维在前）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOutput {
  pub data: Vec<TensorElement>,
  pub shape: Vec<i64>,
}

impl RawOutput {
  pub fn new(data: Vec<TensorElement>, shape: Vec<i64>) -> Self {
    Self { data, shape }
  }

  pub fn from_f32(data: Vec<f32>, shape: Vec<i64>) -> Self {
    Self {
      data: data.into_iter().map(TensorElement::F32).collect(),
      shape,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty() || self.shape.is_empty()
  }

  /// 第 idx 个元素按 f32 解释
  pub fn get_f32(&self, idx: usize) -> Option<f32> {
    self.data.get(idx).map(TensorElement::as_f32)
  }
}
