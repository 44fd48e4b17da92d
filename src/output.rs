// 该文件是 Letterbox （信封填充） 项目的一部分。
// src/output.rs - 输出定义
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

use std::{io::Write, sync::Mutex};

use serde::Serialize;
use thiserror::Error;

use crate::{
  frame::BgrImage,
  label::LabelMap,
  model::{Classification, Detection, TaskOutput},
};

pub trait Render<Output>: Sized {
  type Error;
  fn render_result(&self, frame: &BgrImage, result: &Output) -> Result<(), Self::Error>;
}

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("输出锁已失效")]
  Poisoned,
}

#[derive(Serialize)]
struct DetectionRecord<'a> {
  class_id: u32,
  #[serde(skip_serializing_if = "Option::is_none")]
  label: Option<&'a str>,
  det_confidence: f32,
  class_confidence: f32,
  x: i32,
  y: i32,
  width: i32,
  height: i32,
}

#[derive(Serialize)]
struct ClassificationRecord<'a> {
  class_id: u32,
  #[serde(skip_serializing_if = "Option::is_none")]
  label: Option<&'a str>,
  class_confidence: f32,
}

/// 每个结果输出一行 JSON
pub struct JsonLinesOutput<W: Write> {
  writer: Mutex<W>,
  labels: Option<LabelMap>,
}

impl<W: Write> JsonLinesOutput<W> {
  pub fn new(writer: W) -> Self {
    Self {
      writer: Mutex::new(writer),
      labels: None,
    }
  }

  pub fn with_labels(mut self, labels: LabelMap) -> Self {
    self.labels = Some(labels);
    self
  }

  pub fn into_inner(self) -> Result<W, OutputError> {
    self.writer.into_inner().map_err(|_| OutputError::Poisoned)
  }

  fn label(&self, class_id: u32) -> Option<&str> {
    self.labels.as_ref().and_then(|labels| labels.name(class_id))
  }

  fn write_records<T: Serialize>(&self, records: &[T]) -> Result<(), OutputError> {
    let mut writer = self.writer.lock().map_err(|_| OutputError::Poisoned)?;
    for record in records {
      serde_json::to_writer(&mut *writer, record)?;
      writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
  }
}

impl<W: Write> Render<Vec<Detection>> for JsonLinesOutput<W> {
  type Error = OutputError;

  fn render_result(&self, _frame: &BgrImage, result: &Vec<Detection>) -> Result<(), Self::Error> {
    let records: Vec<DetectionRecord> = result
      .iter()
      .map(|det| {
        let rect = det.bbox.to_rect();
        DetectionRecord {
          class_id: det.class_id,
          label: self.label(det.class_id),
          det_confidence: det.det_confidence,
          class_confidence: det.class_confidence,
          x: rect.x,
          y: rect.y,
          width: rect.width,
          height: rect.height,
        }
      })
      .collect();
    self.write_records(&records)
  }
}

impl<W: Write> Render<Vec<Classification>> for JsonLinesOutput<W> {
  type Error = OutputError;

  fn render_result(
    &self,
    _frame: &BgrImage,
    result: &Vec<Classification>,
  ) -> Result<(), Self::Error> {
    let records: Vec<ClassificationRecord> = result
      .iter()
      .map(|c| ClassificationRecord {
        class_id: c.class_id,
        label: self.label(c.class_id),
        class_confidence: c.class_confidence,
      })
      .collect();
    self.write_records(&records)
  }
}

impl<W: Write> Render<TaskOutput> for JsonLinesOutput<W> {
  type Error = OutputError;

  fn render_result(&self, frame: &BgrImage, result: &TaskOutput) -> Result<(), Self::Error> {
    match result {
      TaskOutput::Detections(items) => {
        <Self as Render<Vec<Detection>>>::render_result(self, frame, items)
      }
      TaskOutput::Classifications(items) => {
        <Self as Render<Vec<Classification>>>::render_result(self, frame, items)
      }
    }
  }
}
