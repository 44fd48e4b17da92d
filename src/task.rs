// 该文件是 Letterbox （信封填充） 项目的一部分。
// src/task.rs - 推理任务流程
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

use std::{path::Path, time::Duration};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  frame::BgrImage,
  model::{ModelInfo, Task, TaskOutput},
  output::Render,
  tensor::RawOutput,
};

/// 外部推理执行组件：接收前处理后的输入缓冲区，返回原始输出
pub trait Infer {
  type Error;
  fn infer(&self, inputs: &[Vec<u8>]) -> Result<Vec<RawOutput>, Self::Error>;
}

#[derive(Error, Debug)]
pub enum ReplayError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("输入数量不匹配: 期望 {expected}, 实际 {actual}")]
  InputCountMismatch { expected: usize, actual: usize },
  #[error("输入 {index} 字节数不匹配: 期望 {expected}, 实际 {actual}")]
  InputSizeMismatch {
    index: usize,
    expected: usize,
    actual: usize,
  },
}

/// 回放事先录制的推理输出，用于离线验证前后处理
pub struct ReplayInfer {
  model_info: ModelInfo,
  outputs: Vec<RawOutput>,
}

impl ReplayInfer {
  pub fn new(model_info: ModelInfo, outputs: Vec<RawOutput>) -> Self {
    Self {
      model_info,
      outputs,
    }
  }

  /// 文件内容为 `RawOutput` 的 JSON 数组
  pub fn from_path<P: AsRef<Path>>(model_info: ModelInfo, path: P) -> Result<Self, ReplayError> {
    info!("加载录制的推理输出: {}", path.as_ref().display());
    let file = std::fs::File::open(path.as_ref())?;
    let outputs: Vec<RawOutput> = serde_json::from_reader(std::io::BufReader::new(file))?;
    debug!("录制输出数量: {}", outputs.len());
    Ok(Self::new(model_info, outputs))
  }
}

impl Infer for ReplayInfer {
  type Error = ReplayError;

  fn infer(&self, inputs: &[Vec<u8>]) -> Result<Vec<RawOutput>, Self::Error> {
    if inputs.len() != self.model_info.num_inputs() {
      error!(
        "预期模型输入数量为 {}, 实际为 {}",
        self.model_info.num_inputs(),
        inputs.len()
      );
      return Err(ReplayError::InputCountMismatch {
        expected: self.model_info.num_inputs(),
        actual: inputs.len(),
      });
    }

    for (index, input) in inputs.iter().enumerate() {
      if let Some(expected) = self.model_info.input_byte_size(index)
        && expected != input.len()
      {
        error!(
          "输入 {} 字节数不匹配: 期望 {}, 实际 {}",
          index,
          expected,
          input.len()
        );
        return Err(ReplayError::InputSizeMismatch {
          index,
          expected,
          actual: input.len(),
        });
      }
    }

    Ok(self.outputs.clone())
  }
}

pub trait TaskRunner<I, T, B, O>: Sized {
  type Error;
  fn run_task(self, input: I, task: T, backend: B, output: O) -> Result<(), Self::Error>;
}

fn run_once<T, B, O>(frame: &BgrImage, task: &T, backend: &B, output: &O) -> anyhow::Result<TaskOutput>
where
  T: Task,
  B: Infer,
  B::Error: std::error::Error + Send + Sync + 'static,
  O: Render<TaskOutput>,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  let inputs = task.preprocess(std::slice::from_ref(frame))?;
  let outputs = backend.infer(&inputs)?;
  let result = task.postprocess(frame.dimensions(), &outputs)?;
  output.render_result(frame, &result)?;
  Ok(result)
}

pub struct OneShotTask;

impl<I, T, B, O> TaskRunner<I, T, B, O> for OneShotTask
where
  I: Iterator<Item = BgrImage>,
  T: Task,
  B: Infer,
  B::Error: std::error::Error + Send + Sync + 'static,
  O: Render<TaskOutput>,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, task: T, backend: B, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功: {}x{}", frame.width(), frame.height());
    let now = std::time::Instant::now();
    let result = run_once(&frame, &task, &backend, &output)?;
    info!("处理完成，得到 {} 个结果，耗时: {:.2?}", result.len(), now.elapsed());

    Ok(())
  }
}

/// 对同一帧重复执行，统计平均耗时
pub struct RepeatShotTask {
  times: usize,
}

impl RepeatShotTask {
  pub fn new(times: usize) -> Self {
    Self { times }
  }
}

impl<I, T, B, O> TaskRunner<I, T, B, O> for RepeatShotTask
where
  I: Iterator<Item = BgrImage>,
  T: Task,
  B: Infer,
  B::Error: std::error::Error + Send + Sync + 'static,
  O: Render<TaskOutput>,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, task: T, backend: B, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    let mut times = Vec::with_capacity(self.times);
    for i in 0..self.times {
      let now = std::time::Instant::now();
      run_once(&frame, &task, &backend, &output)?;
      let elapsed = now.elapsed();
      debug!("({})处理完成，耗时: {:.2?}", i, elapsed);
      times.push(elapsed);
    }

    if !times.is_empty() {
      warn!(
        "平均处理时间: {:.2?}",
        times.iter().sum::<Duration>() / times.len() as u32
      );
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{model::YoloDetector, output::JsonLinesOutput};

  fn frame() -> BgrImage {
    BgrImage::new(1280, 720, vec![50; 1280 * 720 * 3]).unwrap()
  }

  fn recorded_output() -> RawOutput {
    let mut data = vec![0.0f32; 8 * 6];
    data[..6].copy_from_slice(&[320.0, 320.0, 640.0, 360.0, 0.9, 0.9]);
    RawOutput::from_f32(data, vec![1, 8, 6])
  }

  #[test]
  fn replay_checks_input_sizes() {
    let backend = ReplayInfer::new(ModelInfo::yolo_default(), vec![recorded_output()]);
    assert!(matches!(
      backend.infer(&[vec![0u8; 10]]),
      Err(ReplayError::InputSizeMismatch { index: 0, .. })
    ));
    assert!(matches!(
      backend.infer(&[]),
      Err(ReplayError::InputCountMismatch { expected: 1, actual: 0 })
    ));
  }

  #[test]
  fn replay_loads_outputs_from_json() {
    let path = std::env::temp_dir().join(format!("letterbox-replay-{}.json", std::process::id()));
    std::fs::write(&path, serde_json::to_string(&vec![recorded_output()]).unwrap()).unwrap();
    let backend = ReplayInfer::from_path(ModelInfo::yolo_default(), &path).unwrap();
    std::fs::remove_file(&path).unwrap();
    let outputs = backend.infer(&[vec![0u8; 3 * 640 * 640 * 4]]).unwrap();
    assert_eq!(outputs, vec![recorded_output()]);
  }

  #[test]
  fn one_shot_runs_full_pipeline() {
    let backend = ReplayInfer::new(ModelInfo::yolo_default(), vec![recorded_output()]);
    let task = YoloDetector::new(ModelInfo::yolo_default());
    let mut buffer = Vec::new();
    let output = JsonLinesOutput::new(&mut buffer);
    OneShotTask
      .run_task(std::iter::once(frame()), task, backend, output)
      .unwrap();

    let text = String::from_utf8(buffer).unwrap();
    let record: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
    assert_eq!(record["x"], 0);
    assert_eq!(record["y"], 0);
    assert_eq!(record["width"], 1280);
    assert_eq!(record["height"], 720);
  }

  #[test]
  fn one_shot_without_frames_fails() {
    let backend = ReplayInfer::new(ModelInfo::yolo_default(), vec![recorded_output()]);
    let task = YoloDetector::new(ModelInfo::yolo_default());
    let output = JsonLinesOutput::new(std::io::sink());
    assert!(
      OneShotTask
        .run_task(std::iter::empty::<BgrImage>(), task, backend, output)
        .is_err()
    );
  }

  #[test]
  fn repeat_shot_runs_many_times() {
    let backend = ReplayInfer::new(ModelInfo::yolo_default(), vec![recorded_output()]);
    let task = YoloDetector::new(ModelInfo::yolo_default());
    let mut buffer = Vec::new();
    let output = JsonLinesOutput::new(&mut buffer);
    RepeatShotTask::new(3)
      .run_task(std::iter::once(frame()), task, backend, output)
      .unwrap();
    assert_eq!(String::from_utf8(buffer).unwrap().lines().count(), 3);
  }
}
