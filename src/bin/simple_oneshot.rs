// 该文件是 Letterbox （信封填充） 项目的一部分。
// src/bin/simple_oneshot.rs - 单帧前后处理
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

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use url::Url;

use letterbox::{
  FromUrl,
  input::ImageFileInput,
  label::LabelMap,
  model::{Classifier, DetectorConfig, ModelInfo, YoloDetector},
  nms::SuppressionPolicy,
  output::JsonLinesOutput,
  task::{OneShotTask, RepeatShotTask, ReplayInfer, TaskRunner},
};

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TaskKind {
  /// YOLO 目标检测
  Detect,
  /// 图像分类
  Classify,
}

/// Letterbox 单帧处理参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 任务类型
  #[arg(long, value_enum, default_value = "detect")]
  task: TaskKind,
  /// 模型元数据 JSON 文件，缺省为 1x3x640x640 float32 检测模型
  #[arg(long, value_name = "FILE")]
  model_info: Option<PathBuf>,
  /// 输入来源，例如 image:///path/to/a.jpg
  #[arg(long, value_name = "SOURCE")]
  input: Url,
  /// 录制的推理输出 JSON 文件
  #[arg(long, value_name = "FILE")]
  raw_output: PathBuf,
  /// 类别名称文件，每行一个
  #[arg(long, value_name = "FILE")]
  labels: Option<PathBuf>,
  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.5", value_name = "THRESHOLD")]
  confidence: f32,
  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.4", value_name = "THRESHOLD")]
  nms_threshold: f32,
  /// 只抑制同类别的重叠框
  #[arg(long)]
  per_class: bool,
  /// 重复次数，大于 1 时统计平均耗时
  #[arg(long, default_value = "1", value_name = "COUNT")]
  repeat: usize,
}

fn load_model_info(path: Option<&PathBuf>) -> Result<ModelInfo> {
  match path {
    Some(path) => {
      let file = std::fs::File::open(path)
        .with_context(|| format!("无法打开模型元数据: {}", path.display()))?;
      serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("无法解析模型元数据: {}", path.display()))
    }
    None => Ok(ModelInfo::yolo_default()),
  }
}

fn run<T: letterbox::model::Task>(args: &Args, task: T, model_info: ModelInfo) -> Result<()> {
  let input = ImageFileInput::from_url(&args.input)?;
  let backend = ReplayInfer::from_path(model_info, &args.raw_output)?;
  let mut output = JsonLinesOutput::new(std::io::stdout().lock());
  if let Some(path) = &args.labels {
    output = output.with_labels(LabelMap::from_path(path)?);
  }

  if args.repeat > 1 {
    RepeatShotTask::new(args.repeat).run_task(input, task, backend, output)
  } else {
    OneShotTask.run_task(input, task, backend, output)
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  info!("任务类型: {:?}", args.task);
  info!("输入来源: {}", args.input);
  info!("推理输出: {}", args.raw_output.display());

  let model_info = load_model_info(args.model_info.as_ref())?;

  match args.task {
    TaskKind::Detect => {
      let policy = if args.per_class {
        SuppressionPolicy::PerClass
      } else {
        SuppressionPolicy::ClassAgnostic
      };
      let config = DetectorConfig::default()
        .with_conf_threshold(args.confidence)
        .with_iou_threshold(args.nms_threshold)
        .with_policy(policy);
      let task = YoloDetector::new(model_info.clone()).with_config(config);
      run(&args, task, model_info)
    }
    TaskKind::Classify => {
      let task = Classifier::new(model_info.clone()).with_threshold(args.confidence);
      run(&args, task, model_info)
    }
  }
}
