// 该文件是 Letterbox （信封填充） 项目的一部分。
// src/error.rs - 流水线错误定义
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

use thiserror::Error;

/// 前处理与后处理的错误
///
/// 所有错误都同步返回给直接调用者，作用域仅限当前帧，内部不做重试。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
  /// 没有输入图像/分数，或者输入为空
  #[error("输入为空: {0}")]
  InputEmpty(String),
  /// 输入张量形状不像图像，或者输出形状无法解析
  #[error("不支持的张量形状: {0}")]
  UnsupportedInputShape(String),
  /// 打包后的字节数与期望不符，说明几何计算有缺陷
  #[error("内部尺寸不匹配: 期望 {expected} 字节, 实际 {actual} 字节")]
  InternalSizeMismatch { expected: usize, actual: usize },
}

impl PipelineError {
  pub fn empty(msg: &str) -> Self {
    PipelineError::InputEmpty(msg.to_string())
  }

  pub fn shape(msg: &str) -> Self {
    PipelineError::UnsupportedInputShape(msg.to_string())
  }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
