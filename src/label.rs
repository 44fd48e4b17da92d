// 该文件是 Letterbox （信封填充） 项目的一部分。
// src/label.rs - 类别名称表
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

use std::{
  io::{BufRead, BufReader, Read},
  path::Path,
};

use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 类别编号到名称的映射，每行一个名称
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMap {
  names: Vec<String>,
}

impl LabelMap {
  pub fn new(names: Vec<String>) -> Self {
    Self { names }
  }

  pub fn from_reader<R: Read>(reader: R) -> Result<Self, LabelError> {
    let mut names = Vec::new();
    for line in BufReader::new(reader).lines() {
      let line = line?;
      names.push(line.trim_end_matches('\r').to_string());
    }
    Ok(Self { names })
  }

  pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, LabelError> {
    let file = std::fs::File::open(path.as_ref())?;
    let labels = Self::from_reader(file)?;
    info!(
      "从 {} 加载 {} 个类别名称",
      path.as_ref().display(),
      labels.len()
    );
    Ok(labels)
  }

  pub fn name(&self, class_id: u32) -> Option<&str> {
    self.names.get(class_id as usize).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reads_one_name_per_line() {
    let labels = LabelMap::from_reader("person\r\nbicycle\ncar\n".as_bytes()).unwrap();
    assert_eq!(labels.len(), 3);
    assert_eq!(labels.name(0), Some("person"));
    assert_eq!(labels.name(1), Some("bicycle"));
    assert_eq!(labels.name(2), Some("car"));
    assert_eq!(labels.name(3), None);
  }

  #[test]
  fn empty_resource_gives_empty_map() {
    let labels = LabelMap::from_reader("".as_bytes()).unwrap();
    assert!(labels.is_empty());
  }

  #[test]
  fn reads_from_file() {
    let path = std::env::temp_dir().join(format!("letterbox-labels-{}.txt", std::process::id()));
    std::fs::write(&path, "cat\ndog\n").unwrap();
    let labels = LabelMap::from_path(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(labels.name(1), Some("dog"));
  }

  #[test]
  fn missing_file_is_an_error() {
    assert!(LabelMap::from_path("/nonexistent/labels.txt").is_err());
  }
}
