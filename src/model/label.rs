// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/label.rs - 标签文件
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

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("标签文件读取错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("标签文件第 {line} 行格式错误: {content:?}")]
  Format { line: usize, content: String },
}

/// 类别编号到类别名称的映射
///
/// 标签文件每行为 `<编号><空白><名称>`，例如 `0 background`。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMap {
  labels: BTreeMap<u32, String>,
}

fn parse_line(line: &str) -> Option<(u32, String)> {
  let rest = line.trim_start();
  let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
  if digits == 0 || digits == rest.len() {
    return None;
  }
  let code = rest[..digits].parse().ok()?;
  Some((code, rest[digits..].trim().to_string()))
}

impl LabelMap {
  pub fn load(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let path = path.as_ref();
    debug!("读取标签文件: {}", path.display());
    let text = std::fs::read_to_string(path)?;
    Self::parse(&text)
  }

  pub fn parse(text: &str) -> Result<Self, LabelError> {
    text
      .lines()
      .enumerate()
      .map(|(idx, line)| {
        parse_line(line).ok_or_else(|| LabelError::Format {
          line: idx + 1,
          content: line.to_string(),
        })
      })
      .collect()
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  pub fn get(&self, code: u32) -> Option<&str> {
    self.labels.get(&code).map(String::as_str)
  }

  /// 解析模型输出的类别编号
  ///
  /// 编号为负、非有限值、不小于标签数量或不在映射中时返回 `None`。
  pub fn resolve(&self, code: f32) -> Option<&str> {
    if !code.is_finite() || code < 0.0 {
      return None;
    }
    let code = code as u32;
    if code as usize >= self.len() {
      return None;
    }
    self.get(code)
  }
}

impl FromIterator<(u32, String)> for LabelMap {
  fn from_iter<I: IntoIterator<Item = (u32, String)>>(iter: I) -> Self {
    Self {
      labels: iter.into_iter().collect(),
    }
  }
}
