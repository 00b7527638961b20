// 该文件是 Beifeng （北风） 项目的一部分。
// src/output/record.rs - 检测结果记录输出
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

use std::io::Write;
use std::sync::Mutex;

use chrono::{DateTime, Local};
use image::RgbImage;
use serde_json::{Value, json};
use thiserror::Error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DetectResult, Detected},
  output::Render,
};

#[derive(Error, Debug)]
pub enum RecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("输出已被占用")]
  Poisoned,
}

/// 单帧检测记录
pub fn frame_record(image: &RgbImage, result: &DetectResult, datetime: DateTime<Local>) -> Value {
  json!({
    "datetime": datetime.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
    "image": {
      "width": image.width(),
      "height": image.height(),
    },
    "inference_result": result.to_json(),
  })
}

/// 每帧输出一行 JSON 检测记录，`stdout:` 或 `stdout:?always`
///
/// 默认只输出包含检测结果的帧。
pub struct RecordOutput {
  writer: Mutex<Box<dyn Write + Send>>,
  always: bool,
}

impl FromUrlWithScheme for RecordOutput {
  const SCHEME: &'static str = "stdout";
}

impl FromUrl for RecordOutput {
  type Error = RecordOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(RecordOutputError::SchemeMismatch);
    }

    let always = url.query_pairs().any(|(k, _)| k == "always");
    Ok(Self::with_writer(Box::new(std::io::stdout()), always))
  }
}

impl RecordOutput {
  pub fn with_writer(writer: Box<dyn Write + Send>, always: bool) -> Self {
    Self {
      writer: Mutex::new(writer),
      always,
    }
  }
}

impl Render<RgbImage, Detected> for RecordOutput {
  type Error = RecordOutputError;

  fn render_result(&self, frame: &RgbImage, result: &Detected) -> Result<(), Self::Error> {
    if !self.always && result.result.is_empty() {
      return Ok(());
    }

    let record = frame_record(frame, &result.result, Local::now());
    let mut writer = self.writer.lock().map_err(|_| RecordOutputError::Poisoned)?;
    serde_json::to_writer(&mut *writer, &record)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
  }
}
