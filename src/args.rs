// 该文件是 Beifeng （北风） 项目的一部分。
// src/args.rs - 项目参数配置
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

use clap::Args;
use tracing::info;
use url::Url;

use crate::model::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_TOP_K, DetectorConfig};

/// 各个可执行程序共用的参数
#[derive(Args, Debug, Clone)]
pub struct DetectArgs {
  /// 模型 URL，例如 rknn:///models/ssd.rknn?width=300&height=300
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 标签文件路径，每行 `<编号> <名称>`
  #[arg(long, value_name = "FILE")]
  pub labels: PathBuf,
  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD, value_name = "THRESHOLD")]
  pub confidence: f32,
  /// 每帧最多保留的检测数量
  #[arg(long, default_value_t = DEFAULT_TOP_K, value_name = "K")]
  pub top_k: usize,
  /// 管线名称，用于日志
  #[arg(long, value_name = "NAME")]
  pub name: Option<String>,
  /// 输入来源：image:///photo.jpg 或 folder:///photos
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出：stdout: 或 image:///input.png
  #[arg(long, value_name = "OUTPUT", default_value = "stdout:")]
  pub output: Url,
}

impl DetectArgs {
  pub fn detector_config(&self) -> DetectorConfig {
    DetectorConfig::new(&self.labels)
      .confidence_threshold(self.confidence)
      .top_k(self.top_k)
      .pipeline_name(self.name.clone())
  }

  pub fn log(&self) {
    info!("模型: {}", self.model);
    info!("标签文件: {}", self.labels.display());
    info!("置信度阈值: {}, top_k: {}", self.confidence, self.top_k);
    info!("输入来源: {}", self.input);
    info!("输出路径: {}", self.output);
  }
}
