// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/stats.rs - 推理耗时统计
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

use std::time::{Duration, Instant};

use tracing::{debug, info};

const UNKNOWN_PIPELINE: &str = "unknown";

/// 单次推理的耗时与瞬时帧率
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallTiming {
  pub latency: Duration,
  pub fps: f64,
}

/// 记录推理耗时，以及相邻两次调用结束时刻之间的瞬时帧率
///
/// 上一次调用的结束时刻保存在本结构中，同一实例不应被多个线程同时使用。
#[derive(Debug, Clone)]
pub struct InferenceStats {
  pipeline: String,
  last_time: Instant,
}

impl InferenceStats {
  pub fn new(pipeline_name: Option<String>) -> Self {
    Self {
      pipeline: pipeline_name.unwrap_or_else(|| UNKNOWN_PIPELINE.to_string()),
      last_time: Instant::now(),
    }
  }

  pub fn pipeline(&self) -> &str {
    &self.pipeline
  }

  pub fn record(&mut self, start: Instant) -> CallTiming {
    self.record_at(start, Instant::now())
  }

  pub fn record_at(&mut self, start: Instant, end: Instant) -> CallTiming {
    debug!("推理引擎返回结果");
    let latency = end.saturating_duration_since(start);
    let fps = 1.0 / end.saturating_duration_since(self.last_time).as_secs_f64();
    info!(
      "推理耗时 {:.2} ms, {:.2} fps, 管线 {}",
      latency.as_secs_f64() * 1000.0,
      fps,
      self.pipeline
    );
    self.last_time = end;
    CallTiming { latency, fps }
  }
}
