// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/ssd.rs - SSD 目标检测流程
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
use std::time::Instant;

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
  engine::InferenceEngine,
  frame::{DesiredSize, GeometryError, pad, thumbnail, to_input_tensor},
  model::{
    CallTiming, DetectResult, InferenceStats, LabelError, LabelMap, Model, RankOptions,
    RawDetections, ScaleFactors, rank,
  },
};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.6;
pub const DEFAULT_TOP_K: usize = 3;

const OUTPUT_NAMES: [&str; 4] = ["检测框", "类别编号", "置信度", "检测数量"];

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("未提供标签文件路径")]
  MissingLabels,
  #[error("输入图像为空")]
  EmptyImage,
  #[error("标签错误: {0}")]
  Label(#[from] LabelError),
  #[error("尺寸错误: {0}")]
  Geometry(#[from] GeometryError),
  #[error("输入张量形状无效: {0:?}")]
  InvalidInputShape(Vec<i64>),
  #[error("缺少{0}张量")]
  MissingTensor(&'static str),
  #[error("推理引擎错误: {0}")]
  Engine(#[source] Box<dyn std::error::Error + Send + Sync>),
}

fn engine_error<E: std::error::Error + Send + Sync + 'static>(e: E) -> DetectorError {
  error!("推理引擎错误: {}", e);
  DetectorError::Engine(Box::new(e))
}

/// 检测器配置
#[derive(Debug, Clone)]
pub struct DetectorConfig {
  labels: PathBuf,
  confidence_threshold: f32,
  top_k: usize,
  pipeline_name: Option<String>,
}

impl DetectorConfig {
  pub fn new(labels: impl Into<PathBuf>) -> Self {
    Self {
      labels: labels.into(),
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      top_k: DEFAULT_TOP_K,
      pipeline_name: None,
    }
  }

  pub fn confidence_threshold(mut self, confidence_threshold: f32) -> Self {
    self.confidence_threshold = confidence_threshold;
    self
  }

  pub fn top_k(mut self, top_k: usize) -> Self {
    self.top_k = top_k;
    self
  }

  pub fn pipeline_name(mut self, name: Option<String>) -> Self {
    self.pipeline_name = name;
    self
  }

  fn rank_options(&self) -> RankOptions {
    RankOptions {
      top_k: self.top_k,
      confidence_threshold: self.confidence_threshold,
    }
  }

  /// 读取标签文件并创建检测器
  pub fn build<E: InferenceEngine>(self, engine: E) -> Result<SsdDetector<E>, DetectorError> {
    if self.labels.as_os_str().is_empty() {
      error!("未提供标签文件路径");
      return Err(DetectorError::MissingLabels);
    }

    info!("加载标签文件: {}", self.labels.display());
    let labels = LabelMap::load(&self.labels)?;
    info!("标签加载完成, 共 {} 个类别", labels.len());

    Ok(SsdDetector::with_label_map(engine, labels, &self))
  }
}

/// 一次检测的全部产物
#[derive(Debug, Clone)]
pub struct Detected {
  /// 按比例缩小后的图像
  pub thumbnail: RgbImage,
  /// 送入模型的图像
  pub padded: RgbImage,
  pub result: DetectResult,
  pub timing: CallTiming,
}

/// SSD 检测器：缩略、填充、推理，再把结果映射回原图坐标
pub struct SsdDetector<E> {
  engine: E,
  labels: LabelMap,
  options: RankOptions,
  stats: InferenceStats,
}

impl<E: InferenceEngine> SsdDetector<E> {
  pub fn with_label_map(engine: E, labels: LabelMap, config: &DetectorConfig) -> Self {
    Self {
      engine,
      labels,
      options: config.rank_options(),
      stats: InferenceStats::new(config.pipeline_name.clone()),
    }
  }

  pub fn labels(&self) -> &LabelMap {
    &self.labels
  }

  pub fn engine(&self) -> &E {
    &self.engine
  }

  pub fn detect(&mut self, image: &RgbImage) -> Result<Detected, DetectorError> {
    if image.width() == 0 || image.height() == 0 {
      return Err(DetectorError::EmptyImage);
    }

    let start = Instant::now();
    debug!("调用推理引擎");

    let input = self
      .engine
      .input_details()
      .first()
      .cloned()
      .ok_or(DetectorError::MissingTensor("输入"))?;
    // NHWC, H:1, W:2
    let desired = match input.shape.as_slice() {
      [_, height, width, _] => (*width, *height),
      _ => return Err(DetectorError::InvalidInputShape(input.shape.clone())),
    };

    let thumb = thumbnail(image, desired)?;
    let padded = pad(&thumb, desired.to_tensor_size()?);

    let factors = ScaleFactors::new(thumb.dimensions(), padded.dimensions());
    debug!(
      "缩略图尺寸: {:?}, 张量图像尺寸: {:?}, 比例: {:?}",
      thumb.dimensions(),
      padded.dimensions(),
      factors
    );

    let tensor = to_input_tensor(&padded, self.engine.is_quantized());
    self
      .engine
      .set_tensor(input.index, tensor)
      .map_err(engine_error)?;
    self.engine.infer().map_err(engine_error)?;

    let timing = self.stats.record(start);

    let [boxes, classes, scores, num] = self.read_outputs()?;
    let raw = RawDetections {
      boxes: &boxes,
      classes: &classes,
      scores: &scores,
      count: detection_count(&num),
    };
    debug!("有效检测数量: {}", raw.count);

    let result = DetectResult::from(rank(&raw, &self.labels, factors, self.options));
    debug!("检测结果: {:?}", result);

    Ok(Detected {
      thumbnail: thumb,
      padded,
      result,
      timing,
    })
  }

  fn read_outputs(&self) -> Result<[Vec<f32>; 4], DetectorError> {
    let details = self.engine.output_details();
    let mut outputs: [Vec<f32>; 4] = Default::default();
    for (position, (slot, name)) in outputs.iter_mut().zip(OUTPUT_NAMES).enumerate() {
      let detail = details
        .get(position)
        .ok_or(DetectorError::MissingTensor(name))?;
      *slot = self.engine.get_tensor(detail.index).map_err(engine_error)?;
    }
    Ok(outputs)
  }
}

fn detection_count(num: &[f32]) -> usize {
  match num.first() {
    Some(&n) if n.is_finite() && n > 0.0 => n as usize,
    _ => 0,
  }
}

impl<E: InferenceEngine> Model for SsdDetector<E> {
  type Input = RgbImage;
  type Output = Detected;
  type Error = DetectorError;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.detect(input)
  }
}
