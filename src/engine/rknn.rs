// 该文件是 Beifeng （北风） 项目的一部分。
// src/engine/rknn.rs - RKNN NPU 推理引擎
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

use rknpu::{Context, InitFlags, TensorFormat, TensorType};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  engine::{InferenceEngine, InputTensor, TensorDetails},
  url_file_path,
};

const SSD_NUM_INPUTS: u32 = 1;
const SSD_NUM_OUTPUTS: u32 = 4;
const SSD_DEFAULT_INPUT_W: i64 = 300;
const SSD_DEFAULT_INPUT_H: i64 = 300;
const RGB_CHANNELS: i64 = 3;

#[derive(Error, Debug)]
pub enum RknnEngineError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型无效: {0}, 错误: {1}")]
  ModelInvalid(String, rknpu::Error),
  #[error("RKNN 错误: {0}")]
  RknnError(#[from] rknpu::Error),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("不支持的输入: {0}")]
  UnsupportedInput(String),
  #[error("输出张量 {0} 不存在")]
  MissingOutput(usize),
}

impl RknnEngineError {
  pub fn invalid(msg: &str, e: rknpu::Error) -> Self {
    RknnEngineError::ModelInvalid(msg.to_string(), e)
  }
}

/// 通过 URL 配置 RKNN 引擎
///
/// `rknn:///path/to/ssd.rknn?width=300&height=300&quantized=true`
pub struct RknnEngineBuilder {
  model_path: std::path::PathBuf,
  width: i64,
  height: i64,
  quantized: bool,
  flags: InitFlags,
}

impl FromUrlWithScheme for RknnEngineBuilder {
  const SCHEME: &'static str = "rknn";
}

impl FromUrl for RknnEngineBuilder {
  type Error = RknnEngineError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(RknnEngineError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let mut builder = RknnEngineBuilder {
      model_path: url_file_path(url),
      width: SSD_DEFAULT_INPUT_W,
      height: SSD_DEFAULT_INPUT_H,
      quantized: true,
      flags: InitFlags::default(),
    };

    for (key, value) in url.query_pairs() {
      let invalid = || RknnEngineError::ModelPathError(format!("参数 {}={} 无效", key, value));
      match &*key {
        "width" => builder.width = value.parse().map_err(|_| invalid())?,
        "height" => builder.height = value.parse().map_err(|_| invalid())?,
        "quantized" => builder.quantized = value.parse().map_err(|_| invalid())?,
        _ => debug!("忽略未知参数: {}={}", key, value),
      }
    }

    Ok(builder)
  }
}

impl RknnEngineBuilder {
  pub fn flags(mut self, flags: InitFlags) -> Self {
    self.flags = flags;
    self
  }

  pub fn build(self) -> Result<RknnEngine, RknnEngineError> {
    info!("加载模型文件: {}", self.model_path.display());
    let model_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 RKNN 推理上下文");
    let context = Context::new(&model_data, self.flags)?;
    info!("模型加载完成");

    let num_inputs = context
      .num_inputs()
      .map_err(|e| RknnEngineError::invalid("无法获取输入数量", e))?;
    let num_outputs = context
      .num_outputs()
      .map_err(|e| RknnEngineError::invalid("无法获取输出数量", e))?;

    if num_inputs != SSD_NUM_INPUTS || num_outputs != SSD_NUM_OUTPUTS {
      let msg = format!(
        "预期模型输入/输出数量为 {}/{}, 实际为 {}/{}",
        SSD_NUM_INPUTS, SSD_NUM_OUTPUTS, num_inputs, num_outputs
      );
      error!("{}", msg);
      return Err(RknnEngineError::invalid(&msg, rknpu::Error::InvalidModel));
    }

    let inputs = vec![TensorDetails::new(
      0,
      [1, self.height, self.width, RGB_CHANNELS],
    )];
    let outputs = (0..SSD_NUM_OUTPUTS as usize)
      .map(|index| TensorDetails::new(index, Vec::new()))
      .collect();

    Ok(RknnEngine {
      context,
      inputs,
      outputs,
      quantized: self.quantized,
      results: Vec::new(),
    })
  }
}

/// 以 NHWC uint8 输入运行 SSD 模型的 RKNN 引擎
pub struct RknnEngine {
  context: Context,
  inputs: Vec<TensorDetails>,
  outputs: Vec<TensorDetails>,
  quantized: bool,
  results: Vec<Vec<f32>>,
}

impl InferenceEngine for RknnEngine {
  type Error = RknnEngineError;

  fn input_details(&self) -> &[TensorDetails] {
    &self.inputs
  }

  fn output_details(&self) -> &[TensorDetails] {
    &self.outputs
  }

  fn is_quantized(&self) -> bool {
    self.quantized
  }

  fn set_tensor(&mut self, index: usize, data: InputTensor) -> Result<(), Self::Error> {
    if index != 0 {
      return Err(RknnEngineError::UnsupportedInput(format!(
        "输入槽位 {}",
        index
      )));
    }

    match data {
      InputTensor::UInt8 { data, .. } => {
        debug!("设置模型输入");
        self
          .context
          .set_input(0, &data, TensorFormat::NHWC, TensorType::UInt8)?;
        Ok(())
      }
      InputTensor::Float32 { .. } => Err(RknnEngineError::UnsupportedInput(
        "RKNN 引擎仅接受 uint8 输入".to_string(),
      )),
    }
  }

  fn infer(&mut self) -> Result<(), Self::Error> {
    debug!("执行模型推理");
    self.context.run()?;

    debug!("获取模型输出");
    let output = self.context.get_outputs()?;
    self.results = (0..self.outputs.len())
      .map(|index| output.get_f32(index).map(|data| data.to_vec()))
      .collect::<Result<_, _>>()?;
    Ok(())
  }

  fn get_tensor(&self, index: usize) -> Result<Vec<f32>, Self::Error> {
    self
      .results
      .get(index)
      .cloned()
      .ok_or(RknnEngineError::MissingOutput(index))
  }
}
