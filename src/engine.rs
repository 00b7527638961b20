// 该文件是 Beifeng （北风） 项目的一部分。
// src/engine.rs - 推理引擎接口
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

/// 张量描述：槽位索引与形状
///
/// 输入张量的形状为 NHWC，高在下标 1，宽在下标 2。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorDetails {
  pub index: usize,
  pub shape: Vec<i64>,
}

impl TensorDetails {
  pub fn new(index: usize, shape: impl Into<Vec<i64>>) -> Self {
    Self {
      index,
      shape: shape.into(),
    }
  }
}

/// 带批次维度的 NHWC 输入张量
#[derive(Debug, Clone, PartialEq)]
pub enum InputTensor {
  UInt8 { shape: [usize; 4], data: Vec<u8> },
  Float32 { shape: [usize; 4], data: Vec<f32> },
}

impl InputTensor {
  pub fn shape(&self) -> &[usize; 4] {
    match self {
      InputTensor::UInt8 { shape, .. } | InputTensor::Float32 { shape, .. } => shape,
    }
  }

  pub fn len(&self) -> usize {
    match self {
      InputTensor::UInt8 { data, .. } => data.len(),
      InputTensor::Float32 { data, .. } => data.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// 外部推理引擎
///
/// 输出张量按固定顺序排列：检测框、类别编号、置信度、检测数量。
/// 输出数据只在下一次 [`InferenceEngine::infer`] 之前有效。
pub trait InferenceEngine {
  type Error: std::error::Error + Send + Sync + 'static;

  fn input_details(&self) -> &[TensorDetails];
  fn output_details(&self) -> &[TensorDetails];
  fn is_quantized(&self) -> bool;

  fn set_tensor(&mut self, index: usize, data: InputTensor) -> Result<(), Self::Error>;
  fn infer(&mut self) -> Result<(), Self::Error>;
  fn get_tensor(&self, index: usize) -> Result<Vec<f32>, Self::Error>;
}

#[cfg(feature = "rknn")]
mod rknn;
#[cfg(feature = "rknn")]
pub use self::rknn::{RknnEngine, RknnEngineBuilder, RknnEngineError};
