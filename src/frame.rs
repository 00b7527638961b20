// 该文件是 Beifeng （北风） 项目的一部分。
// src/frame.rs - 缩略图、填充与输入张量
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

use std::any::type_name;
use std::fmt::Debug;

use image::{
  ImageBuffer, Pixel, RgbImage,
  imageops::{self, FilterType},
};
use thiserror::Error;
use tracing::{debug, error};

use crate::engine::InputTensor;

const RGB_CHANNELS: usize = 3;
const INPUT_MEAN: f32 = 127.5;
const INPUT_STD: f32 = 127.5;
const THUMBNAIL_FILTER: FilterType = FilterType::CatmullRom;

/// 模型输入张量的宽高
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorSize {
  pub width: u32,
  pub height: u32,
}

impl TensorSize {
  pub fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }

  pub fn dimensions(&self) -> (u32, u32) {
    (self.width, self.height)
  }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
  "期望尺寸 {desired} 的 {dimension} 无法转换为正整数: 值 {value}, type(width)={width_type}, type(height)={height_type}"
)]
pub struct GeometryError {
  pub desired: String,
  pub dimension: &'static str,
  pub value: String,
  pub width_type: &'static str,
  pub height_type: &'static str,
}

/// 可以规范化为 [`TensorSize`] 的期望尺寸
///
/// 推理引擎给出的形状可能是 `i32`、`i64`、`usize` 等任意整数类型，
/// 在进入图像处理之前统一转换为 `u32`。
pub trait DesiredSize: Debug {
  fn to_tensor_size(&self) -> Result<TensorSize, GeometryError>;
}

impl DesiredSize for TensorSize {
  fn to_tensor_size(&self) -> Result<TensorSize, GeometryError> {
    Ok(*self)
  }
}

fn positive_u32<T: TryInto<u32>>(value: T) -> Option<u32> {
  value.try_into().ok().filter(|v| *v > 0)
}

impl<W, H> DesiredSize for (W, H)
where
  W: TryInto<u32> + Copy + Debug,
  H: TryInto<u32> + Copy + Debug,
{
  fn to_tensor_size(&self) -> Result<TensorSize, GeometryError> {
    let (w, h) = *self;
    let failure = |dimension: &'static str, value: String| GeometryError {
      desired: format!("{:?}", self),
      dimension,
      value,
      width_type: type_name::<W>(),
      height_type: type_name::<H>(),
    };

    let width = positive_u32(w).ok_or_else(|| failure("width", format!("{:?}", w)))?;
    let height = positive_u32(h).ok_or_else(|| failure("height", format!("{:?}", h)))?;
    Ok(TensorSize::new(width, height))
  }
}

fn round_aspect(number: f64, key: impl Fn(u32) -> f64) -> u32 {
  let floor = number.floor() as u32;
  let ceil = number.ceil() as u32;
  let best = if key(ceil) < key(floor) { ceil } else { floor };
  best.max(1)
}

/// 计算保持宽高比、恰好放入目标尺寸的缩略图大小，从不放大
pub fn fit_within(source: (u32, u32), target: TensorSize) -> (u32, u32) {
  let (src_w, src_h) = source;
  let (dst_w, dst_h) = target.dimensions();
  if dst_w >= src_w && dst_h >= src_h {
    return source;
  }

  let aspect = src_w as f64 / src_h as f64;
  let (dst_w_f, dst_h_f) = (dst_w as f64, dst_h as f64);
  if dst_w_f / dst_h_f >= aspect {
    let width = round_aspect(dst_h_f * aspect, |n| (aspect - n as f64 / dst_h_f).abs());
    (width, dst_h)
  } else {
    let height = round_aspect(dst_w_f / aspect, |n| {
      if n == 0 {
        0.0
      } else {
        (aspect - dst_w_f / n as f64).abs()
      }
    });
    (dst_w, height)
  }
}

/// 按比例缩小图像，使其尽量接近期望尺寸
///
/// 保持原图宽高比，不修改原图；原图已经能放入期望尺寸时返回其副本。
pub fn thumbnail<P, D>(
  image: &ImageBuffer<P, Vec<P::Subpixel>>,
  desired: D,
) -> Result<ImageBuffer<P, Vec<P::Subpixel>>, GeometryError>
where
  P: Pixel + 'static,
  P::Subpixel: 'static,
  D: DesiredSize,
{
  debug!("输入图像尺寸 = {:?}", image.dimensions());
  let target = desired.to_tensor_size().inspect_err(|e| {
    error!("缩略图尺寸转换失败 (desired_size={:?}): {}", desired, e);
  })?;

  let (width, height) = fit_within(image.dimensions(), target);
  let thumb = if (width, height) == image.dimensions() {
    image.clone()
  } else {
    imageops::resize(image, width, height, THUMBNAIL_FILTER)
  };

  debug!("缩略图尺寸 = {:?}", thumb.dimensions());
  Ok(thumb)
}

/// 在右侧和底部以零值像素填充缩略图，得到与输入张量完全一致的尺寸
///
/// # Panics
///
/// 缩略图大于目标尺寸，或填充结果与目标尺寸不一致时触发断言。
pub fn pad<P>(
  thumbnail: &ImageBuffer<P, Vec<P::Subpixel>>,
  target: TensorSize,
) -> ImageBuffer<P, Vec<P::Subpixel>>
where
  P: Pixel,
{
  let (thumb_w, thumb_h) = thumbnail.dimensions();
  assert!(
    thumb_w <= target.width && thumb_h <= target.height,
    "缩略图 {}x{} 超出目标尺寸 {}x{}",
    thumb_w,
    thumb_h,
    target.width,
    target.height
  );

  let delta_w = target.width - thumb_w;
  let delta_h = target.height - thumb_h;
  debug!("右侧填充 {} 像素, 底部填充 {} 像素", delta_w, delta_h);

  let mut padded: ImageBuffer<P, Vec<P::Subpixel>> = ImageBuffer::new(target.width, target.height);
  imageops::replace(&mut padded, thumbnail, 0, 0);

  debug!("填充后图像尺寸 = {:?}", padded.dimensions());
  assert_eq!(
    padded.dimensions(),
    target.dimensions(),
    "填充后尺寸与目标尺寸不一致"
  );
  padded
}

/// 将填充后的图像加上批次维度，组成 NHWC 输入张量
///
/// 非量化模型的像素值按 `(v - 127.5) / 127.5` 归一化为浮点数。
pub fn to_input_tensor(padded: &RgbImage, quantized: bool) -> InputTensor {
  let (width, height) = padded.dimensions();
  let shape = [1, height as usize, width as usize, RGB_CHANNELS];
  let data = padded.as_raw();

  if quantized {
    InputTensor::UInt8 {
      shape,
      data: data.clone(),
    }
  } else {
    InputTensor::Float32 {
      shape,
      data: data
        .iter()
        .map(|&v| (v as f32 - INPUT_MEAN) / INPUT_STD)
        .collect(),
    }
  }
}
