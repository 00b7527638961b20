// 该文件是 Beifeng （北风） 项目的一部分。
// tests/pipeline.rs - 检测流程集成测试
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

use approx::assert_relative_eq;
use image::{Rgb, RgbImage};

use beifeng::{
  engine::{InferenceEngine, InputTensor, TensorDetails},
  model::{DetectorConfig, DetectorError, LabelError, LabelMap, Model, SsdDetector},
};

#[derive(Debug, thiserror::Error)]
#[error("scripted engine failure")]
struct ScriptedError;

/// 按预设结果应答的推理引擎
struct ScriptedEngine {
  inputs: Vec<TensorDetails>,
  outputs: Vec<TensorDetails>,
  quantized: bool,
  fail_infer: bool,
  results: Vec<Vec<f32>>,
  received: Option<InputTensor>,
  infer_calls: usize,
}

impl ScriptedEngine {
  fn ssd(shape: Vec<i64>, boxes: Vec<f32>, classes: Vec<f32>, scores: Vec<f32>, num: f32) -> Self {
    Self {
      inputs: vec![TensorDetails::new(7, shape)],
      outputs: (0..4).map(|i| TensorDetails::new(10 + i, Vec::new())).collect(),
      quantized: true,
      fail_infer: false,
      results: vec![boxes, classes, scores, vec![num]],
      received: None,
      infer_calls: 0,
    }
  }

  fn empty(shape: Vec<i64>) -> Self {
    Self::ssd(shape, Vec::new(), Vec::new(), Vec::new(), 0.0)
  }
}

impl InferenceEngine for ScriptedEngine {
  type Error = ScriptedError;

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
    assert_eq!(index, 7);
    self.received = Some(data);
    Ok(())
  }

  fn infer(&mut self) -> Result<(), Self::Error> {
    self.infer_calls += 1;
    if self.fail_infer {
      return Err(ScriptedError);
    }
    Ok(())
  }

  fn get_tensor(&self, index: usize) -> Result<Vec<f32>, Self::Error> {
    index
      .checked_sub(10)
      .and_then(|i| self.results.get(i))
      .cloned()
      .ok_or(ScriptedError)
  }
}

fn label_file() -> tempfile::NamedTempFile {
  let mut file = tempfile::NamedTempFile::new().unwrap();
  writeln!(file, "0 background").unwrap();
  writeln!(file, "1   person").unwrap();
  writeln!(file, "2 car").unwrap();
  file
}

fn photo(width: u32, height: u32) -> RgbImage {
  RgbImage::from_pixel(width, height, Rgb([200, 100, 50]))
}

fn detector(engine: ScriptedEngine) -> SsdDetector<ScriptedEngine> {
  let labels = LabelMap::parse("0 background\n1 person\n2 car").unwrap();
  SsdDetector::with_label_map(engine, labels, &DetectorConfig::new("labels.txt"))
}

#[test]
fn end_to_end_landscape_photo() {
  let labels = label_file();
  let engine = ScriptedEngine::ssd(
    vec![1, 300, 300, 3],
    vec![0.1, 0.2, 0.4, 0.6, 0.0, 0.0, 0.0, 0.0],
    vec![1.0, 2.0],
    vec![0.9, 0.1],
    2.0,
  );
  let mut detector = DetectorConfig::new(labels.path()).build(engine).unwrap();

  let image = photo(600, 400);
  let detected = detector.detect(&image).unwrap();

  assert_eq!(detected.thumbnail.dimensions(), (300, 200));
  assert_eq!(detected.padded.dimensions(), (300, 300));
  assert_eq!(*detected.padded.get_pixel(150, 250), Rgb([0, 0, 0]));
  assert_eq!(*detected.padded.get_pixel(150, 100), Rgb([200, 100, 50]));
  assert_eq!(image.dimensions(), (600, 400));

  assert_eq!(detected.result.len(), 1);
  let person = &detected.result.items[0];
  assert_eq!(person.label, "person");
  assert_relative_eq!(person.confidence, 0.9);
  let [x0, y0, x1, y1] = person.bbox;
  assert_relative_eq!(x0, 0.2, epsilon = 1e-5);
  assert_relative_eq!(y0, 0.15, epsilon = 1e-5);
  assert_relative_eq!(x1, 0.6, epsilon = 1e-5);
  assert_relative_eq!(y1, 0.6, epsilon = 1e-5);

  match detector.engine().received.as_ref() {
    Some(InputTensor::UInt8 { shape, data }) => {
      assert_eq!(*shape, [1, 300, 300, 3]);
      assert_eq!(data.len(), 300 * 300 * 3);
      assert_eq!(&data[..3], &[200, 100, 50]);
      assert_eq!(data[data.len() - 1], 0);
    }
    other => panic!("unexpected input tensor: {:?}", other.map(InputTensor::shape)),
  }
}

#[test]
fn portrait_photo_pads_on_the_right() {
  let engine = ScriptedEngine::ssd(
    vec![1, 300, 300, 3],
    vec![0.0, 0.0, 1.0, 0.5],
    vec![2.0],
    vec![0.8],
    1.0,
  );
  let mut detector = detector(engine);
  let detected = detector.detect(&photo(200, 400)).unwrap();

  assert_eq!(detected.thumbnail.dimensions(), (150, 300));
  assert_eq!(*detected.padded.get_pixel(299, 0), Rgb([0, 0, 0]));

  let car = &detected.result.items[0];
  assert_eq!(car.label, "car");
  assert_relative_eq!(car.bbox[2], 1.0);
  assert_relative_eq!(car.bbox[3], 1.0);
}

#[test]
fn float_model_receives_normalized_input() {
  let mut engine = ScriptedEngine::empty(vec![1, 4, 4, 3]);
  engine.quantized = false;
  let mut detector = detector(engine);

  let detected = detector.detect(&RgbImage::from_pixel(4, 2, Rgb([255, 255, 255]))).unwrap();
  assert!(detected.result.is_empty());

  match detector.engine().received.as_ref() {
    Some(InputTensor::Float32 { shape, data }) => {
      assert_eq!(*shape, [1, 4, 4, 3]);
      assert_relative_eq!(data[0], 1.0);
      assert_relative_eq!(data[data.len() - 1], -1.0);
    }
    other => panic!("unexpected input tensor: {:?}", other.map(InputTensor::shape)),
  }
}

#[test]
fn ranking_filters_threshold_labels_and_top_k() {
  let engine = ScriptedEngine::ssd(
    vec![1, 300, 300, 3],
    vec![0.0; 24],
    vec![9.0, 1.0, 2.0, 1.0, 2.0, 1.0],
    vec![0.99, 0.95, 0.6, 0.59, 0.97, 0.98],
    5.0,
  );
  let mut detector = detector(engine);
  let detected = detector.detect(&photo(300, 300)).unwrap();

  // 前三名为 0.99（类别编号越界）、0.97、0.95；第 6 个条目超出检测数量
  let got: Vec<(&str, f32)> = detected
    .result
    .iter()
    .map(|d| (d.label.as_str(), d.confidence))
    .collect();
  assert_eq!(got, vec![("car", 0.97), ("person", 0.95)]);
}

#[test]
fn threshold_and_top_k_come_from_config() {
  let engine = ScriptedEngine::ssd(
    vec![1, 300, 300, 3],
    vec![0.0; 16],
    vec![1.0, 1.0, 2.0, 2.0],
    vec![0.3, 0.5, 0.4, 0.7],
    4.0,
  );
  let labels = LabelMap::parse("0 background\n1 person\n2 car").unwrap();
  let config = DetectorConfig::new("labels.txt")
    .confidence_threshold(0.4)
    .top_k(10);
  let mut detector = SsdDetector::with_label_map(engine, labels, &config);

  let detected = detector.detect(&photo(300, 300)).unwrap();
  let confidences: Vec<f32> = detected.result.iter().map(|d| d.confidence).collect();
  assert_eq!(confidences, vec![0.7, 0.5, 0.4]);
}

#[test]
fn engine_failure_is_reported() {
  let mut engine = ScriptedEngine::empty(vec![1, 300, 300, 3]);
  engine.fail_infer = true;
  let mut detector = detector(engine);

  let err = detector.detect(&photo(10, 10)).unwrap_err();
  assert!(matches!(err, DetectorError::Engine(_)));
  assert_eq!(detector.engine().infer_calls, 1);
}

#[test]
fn malformed_input_shape_is_rejected() {
  let mut detector = detector(ScriptedEngine::empty(vec![300, 300]));
  let err = detector.detect(&photo(10, 10)).unwrap_err();
  assert!(matches!(err, DetectorError::InvalidInputShape(shape) if shape == vec![300, 300]));
}

#[test]
fn negative_dimension_is_a_geometry_error() {
  let mut detector = detector(ScriptedEngine::empty(vec![1, 300, -1, 3]));
  match detector.detect(&photo(10, 10)).unwrap_err() {
    DetectorError::Geometry(e) => {
      assert_eq!(e.dimension, "width");
      assert_eq!(e.value, "-1");
      assert_eq!(e.width_type, "i64");
    }
    other => panic!("unexpected error: {}", other),
  }
}

#[test]
fn missing_output_tensor_is_reported() {
  let mut engine = ScriptedEngine::empty(vec![1, 300, 300, 3]);
  engine.outputs.truncate(3);
  let mut detector = detector(engine);

  let err = detector.detect(&photo(10, 10)).unwrap_err();
  assert!(matches!(err, DetectorError::MissingTensor(_)));
}

#[test]
fn empty_image_is_rejected() {
  let mut detector = detector(ScriptedEngine::empty(vec![1, 300, 300, 3]));
  let err = detector.detect(&RgbImage::new(0, 0)).unwrap_err();
  assert!(matches!(err, DetectorError::EmptyImage));
  assert_eq!(detector.engine().infer_calls, 0);
}

#[test]
fn config_requires_label_file() {
  let engine = ScriptedEngine::empty(vec![1, 300, 300, 3]);
  assert!(matches!(
    DetectorConfig::new("").build(engine),
    Err(DetectorError::MissingLabels)
  ));

  let dir = tempfile::tempdir().unwrap();
  let engine = ScriptedEngine::empty(vec![1, 300, 300, 3]);
  assert!(matches!(
    DetectorConfig::new(dir.path().join("missing.txt")).build(engine),
    Err(DetectorError::Label(LabelError::Io(_)))
  ));
}

#[test]
fn malformed_label_file_fails_construction() {
  let mut file = tempfile::NamedTempFile::new().unwrap();
  writeln!(file, "0 background").unwrap();
  writeln!(file, "person").unwrap();

  let engine = ScriptedEngine::empty(vec![1, 300, 300, 3]);
  let err = DetectorConfig::new(file.path()).build(engine).err().unwrap();
  assert!(matches!(
    err,
    DetectorError::Label(LabelError::Format { line: 2, .. })
  ));
}

#[test]
fn repeated_calls_through_model_trait() {
  let engine = ScriptedEngine::ssd(
    vec![1, 300, 300, 3],
    vec![0.1, 0.1, 0.2, 0.2],
    vec![1.0],
    vec![0.75],
    1.0,
  );
  let mut detector = detector(engine);
  let image = photo(640, 480);

  for _ in 0..3 {
    let detected = detector.infer(&image).unwrap();
    assert_eq!(detected.result.len(), 1);
    assert!(detected.timing.fps > 0.0);
  }
  assert_eq!(detector.engine().infer_calls, 3);
}
