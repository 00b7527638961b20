// 该文件是 Beifeng （北风） 项目的一部分。
// src/model.rs - 模型
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

use serde_json::{Value, json};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 单个检测结果，bbox 为原图归一化坐标
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  pub label: String,
  pub confidence: f32,
  pub bbox: [f32; 4], // [x0, y0, x1, y1]
}

impl Detection {
  pub fn to_json(&self) -> Value {
    let [xmin, ymin, xmax, ymax] = self.bbox;
    json!({
      "category": self.label,
      "confidence": self.confidence,
      "box": {
        "xmin": xmin,
        "ymin": ymin,
        "xmax": xmax,
        "ymax": ymax,
      }
    })
  }
}

/// 按置信度降序排列的检测结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[Detection]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
    self.items.iter()
  }

  pub fn to_json(&self) -> Value {
    Value::Array(self.items.iter().map(Detection::to_json).collect())
  }
}

impl From<Vec<Detection>> for DetectResult {
  fn from(items: Vec<Detection>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

mod label;
mod rank;
mod ssd;
mod stats;

pub use self::label::{LabelError, LabelMap};
pub use self::rank::{RankOptions, RawDetections, ScaleFactors, rank};
pub use self::ssd::{
  DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_TOP_K, Detected, DetectorConfig, DetectorError,
  SsdDetector,
};
pub use self::stats::{CallTiming, InferenceStats};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn detection_json_matches_record_layout() {
    let detection = Detection {
      label: "person".to_string(),
      confidence: 0.5,
      bbox: [0.25, 0.0, 0.75, 1.0],
    };

    assert_eq!(
      detection.to_json(),
      json!({
        "category": "person",
        "confidence": 0.5,
        "box": {"xmin": 0.25, "ymin": 0.0, "xmax": 0.75, "ymax": 1.0}
      })
    );
  }

  #[test]
  fn result_json_is_an_array() {
    let result = DetectResult::from(vec![
      Detection {
        label: "cat".to_string(),
        confidence: 0.75,
        bbox: [0.0; 4],
      },
      Detection {
        label: "dog".to_string(),
        confidence: 0.5,
        bbox: [0.0; 4],
      },
    ]);

    let value = result.to_json();
    assert_eq!(value.as_array().map(Vec::len), Some(2));
    assert_eq!(value[1]["category"], "dog");
    assert_eq!(result.len(), 2);
    assert!(DetectResult::default().is_empty());
  }
}
