// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/rank.rs - 检测框回投影与排序
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

use tracing::debug;

use crate::model::{Detection, LabelMap};

/// 缩略图在输入张量中所占的比例
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactors {
  pub width: f32,
  pub height: f32,
}

impl ScaleFactors {
  pub fn new(thumbnail: (u32, u32), tensor: (u32, u32)) -> Self {
    Self {
      width: thumbnail.0 as f32 / tensor.0 as f32,
      height: thumbnail.1 as f32 / tensor.1 as f32,
    }
  }

  /// 把张量空间的 `[ymin, xmin, ymax, xmax]` 转为缩略图空间的 `[x0, y0, x1, y1]`，
  /// 结果限制在 `[0, 1]` 内
  pub fn back_project(&self, raw: [f32; 4]) -> [f32; 4] {
    let [ymin, xmin, ymax, xmax] = raw;
    [
      (xmin / self.width).clamp(0.0, 1.0),
      (ymin / self.height).clamp(0.0, 1.0),
      (xmax / self.width).clamp(0.0, 1.0),
      (ymax / self.height).clamp(0.0, 1.0),
    ]
  }
}

/// 推理引擎输出的原始检测数据（批次 0）
///
/// 只有前 `count` 个条目有效。
#[derive(Debug, Clone, Copy)]
pub struct RawDetections<'a> {
  pub boxes: &'a [f32],
  pub classes: &'a [f32],
  pub scores: &'a [f32],
  pub count: usize,
}

impl RawDetections<'_> {
  fn valid_scores(&self) -> &[f32] {
    &self.scores[..self.count.min(self.scores.len())]
  }

  fn raw_box(&self, index: usize) -> Option<[f32; 4]> {
    let chunk = self.boxes.get(index * 4..index * 4 + 4)?;
    Some([chunk[0], chunk[1], chunk[2], chunk[3]])
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankOptions {
  pub top_k: usize,
  pub confidence_threshold: f32,
}

/// 取置信度最高的 `top_k` 个候选，过滤低于阈值或类别编号无效的候选，
/// 再把检测框回投影到原图坐标
///
/// 置信度相同的候选中，原始下标较大者排在前面。
pub fn rank(
  raw: &RawDetections<'_>,
  labels: &LabelMap,
  factors: ScaleFactors,
  options: RankOptions,
) -> Vec<Detection> {
  let scores = raw.valid_scores();
  let mut order: Vec<usize> = (0..scores.len()).collect();
  order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

  order
    .into_iter()
    .rev()
    .take(options.top_k)
    .filter(|&i| scores[i] >= options.confidence_threshold)
    .filter_map(|i| {
      let label = raw.classes.get(i).and_then(|&code| labels.resolve(code))?;
      Some((i, label, raw.raw_box(i)?))
    })
    .map(|(i, label, raw_box)| {
      let bbox = factors.back_project(raw_box);
      debug!(
        "检测框回投影 (x0, y0, x1, y1): {:?} -> {:?}",
        [raw_box[1], raw_box[0], raw_box[3], raw_box[2]],
        bbox
      );
      Detection {
        label: label.to_string(),
        confidence: scores[i],
        bbox,
      }
    })
    .collect()
}
