// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/multi_scale.rs - 多尺度与翻转增强的预测融合
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

use ndarray::{Array3, Array4, ArrayView4, Axis, s};
use tracing::debug;

/// 多尺度、水平翻转的测试时增强。
///
/// 每个尺度（及其翻转）的 logits 先做 softmax，再以 align-corners 双线性插值
/// 缩放回输入分辨率，取平均后逐像素 argmax 得到单张类别图。
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleAugment {
  scales: Vec<f64>,
  flip: bool,
}

impl Default for ScaleAugment {
  fn default() -> Self {
    Self {
      scales: vec![1.0],
      flip: false,
    }
  }
}

impl ScaleAugment {
  pub fn new(scales: Vec<f64>, flip: bool) -> Self {
    Self { scales, flip }
  }

  pub fn scales(&self) -> &[f64] {
    &self.scales
  }

  pub fn flip(&self) -> bool {
    self.flip
  }

  pub fn is_single_scale(&self) -> bool {
    self.scales == [1.0] && !self.flip
  }

  /// `input` 为 `[N, C, H, W]`，`forward` 返回 `[N, classes, h, w]` 的 logits
  pub fn combine<E>(
    &self,
    input: ArrayView4<'_, f32>,
    mut forward: impl FnMut(Array4<f32>) -> Result<Array4<f32>, E>,
  ) -> Result<Array3<u8>, E> {
    let (_, _, height, width) = input.dim();

    if self.is_single_scale() {
      let logits = forward(input.to_owned())?;
      return Ok(argmax(resize_bilinear(logits.view(), height, width).view()));
    }

    let mut total: Option<Array4<f32>> = None;
    let mut accumulate = |logits: Array4<f32>| {
      let probabilities = resize_bilinear(softmax(logits).view(), height, width);
      match total.as_mut() {
        Some(sum) => *sum += &probabilities,
        None => total = Some(probabilities),
      }
    };

    for &scale in &self.scales {
      let scaled = if scale == 1.0 {
        input.to_owned()
      } else {
        resize_bilinear(
          input,
          scale_dimension(height, scale),
          scale_dimension(width, scale),
        )
      };
      debug!("尺度 {}: 输入 {:?}", scale, scaled.dim());

      if self.flip {
        let mut flipped = scaled.clone();
        flipped.invert_axis(Axis(3));
        let mut logits = forward(flipped)?;
        logits.invert_axis(Axis(3));
        accumulate(logits);
      }
      accumulate(forward(scaled)?);
    }

    Ok(match total {
      Some(sum) => argmax(sum.view()),
      None => Array3::zeros((input.dim().0, height, width)),
    })
  }
}

fn scale_dimension(dim: usize, scale: f64) -> usize {
  (((dim as f64 - 1.0) * scale + 1.0) as usize).max(1)
}

fn softmax(mut logits: Array4<f32>) -> Array4<f32> {
  for mut lane in logits.lanes_mut(Axis(1)) {
    let max = lane.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
    lane.mapv_inplace(|v| (v - max).exp());
    let sum = lane.sum();
    lane.mapv_inplace(|v| v / sum);
  }
  logits
}

fn align_corners(dst: usize, src_len: usize, dst_len: usize) -> (usize, usize, f32) {
  let position = if dst_len > 1 {
    dst as f32 * (src_len - 1) as f32 / (dst_len - 1) as f32
  } else {
    0.0
  };
  let lower = (position.floor() as usize).min(src_len - 1);
  let upper = (lower + 1).min(src_len - 1);
  (lower, upper, position - lower as f32)
}

fn resize_bilinear(x: ArrayView4<'_, f32>, height: usize, width: usize) -> Array4<f32> {
  let (n, c, in_height, in_width) = x.dim();
  if (in_height, in_width) == (height, width) {
    return x.to_owned();
  }
  let rows: Vec<_> = (0..height)
    .map(|y| align_corners(y, in_height, height))
    .collect();
  let cols: Vec<_> = (0..width)
    .map(|x| align_corners(x, in_width, width))
    .collect();

  Array4::from_shape_fn((n, c, height, width), |(b, k, y, x_)| {
    let (y0, y1, wy) = rows[y];
    let (x0, x1, wx) = cols[x_];
    let plane = x.slice(s![b, k, .., ..]);
    let top = plane[[y0, x0]] * (1.0 - wx) + plane[[y0, x1]] * wx;
    let bottom = plane[[y1, x0]] * (1.0 - wx) + plane[[y1, x1]] * wx;
    top * (1.0 - wy) + bottom * wy
  })
}

fn argmax(scores: ArrayView4<'_, f32>) -> Array3<u8> {
  let (n, _, height, width) = scores.dim();
  Array3::from_shape_fn((n, height, width), |(b, y, x)| {
    let lane = scores.slice(s![b, .., y, x]);
    let mut best = 0;
    for (class, &value) in lane.iter().enumerate() {
      if value > lane[best] {
        best = class;
      }
    }
    best as u8
  })
}
