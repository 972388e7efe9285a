// 该文件是 Shanan （山南西风） 项目的一部分。
// src/metrics/channel.rs - 掩码内的颜色通道统计
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

use image::RgbImage;

use crate::mask::{BACKGROUND, LabelMask};
use crate::metrics::record::ChannelStatistics;

struct Histogram {
  bins: [u64; 256],
  count: u64,
}

impl Histogram {
  fn new() -> Self {
    Self {
      bins: [0; 256],
      count: 0,
    }
  }

  fn push(&mut self, value: u8) {
    self.bins[value as usize] += 1;
    self.count += 1;
  }

  fn sum(&self) -> u64 {
    self
      .bins
      .iter()
      .enumerate()
      .map(|(value, n)| value as u64 * n)
      .sum()
  }

  // 累计计数首次超过 count / 2 的取值
  fn median(&self) -> Option<u8> {
    let half = self.count / 2;
    let mut seen = 0;
    for (value, n) in self.bins.iter().enumerate() {
      seen += n;
      if seen > half {
        return Some(value as u8);
      }
    }
    None
  }

  fn statistics(&self) -> ChannelStatistics {
    let sum = self.sum();
    ChannelStatistics {
      sum,
      mean: (self.count > 0).then(|| sum as f64 / self.count as f64),
      median: self.median(),
    }
  }
}

/// 统计前景（非背景类别）像素在 R、G、B 三个通道上的和、均值与中位数。
/// 调用方保证 `image` 与 `mask` 尺寸一致。
pub fn channel_statistics(image: &RgbImage, mask: &LabelMask) -> [ChannelStatistics; 3] {
  let mut histograms = [Histogram::new(), Histogram::new(), Histogram::new()];
  for ((y, x), &class) in mask.indexed_iter() {
    if class == BACKGROUND {
      continue;
    }
    let pixel = image.get_pixel(x as u32, y as u32);
    for (histogram, &value) in histograms.iter_mut().zip(pixel.0.iter()) {
      histogram.push(value);
    }
  }
  histograms.map(|h| h.statistics())
}
