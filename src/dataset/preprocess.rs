// 该文件是 Shanan （山南西风） 项目的一部分。
// src/dataset/preprocess.rs - 评估前的缩放与补边
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

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use crate::dataset::{DatasetError, Sample};
use crate::mask::Extent;

/// 补边使用的均值像素，归一化到 `[-1, 1]` 后约为 0
pub const PAD_VALUE: u8 = 128;

/// 按范围缩放：短边放大到 `min`，若此时长边超过 `max`，则改为长边等于 `max`。
/// 设置 `factor` 时各边向上取整为 `k * factor + 1`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeRange {
  pub min: u32,
  pub max: u32,
  pub factor: Option<u32>,
}

impl ResizeRange {
  pub fn target(&self, original: Extent) -> Extent {
    let (height, width) = (original.height as f64, original.width as f64);
    let max_size = match self.factor {
      Some(factor) if factor > 0 => {
        let factor = factor as i64;
        let max = self.max as i64;
        (max + (factor - (max - 1) % factor) % factor - factor) as f64
      }
      _ => self.max as f64,
    };

    let large_scale = self.min as f64 / height.min(width);
    let large = (
      (height * large_scale).floor(),
      (width * large_scale).floor(),
    );
    let (mut new_height, mut new_width) = if large.0.max(large.1) > max_size {
      let small_scale = max_size / height.max(width);
      ((height * small_scale).floor(), (width * small_scale).floor())
    } else {
      large
    };

    if let Some(factor) = self.factor
      && factor > 0
    {
      let factor = factor as f64;
      new_height += (factor - (new_height - 1.0).rem_euclid(factor)).rem_euclid(factor);
      new_width += (factor - (new_width - 1.0).rem_euclid(factor)).rem_euclid(factor);
    }

    Extent::new((new_height as usize).max(1), (new_width as usize).max(1))
  }
}

/// 把原图变为固定裁剪尺寸的模型输入：可选的范围缩放，然后在下方和右方补边
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
  crop: Extent,
  resize: Option<ResizeRange>,
}

impl Preprocessor {
  pub fn new(crop: Extent, resize: Option<ResizeRange>) -> Self {
    Self { crop, resize }
  }

  pub fn crop(&self) -> Extent {
    self.crop
  }

  pub fn resize(&self) -> Option<ResizeRange> {
    self.resize
  }

  pub fn prepare(&self, name: impl Into<String>, image: RgbImage) -> Result<Sample, DatasetError> {
    let name = name.into();
    let (width, height) = image.dimensions();
    let original = Extent::new(height as usize, width as usize);
    let resized = match self.resize {
      Some(range) => range.target(original),
      None => original,
    };

    if !self.crop.contains(resized) {
      return Err(DatasetError::TooLarge {
        name,
        size: resized,
        crop: self.crop,
      });
    }

    let scaled = if resized == original {
      None
    } else {
      Some(imageops::resize(
        &image,
        resized.width as u32,
        resized.height as u32,
        FilterType::Triangle,
      ))
    };

    let mut input = RgbImage::from_pixel(
      self.crop.width as u32,
      self.crop.height as u32,
      Rgb([PAD_VALUE; 3]),
    );
    imageops::replace(&mut input, scaled.as_ref().unwrap_or(&image), 0, 0);

    Ok(Sample {
      name,
      image,
      input,
      original,
      resized,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn short_side_reaches_min() {
    let range = ResizeRange {
      min: 100,
      max: 400,
      factor: None,
    };
    assert_eq!(range.target(Extent::new(50, 80)), Extent::new(100, 160));
  }

  #[test]
  fn long_side_capped_by_max() {
    let range = ResizeRange {
      min: 100,
      max: 150,
      factor: None,
    };
    assert_eq!(range.target(Extent::new(50, 100)), Extent::new(75, 150));
  }

  #[test]
  fn factor_rounds_up_to_multiple_plus_one() {
    let range = ResizeRange {
      min: 513,
      max: 513,
      factor: Some(16),
    };
    let target = range.target(Extent::new(300, 400));
    assert_eq!(target, Extent::new(385, 497));
    assert_eq!((target.height - 1) % 16, 0);
    assert_eq!((target.width - 1) % 16, 0);
  }

  #[test]
  fn input_is_padded_bottom_right() {
    let preprocessor = Preprocessor::new(Extent::new(4, 5), None);
    let image = RgbImage::from_pixel(3, 2, Rgb([7, 8, 9]));
    let sample = preprocessor.prepare("leaf", image).unwrap();

    assert_eq!(sample.original, Extent::new(2, 3));
    assert_eq!(sample.resized, Extent::new(2, 3));
    assert_eq!(sample.input.dimensions(), (5, 4));
    assert_eq!(sample.input.get_pixel(2, 1).0, [7, 8, 9]);
    assert_eq!(sample.input.get_pixel(3, 1).0, [PAD_VALUE; 3]);
    assert_eq!(sample.input.get_pixel(0, 2).0, [PAD_VALUE; 3]);
  }

  #[test]
  fn resized_image_fits_crop() {
    let range = ResizeRange {
      min: 8,
      max: 8,
      factor: None,
    };
    let preprocessor = Preprocessor::new(Extent::new(8, 8), Some(range));
    let sample = preprocessor
      .prepare("big", RgbImage::new(20, 10))
      .unwrap();
    assert_eq!(sample.original, Extent::new(10, 20));
    assert_eq!(sample.resized, Extent::new(4, 8));
    assert_eq!(sample.image.dimensions(), (20, 10));
  }

  #[test]
  fn oversized_image_is_rejected() {
    let preprocessor = Preprocessor::new(Extent::new(4, 4), None);
    let err = preprocessor.prepare("huge", RgbImage::new(5, 3)).unwrap_err();
    assert!(matches!(err, DatasetError::TooLarge { .. }));
  }
}
