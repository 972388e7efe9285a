// 该文件是 Shanan （山南西风） 项目的一部分。
// src/batch.rs - 批次预测的拆分与还原
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
use ndarray::{Array3, Axis, s};
use thiserror::Error;
use tracing::debug;

use crate::dataset::Batch;
use crate::mask::{Extent, LabelMask};
use crate::rectify::{GeometryRectifier, RectifyError};

#[derive(Error, Debug)]
pub enum BatchError {
  #[error("批内有 {images} 张图像，但预测结果有 {predictions} 张")]
  CountMismatch { images: usize, predictions: usize },
  #[error("图像 {name} 尺寸 {image} 与还原后的掩码尺寸 {mask} 不一致")]
  ShapeMismatch {
    name: String,
    image: Extent,
    mask: Extent,
  },
  #[error("还原预测失败: {0}")]
  Rectify(#[from] RectifyError),
}

/// 单张图像的还原结果：原图分辨率的类别掩码、原图与显示名
#[derive(Debug)]
pub struct ProcessedImage<'a> {
  pub mask: LabelMask,
  pub image: &'a RgbImage,
  pub name: &'a str,
}

/// 按批内顺序把 `[N, H, W]` 预测拆为单张掩码。
///
/// `resize_back` 打开时先裁去补边再最近邻缩放回原图尺寸，此路径只支持批大小 1；
/// 关闭时只裁剪到原图尺寸。
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchProcessor {
  rectifier: GeometryRectifier,
  resize_back: bool,
}

impl BatchProcessor {
  pub fn new(resize_back: bool) -> Self {
    Self {
      rectifier: GeometryRectifier,
      resize_back,
    }
  }

  pub fn resize_back(&self) -> bool {
    self.resize_back
  }

  pub fn process<'a>(
    &self,
    batch: &'a Batch,
    predictions: &Array3<u8>,
  ) -> Result<Vec<ProcessedImage<'a>>, BatchError> {
    let count = predictions.len_of(Axis(0));
    if count != batch.len() {
      return Err(BatchError::CountMismatch {
        images: batch.len(),
        predictions: count,
      });
    }
    if self.resize_back {
      GeometryRectifier::ensure_batch_size(batch.len())?;
    }

    let mut processed = Vec::with_capacity(batch.len());
    for (index, sample) in batch.iter().enumerate() {
      let prediction = predictions.index_axis(Axis(0), index);
      let mask = if self.resize_back {
        self
          .rectifier
          .rectify(prediction, sample.resized, sample.original)?
      } else {
        crate::rectify::crop_top_left(prediction, sample.resized)?.to_owned()
      };

      // 上游补边若有残留，这里再裁一次
      let (height, width) = (sample.height(), sample.width());
      let mask_extent = Extent::of(&mask);
      if !mask_extent.contains(sample.original) {
        return Err(BatchError::ShapeMismatch {
          name: sample.name.clone(),
          image: sample.original,
          mask: mask_extent,
        });
      }
      let mask = if mask_extent == sample.original {
        mask
      } else {
        mask.slice(s![..height, ..width]).to_owned()
      };

      let (image_width, image_height) = sample.image.dimensions();
      let image_extent = Extent::new(image_height as usize, image_width as usize);
      if image_extent != sample.original {
        return Err(BatchError::ShapeMismatch {
          name: sample.name.clone(),
          image: image_extent,
          mask: Extent::of(&mask),
        });
      }

      debug!("图像 {} 还原为 {}", sample.name, sample.original);
      processed.push(ProcessedImage {
        mask,
        image: &sample.image,
        name: &sample.name,
      });
    }
    Ok(processed)
  }
}
