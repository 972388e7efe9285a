// 该文件是 Shanan （山南西风） 项目的一部分。
// src/dataset.rs - 评估数据集
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
use thiserror::Error;

use crate::mask::Extent;

mod image_folder;
mod preprocess;

pub use self::image_folder::{ImageFolderBatches, ImageFolderDataset};
pub use self::preprocess::{PAD_VALUE, Preprocessor, ResizeRange};

#[derive(Error, Debug)]
pub enum DatasetError {
  #[error("读取 {path} 失败: {source}")]
  IoError {
    path: String,
    #[source]
    source: std::io::Error,
  },
  #[error("解码图像 {path} 失败: {source}")]
  ImageError {
    path: String,
    #[source]
    source: image::ImageError,
  },
  #[error("数据集划分 {0} 中没有图像")]
  EmptySplit(String),
  #[error("图像 {name} 缩放后尺寸 {size} 超过裁剪尺寸 {crop}")]
  TooLarge {
    name: String,
    size: Extent,
    crop: Extent,
  },
}

/// 单张图像及其预处理结果
#[derive(Debug, Clone)]
pub struct Sample {
  pub name: String,
  /// 原始图像
  pub image: RgbImage,
  /// 裁剪尺寸的模型输入（缩放 + 补边）
  pub input: RgbImage,
  pub original: Extent,
  /// 缩放后、补边前的有效区域
  pub resized: Extent,
}

impl Sample {
  pub fn height(&self) -> usize {
    self.original.height
  }

  pub fn width(&self) -> usize {
    self.original.width
  }
}

#[derive(Debug, Clone)]
pub struct Batch {
  pub samples: Vec<Sample>,
  pub crop: Extent,
}

impl Batch {
  pub fn len(&self) -> usize {
    self.samples.len()
  }

  pub fn is_empty(&self) -> bool {
    self.samples.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
    self.samples.iter()
  }
}

/// 数据集每次调用 `batches` 都从头产生一轮新的批次迭代
pub trait Dataset {
  type Error: std::error::Error + Send + Sync + 'static;
  type Batches: Iterator<Item = Result<Batch, Self::Error>>;

  fn batches(&self) -> Self::Batches;
}
