// 该文件是 Shanan （山南西风） 项目的一部分。
// src/metrics.rs - 单张图像的指标计算
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
use tracing::debug;

use crate::colormap::ColormapKind;
use crate::mask::{Extent, LabelMask, LabelVocabulary};
use crate::output::{PredictionWriter, SaveImageFileError};

mod channel;
mod record;
mod region;

pub use self::channel::channel_statistics;
pub use self::record::{
  CHANNEL_NAMES, ChannelStatistics, ClassCount, FieldValue, MetricRecord, NOT_AVAILABLE,
  REGION_FIELDS, RecordSchema, RegionMetrics, RegionProperties,
};
pub use self::region::region_properties;

/// 可选指标组的开关
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricOptions {
  pub with_colormap: bool,
  pub with_region_properties: bool,
  pub with_channel_statistics: bool,
  pub with_saved_prediction: bool,
  pub colormap_kind: ColormapKind,
}

impl Default for MetricOptions {
  fn default() -> Self {
    Self {
      with_colormap: true,
      with_region_properties: true,
      with_channel_statistics: true,
      with_saved_prediction: true,
      colormap_kind: ColormapKind::Pascal,
    }
  }
}

#[derive(Error, Debug)]
pub enum MetricsError {
  #[error("掩码中出现无效类别 {value}（共 {classes} 类）")]
  InvalidLabel { value: u8, classes: usize },
  #[error("图像尺寸 {image} 与掩码尺寸 {mask} 不一致")]
  ShapeMismatch { image: Extent, mask: Extent },
  #[error("保存预测图像失败: {0}")]
  SavePrediction(#[from] SaveImageFileError),
}

/// 统计词表中每个类别的像素数。各类别计数之和恒等于像素总数
pub fn count_pixels(
  mask: &LabelMask,
  labels: &LabelVocabulary,
) -> Result<Vec<ClassCount>, MetricsError> {
  let mut counts = vec![0u64; labels.len()];
  for &value in mask.iter() {
    match counts.get_mut(value as usize) {
      Some(count) => *count += 1,
      None => {
        return Err(MetricsError::InvalidLabel {
          value,
          classes: labels.len(),
        });
      }
    }
  }

  Ok(
    labels
      .names()
      .iter()
      .zip(counts)
      .map(|(label, pixels)| ClassCount {
        label: label.clone(),
        pixels,
      })
      .collect(),
  )
}

pub struct MetricsAggregator {
  labels: LabelVocabulary,
  options: MetricOptions,
  writer: Option<PredictionWriter>,
}

impl MetricsAggregator {
  pub fn new(labels: LabelVocabulary, options: MetricOptions) -> Self {
    Self {
      labels,
      options,
      writer: None,
    }
  }

  /// 启用 `with_saved_prediction` 时需要提供预测图像的写出位置
  pub fn with_writer(mut self, writer: PredictionWriter) -> Self {
    self.writer = Some(writer);
    self
  }

  pub fn options(&self) -> &MetricOptions {
    &self.options
  }

  pub fn labels(&self) -> &LabelVocabulary {
    &self.labels
  }

  pub fn schema(&self) -> RecordSchema {
    RecordSchema::for_options(&self.labels, &self.options)
  }

  /// 纯计算，不产生任何磁盘写入
  pub fn compute(
    &self,
    mask: &LabelMask,
    image: &RgbImage,
    name: &str,
  ) -> Result<MetricRecord, MetricsError> {
    let class_counts = count_pixels(mask, &self.labels)?;

    let channels = if self.options.with_channel_statistics {
      let (width, height) = image.dimensions();
      let image_extent = Extent::new(height as usize, width as usize);
      if image_extent != Extent::of(mask) {
        return Err(MetricsError::ShapeMismatch {
          image: image_extent,
          mask: Extent::of(mask),
        });
      }
      Some(channel_statistics(image, mask))
    } else {
      None
    };

    let region = self
      .options
      .with_region_properties
      .then(|| region_properties(mask));
    if let Some(RegionMetrics::Ambiguous { components }) = &region {
      debug!("{}: 前景连通区域数量为 {}，形状指标记为 NA", name, components);
    }

    Ok(MetricRecord {
      file: format!("{}.png", name),
      total_pixels: mask.len() as u64,
      class_counts,
      channels,
      region,
    })
  }

  /// 计算指标，并按配置保存预测图像
  pub fn aggregate(
    &self,
    mask: &LabelMask,
    image: &RgbImage,
    name: &str,
  ) -> Result<MetricRecord, MetricsError> {
    let record = self.compute(mask, image, name)?;
    if self.options.with_saved_prediction
      && let Some(writer) = &self.writer
    {
      writer.save(name, mask)?;
    }
    Ok(record)
  }
}
