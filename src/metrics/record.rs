// 该文件是 Shanan （山南西风） 项目的一部分。
// src/metrics/record.rs - 单张图像的指标记录
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

use std::fmt;

use crate::mask::LabelVocabulary;
use crate::metrics::MetricOptions;

/// 未定义指标的占位值
pub const NOT_AVAILABLE: &str = "NA";

pub const CHANNEL_NAMES: [&str; 3] = ["red", "green", "blue"];

pub const REGION_FIELDS: [&str; 9] = [
  "filled_area",
  "convex_area",
  "equivalent_diameter",
  "major_axis_length",
  "minor_axis_length",
  "perimeter",
  "eccentricity",
  "extent",
  "solidity",
];

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
  Text(String),
  Count(u64),
  Real(f64),
  NotAvailable,
}

impl fmt::Display for FieldValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FieldValue::Text(text) => f.write_str(text),
      FieldValue::Count(count) => write!(f, "{}", count),
      FieldValue::Real(value) => write!(f, "{}", value),
      FieldValue::NotAvailable => f.write_str(NOT_AVAILABLE),
    }
  }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
  fn from(value: Option<T>) -> Self {
    value.map(Into::into).unwrap_or(FieldValue::NotAvailable)
  }
}

impl From<u64> for FieldValue {
  fn from(value: u64) -> Self {
    FieldValue::Count(value)
  }
}

impl From<u8> for FieldValue {
  fn from(value: u8) -> Self {
    FieldValue::Count(value as u64)
  }
}

impl From<f64> for FieldValue {
  fn from(value: f64) -> Self {
    FieldValue::Real(value)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassCount {
  pub label: String,
  pub pixels: u64,
}

/// 掩码前景内单个颜色通道的统计量
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelStatistics {
  pub sum: u64,
  /// 前景为空时无定义
  pub mean: Option<f64>,
  /// 前景为空时无定义
  pub median: Option<u8>,
}

/// 单一连通前景区域的形状描述
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionProperties {
  pub filled_area: u64,
  pub convex_area: u64,
  pub equivalent_diameter: f64,
  pub major_axis_length: f64,
  pub minor_axis_length: f64,
  pub perimeter: f64,
  pub eccentricity: f64,
  pub extent: f64,
  pub solidity: f64,
}

impl RegionProperties {
  fn values(&self) -> [FieldValue; 9] {
    [
      self.filled_area.into(),
      self.convex_area.into(),
      self.equivalent_diameter.into(),
      self.major_axis_length.into(),
      self.minor_axis_length.into(),
      self.perimeter.into(),
      self.eccentricity.into(),
      self.extent.into(),
      self.solidity.into(),
    ]
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegionMetrics {
  Single(RegionProperties),
  /// 连通区域数量不为 1，所有形状指标均记为 NA
  Ambiguous { components: usize },
}

impl RegionMetrics {
  pub fn properties(&self) -> Option<&RegionProperties> {
    match self {
      RegionMetrics::Single(properties) => Some(properties),
      RegionMetrics::Ambiguous { .. } => None,
    }
  }
}

/// 结果文件的列名序列。同一文件的所有记录必须共享同一个 schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
  columns: Vec<String>,
}

impl RecordSchema {
  pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
    Self {
      columns: columns.into_iter().map(Into::into).collect(),
    }
  }

  /// 仅包含像素计数的汇总 schema
  pub fn summary(labels: &LabelVocabulary) -> Self {
    let mut columns = vec!["file".to_string(), "total_pixels".to_string()];
    columns.extend(labels.names().iter().cloned());
    Self { columns }
  }

  /// 由启用的指标组决定的完整 schema
  pub fn for_options(labels: &LabelVocabulary, options: &MetricOptions) -> Self {
    let mut schema = Self::summary(labels);
    if options.with_channel_statistics {
      schema.columns.extend(channel_columns());
    }
    if options.with_region_properties {
      schema
        .columns
        .extend(REGION_FIELDS.iter().map(|s| s.to_string()));
    }
    schema
  }

  pub fn columns(&self) -> &[String] {
    &self.columns
  }

  pub fn len(&self) -> usize {
    self.columns.len()
  }

  pub fn is_empty(&self) -> bool {
    self.columns.is_empty()
  }
}

impl fmt::Display for RecordSchema {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[{}]", self.columns.join(", "))
  }
}

fn channel_columns() -> impl Iterator<Item = String> {
  CHANNEL_NAMES.iter().flat_map(|band| {
    [
      format!("{}_sum_within_mask", band),
      format!("{}_mean_within_mask", band),
      format!("{}_median_within_mask", band),
    ]
  })
}

/// 单张图像的指标记录。可选字段与指标组开关一一对应
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
  pub file: String,
  pub total_pixels: u64,
  pub class_counts: Vec<ClassCount>,
  pub channels: Option<[ChannelStatistics; 3]>,
  pub region: Option<RegionMetrics>,
}

impl MetricRecord {
  pub fn schema(&self) -> RecordSchema {
    let mut columns = vec!["file".to_string(), "total_pixels".to_string()];
    columns.extend(self.class_counts.iter().map(|c| c.label.clone()));
    if self.channels.is_some() {
      columns.extend(channel_columns());
    }
    if self.region.is_some() {
      columns.extend(REGION_FIELDS.iter().map(|s| s.to_string()));
    }
    RecordSchema { columns }
  }

  /// 与 `schema()` 顺序一致的字段值
  pub fn values(&self) -> Vec<FieldValue> {
    let mut values = vec![
      FieldValue::Text(self.file.clone()),
      FieldValue::Count(self.total_pixels),
    ];
    values.extend(self.class_counts.iter().map(|c| FieldValue::Count(c.pixels)));

    if let Some(channels) = &self.channels {
      for stats in channels {
        values.push(stats.sum.into());
        values.push(stats.mean.into());
        values.push(stats.median.into());
      }
    }

    match &self.region {
      Some(RegionMetrics::Single(properties)) => values.extend(properties.values()),
      Some(RegionMetrics::Ambiguous { .. }) => {
        values.extend(std::iter::repeat_n(FieldValue::NotAvailable, REGION_FIELDS.len()))
      }
      None => {}
    }

    values
  }

  pub fn get(&self, column: &str) -> Option<FieldValue> {
    self
      .schema()
      .columns()
      .iter()
      .position(|c| c == column)
      .map(|i| self.values().swap_remove(i))
  }

  /// 只保留像素计数部分
  pub fn summary(&self) -> MetricRecord {
    MetricRecord {
      file: self.file.clone(),
      total_pixels: self.total_pixels,
      class_counts: self.class_counts.clone(),
      channels: None,
      region: None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn record() -> MetricRecord {
    MetricRecord {
      file: "a.png".to_string(),
      total_pixels: 16,
      class_counts: vec![
        ClassCount {
          label: "background".to_string(),
          pixels: 12,
        },
        ClassCount {
          label: "rosette".to_string(),
          pixels: 4,
        },
      ],
      channels: Some(
        [ChannelStatistics {
          sum: 0,
          mean: None,
          median: None,
        }; 3],
      ),
      region: Some(RegionMetrics::Ambiguous { components: 0 }),
    }
  }

  #[test]
  fn schema_matches_options() {
    let labels = LabelVocabulary::default();
    let options = MetricOptions::default();
    assert_eq!(record().schema(), RecordSchema::for_options(&labels, &options));
    assert_eq!(record().summary().schema(), RecordSchema::summary(&labels));
    assert_eq!(record().schema().len(), record().values().len());
  }

  #[test]
  fn undefined_values_render_as_na() {
    let record = record();
    assert_eq!(record.get("red_mean_within_mask"), Some(FieldValue::NotAvailable));
    assert_eq!(record.get("red_sum_within_mask"), Some(FieldValue::Count(0)));
    assert_eq!(record.get("solidity").unwrap().to_string(), "NA");
    assert_eq!(record.get("rosette"), Some(FieldValue::Count(4)));
    assert_eq!(record.get("missing"), None);
  }

  #[test]
  fn column_order_follows_groups() {
    let schema = record().schema();
    let columns = schema.columns();
    assert_eq!(&columns[..4], ["file", "total_pixels", "background", "rosette"]);
    assert_eq!(columns[4], "red_sum_within_mask");
    assert_eq!(columns[12], "blue_median_within_mask");
    assert_eq!(columns[13], "filled_area");
    assert_eq!(columns.last().map(String::as_str), Some("solidity"));
  }
}
