// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output.rs - 输出定义
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

use std::path::Path;

use tracing::info;

use crate::mask::LabelVocabulary;
use crate::metrics::{MetricOptions, MetricRecord, RecordSchema};

mod result_sink;
mod save_image_file;

pub use self::result_sink::{ResultSink, SinkError};
pub use self::save_image_file::{PredictionWriter, SaveImageFileError};

/// 像素计数汇总文件
pub const SUMMARY_FILE_NAME: &str = "pixel_counts.csv";
/// 完整指标文件
pub const METRICS_FILE_NAME: &str = "pixel_counts.tsv";

pub trait RecordSink {
  type Error;
  fn append(&mut self, record: &MetricRecord) -> Result<(), Self::Error>;
}

/// 两个结果文件：像素计数汇总与完整指标，每个文件各自持有一个 sink
pub struct ResultOutputs {
  summary: ResultSink,
  metrics: ResultSink,
}

impl ResultOutputs {
  pub fn open(
    directory: &Path,
    labels: &LabelVocabulary,
    options: &MetricOptions,
    delimiter: u8,
  ) -> Result<Self, SinkError> {
    let summary = ResultSink::open(
      directory.join(SUMMARY_FILE_NAME),
      delimiter,
      RecordSchema::summary(labels),
    )?;
    let metrics = ResultSink::open(
      directory.join(METRICS_FILE_NAME),
      delimiter,
      RecordSchema::for_options(labels, options),
    )?;
    info!(
      "结果文件: {} / {}",
      summary.path().display(),
      metrics.path().display()
    );
    Ok(Self { summary, metrics })
  }

  pub fn summary(&self) -> &ResultSink {
    &self.summary
  }

  pub fn metrics(&self) -> &ResultSink {
    &self.metrics
  }
}

impl RecordSink for ResultOutputs {
  type Error = SinkError;

  fn append(&mut self, record: &MetricRecord) -> Result<(), Self::Error> {
    self.summary.append(&record.summary())?;
    self.metrics.append(record)
  }
}

impl RecordSink for ResultSink {
  type Error = SinkError;

  fn append(&mut self, record: &MetricRecord) -> Result<(), Self::Error> {
    ResultSink::append(self, record)
  }
}
