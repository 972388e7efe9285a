// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/result_sink.rs - 追加写入的分隔符结果文件
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

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::metrics::{MetricRecord, RecordSchema};

#[derive(Error, Debug)]
pub enum SinkError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("CSV 错误: {0}")]
  CsvError(#[from] csv::Error),
  #[error("结果文件 {path} 的列 {found} 与期望的列 {expected} 不一致")]
  SchemaMismatch {
    path: String,
    expected: RecordSchema,
    found: RecordSchema,
  },
}

/// 单个结果文件的写入端。
///
/// 表头状态在打开时确定一次：文件已存在且非空时读取其首行作为表头，
/// 必须与期望的列一致；之后每次追加前都校验记录的列，不一致则拒绝写入，
/// 文件不会出现参差不齐的行。
#[derive(Debug)]
pub struct ResultSink {
  path: PathBuf,
  delimiter: u8,
  schema: RecordSchema,
  header_written: bool,
}

impl ResultSink {
  pub fn open(
    path: impl Into<PathBuf>,
    delimiter: u8,
    schema: RecordSchema,
  ) -> Result<Self, SinkError> {
    let path = path.into();
    let header_written = match std::fs::metadata(&path) {
      Ok(meta) => meta.len() > 0,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
      Err(e) => return Err(e.into()),
    };

    if header_written {
      let existing = read_header(&path, delimiter)?;
      if existing != schema {
        return Err(SinkError::SchemaMismatch {
          path: path.display().to_string(),
          expected: schema,
          found: existing,
        });
      }
      info!("继续追加已有结果文件: {}", path.display());
    }

    Ok(Self {
      path,
      delimiter,
      schema,
      header_written,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn schema(&self) -> &RecordSchema {
    &self.schema
  }

  pub fn header_written(&self) -> bool {
    self.header_written
  }

  /// 以追加模式写入一行；文件句柄在本次调用内打开并在任何返回路径上关闭
  pub fn append(&mut self, record: &MetricRecord) -> Result<(), SinkError> {
    let found = record.schema();
    if found != self.schema {
      return Err(SinkError::SchemaMismatch {
        path: self.path.display().to_string(),
        expected: self.schema.clone(),
        found,
      });
    }

    let file = OpenOptions::new()
      .create(true)
      .append(true)
      .open(&self.path)?;
    let mut writer = csv::WriterBuilder::new()
      .delimiter(self.delimiter)
      .has_headers(false)
      .from_writer(file);

    if !self.header_written {
      writer.write_record(self.schema.columns())?;
      debug!("写入表头: {}", self.path.display());
    }
    writer.write_record(record.values().iter().map(|v| v.to_string()))?;
    writer.flush()?;
    self.header_written = true;

    Ok(())
  }
}

fn read_header(path: &Path, delimiter: u8) -> Result<RecordSchema, SinkError> {
  let mut reader = csv::ReaderBuilder::new()
    .delimiter(delimiter)
    .has_headers(false)
    .flexible(true)
    .from_path(path)?;
  match reader.records().next() {
    Some(header) => Ok(RecordSchema::new(header?.iter())),
    None => Ok(RecordSchema::new(Vec::<String>::new())),
  }
}
