// 该文件是 Shanan （山南西风） 项目的一部分。
// src/checkpoint/directory.rs - 目录检查点来源
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

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;
use tracing::debug;

use crate::checkpoint::CheckpointSource;
use crate::{FromUrl, FromUrlWithScheme};

const DEFAULT_EXTENSION: &str = "onnx";

#[derive(Error, Debug)]
pub enum DirectoryCheckpointsError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("检查点目录 {path} 读取失败: {source}")]
  IoError {
    path: String,
    #[source]
    source: std::io::Error,
  },
}

/// 监视一个目录，按修改时间（其次按文件名）取扩展名匹配的最新文件。
///
/// 地址形如 `folder:///train/logdir?extension=onnx`。
#[derive(Debug, Clone)]
pub struct DirectoryCheckpoints {
  directory: PathBuf,
  extension: String,
}

impl DirectoryCheckpoints {
  pub fn new(directory: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
    Self {
      directory: directory.into(),
      extension: extension.into(),
    }
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  pub fn extension(&self) -> &str {
    &self.extension
  }

  fn io_error(&self, source: std::io::Error) -> DirectoryCheckpointsError {
    DirectoryCheckpointsError::IoError {
      path: self.directory.display().to_string(),
      source,
    }
  }

  fn matches(&self, path: &Path) -> bool {
    path
      .extension()
      .and_then(|e| e.to_str())
      .map(|e| e.eq_ignore_ascii_case(&self.extension))
      .unwrap_or(false)
  }
}

impl FromUrlWithScheme for DirectoryCheckpoints {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryCheckpoints {
  type Error = DirectoryCheckpointsError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryCheckpointsError::SchemeMismatch(format!(
        "期望来源 '{}', 实际来源 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let extension = uri
      .query_pairs()
      .find(|(k, _)| k == "extension")
      .map(|(_, v)| v.trim_start_matches('.').to_string())
      .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());

    Ok(DirectoryCheckpoints::new(uri.path(), extension))
  }
}

impl CheckpointSource for DirectoryCheckpoints {
  type Error = DirectoryCheckpointsError;

  fn latest(&self) -> Result<Option<PathBuf>, Self::Error> {
    let entries = std::fs::read_dir(&self.directory).map_err(|e| self.io_error(e))?;

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries {
      let entry = entry.map_err(|e| self.io_error(e))?;
      let path = entry.path();
      if !self.matches(&path) {
        continue;
      }
      let meta = entry.metadata().map_err(|e| self.io_error(e))?;
      if !meta.is_file() {
        continue;
      }
      let modified = meta.modified().map_err(|e| self.io_error(e))?;
      let candidate = (modified, path);
      if newest.as_ref().is_none_or(|best| candidate > *best) {
        newest = Some(candidate);
      }
    }

    if let Some((_, path)) = &newest {
      debug!("最新检查点: {}", path.display());
    }
    Ok(newest.map(|(_, path)| path))
  }
}
