// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/save_image_file.rs - 保存预测图像文件
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

use image::GrayImage;
use thiserror::Error;
use tracing::debug;

use crate::colormap::Colormap;
use crate::mask::LabelMask;

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
}

/// 将预测掩码写为 `<directory>/<name>.png`。
/// 设置调色板时保存着色后的 RGB 图像，否则保存原始类别编号的灰度图。
#[derive(Debug, Clone)]
pub struct PredictionWriter {
  directory: PathBuf,
  colormap: Option<Colormap>,
}

impl PredictionWriter {
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    Self {
      directory: directory.into(),
      colormap: None,
    }
  }

  pub fn with_colormap(mut self, colormap: Option<Colormap>) -> Self {
    self.colormap = colormap;
    self
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  pub fn path_for(&self, name: &str) -> PathBuf {
    self.directory.join(format!("{}.png", name))
  }

  pub fn save(&self, name: &str, mask: &LabelMask) -> Result<PathBuf, SaveImageFileError> {
    let path = self.path_for(name);
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    match &self.colormap {
      Some(colormap) => colormap.colorize(mask).save(&path)?,
      None => {
        let (height, width) = mask.dim();
        let image = GrayImage::from_fn(width as u32, height as u32, |x, y| {
          image::Luma([mask[[y as usize, x as usize]]])
        });
        image.save(&path)?;
      }
    }

    debug!("保存预测图像到文件: {}", path.display());
    Ok(path)
  }
}
