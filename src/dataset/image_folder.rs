// 该文件是 Shanan （山南西风） 项目的一部分。
// src/dataset/image_folder.rs - 图像目录数据集
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

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ImageReader;
use tracing::{debug, info};

use crate::dataset::{Batch, Dataset, DatasetError, Preprocessor, Sample};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// `<dataset_dir>/<split>/` 下按文件名排序的图像，显示名为文件名去掉扩展名
#[derive(Debug, Clone)]
pub struct ImageFolderDataset {
  files: Arc<[PathBuf]>,
  preprocessor: Preprocessor,
  batch_size: NonZeroUsize,
}

impl ImageFolderDataset {
  pub fn open(
    dataset_dir: &Path,
    split: &str,
    preprocessor: Preprocessor,
    batch_size: NonZeroUsize,
  ) -> Result<Self, DatasetError> {
    let directory = dataset_dir.join(split);
    let io_error = |source| DatasetError::IoError {
      path: directory.display().to_string(),
      source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(&directory).map_err(io_error)? {
      let path = entry.map_err(io_error)?.path();
      let is_image = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false);
      if is_image && path.is_file() {
        files.push(path);
      }
    }
    if files.is_empty() {
      return Err(DatasetError::EmptySplit(directory.display().to_string()));
    }
    files.sort();

    info!("数据集 {}: {} 张图像", directory.display(), files.len());
    Ok(Self {
      files: files.into(),
      preprocessor,
      batch_size,
    })
  }

  pub fn len(&self) -> usize {
    self.files.len()
  }

  pub fn is_empty(&self) -> bool {
    self.files.is_empty()
  }

  pub fn files(&self) -> &[PathBuf] {
    &self.files
  }
}

impl Dataset for ImageFolderDataset {
  type Error = DatasetError;
  type Batches = ImageFolderBatches;

  fn batches(&self) -> Self::Batches {
    ImageFolderBatches {
      files: self.files.clone(),
      preprocessor: self.preprocessor,
      batch_size: self.batch_size.get(),
      position: 0,
    }
  }
}

/// 一轮批次迭代。最后一批可能不足批大小
pub struct ImageFolderBatches {
  files: Arc<[PathBuf]>,
  preprocessor: Preprocessor,
  batch_size: usize,
  position: usize,
}

impl ImageFolderBatches {
  fn load(&self, path: &Path) -> Result<Sample, DatasetError> {
    let image = ImageReader::open(path)
      .map_err(|source| DatasetError::IoError {
        path: path.display().to_string(),
        source,
      })?
      .decode()
      .map_err(|source| DatasetError::ImageError {
        path: path.display().to_string(),
        source,
      })?
      .to_rgb8();
    let name = path
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_default();
    debug!("读取图像 {}", path.display());
    self.preprocessor.prepare(name, image)
  }
}

impl Iterator for ImageFolderBatches {
  type Item = Result<Batch, DatasetError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.position >= self.files.len() {
      return None;
    }
    let end = (self.position + self.batch_size).min(self.files.len());
    let files = self.files.clone();
    let chunk = &files[self.position..end];
    self.position = end;

    let samples = chunk
      .iter()
      .map(|path| self.load(path))
      .collect::<Result<Vec<_>, _>>();
    Some(samples.map(|samples| Batch {
      samples,
      crop: self.preprocessor.crop(),
    }))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::mask::Extent;
  use image::{Rgb, RgbImage};

  fn write_split(root: &Path, names: &[&str]) {
    let split = root.join("val");
    std::fs::create_dir_all(&split).unwrap();
    for (i, name) in names.iter().enumerate() {
      RgbImage::from_pixel(3 + i as u32, 2, Rgb([i as u8, 0, 0]))
        .save(split.join(name))
        .unwrap();
    }
    std::fs::write(split.join("notes.txt"), "not an image").unwrap();
  }

  fn open(root: &Path, batch_size: usize) -> ImageFolderDataset {
    ImageFolderDataset::open(
      root,
      "val",
      Preprocessor::new(Extent::new(8, 8), None),
      NonZeroUsize::new(batch_size).unwrap(),
    )
    .unwrap()
  }

  #[test]
  fn lists_images_sorted_by_name() {
    let dir = tempfile::tempdir().unwrap();
    write_split(dir.path(), &["b.png", "a.png", "c.jpg"]);
    let dataset = open(dir.path(), 1);
    assert_eq!(dataset.len(), 3);

    let names: Vec<String> = dataset
      .batches()
      .map(|b| b.unwrap().samples.remove(0).name)
      .collect();
    assert_eq!(names, vec!["a", "b", "c"]);
  }

  #[test]
  fn last_batch_may_be_partial() {
    let dir = tempfile::tempdir().unwrap();
    write_split(dir.path(), &["a.png", "b.png", "c.png"]);
    let sizes: Vec<usize> = open(dir.path(), 2)
      .batches()
      .map(|b| b.unwrap().len())
      .collect();
    assert_eq!(sizes, vec![2, 1]);
  }

  #[test]
  fn every_call_restarts_iteration() {
    let dir = tempfile::tempdir().unwrap();
    write_split(dir.path(), &["a.png", "b.png"]);
    let dataset = open(dir.path(), 1);
    assert_eq!(dataset.batches().count(), 2);
    assert_eq!(dataset.batches().count(), 2);
  }

  #[test]
  fn sample_keeps_original_geometry() {
    let dir = tempfile::tempdir().unwrap();
    write_split(dir.path(), &["a.png"]);
    let batch = open(dir.path(), 1).batches().next().unwrap().unwrap();
    let sample = &batch.samples[0];
    assert_eq!(sample.original, Extent::new(2, 3));
    assert_eq!(sample.input.dimensions(), (8, 8));
    assert_eq!(batch.crop, Extent::new(8, 8));
  }

  #[test]
  fn empty_split_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("val")).unwrap();
    let err = ImageFolderDataset::open(
      dir.path(),
      "val",
      Preprocessor::new(Extent::new(8, 8), None),
      NonZeroUsize::MIN,
    )
    .unwrap_err();
    assert!(matches!(err, DatasetError::EmptySplit(_)));
  }
}
