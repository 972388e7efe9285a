// 该文件是 Shanan （山南西风） 项目的一部分。
// src/mask.rs - 标签掩码与类别词表
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

use ndarray::Array2;
use thiserror::Error;

/// 逐像素类别索引，形状为 `[height, width]`
pub type LabelMask = Array2<u8>;

/// 背景类别的索引
pub const BACKGROUND: u8 = 0;

/// 二维尺寸（高, 宽）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent {
  pub height: usize,
  pub width: usize,
}

impl Extent {
  pub const fn new(height: usize, width: usize) -> Self {
    Self { height, width }
  }

  pub fn of(mask: &LabelMask) -> Self {
    let (height, width) = mask.dim();
    Self { height, width }
  }

  pub fn area(&self) -> usize {
    self.height * self.width
  }

  pub fn contains(&self, other: Extent) -> bool {
    other.height <= self.height && other.width <= self.width
  }
}

impl std::fmt::Display for Extent {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}x{}", self.height, self.width)
  }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum VocabularyError {
  #[error("类别词表为空")]
  Empty,
  #[error("类别数量 {0} 超过上限 256")]
  TooMany(usize),
  #[error("类别名称重复: {0}")]
  Duplicate(String),
  #[error("类别名称无效: {0:?}")]
  InvalidName(String),
}

/// 固定的类别词表，索引即类别值
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelVocabulary {
  names: Vec<String>,
}

impl Default for LabelVocabulary {
  fn default() -> Self {
    Self {
      names: vec!["background".to_string(), "rosette".to_string()],
    }
  }
}

impl LabelVocabulary {
  pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Result<Self, VocabularyError> {
    let names: Vec<String> = names.into_iter().map(Into::into).collect();
    if names.is_empty() {
      return Err(VocabularyError::Empty);
    }
    if names.len() > u8::MAX as usize + 1 {
      return Err(VocabularyError::TooMany(names.len()));
    }
    for (i, name) in names.iter().enumerate() {
      if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c == ',' || c == '"') {
        return Err(VocabularyError::InvalidName(name.clone()));
      }
      if names[..i].contains(name) {
        return Err(VocabularyError::Duplicate(name.clone()));
      }
    }
    Ok(Self { names })
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn names(&self) -> &[String] {
    &self.names
  }

  pub fn name(&self, class: u8) -> Option<&str> {
    self.names.get(class as usize).map(String::as_str)
  }

  pub fn is_valid(&self, class: u8) -> bool {
    (class as usize) < self.names.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_vocabulary_is_background_and_rosette() {
    let labels = LabelVocabulary::default();
    assert_eq!(labels.names(), ["background", "rosette"]);
    assert_eq!(labels.name(BACKGROUND), Some("background"));
    assert!(labels.is_valid(1));
    assert!(!labels.is_valid(2));
  }

  #[test]
  fn rejects_duplicate_and_blank_names() {
    assert_eq!(
      LabelVocabulary::new(["a", "a"]),
      Err(VocabularyError::Duplicate("a".to_string()))
    );
    assert_eq!(
      LabelVocabulary::new(["a", "b c"]),
      Err(VocabularyError::InvalidName("b c".to_string()))
    );
    assert_eq!(
      LabelVocabulary::new(Vec::<String>::new()),
      Err(VocabularyError::Empty)
    );
  }

  #[test]
  fn extent_containment() {
    let big = Extent::new(4, 5);
    assert!(big.contains(Extent::new(4, 5)));
    assert!(big.contains(Extent::new(1, 1)));
    assert!(!big.contains(Extent::new(5, 1)));
    assert_eq!(big.area(), 20);
    assert_eq!(big.to_string(), "4x5");
  }
}
