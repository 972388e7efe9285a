// 该文件是 Shanan （山南西风） 项目的一部分。
// src/colormap.rs - 类别调色板
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

use image::{Rgb, RgbImage};

use crate::mask::LabelMask;

const PALETTE_SIZE: usize = 256;

const CITYSCAPES_COLORS: [[u8; 3]; 19] = [
  [128, 64, 128],
  [244, 35, 232],
  [70, 70, 70],
  [102, 102, 156],
  [190, 153, 153],
  [153, 153, 153],
  [250, 170, 30],
  [220, 220, 0],
  [107, 142, 35],
  [152, 251, 152],
  [70, 130, 180],
  [220, 20, 60],
  [255, 0, 0],
  [0, 0, 142],
  [0, 0, 70],
  [0, 60, 100],
  [0, 80, 100],
  [0, 0, 230],
  [119, 11, 32],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ColormapKind {
  #[default]
  Pascal,
  Cityscapes,
}

#[derive(Debug, Clone)]
pub struct Colormap {
  palette: Vec<[u8; 3]>,
}

impl Colormap {
  pub fn new(kind: ColormapKind) -> Self {
    let palette = match kind {
      ColormapKind::Pascal => pascal_palette(),
      ColormapKind::Cityscapes => {
        let mut palette = vec![[0u8; 3]; PALETTE_SIZE];
        palette[..CITYSCAPES_COLORS.len()].copy_from_slice(&CITYSCAPES_COLORS);
        palette
      }
    };
    Self { palette }
  }

  pub fn color(&self, class: u8) -> [u8; 3] {
    self.palette[class as usize]
  }

  /// 按类别索引查表上色
  pub fn colorize(&self, mask: &LabelMask) -> RgbImage {
    let (height, width) = mask.dim();
    RgbImage::from_fn(width as u32, height as u32, |x, y| {
      Rgb(self.color(mask[[y as usize, x as usize]]))
    })
  }
}

// PASCAL VOC 调色板：类别索引的比特交错展开到 RGB 高位
fn pascal_palette() -> Vec<[u8; 3]> {
  (0..PALETTE_SIZE)
    .map(|index| {
      let mut color = [0u8; 3];
      let mut bits = index;
      for shift in (0..8).rev() {
        for (channel, value) in color.iter_mut().enumerate() {
          *value |= (((bits >> channel) & 1) << shift) as u8;
        }
        bits >>= 3;
      }
      color
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::array;

  #[test]
  fn pascal_palette_matches_voc_colors() {
    let colormap = Colormap::new(ColormapKind::Pascal);
    assert_eq!(colormap.color(0), [0, 0, 0]);
    assert_eq!(colormap.color(1), [128, 0, 0]);
    assert_eq!(colormap.color(2), [0, 128, 0]);
    assert_eq!(colormap.color(3), [128, 128, 0]);
    assert_eq!(colormap.color(15), [192, 128, 128]);
  }

  #[test]
  fn cityscapes_palette_pads_with_black() {
    let colormap = Colormap::new(ColormapKind::Cityscapes);
    assert_eq!(colormap.color(0), [128, 64, 128]);
    assert_eq!(colormap.color(18), [119, 11, 32]);
    assert_eq!(colormap.color(19), [0, 0, 0]);
    assert_eq!(colormap.color(255), [0, 0, 0]);
  }

  #[test]
  fn colorize_keeps_geometry() {
    let mask = array![[0u8, 1, 1], [0, 0, 1]];
    let image = Colormap::new(ColormapKind::Pascal).colorize(&mask);
    assert_eq!(image.dimensions(), (3, 2));
    assert_eq!(image.get_pixel(1, 0).0, [128, 0, 0]);
    assert_eq!(image.get_pixel(0, 1).0, [0, 0, 0]);
  }
}
