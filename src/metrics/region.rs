// 该文件是 Shanan （山南西风） 项目的一部分。
// src/metrics/region.rs - 前景连通区域的形状描述
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

use std::collections::BTreeSet;
use std::f64::consts::{PI, SQRT_2};

use image::{GrayImage, Luma};
use imageproc::geometry::convex_hull;
use imageproc::point::Point;
use imageproc::region_labelling::{Connectivity, connected_components};
use ndarray::Array2;

use crate::mask::{BACKGROUND, LabelMask};
use crate::metrics::record::{RegionMetrics, RegionProperties};

const FOREGROUND_PIXEL: Luma<u8> = Luma([255]);
const BACKGROUND_PIXEL: Luma<u8> = Luma([0]);

/// 将掩码视为前景/背景二值图，计算 8 连通前景区域的形状描述。
/// 连通区域数量不为 1 时不挑选其中任何一个，返回 `Ambiguous`。
pub fn region_properties(mask: &LabelMask) -> RegionMetrics {
  let (height, width) = mask.dim();
  let binary = GrayImage::from_fn(width as u32, height as u32, |x, y| {
    if mask[[y as usize, x as usize]] != BACKGROUND {
      FOREGROUND_PIXEL
    } else {
      BACKGROUND_PIXEL
    }
  });

  let labelled = connected_components(&binary, Connectivity::Eight, BACKGROUND_PIXEL);
  let components: BTreeSet<u32> = labelled.pixels().map(|p| p[0]).filter(|&l| l != 0).collect();
  if components.len() != 1 {
    return RegionMetrics::Ambiguous {
      components: components.len(),
    };
  }

  let pixels: Vec<(usize, usize)> = labelled
    .enumerate_pixels()
    .filter(|(_, _, p)| p[0] != 0)
    .map(|(x, y, _)| (y as usize, x as usize))
    .collect();
  RegionMetrics::Single(Region::new(&pixels).describe())
}

/// 以外接矩形为坐标系的单个区域
struct Region {
  grid: Array2<bool>,
  area: u64,
}

impl Region {
  fn new(pixels: &[(usize, usize)]) -> Self {
    let min_row = pixels.iter().map(|p| p.0).min().unwrap_or(0);
    let max_row = pixels.iter().map(|p| p.0).max().unwrap_or(0);
    let min_col = pixels.iter().map(|p| p.1).min().unwrap_or(0);
    let max_col = pixels.iter().map(|p| p.1).max().unwrap_or(0);

    let mut grid = Array2::from_elem((max_row - min_row + 1, max_col - min_col + 1), false);
    for &(row, col) in pixels {
      grid[[row - min_row, col - min_col]] = true;
    }
    Self {
      grid,
      area: pixels.len() as u64,
    }
  }

  fn is_set(&self, row: isize, col: isize) -> bool {
    if row < 0 || col < 0 {
      return false;
    }
    self
      .grid
      .get((row as usize, col as usize))
      .copied()
      .unwrap_or(false)
  }

  fn describe(&self) -> RegionProperties {
    let area = self.area as f64;
    let (bbox_height, bbox_width) = self.grid.dim();
    let filled_area = self.filled_area();
    let convex_area = self.convex_area();
    let (major, minor) = self.axis_eigenvalues();

    RegionProperties {
      filled_area,
      convex_area,
      equivalent_diameter: (4.0 * area / PI).sqrt(),
      major_axis_length: 4.0 * major.sqrt(),
      minor_axis_length: 4.0 * minor.sqrt(),
      perimeter: self.perimeter(),
      eccentricity: if major == 0.0 {
        0.0
      } else {
        (1.0 - minor / major).sqrt()
      },
      extent: area / (bbox_height * bbox_width) as f64,
      solidity: area / convex_area as f64,
    }
  }

  // 区域面积加上被包围的孔洞（不与外接矩形边界 4 连通的背景）
  fn filled_area(&self) -> u64 {
    let (height, width) = self.grid.dim();
    let inverted = GrayImage::from_fn(width as u32, height as u32, |x, y| {
      if self.grid[[y as usize, x as usize]] {
        BACKGROUND_PIXEL
      } else {
        FOREGROUND_PIXEL
      }
    });
    let gaps = connected_components(&inverted, Connectivity::Four, BACKGROUND_PIXEL);

    let outside: BTreeSet<u32> = gaps
      .enumerate_pixels()
      .filter(|(x, y, _)| *x == 0 || *y == 0 || *x + 1 == width as u32 || *y + 1 == height as u32)
      .map(|(_, _, p)| p[0])
      .filter(|&l| l != 0)
      .collect();
    let holes = gaps
      .pixels()
      .filter(|p| p[0] != 0 && !outside.contains(&p[0]))
      .count() as u64;

    self.area + holes
  }

  // 以像素角点构造凸包（坐标放大两倍以保持整数），统计中心落在凸包内的像素
  fn convex_area(&self) -> u64 {
    let mut corners = Vec::new();
    for (row, line) in self.grid.outer_iter().enumerate() {
      let first = line.iter().position(|&v| v);
      let last = line.iter().rposition(|&v| v);
      if let (Some(first), Some(last)) = (first, last) {
        let (top, bottom) = (2 * row as i32 - 1, 2 * row as i32 + 1);
        let (left, right) = (2 * first as i32 - 1, 2 * last as i32 + 1);
        corners.extend([
          Point::new(left, top),
          Point::new(left, bottom),
          Point::new(right, top),
          Point::new(right, bottom),
        ]);
      }
    }
    let hull = convex_hull(corners.as_slice());

    self
      .grid
      .indexed_iter()
      .filter(|&((row, col), _)| inside_convex(&hull, Point::new(2 * col as i32, 2 * row as i32)))
      .count() as u64
  }

  // 归一化中心矩协方差矩阵的两个特征值（大, 小）
  fn axis_eigenvalues(&self) -> (f64, f64) {
    let n = self.area as f64;
    let coords: Vec<(f64, f64)> = self
      .grid
      .indexed_iter()
      .filter(|(_, v)| **v)
      .map(|((r, c), _)| (r as f64, c as f64))
      .collect();
    let mean_row = coords.iter().map(|c| c.0).sum::<f64>() / n;
    let mean_col = coords.iter().map(|c| c.1).sum::<f64>() / n;

    let (mut rr, mut cc, mut rc) = (0.0, 0.0, 0.0);
    for (r, c) in &coords {
      let (dr, dc) = (r - mean_row, c - mean_col);
      rr += dr * dr;
      cc += dc * dc;
      rc += dr * dc;
    }
    let (rr, cc, rc) = (rr / n, cc / n, rc / n);

    let half_trace = (rr + cc) / 2.0;
    let spread = (((rr - cc) / 2.0).powi(2) + rc * rc).sqrt();
    (half_trace + spread, (half_trace - spread).max(0.0))
  }

  // 带权边界像素法：对 4 邻域边界像素按 3x3 邻接模式编码，查表加权
  fn perimeter(&self) -> f64 {
    let (height, width) = self.grid.dim();
    let border = Array2::from_shape_fn((height, width), |(row, col)| {
      let (r, c) = (row as isize, col as isize);
      self.grid[[row, col]]
        && !(self.is_set(r - 1, c)
          && self.is_set(r + 1, c)
          && self.is_set(r, c - 1)
          && self.is_set(r, c + 1))
    });
    let is_border = |r: isize, c: isize| {
      r >= 0 && c >= 0 && border.get((r as usize, c as usize)).copied().unwrap_or(false)
    };

    let mut total = 0.0;
    for ((row, col), _) in border.indexed_iter().filter(|(_, b)| **b) {
      let (r, c) = (row as isize, col as isize);
      let sides = [(r - 1, c), (r + 1, c), (r, c - 1), (r, c + 1)]
        .iter()
        .filter(|(y, x)| is_border(*y, *x))
        .count();
      let diagonals = [(r - 1, c - 1), (r - 1, c + 1), (r + 1, c - 1), (r + 1, c + 1)]
        .iter()
        .filter(|(y, x)| is_border(*y, *x))
        .count();
      total += perimeter_weight(1 + 2 * sides + 10 * diagonals);
    }
    total
  }
}

fn perimeter_weight(code: usize) -> f64 {
  match code {
    5 | 7 | 15 | 17 | 25 | 27 => 1.0,
    21 | 33 => SQRT_2,
    13 | 23 => (1.0 + SQRT_2) / 2.0,
    _ => 0.0,
  }
}

// 点在凸多边形内或边上
fn inside_convex(hull: &[Point<i32>], point: Point<i32>) -> bool {
  if hull.len() < 3 {
    return false;
  }
  let mut sign = 0i64;
  for (i, a) in hull.iter().enumerate() {
    let b = hull[(i + 1) % hull.len()];
    let cross = (b.x - a.x) as i64 * (point.y - a.y) as i64 - (b.y - a.y) as i64 * (point.x - a.x) as i64;
    if cross == 0 {
      continue;
    }
    if sign == 0 {
      sign = cross.signum();
    } else if sign != cross.signum() {
      return false;
    }
  }
  true
}
