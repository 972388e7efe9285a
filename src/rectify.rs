// 该文件是 Shanan （山南西风） 项目的一部分。
// src/rectify.rs - 预测结果的几何还原
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

use ndarray::{Array2, ArrayView2, s};
use thiserror::Error;

use crate::mask::{Extent, LabelMask};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RectifyError {
  #[error("裁剪区域 {requested} 超出预测结果尺寸 {available}")]
  CropOutOfBounds { requested: Extent, available: Extent },
  #[error("目标尺寸无效: {0}")]
  EmptyTarget(Extent),
  #[error("还原到原图尺寸仅支持批大小为 1，当前为 {0}")]
  BatchTooLarge(usize),
}

/// 截取左上角 `extent` 大小的区域，丢弃预处理时补齐的边缘
pub fn crop_top_left(
  prediction: ArrayView2<'_, u8>,
  extent: Extent,
) -> Result<ArrayView2<'_, u8>, RectifyError> {
  let (height, width) = prediction.dim();
  let available = Extent::new(height, width);
  if !available.contains(extent) {
    return Err(RectifyError::CropOutOfBounds {
      requested: extent,
      available,
    });
  }
  Ok(prediction.slice_move(s![..extent.height, ..extent.width]))
}

// 与 align_corners 的最近邻采样一致：端点对齐，取最近的源像素
fn source_index(dst: usize, src_len: usize, dst_len: usize) -> usize {
  let scale = if dst_len > 1 {
    (src_len - 1) as f64 / (dst_len - 1) as f64
  } else {
    0.0
  };
  ((dst as f64 * scale).round() as usize).min(src_len - 1)
}

/// 最近邻缩放。类别标签不可混合，因此只允许最近邻
pub fn resize_nearest(mask: ArrayView2<'_, u8>, target: Extent) -> Result<LabelMask, RectifyError> {
  let (height, width) = mask.dim();
  if target.area() == 0 || height == 0 || width == 0 {
    return Err(RectifyError::EmptyTarget(target));
  }
  if (height, width) == (target.height, target.width) {
    return Ok(mask.to_owned());
  }

  let rows: Vec<usize> = (0..target.height)
    .map(|y| source_index(y, height, target.height))
    .collect();
  let cols: Vec<usize> = (0..target.width)
    .map(|x| source_index(x, width, target.width))
    .collect();

  Ok(Array2::from_shape_fn((target.height, target.width), |(y, x)| {
    mask[[rows[y], cols[x]]]
  }))
}

/// 逆转“缩放 + 补边”预处理，把模型分辨率下的预测映射回原图像素网格
#[derive(Debug, Default, Clone, Copy)]
pub struct GeometryRectifier;

impl GeometryRectifier {
  /// 仅当批大小为 1 时还原才有意义，需要在进入主循环之前检查
  pub fn ensure_batch_size(batch_size: usize) -> Result<(), RectifyError> {
    if batch_size != 1 {
      return Err(RectifyError::BatchTooLarge(batch_size));
    }
    Ok(())
  }

  /// `valid` 为缩放后（补边前）的有效区域，`target` 为原图尺寸
  pub fn rectify(
    &self,
    prediction: ArrayView2<'_, u8>,
    valid: Extent,
    target: Extent,
  ) -> Result<LabelMask, RectifyError> {
    let cropped = crop_top_left(prediction, valid)?;
    resize_nearest(cropped, target)
  }
}
