// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 分割模型定义
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

use ndarray::Array3;

use crate::checkpoint::Checkpoint;
use crate::dataset::Batch;

mod multi_scale;
#[cfg(feature = "onnx")]
mod onnx;
mod session;

pub use self::multi_scale::ScaleAugment;
#[cfg(feature = "onnx")]
pub use self::onnx::{OnnxLoader, OnnxModel, OnnxModelError};
pub use self::session::{InferenceSession, SessionError, SessionPhase};

pub trait Model {
  type Error: std::error::Error + Send + Sync + 'static;

  /// 返回形状为 `[N, crop_h, crop_w]` 的逐像素类别索引
  fn predict(&mut self, batch: &Batch) -> Result<Array3<u8>, Self::Error>;
}

/// 从检查点恢复模型参数
pub trait ModelLoader {
  type Model: Model;
  type Error: std::error::Error + Send + Sync + 'static;

  fn load(&self, checkpoint: &Checkpoint) -> Result<Self::Model, Self::Error>;
}
