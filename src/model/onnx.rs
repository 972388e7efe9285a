// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/onnx.rs - ONNX Runtime 推理后端
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

use ndarray::{Array3, Array4, Ix4};
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::Tensor;
use thiserror::Error;
use tracing::info;

use crate::checkpoint::Checkpoint;
use crate::dataset::Batch;
use crate::model::{Model, ModelLoader, ScaleAugment};

#[derive(Error, Debug)]
pub enum OnnxModelError {
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(#[from] ort::Error),
  #[error("模型缺少输入或输出")]
  MissingIo,
  #[error("模型输出形状错误: {0}")]
  ShapeError(#[from] ndarray::ShapeError),
}

/// 以 `.onnx` 文件作为检查点，输出 `[N, classes, H, W]` 的 logits
#[derive(Debug, Clone, Default)]
pub struct OnnxLoader {
  augment: ScaleAugment,
  intra_threads: Option<usize>,
}

impl OnnxLoader {
  pub fn new(augment: ScaleAugment) -> Self {
    Self {
      augment,
      intra_threads: None,
    }
  }

  pub fn with_intra_threads(mut self, threads: Option<usize>) -> Self {
    self.intra_threads = threads;
    self
  }
}

impl ModelLoader for OnnxLoader {
  type Model = OnnxModel;
  type Error = OnnxModelError;

  fn load(&self, checkpoint: &Checkpoint) -> Result<Self::Model, Self::Error> {
    let mut builder = Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;
    if let Some(threads) = self.intra_threads {
      builder = builder.with_intra_threads(threads)?;
    }
    let session = builder.commit_from_file(&checkpoint.path)?;

    let input_name = session
      .inputs
      .first()
      .map(|i| i.name.clone())
      .ok_or(OnnxModelError::MissingIo)?;
    let output_name = session
      .outputs
      .first()
      .map(|o| o.name.clone())
      .ok_or(OnnxModelError::MissingIo)?;
    info!("ONNX 模型输入 {}，输出 {}", input_name, output_name);

    Ok(OnnxModel {
      session,
      input_name,
      output_name,
      augment: self.augment.clone(),
    })
  }
}

pub struct OnnxModel {
  session: Session,
  input_name: String,
  output_name: String,
  augment: ScaleAugment,
}

impl OnnxModel {
  fn forward(&self, input: Array4<f32>) -> Result<Array4<f32>, OnnxModelError> {
    let tensor = Tensor::from_array(input)?;
    let outputs = self
      .session
      .run(ort::inputs![self.input_name.as_str() => tensor]?)?;
    let logits = outputs[self.output_name.as_str()]
      .try_extract_tensor::<f32>()?
      .to_owned()
      .into_dimensionality::<Ix4>()?;
    Ok(logits)
  }
}

// 与 deeplab 一致，像素归一化到 [-1, 1]
fn normalize(batch: &Batch) -> Array4<f32> {
  Array4::from_shape_fn(
    (batch.len(), 3, batch.crop.height, batch.crop.width),
    |(n, c, y, x)| {
      let value = batch.samples[n].input.get_pixel(x as u32, y as u32)[c];
      value as f32 / 127.5 - 1.0
    },
  )
}

impl Model for OnnxModel {
  type Error = OnnxModelError;

  fn predict(&mut self, batch: &Batch) -> Result<Array3<u8>, Self::Error> {
    let input = normalize(batch);
    self.augment.combine(input.view(), |x| self.forward(x))
  }
}
