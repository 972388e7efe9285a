// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/session.rs - 推理会话状态机
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

use std::fmt;

use ndarray::Array3;
use thiserror::Error;
use tracing::{debug, info};

use crate::checkpoint::Checkpoint;
use crate::dataset::Batch;
use crate::model::{Model, ModelLoader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
  Unloaded,
  Loaded,
  Serving,
  Stopped,
}

impl fmt::Display for SessionPhase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      SessionPhase::Unloaded => "未加载",
      SessionPhase::Loaded => "已加载",
      SessionPhase::Serving => "推理中",
      SessionPhase::Stopped => "已停止",
    };
    f.write_str(name)
  }
}

#[derive(Error, Debug)]
pub enum SessionError {
  #[error("会话处于{phase}状态，无法执行 {operation}")]
  InvalidState {
    operation: &'static str,
    phase: SessionPhase,
  },
  #[error("加载检查点 {checkpoint} 失败: {source}")]
  Load {
    checkpoint: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },
  #[error("推理失败: {0}")]
  Predict(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("预测结果形状 {found:?} 与期望形状 {expected:?} 不一致")]
  ShapeMismatch {
    expected: [usize; 3],
    found: [usize; 3],
  },
}

/// `Unloaded → Loaded → Serving → Stopped`，停止后可再次加载下一个检查点
pub struct InferenceSession<L: ModelLoader> {
  loader: L,
  model: Option<L::Model>,
  checkpoint: Option<Checkpoint>,
  phase: SessionPhase,
}

impl<L: ModelLoader> InferenceSession<L> {
  pub fn new(loader: L) -> Self {
    Self {
      loader,
      model: None,
      checkpoint: None,
      phase: SessionPhase::Unloaded,
    }
  }

  pub fn phase(&self) -> SessionPhase {
    self.phase
  }

  pub fn checkpoint(&self) -> Option<&Checkpoint> {
    self.checkpoint.as_ref()
  }

  pub fn load(&mut self, checkpoint: &Checkpoint) -> Result<(), SessionError> {
    if !matches!(self.phase, SessionPhase::Unloaded | SessionPhase::Stopped) {
      return Err(SessionError::InvalidState {
        operation: "load",
        phase: self.phase,
      });
    }

    let now = std::time::Instant::now();
    let model = self
      .loader
      .load(checkpoint)
      .map_err(|e| SessionError::Load {
        checkpoint: checkpoint.path.display().to_string(),
        source: Box::new(e),
      })?;
    info!(
      "检查点 {} 加载完成，耗时: {:.2?}",
      checkpoint.path.display(),
      now.elapsed()
    );

    self.model = Some(model);
    self.checkpoint = Some(checkpoint.clone());
    self.phase = SessionPhase::Loaded;
    Ok(())
  }

  pub fn predict(&mut self, batch: &Batch) -> Result<Array3<u8>, SessionError> {
    let model = match (self.phase, self.model.as_mut()) {
      (SessionPhase::Loaded | SessionPhase::Serving, Some(model)) => model,
      _ => {
        return Err(SessionError::InvalidState {
          operation: "predict",
          phase: self.phase,
        });
      }
    };

    let now = std::time::Instant::now();
    let predictions = model
      .predict(batch)
      .map_err(|e| SessionError::Predict(Box::new(e)))?;
    debug!("推理完成，耗时: {:.2?}", now.elapsed());

    let expected = [batch.len(), batch.crop.height, batch.crop.width];
    let (n, h, w) = predictions.dim();
    if [n, h, w] != expected {
      return Err(SessionError::ShapeMismatch {
        expected,
        found: [n, h, w],
      });
    }

    self.phase = SessionPhase::Serving;
    Ok(predictions)
  }

  /// 数据集耗尽后释放模型，本检查点的会话结束
  pub fn stop(&mut self) {
    if self.model.take().is_some() {
      debug!("释放检查点模型");
    }
    self.phase = SessionPhase::Stopped;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::mask::Extent;
  use std::path::PathBuf;

  #[derive(Debug, thiserror::Error)]
  #[error("损坏的检查点")]
  struct Corrupt;

  struct Constant(u8);

  impl Model for Constant {
    type Error = Corrupt;

    fn predict(&mut self, batch: &Batch) -> Result<Array3<u8>, Self::Error> {
      Ok(Array3::from_elem(
        (batch.len(), batch.crop.height, batch.crop.width),
        self.0,
      ))
    }
  }

  struct Loader;

  impl ModelLoader for Loader {
    type Model = Constant;
    type Error = Corrupt;

    fn load(&self, checkpoint: &Checkpoint) -> Result<Self::Model, Self::Error> {
      if checkpoint.path.ends_with("bad.onnx") {
        Err(Corrupt)
      } else {
        Ok(Constant(1))
      }
    }
  }

  fn checkpoint(name: &str) -> Checkpoint {
    Checkpoint {
      path: PathBuf::from(name),
      index: 1,
    }
  }

  fn empty_batch() -> Batch {
    Batch {
      samples: Vec::new(),
      crop: Extent::new(4, 4),
    }
  }

  #[test]
  fn follows_lifecycle() {
    let mut session = InferenceSession::new(Loader);
    assert_eq!(session.phase(), SessionPhase::Unloaded);
    session.load(&checkpoint("a.onnx")).unwrap();
    assert_eq!(session.phase(), SessionPhase::Loaded);
    let out = session.predict(&empty_batch()).unwrap();
    assert_eq!(out.dim(), (0, 4, 4));
    assert_eq!(session.phase(), SessionPhase::Serving);
    session.stop();
    assert_eq!(session.phase(), SessionPhase::Stopped);
    session.load(&checkpoint("b.onnx")).unwrap();
    assert_eq!(session.checkpoint().unwrap().path, PathBuf::from("b.onnx"));
  }

  #[test]
  fn predict_requires_loaded_model() {
    let mut session = InferenceSession::new(Loader);
    let err = session.predict(&empty_batch()).unwrap_err();
    assert!(matches!(
      err,
      SessionError::InvalidState {
        operation: "predict",
        phase: SessionPhase::Unloaded
      }
    ));

    session.load(&checkpoint("a.onnx")).unwrap();
    session.stop();
    assert!(session.predict(&empty_batch()).is_err());
  }

  #[test]
  fn load_twice_without_stop_is_rejected() {
    let mut session = InferenceSession::new(Loader);
    session.load(&checkpoint("a.onnx")).unwrap();
    assert!(matches!(
      session.load(&checkpoint("b.onnx")),
      Err(SessionError::InvalidState { operation: "load", .. })
    ));
  }

  #[test]
  fn corrupt_checkpoint_fails_to_load() {
    let mut session = InferenceSession::new(Loader);
    let err = session.load(&checkpoint("bad.onnx")).unwrap_err();
    assert!(matches!(err, SessionError::Load { .. }));
    assert_eq!(session.phase(), SessionPhase::Unloaded);
  }
}
