// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 评估任务主循环
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

use anyhow::Context;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::batch::BatchProcessor;
use crate::checkpoint::{Checkpoint, WatchError};
use crate::dataset::Dataset;
use crate::metrics::MetricsAggregator;
use crate::model::{InferenceSession, ModelLoader};
use crate::output::RecordSink;
use crate::shutdown::Shutdown;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H:%M:%S";

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 按发现顺序逐个评估检查点；每个检查点都从头遍历一遍数据集
pub struct EvaluationTask<D> {
  dataset: D,
  processor: BatchProcessor,
  aggregator: MetricsAggregator,
  shutdown: Shutdown,
}

impl<D: Dataset> EvaluationTask<D> {
  pub fn new(dataset: D, processor: BatchProcessor, aggregator: MetricsAggregator) -> Self {
    Self {
      dataset,
      processor,
      aggregator,
      shutdown: Shutdown::default(),
    }
  }

  pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
    self.shutdown = shutdown;
    self
  }

  fn evaluate_checkpoint<L, O>(
    &self,
    session: &mut InferenceSession<L>,
    output: &mut O,
  ) -> anyhow::Result<usize>
  where
    L: ModelLoader,
    O: RecordSink,
    O::Error: std::error::Error + Send + Sync + 'static,
  {
    let mut images = 0;
    for (index, batch) in self.dataset.batches().enumerate() {
      if self.shutdown.is_triggered() {
        warn!("中断信号接收，停止当前检查点的评估");
        break;
      }
      let batch = batch?;
      info!("处理第 {} 批", index + 1);

      let predictions = session.predict(&batch)?;
      for item in self.processor.process(&batch, &predictions)? {
        let record = self
          .aggregator
          .aggregate(&item.mask, item.image, item.name)
          .with_context(|| format!("计算图像 {} 的指标失败", item.name))?;
        output
          .append(&record)
          .with_context(|| format!("写入图像 {} 的结果失败", item.name))?;
        debug!("图像 {} 完成", item.name);
        images += 1;
      }
    }
    Ok(images)
  }
}

impl<D, I, L, O> Task<I, InferenceSession<L>, O> for EvaluationTask<D>
where
  D: Dataset,
  I: Iterator<Item = Result<Checkpoint, WatchError>>,
  L: ModelLoader,
  O: RecordSink,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    checkpoints: I,
    mut session: InferenceSession<L>,
    mut output: O,
  ) -> Result<(), Self::Error> {
    info!("开始评估任务...");
    let mut evaluated = 0;
    let mut total_images = 0;

    for checkpoint in checkpoints {
      let checkpoint = checkpoint?;
      info!(
        "开始评估检查点 #{} {} ({})",
        checkpoint.index,
        checkpoint.path.display(),
        Utc::now().format(TIMESTAMP_FORMAT)
      );

      let now = std::time::Instant::now();
      session.load(&checkpoint)?;
      let images = self.evaluate_checkpoint(&mut session, &mut output)?;
      session.stop();

      evaluated += 1;
      total_images += images;
      info!(
        "完成评估检查点 #{}，{} 张图像，耗时: {:.2?} ({})",
        checkpoint.index,
        images,
        now.elapsed(),
        Utc::now().format(TIMESTAMP_FORMAT)
      );

      if self.shutdown.is_triggered() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!(
      "任务完成，共评估 {} 个检查点、{} 张图像",
      evaluated, total_images
    );
    Ok(())
  }
}
