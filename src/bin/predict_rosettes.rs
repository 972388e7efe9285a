// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/predict_rosettes.rs - 检查点驱动的分割评估程序
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

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use shanan_segeval::{
  args::Args,
  batch::BatchProcessor,
  checkpoint::{Checkpoint, CheckpointWatcher, WatchError},
  colormap::Colormap,
  config::{CheckpointSelection, EvalConfig},
  dataset::{ImageFolderDataset, Preprocessor},
  metrics::MetricsAggregator,
  model::{InferenceSession, OnnxLoader},
  output::{PredictionWriter, ResultOutputs},
  shutdown::Shutdown,
  task::{EvaluationTask, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let config = EvalConfig::try_from(args)?;

  let save_dir = config.save_dir();
  std::fs::create_dir_all(&save_dir)?;
  info!("结果目录: {}", save_dir.display());
  info!(
    "评估数据集 {} 的 {} 划分",
    config.dataset.dataset_dir.display(),
    config.dataset.split
  );
  if let Some(step) = config.inference.quantize_delay_step {
    warn!("量化延迟步数 {} 已导出到模型中，此处不再处理", step);
  }

  let shutdown = Shutdown::new();
  shutdown.install_ctrlc()?;

  let dataset = ImageFolderDataset::open(
    &config.dataset.dataset_dir,
    &config.dataset.split,
    Preprocessor::new(config.dataset.crop, config.dataset.resize),
    config.dataset.batch_size,
  )?;

  let colormap = config
    .metrics
    .with_colormap
    .then(|| Colormap::new(config.metrics.colormap_kind));
  let writer = PredictionWriter::new(&save_dir).with_colormap(colormap);
  let aggregator = MetricsAggregator::new(config.labels.clone(), config.metrics).with_writer(writer);
  let outputs = ResultOutputs::open(
    &save_dir,
    &config.labels,
    &config.metrics,
    config.output.delimiter,
  )?;
  let session = InferenceSession::new(OnnxLoader::new(config.inference.augment.clone()));
  let processor = BatchProcessor::new(config.resize_to_original());

  let checkpoints: Box<dyn Iterator<Item = Result<Checkpoint, WatchError>>> =
    match config.checkpoints {
      CheckpointSelection::Watch(source) => {
        info!("轮询检查点目录: {}", source.directory().display());
        Box::new(
          CheckpointWatcher::new(source, config.watch.min_interval)
            .with_max_iterations(config.watch.max_iterations)
            .with_timeout(config.watch.timeout)
            .with_max_poll_failures(config.watch.max_poll_failures)
            .with_shutdown(shutdown.clone()),
        )
      }
      CheckpointSelection::Single(path) => {
        info!("评估单个检查点: {}", path.display());
        Box::new(std::iter::once(Ok(Checkpoint { path, index: 1 })))
      }
    };

  EvaluationTask::new(dataset, processor, aggregator)
    .with_shutdown(shutdown)
    .run_task(checkpoints, session, outputs)?;

  Ok(())
}
