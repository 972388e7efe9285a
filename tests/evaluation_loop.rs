// 该文件是 Shanan （山南西风） 项目的一部分。
// tests/evaluation_loop.rs - 评估主循环的端到端测试
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

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::{Rgb, RgbImage};
use ndarray::Array3;

use shanan_segeval::{
  batch::BatchProcessor,
  checkpoint::{Checkpoint, CheckpointWatcher, DirectoryCheckpoints, WatchError},
  colormap::{Colormap, ColormapKind},
  dataset::{Batch, ImageFolderDataset, Preprocessor},
  mask::{Extent, LabelVocabulary},
  metrics::{MetricOptions, MetricsAggregator},
  model::{InferenceSession, Model, ModelLoader},
  output::{METRICS_FILE_NAME, PredictionWriter, ResultOutputs, SUMMARY_FILE_NAME},
  shutdown::Shutdown,
  task::{EvaluationTask, Task},
};

#[derive(Debug, thiserror::Error)]
#[error("无法加载")]
struct LoadError;

/// 红色通道大于 200 的像素判为前景
struct Threshold;

impl Model for Threshold {
  type Error = LoadError;

  fn predict(&mut self, batch: &Batch) -> Result<Array3<u8>, Self::Error> {
    Ok(Array3::from_shape_fn(
      (batch.len(), batch.crop.height, batch.crop.width),
      |(n, y, x)| {
        let pixel = batch.samples[n].input.get_pixel(x as u32, y as u32);
        u8::from(pixel[0] > 200)
      },
    ))
  }
}

struct ThresholdLoader;

impl ModelLoader for ThresholdLoader {
  type Model = Threshold;
  type Error = LoadError;

  fn load(&self, _checkpoint: &Checkpoint) -> Result<Self::Model, Self::Error> {
    Ok(Threshold)
  }
}

const WHITE: Rgb<u8> = Rgb([255, 120, 60]);

fn write_dataset(root: &Path) {
  let split = root.join("val");
  std::fs::create_dir_all(&split).unwrap();

  let mut block = RgbImage::new(4, 4);
  for (x, y) in [(1, 1), (2, 1), (1, 2), (2, 2)] {
    block.put_pixel(x, y, WHITE);
  }
  block.save(split.join("block.png")).unwrap();

  let mut pair = RgbImage::new(3, 3);
  pair.put_pixel(0, 0, WHITE);
  pair.put_pixel(2, 2, WHITE);
  pair.save(split.join("pair.png")).unwrap();
}

struct Fixture {
  _dir: tempfile::TempDir,
  save_dir: PathBuf,
  task: EvaluationTask<ImageFolderDataset>,
  outputs: ResultOutputs,
}

fn fixture(shutdown: Shutdown) -> Fixture {
  let dir = tempfile::tempdir().unwrap();
  write_dataset(dir.path());
  let save_dir = dir.path().join("vis").join("segmentation_results");
  std::fs::create_dir_all(&save_dir).unwrap();

  let labels = LabelVocabulary::default();
  let options = MetricOptions::default();
  let dataset = ImageFolderDataset::open(
    dir.path(),
    "val",
    Preprocessor::new(Extent::new(8, 8), None),
    NonZeroUsize::MIN,
  )
  .unwrap();
  let writer =
    PredictionWriter::new(&save_dir).with_colormap(Some(Colormap::new(ColormapKind::Pascal)));
  let aggregator = MetricsAggregator::new(labels.clone(), options).with_writer(writer);
  let outputs = ResultOutputs::open(&save_dir, &labels, &options, b' ').unwrap();
  let task = EvaluationTask::new(dataset, BatchProcessor::new(false), aggregator)
    .with_shutdown(shutdown);

  Fixture {
    _dir: dir,
    save_dir,
    task,
    outputs,
  }
}

fn checkpoints(count: usize) -> Vec<Result<Checkpoint, WatchError>> {
  (1..=count)
    .map(|index| {
      Ok(Checkpoint {
        path: PathBuf::from(format!("model-{}.onnx", index)),
        index,
      })
    })
    .collect()
}

fn read_rows(path: &Path) -> Vec<HashMap<String, String>> {
  let mut reader = csv::ReaderBuilder::new()
    .delimiter(b' ')
    .from_path(path)
    .unwrap();
  let headers = reader.headers().unwrap().clone();
  reader
    .records()
    .map(|row| {
      let row = row.unwrap();
      headers
        .iter()
        .zip(row.iter())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    })
    .collect()
}

#[test]
fn every_checkpoint_evaluates_the_whole_split() {
  let Fixture {
    _dir,
    save_dir,
    task,
    outputs,
  } = fixture(Shutdown::new());
  let session = InferenceSession::new(ThresholdLoader);
  task
    .run_task(checkpoints(2).into_iter(), session, outputs)
    .unwrap();

  let summary = std::fs::read_to_string(save_dir.join(SUMMARY_FILE_NAME)).unwrap();
  let lines: Vec<&str> = summary.lines().collect();
  assert_eq!(lines.len(), 5);
  assert_eq!(lines[0], "file total_pixels background rosette");
  assert_eq!(lines[1], "block.png 16 12 4");
  assert_eq!(lines[2], "pair.png 9 7 2");
  assert_eq!(lines[3], lines[1]);

  let rows = read_rows(&save_dir.join(METRICS_FILE_NAME));
  assert_eq!(rows.len(), 4);

  let block = &rows[0];
  assert_eq!(block["file"], "block.png");
  assert_eq!(block["red_sum_within_mask"], "1020");
  assert_eq!(block["green_mean_within_mask"], "120");
  assert_eq!(block["blue_median_within_mask"], "60");
  let diameter: f64 = block["equivalent_diameter"].parse().unwrap();
  assert!((diameter - 2.2568).abs() < 1e-3);
  assert_eq!(block["convex_area"], "4");

  let pair = &rows[1];
  assert_eq!(pair["file"], "pair.png");
  for field in ["filled_area", "perimeter", "solidity", "eccentricity"] {
    assert_eq!(pair[field], "NA", "{}", field);
  }
  assert_eq!(pair["red_sum_within_mask"], "510");

  let saved = image::open(save_dir.join("block.png")).unwrap().to_rgb8();
  assert_eq!(saved.dimensions(), (4, 4));
  let palette = Colormap::new(ColormapKind::Pascal);
  assert_eq!(saved.get_pixel(1, 1).0, palette.color(1));
  assert_eq!(saved.get_pixel(0, 0).0, palette.color(0));
}

#[test]
fn unreachable_source_aborts_the_run() {
  let Fixture { task, outputs, .. } = fixture(Shutdown::new());
  let failing: Vec<Result<Checkpoint, WatchError>> = vec![Err(WatchError::Unreachable {
    attempts: 3,
    source: Box::new(std::io::Error::other("gone")),
  })];
  let err = task
    .run_task(failing.into_iter(), InferenceSession::new(ThresholdLoader), outputs)
    .unwrap_err();
  assert!(err.downcast_ref::<WatchError>().is_some());
}

#[test]
fn shutdown_stops_before_any_batch() {
  let shutdown = Shutdown::new();
  shutdown.trigger();
  let Fixture {
    _dir,
    save_dir,
    task,
    outputs,
  } = fixture(shutdown);
  task
    .run_task(
      checkpoints(3).into_iter(),
      InferenceSession::new(ThresholdLoader),
      outputs,
    )
    .unwrap();
  assert!(!save_dir.join(SUMMARY_FILE_NAME).exists());
}

#[test]
fn watched_directory_drives_the_loop() {
  let Fixture {
    _dir,
    save_dir,
    task,
    outputs,
  } = fixture(Shutdown::new());
  let checkpoint_dir = tempfile::tempdir().unwrap();
  std::fs::write(checkpoint_dir.path().join("model-1.onnx"), b"weights").unwrap();

  let watcher = CheckpointWatcher::new(
    DirectoryCheckpoints::new(checkpoint_dir.path(), "onnx"),
    Duration::from_millis(10),
  )
  .with_poll_interval(Duration::from_millis(1))
  .with_timeout(Some(Duration::from_millis(100)));
  task
    .run_task(watcher, InferenceSession::new(ThresholdLoader), outputs)
    .unwrap();

  // 同一检查点只评估一次
  let rows = read_rows(&save_dir.join(SUMMARY_FILE_NAME));
  assert_eq!(rows.len(), 2);
}
