// 该文件是 Shanan （山南西风） 项目的一部分。
// src/config.rs - 评估配置与启动前校验
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

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::FromUrl;
use crate::args::Args;
use crate::checkpoint::{DirectoryCheckpoints, DirectoryCheckpointsError};
use crate::dataset::ResizeRange;
use crate::mask::{Extent, LabelVocabulary, VocabularyError};
use crate::metrics::MetricOptions;
use crate::model::ScaleAugment;

/// 预测图像与结果文件所在的子目录
pub const SAVE_FOLDER: &str = "segmentation_results";

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("批大小必须大于 0")]
  ZeroBatchSize,
  #[error("还原到原图尺寸时批大小必须为 1，当前为 {0}")]
  BatchWithResize(usize),
  #[error("量化评估不支持多尺度或翻转评估")]
  QuantizedMultiScale,
  #[error("缩放系数列表为空")]
  EmptyScales,
  #[error("无效的缩放系数: {0}")]
  InvalidScale(f64),
  #[error("无效的裁剪尺寸 '{0}'，应为 `高,宽`")]
  InvalidCropSize(String),
  #[error("min_resize_value 与 max_resize_value 需要同时设置")]
  PartialResizeRange,
  #[error("无效的缩放范围: min {min} / max {max}")]
  InvalidResizeRange { min: u32, max: u32 },
  #[error("无效的分隔符 {0:?}，应为单个 ASCII 字符且不能是引号或换行")]
  InvalidDelimiter(String),
  #[error("类别词表错误: {0}")]
  Labels(#[from] VocabularyError),
  #[error("检查点来源错误: {0}")]
  Checkpoints(#[from] DirectoryCheckpointsError),
  #[error("未指定检查点来源")]
  MissingCheckpointSource,
}

#[derive(Debug, Clone)]
pub enum CheckpointSelection {
  /// 持续轮询目录中的最新检查点
  Watch(DirectoryCheckpoints),
  /// 只评估一个固定的检查点
  Single(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
  pub min_interval: Duration,
  pub max_iterations: Option<NonZeroUsize>,
  pub timeout: Option<Duration>,
  pub max_poll_failures: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetConfig {
  pub dataset_dir: PathBuf,
  pub split: String,
  pub batch_size: NonZeroUsize,
  pub crop: Extent,
  pub resize: Option<ResizeRange>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InferenceConfig {
  pub augment: ScaleAugment,
  pub quantize_delay_step: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
  pub vis_logdir: PathBuf,
  pub delimiter: u8,
}

/// 一次评估运行的全部配置，构造完成后不再改变
#[derive(Debug, Clone)]
pub struct EvalConfig {
  pub checkpoints: CheckpointSelection,
  pub watch: WatchConfig,
  pub dataset: DatasetConfig,
  pub inference: InferenceConfig,
  pub output: OutputConfig,
  pub labels: LabelVocabulary,
  pub metrics: MetricOptions,
}

impl EvalConfig {
  /// 同时设置了最小与最大缩放值时，预测需要还原到原图尺寸
  pub fn resize_to_original(&self) -> bool {
    self.dataset.resize.is_some()
  }

  pub fn save_dir(&self) -> PathBuf {
    self.output.vis_logdir.join(SAVE_FOLDER)
  }
}

fn parse_crop_size(text: &str) -> Result<Extent, ConfigError> {
  let invalid = || ConfigError::InvalidCropSize(text.to_string());
  let parts = text
    .split(',')
    .map(|p| p.trim().parse::<usize>().map_err(|_| invalid()))
    .collect::<Result<Vec<_>, _>>()?;
  match parts.as_slice() {
    [height, width] if *height > 0 && *width > 0 => Ok(Extent::new(*height, *width)),
    _ => Err(invalid()),
  }
}

fn parse_delimiter(text: &str) -> Result<u8, ConfigError> {
  match text.as_bytes() {
    [byte] if byte.is_ascii() && !matches!(*byte, b'"' | b'\'' | b'\n' | b'\r') => Ok(*byte),
    _ => Err(ConfigError::InvalidDelimiter(text.to_string())),
  }
}

fn parse_resize(args: &Args) -> Result<Option<ResizeRange>, ConfigError> {
  match (args.min_resize_value, args.max_resize_value) {
    (None, None) => Ok(None),
    (Some(min), Some(max)) => {
      if min == 0 || min > max || args.resize_factor == Some(0) {
        return Err(ConfigError::InvalidResizeRange { min, max });
      }
      Ok(Some(ResizeRange {
        min,
        max,
        factor: args.resize_factor,
      }))
    }
    _ => Err(ConfigError::PartialResizeRange),
  }
}

impl TryFrom<Args> for EvalConfig {
  type Error = ConfigError;

  fn try_from(args: Args) -> Result<Self, Self::Error> {
    let batch_size = NonZeroUsize::new(args.vis_batch_size).ok_or(ConfigError::ZeroBatchSize)?;
    let crop = parse_crop_size(&args.vis_crop_size)?;
    let resize = parse_resize(&args)?;
    if resize.is_some() && batch_size.get() != 1 {
      return Err(ConfigError::BatchWithResize(batch_size.get()));
    }

    if args.eval_scales.is_empty() {
      return Err(ConfigError::EmptyScales);
    }
    if let Some(&scale) = args
      .eval_scales
      .iter()
      .find(|s| !s.is_finite() || **s <= 0.0)
    {
      return Err(ConfigError::InvalidScale(scale));
    }
    let augment = ScaleAugment::new(args.eval_scales.clone(), args.add_flipped_images);
    let quantize_delay_step = u64::try_from(args.quantize_delay_step).ok();
    if quantize_delay_step.is_some() && !augment.is_single_scale() {
      return Err(ConfigError::QuantizedMultiScale);
    }

    let delimiter = parse_delimiter(&args.delimiter)?;
    let labels = LabelVocabulary::new(args.label_names.iter().map(|s| s.trim()))?;

    let checkpoints = match (&args.checkpoints, &args.checkpoint_path) {
      (_, Some(path)) => CheckpointSelection::Single(path.clone()),
      (Some(url), None) => CheckpointSelection::Watch(DirectoryCheckpoints::from_url(url)?),
      (None, None) => return Err(ConfigError::MissingCheckpointSource),
    };

    Ok(EvalConfig {
      checkpoints,
      watch: WatchConfig {
        min_interval: Duration::from_secs(args.eval_interval_secs),
        max_iterations: NonZeroUsize::new(args.max_number_of_iterations),
        timeout: args.checkpoint_timeout_secs.map(Duration::from_secs),
        max_poll_failures: args.max_poll_failures.max(1),
      },
      dataset: DatasetConfig {
        dataset_dir: args.dataset_dir,
        split: args.vis_split,
        batch_size,
        crop,
        resize,
      },
      inference: InferenceConfig {
        augment,
        quantize_delay_step,
      },
      output: OutputConfig {
        vis_logdir: args.vis_logdir,
        delimiter,
      },
      labels,
      metrics: MetricOptions {
        with_colormap: args.with_colormap,
        with_region_properties: args.with_region_properties,
        with_channel_statistics: args.with_channel_statistics,
        with_saved_prediction: args.with_saved_prediction,
        colormap_kind: args.colormap_type,
      },
    })
  }
}
