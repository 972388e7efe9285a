// 该文件是 Shanan （山南西风） 项目的一部分。
// src/args.rs - 命令行参数定义
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

use std::path::PathBuf;

use clap::{ArgAction, ArgGroup, Parser};
use url::Url;

use crate::colormap::ColormapKind;

/// 山南西风分割评估参数配置
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(group(
  ArgGroup::new("checkpoint_source")
    .required(true)
    .args(["checkpoints", "checkpoint_path"])
))]
pub struct Args {
  /// 检查点来源，例如 folder:///train/logdir?extension=onnx
  #[arg(long, value_name = "SOURCE")]
  pub checkpoints: Option<Url>,

  /// 只评估指定的单个检查点文件，不轮询
  #[arg(long, value_name = "FILE")]
  pub checkpoint_path: Option<PathBuf>,

  /// 数据集根目录
  #[arg(long, value_name = "DIR")]
  pub dataset_dir: PathBuf,

  /// 评估使用的数据集划分
  #[arg(long, default_value = "val", value_name = "SPLIT")]
  pub vis_split: String,

  /// 结果输出目录，预测图像与结果文件写在其下的 segmentation_results
  #[arg(long, value_name = "DIR")]
  pub vis_logdir: PathBuf,

  #[arg(long, default_value_t = 1, value_name = "SIZE")]
  pub vis_batch_size: usize,

  /// 模型输入裁剪尺寸 `高,宽`
  #[arg(long, default_value = "513,513", value_name = "H,W")]
  pub vis_crop_size: String,

  /// 两次检查点轮询之间的最短间隔（秒）
  #[arg(long, default_value_t = 300, value_name = "SECONDS")]
  pub eval_interval_secs: u64,

  /// 最多评估的检查点数量，0 表示不限制
  #[arg(long, default_value_t = 0, value_name = "COUNT")]
  pub max_number_of_iterations: usize,

  /// 超过该时间没有新检查点则结束
  #[arg(long, value_name = "SECONDS")]
  pub checkpoint_timeout_secs: Option<u64>,

  /// 检查点来源连续失败多少次视为不可达
  #[arg(long, default_value_t = 3, value_name = "COUNT")]
  pub max_poll_failures: usize,

  /// 多尺度评估的缩放系数，逗号分隔
  #[arg(
    long,
    value_delimiter = ',',
    default_value = "1.0",
    value_name = "SCALES"
  )]
  pub eval_scales: Vec<f64>,

  /// 多尺度评估时同时使用水平翻转的图像
  #[arg(long)]
  pub add_flipped_images: bool,

  /// 量化评估图的延迟步数，负数表示不使用量化
  #[arg(
    long,
    default_value_t = -1,
    allow_hyphen_values = true,
    value_name = "STEP"
  )]
  pub quantize_delay_step: i64,

  #[arg(long, value_name = "PIXELS")]
  pub min_resize_value: Option<u32>,

  #[arg(long, value_name = "PIXELS")]
  pub max_resize_value: Option<u32>,

  #[arg(long, value_name = "FACTOR")]
  pub resize_factor: Option<u32>,

  #[arg(long, value_enum, default_value_t = ColormapKind::Pascal)]
  pub colormap_type: ColormapKind,

  /// 类别名称，按类别索引顺序，逗号分隔
  #[arg(
    long,
    value_delimiter = ',',
    default_value = "background,rosette",
    value_name = "NAMES"
  )]
  pub label_names: Vec<String>,

  #[arg(long, action = ArgAction::Set, default_value_t = true, value_name = "BOOL")]
  pub with_colormap: bool,

  #[arg(long, action = ArgAction::Set, default_value_t = true, value_name = "BOOL")]
  pub with_region_properties: bool,

  #[arg(long, action = ArgAction::Set, default_value_t = true, value_name = "BOOL")]
  pub with_channel_statistics: bool,

  #[arg(long, action = ArgAction::Set, default_value_t = true, value_name = "BOOL")]
  pub with_saved_prediction: bool,

  /// 结果文件分隔符
  #[arg(long, default_value = " ", value_name = "CHAR")]
  pub delimiter: String,
}
