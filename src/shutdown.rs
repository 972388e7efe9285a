// 该文件是 Shanan （山南西风） 项目的一部分。
// src/shutdown.rs - 中断信号
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

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

const SLEEP_SLICE: Duration = Duration::from_millis(100);
const FORCED_EXIT_AFTER: Duration = Duration::from_secs(30);

/// 可在线程间共享的停止标志。检查点等待与批处理循环都会查询它。
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
  pub fn new() -> Self {
    Self::default()
  }

  /// 安装 Ctrl-C 处理函数；收到信号后 30 秒仍未退出则强制结束进程
  pub fn install_ctrlc(&self) -> Result<(), ctrlc::Error> {
    let flag = self.clone();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      flag.trigger();
      thread::spawn(|| {
        thread::sleep(FORCED_EXIT_AFTER);
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })
  }

  pub fn trigger(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_triggered(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }

  /// 分片休眠。返回 `false` 表示休眠期间收到了停止信号。
  pub fn sleep(&self, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    loop {
      if self.is_triggered() {
        return false;
      }
      let now = Instant::now();
      if now >= deadline {
        return true;
      }
      thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
  }
}
