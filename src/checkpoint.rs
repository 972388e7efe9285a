// 该文件是 Shanan （山南西风） 项目的一部分。
// src/checkpoint.rs - 检查点发现与轮询
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

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::shutdown::Shutdown;

mod directory;

pub use self::directory::{DirectoryCheckpoints, DirectoryCheckpointsError};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);
const DEFAULT_MAX_POLL_FAILURES: usize = 3;

/// 外部训练进程产生的模型快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
  pub path: PathBuf,
  /// 本次运行中的发现序号，从 1 开始
  pub index: usize,
}

/// 检查点来源，只读地报告当前最新的检查点
pub trait CheckpointSource {
  type Error: std::error::Error + Send + Sync + 'static;
  fn latest(&self) -> Result<Option<PathBuf>, Self::Error>;
}

#[derive(Error, Debug)]
pub enum WatchError {
  #[error("检查点来源连续 {attempts} 次不可达: {source}")]
  Unreachable {
    attempts: usize,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },
}

/// 检查点序列。
///
/// 每次等待只关注来源报告的最新检查点，两次轮询之间写出的中间检查点会被跳过；
/// 同一个路径在一次运行中只会产出一次。相邻两次等待的开始时刻至少间隔
/// `min_interval`，评估所花的时间也计入其中。
///
/// 序列在以下情况结束：已产出 `max_iterations` 个检查点、等待超过 `timeout`、
/// 收到停止信号，或来源连续失败后产出一次 [`WatchError::Unreachable`]。
pub struct CheckpointWatcher<S> {
  source: S,
  min_interval: Duration,
  poll_interval: Duration,
  max_iterations: Option<NonZeroUsize>,
  timeout: Option<Duration>,
  max_poll_failures: usize,
  shutdown: Shutdown,
  seen: HashSet<PathBuf>,
  emitted: usize,
  last_wait: Option<Instant>,
  finished: bool,
}

impl<S: CheckpointSource> CheckpointWatcher<S> {
  pub fn new(source: S, min_interval: Duration) -> Self {
    Self {
      source,
      min_interval,
      poll_interval: DEFAULT_POLL_INTERVAL,
      max_iterations: None,
      timeout: None,
      max_poll_failures: DEFAULT_MAX_POLL_FAILURES,
      shutdown: Shutdown::default(),
      seen: HashSet::new(),
      emitted: 0,
      last_wait: None,
      finished: false,
    }
  }

  /// `None` 表示不限制检查点数量
  pub fn with_max_iterations(mut self, max_iterations: Option<NonZeroUsize>) -> Self {
    self.max_iterations = max_iterations;
    self
  }

  pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
    self.poll_interval = poll_interval;
    self
  }

  pub fn with_max_poll_failures(mut self, max_poll_failures: usize) -> Self {
    self.max_poll_failures = max_poll_failures.max(1);
    self
  }

  pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
    self.shutdown = shutdown;
    self
  }

  pub fn emitted(&self) -> usize {
    self.emitted
  }

  fn effective_poll_interval(&self) -> Duration {
    self
      .poll_interval
      .min(self.min_interval)
      .max(MIN_POLL_INTERVAL)
  }

  fn finish(&mut self) -> Option<Result<Checkpoint, WatchError>> {
    self.finished = true;
    None
  }
}

impl<S: CheckpointSource> Iterator for CheckpointWatcher<S> {
  type Item = Result<Checkpoint, WatchError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.finished {
      return None;
    }
    if let Some(max) = self.max_iterations
      && self.emitted >= max.get()
    {
      info!("已评估 {} 个检查点，结束轮询", self.emitted);
      return self.finish();
    }

    if let Some(last) = self.last_wait {
      let elapsed = last.elapsed();
      if elapsed < self.min_interval {
        let pause = self.min_interval - elapsed;
        debug!("距离下一次检查点轮询还有 {:.2?}", pause);
        if !self.shutdown.sleep(pause) {
          return self.finish();
        }
      }
    }

    let wait_start = Instant::now();
    self.last_wait = Some(wait_start);
    let poll_interval = self.effective_poll_interval();
    let mut failures = 0;

    loop {
      if self.shutdown.is_triggered() {
        warn!("中断信号接收，停止轮询检查点");
        return self.finish();
      }

      match self.source.latest() {
        Ok(Some(path)) if !self.seen.contains(&path) => {
          self.seen.insert(path.clone());
          self.emitted += 1;
          info!("发现新检查点 #{}: {}", self.emitted, path.display());
          return Some(Ok(Checkpoint {
            path,
            index: self.emitted,
          }));
        }
        Ok(_) => failures = 0,
        Err(e) => {
          failures += 1;
          warn!(
            "读取检查点来源失败 ({}/{}): {}",
            failures, self.max_poll_failures, e
          );
          if failures >= self.max_poll_failures {
            self.finished = true;
            return Some(Err(WatchError::Unreachable {
              attempts: failures,
              source: Box::new(e),
            }));
          }
        }
      }

      let mut pause = poll_interval;
      if let Some(timeout) = self.timeout {
        let waited = wait_start.elapsed();
        if waited >= timeout {
          info!("等待新检查点超时 ({:.2?})，结束轮询", timeout);
          return self.finish();
        }
        pause = pause.min(timeout - waited);
      }
      if !self.shutdown.sleep(pause) {
        warn!("中断信号接收，停止轮询检查点");
        return self.finish();
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::VecDeque;
  use std::sync::Mutex;

  /// 按脚本依次返回结果，脚本用完后重复最后一个成功结果
  struct ScriptedSource {
    script: Mutex<VecDeque<Result<Option<&'static str>, &'static str>>>,
    last: Mutex<Option<&'static str>>,
  }

  impl ScriptedSource {
    fn new(script: Vec<Result<Option<&'static str>, &'static str>>) -> Self {
      Self {
        script: Mutex::new(script.into()),
        last: Mutex::new(None),
      }
    }
  }

  impl CheckpointSource for ScriptedSource {
    type Error = std::io::Error;

    fn latest(&self) -> Result<Option<PathBuf>, Self::Error> {
      let step = self.script.lock().unwrap().pop_front();
      let mut last = self.last.lock().unwrap();
      match step {
        Some(Ok(value)) => {
          *last = value;
          Ok(value.map(PathBuf::from))
        }
        Some(Err(message)) => Err(std::io::Error::other(message)),
        None => Ok(last.map(PathBuf::from)),
      }
    }
  }

  fn fast(source: ScriptedSource) -> CheckpointWatcher<ScriptedSource> {
    CheckpointWatcher::new(source, Duration::from_millis(5))
      .with_poll_interval(Duration::from_millis(1))
      .with_timeout(Some(Duration::from_millis(100)))
  }

  fn paths(items: Vec<Result<Checkpoint, WatchError>>) -> Vec<PathBuf> {
    items.into_iter().map(|c| c.unwrap().path).collect()
  }

  #[test]
  fn stops_after_max_iterations() {
    let source = ScriptedSource::new(vec![Ok(Some("a")), Ok(Some("b")), Ok(Some("c"))]);
    let watcher = fast(source).with_max_iterations(NonZeroUsize::new(2));
    let items: Vec<_> = watcher.collect();
    assert_eq!(paths(items), vec![PathBuf::from("a"), PathBuf::from("b")]);
  }

  #[test]
  fn never_emits_the_same_checkpoint_twice() {
    let source = ScriptedSource::new(vec![
      Ok(Some("a")),
      Ok(Some("a")),
      Ok(None),
      Ok(Some("a")),
      Ok(Some("b")),
    ]);
    let items: Vec<_> = fast(source).collect();
    assert_eq!(paths(items), vec![PathBuf::from("a"), PathBuf::from("b")]);
  }

  #[test]
  fn discovery_index_counts_from_one() {
    let source = ScriptedSource::new(vec![Ok(Some("a")), Ok(Some("b"))]);
    let items: Vec<_> = fast(source).map(|c| c.unwrap().index).collect();
    assert_eq!(items, vec![1, 2]);
  }

  #[test]
  fn persistent_failure_is_fatal() {
    let source = ScriptedSource::new(vec![Err("gone"), Err("gone"), Err("gone"), Ok(Some("a"))]);
    let mut watcher = fast(source).with_max_poll_failures(3);
    match watcher.next() {
      Some(Err(WatchError::Unreachable { attempts, .. })) => assert_eq!(attempts, 3),
      other => panic!("期望不可达错误，实际 {:?}", other.map(|r| r.map(|c| c.path))),
    }
    assert!(watcher.next().is_none());
  }

  #[test]
  fn transient_failures_are_retried() {
    let source = ScriptedSource::new(vec![
      Err("flaky"),
      Err("flaky"),
      Ok(Some("a")),
      Err("flaky"),
      Err("flaky"),
      Ok(Some("b")),
    ]);
    let items: Vec<_> = fast(source).with_max_poll_failures(3).collect();
    assert_eq!(paths(items), vec![PathBuf::from("a"), PathBuf::from("b")]);
  }

  #[test]
  fn timeout_ends_sequence_without_error() {
    let source = ScriptedSource::new(vec![]);
    let started = Instant::now();
    let items: Vec<_> = fast(source).collect();
    assert!(items.is_empty());
    assert!(started.elapsed() >= Duration::from_millis(100));
  }

  #[test]
  fn shutdown_ends_sequence() {
    let shutdown = Shutdown::new();
    shutdown.trigger();
    let source = ScriptedSource::new(vec![Ok(Some("a"))]);
    let mut watcher = fast(source).with_shutdown(shutdown);
    assert!(watcher.next().is_none());
  }

  #[test]
  fn waits_respect_min_interval() {
    let source = ScriptedSource::new(vec![Ok(Some("a")), Ok(Some("b"))]);
    let mut watcher = CheckpointWatcher::new(source, Duration::from_millis(80))
      .with_poll_interval(Duration::from_millis(1));
    let started = Instant::now();
    assert!(watcher.next().unwrap().is_ok());
    assert!(watcher.next().unwrap().is_ok());
    assert!(started.elapsed() >= Duration::from_millis(80));
  }
}
