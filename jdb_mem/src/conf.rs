//! Memtable configuration 内存表配置

use jdb_arena::MAX_HEIGHT;
use serde::{Deserialize, Serialize};

/// Default arena size 64MB / 默认 arena 大小
pub const DEFAULT_ARENA_SIZE: u32 = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemConf {
  /// Initial arena bytes 初始 arena 字节数
  pub arena_size: u32,
  /// Tower height cap, clamped to 1..=48 塔高上限
  pub max_height: u8,
  /// Filter density used on seal 封存时过滤器每键位数
  pub bits_per_key: u32,
}

impl Default for MemConf {
  fn default() -> Self {
    Self {
      arena_size: DEFAULT_ARENA_SIZE,
      max_height: MAX_HEIGHT as u8,
      bits_per_key: jdb_filter::DEFAULT_BITS_PER_KEY as u32,
    }
  }
}

impl MemConf {
  /// Size the filter for a target false positive rate
  /// 按目标误判率设定过滤器
  pub fn with_fp(mut self, num_entries: usize, fp: f64) -> Self {
    self.bits_per_key = jdb_filter::bits_per_key(num_entries, fp) as u32;
    self
  }

  /// Highest level index / 最高层下标
  #[inline]
  pub fn max_level(&self) -> usize {
    (self.max_height as usize).clamp(1, MAX_HEIGHT) - 1
  }
}
