//! Arena-backed skip list
//! 基于 arena 的跳表
//!
//! Nodes live in one [`Arena`] and point at each other by `u32` offset. Writes
//! splice every level with a compare-and-swap, so `add` is safe from any number
//! of threads and readers never block writers except across an arena growth.
//! 节点存于同一 [`Arena`]，以 `u32` 偏移互指。写入逐层 CAS 拼接，
//! 任意线程可并发 `add`，读者仅在 arena 扩容时与写者互斥。

use std::{
  cmp::Ordering::{Equal, Greater},
  sync::atomic::{self, AtomicUsize},
};

use jdb_arena::{Arena, MAX_HEIGHT, NodeHead, View};
use jdb_comm::{Entry, hash};
use jdb_filter::Filter;
use parking_lot::Mutex;

use crate::{
  Error, Iter, MemConf, Result,
  level::{Coin, random_level},
  score::{cmp, score},
};

/// Largest accepted encoded value (2GB)
/// 可接受的最大编码值（2GB）
pub const MAX_VAL_SIZE: usize = (u32::MAX >> 1) as usize;

type Tower = [u32; MAX_HEIGHT];

/// 跳表 Skip list
pub struct SkipList<C = fastrand::Rng> {
  arena: Arena,
  head: u32,
  max_level: usize,
  len: AtomicUsize,
  coin: Mutex<C>,
}

impl SkipList {
  /// Create with a fresh random source
  /// 使用新的随机源创建
  pub fn new(arena_size: u32) -> Self {
    Self::with_coin(arena_size, fastrand::Rng::new())
  }

  pub fn with_conf(conf: &MemConf) -> Self {
    Self::with_arena(
      Arena::new(conf.arena_size),
      conf.max_level() + 1,
      fastrand::Rng::new(),
    )
  }
}

impl<C: Coin> SkipList<C> {
  pub fn with_coin(arena_size: u32, coin: C) -> Self {
    Self::with_arena(Arena::new(arena_size), MAX_HEIGHT, coin)
  }

  /// Build over a caller supplied arena, `max_height` is clamped to 1..=48
  /// 基于调用方提供的 arena 构建，`max_height` 限定在 1..=48
  pub fn with_arena(arena: Arena, max_height: usize, coin: C) -> Self {
    let max_level = max_height.clamp(1, MAX_HEIGHT) - 1;
    let head = arena.put_node(max_level);
    // SAFETY: freshly reserved with the same top, not yet shared
    // 刚以相同 top 预留，尚未共享
    unsafe {
      arena.view().init_node(
        head,
        max_level,
        &NodeHead {
          key_off: 0,
          key_size: 0,
          val_off: 0,
          val_size: 0,
          score: 0.0,
        },
      );
    }
    log::trace!("skiplist head {head}, max level {max_level}, {arena:?}");
    Self {
      arena,
      head,
      max_level,
      len: AtomicUsize::new(0),
      coin: Mutex::new(coin),
    }
  }

  /// Insert, or overwrite the value when the key exists
  /// 插入；键已存在则覆盖值
  pub fn add(&self, entry: &Entry) -> Result<()> {
    let key = &entry.key[..];
    let key_size = u16::try_from(key.len()).map_err(|_| Error::KeyTooLarge(key.len()))?;
    let val_size = entry.encoded_size();
    if val_size > MAX_VAL_SIZE {
      return Err(Error::ValTooLarge(val_size));
    }
    let val_size = val_size as u32;
    let score = score(key);

    let mut prev: Tower = [0; MAX_HEIGHT];
    let mut next: Tower = [0; MAX_HEIGHT];
    if let Some(hit) = self.find_splice(score, key, &mut prev, &mut next) {
      let val_off = self.put_val(entry, val_size);
      self.arena.view().at(hit).set_val(val_off, val_size);
      return Ok(());
    }

    let top = random_level(&mut *self.coin.lock(), self.max_level);
    let key_off = self.arena.put_key(key);
    let val_off = self.put_val(entry, val_size);
    let off = self.arena.put_node(top);

    let view = self.arena.view();
    // SAFETY: reserved above with the same top, unlinked until the first CAS
    // 上面以相同 top 预留，首次 CAS 前未链接
    let node = unsafe {
      view.init_node(
        off,
        top,
        &NodeHead {
          key_off,
          key_size,
          val_off,
          val_size,
          score,
        },
      )
    };

    for level in 0..=top {
      loop {
        node.set_next(level, next[level]);
        if view
          .at(prev[level])
          .cas_next(level, next[level], off)
          .is_ok()
        {
          break;
        }
        // Lost a race, rescan this level from the old predecessor
        // 竞争失败，从原前驱重新扫描本层
        let (p, n) = find_level(&view, score, key, prev[level], level);
        if level == 0 && is_key(&view, n, score, key) {
          // Same key linked by another writer, publish our value on it
          // 其他写者已链接相同键，把本次的值发布到该节点
          view.at(n).set_val(val_off, val_size);
          return Ok(());
        }
        prev[level] = p;
        next[level] = n;
      }
    }

    self.len.fetch_add(1, atomic::Ordering::AcqRel);
    Ok(())
  }

  #[inline]
  fn put_val(&self, entry: &Entry, size: u32) -> u32 {
    self.arena.put_val_with(size, |dst| entry.encode_val(dst))
  }

  /// Top-down walk filling predecessors and successors per level.
  /// Returns the node holding `key` if it is already linked.
  /// 自顶向下遍历，记录每层前驱与后继；键已存在时返回其节点
  fn find_splice(&self, score: f64, key: &[u8], prev: &mut Tower, next: &mut Tower) -> Option<u32> {
    let view = self.arena.view();
    let mut x = self.head;
    for level in (0..=self.max_level).rev() {
      let (p, n) = find_level(&view, score, key, x, level);
      if is_key(&view, n, score, key) {
        return Some(n);
      }
      prev[level] = p;
      next[level] = n;
      x = p;
    }
    None
  }

  /// Look up `key` / 查找 `key`
  pub fn search(&self, key: &[u8]) -> Option<Entry> {
    let score = score(key);
    let view = self.arena.view();
    let mut x = self.head;
    for level in (0..=self.max_level).rev() {
      let (p, n) = find_level(&view, score, key, x, level);
      if is_key(&view, n, score, key) {
        let node = view.at(n);
        return Some(Entry::decode(node.key(), node.val()));
      }
      x = p;
    }
    None
  }

  #[inline]
  pub fn contains(&self, key: &[u8]) -> bool {
    self.search(key).is_some()
  }

  /// Iterator from the first entry `>= key`
  /// 从第一个 `>= key` 的条目开始的迭代器
  pub fn seek(&self, key: &[u8]) -> Iter<'_> {
    let score = score(key);
    let view = self.arena.view();
    let mut x = self.head;
    let mut n = 0;
    for level in (0..=self.max_level).rev() {
      (x, n) = find_level(&view, score, key, x, level);
    }
    Iter::new(&self.arena, n)
  }

  /// Ascending traversal of level 0 / 升序遍历第 0 层
  #[inline]
  pub fn iter(&self) -> Iter<'_> {
    Iter::new(&self.arena, self.arena.view().at(self.head).next(0))
  }

  #[inline]
  pub fn first(&self) -> Option<Entry> {
    self.iter().next()
  }

  /// Number of distinct keys / 不同键的数量
  #[inline]
  pub fn len(&self) -> usize {
    self.len.load(atomic::Ordering::Acquire)
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Arena bytes consumed, used to decide when to seal
  /// 已用 arena 字节，用于判断何时封存
  #[inline]
  pub fn size(&self) -> usize {
    self.arena.size()
  }

  #[inline]
  pub fn max_level(&self) -> usize {
    self.max_level
  }

  #[inline]
  pub fn arena(&self) -> &Arena {
    &self.arena
  }

  /// Nodes per top level, index = top level
  /// 各最高层的节点数，下标为最高层
  pub fn height_histogram(&self) -> Vec<usize> {
    let mut li = vec![0; self.max_level + 1];
    let view = self.arena.view();
    let mut off = view.at(self.head).next(0);
    while let Some(node) = view.node(off) {
      li[node.top()] += 1;
      off = node.next(0);
    }
    li
  }

  /// Bloom filter over every key in order, built when the list is sealed
  /// 按序对所有键构建布隆过滤器，封存时使用
  pub fn filter(&self, bits_per_key: usize) -> Filter {
    let mut li = Vec::with_capacity(self.len());
    {
      let view = self.arena.view();
      let mut off = view.at(self.head).next(0);
      while let Some(node) = view.node(off) {
        li.push(hash(node.key()));
        off = node.next(0);
      }
    }
    let filter = Filter::new(&li, bits_per_key);
    log::debug!(
      "seal {} keys, arena {} bytes, filter {} bytes",
      li.len(),
      self.size(),
      filter.len()
    );
    filter
  }

  /// Release the list and its arena / 释放跳表及其 arena
  #[inline]
  pub fn close(self) {}
}

/// Advance along `level` from `from` while the next node orders before `key`.
/// Returns (last node before key, first node not before key).
/// 沿 `level` 从 `from` 前进直到下一节点不小于 `key`，返回 (前驱, 后继)
#[inline]
fn find_level(view: &View, score: f64, key: &[u8], from: u32, level: usize) -> (u32, u32) {
  let mut p = from;
  loop {
    let n = view.at(p).next(level);
    match view.node(n) {
      Some(node) if cmp(score, key, &node) == Greater => p = n,
      _ => return (p, n),
    }
  }
}

#[inline(always)]
fn is_key(view: &View, off: u32, score: f64, key: &[u8]) -> bool {
  view.node(off).is_some_and(|node| cmp(score, key, &node) == Equal)
}

impl<C> std::fmt::Debug for SkipList<C> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SkipList")
      .field("len", &self.len.load(atomic::Ordering::Relaxed))
      .field("max_level", &self.max_level)
      .field("arena", &self.arena)
      .finish()
  }
}
