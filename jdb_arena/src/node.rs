//! Skip list node record inside the arena
//! arena 内的跳表节点记录
//!
//! ```text
//! 0   val        AtomicU64  (size << 32 | offset)
//! 8   key_off    u32
//! 12  key_size   u16
//! 14  top        u16        highest level index
//! 16  score      f64 bits
//! 24  tower      [AtomicU32; top + 1]
//! ```

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::buf::Buf;

/// Maximum tower height (levels 0..48)
/// 最大塔高（层 0..48）
pub const MAX_HEIGHT: usize = 48;

/// Fixed part before the tower / 塔前的固定部分
pub const NODE_HEAD: usize = 24;

/// Largest possible node record / 最大节点记录
pub const MAX_NODE_SIZE: usize = NODE_HEAD + MAX_HEIGHT * OFFSET_SIZE;

pub(crate) const OFFSET_SIZE: usize = size_of::<u32>();
pub(crate) const NODE_ALIGN: u32 = 7;

const VAL: usize = 0;
const KEY_OFF: usize = 8;
const KEY_SIZE: usize = 12;
const TOP: usize = 14;
const SCORE: usize = 16;

/// Bytes to reserve for a node whose highest level is `top`
/// 最高层为 `top` 的节点所需字节
#[inline(always)]
pub(crate) const fn node_size(top: usize) -> usize {
  NODE_HEAD + (top + 1) * OFFSET_SIZE
}

#[inline(always)]
const fn pack(off: u32, size: u32) -> u64 {
  ((size as u64) << 32) | off as u64
}

/// Immutable part of a node written once before it is linked
/// 节点链接前一次性写入的不可变部分
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeHead {
  pub key_off: u32,
  pub key_size: u16,
  pub val_off: u32,
  pub val_size: u32,
  pub score: f64,
}

/// Handle to a node, valid while the arena view is held
/// 节点句柄，持有 arena 视图期间有效
#[derive(Clone, Copy)]
pub struct Node<'a> {
  buf: &'a Buf,
  off: u32,
}

impl<'a> Node<'a> {
  #[inline(always)]
  pub(crate) fn new(buf: &'a Buf, off: u32) -> Self {
    assert!(
      off != 0 && off as usize + NODE_HEAD <= buf.cap(),
      "node offset {off} out of arena {}",
      buf.cap()
    );
    assert_eq!(off & NODE_ALIGN, 0, "unaligned node {off}");
    Self { buf, off }
  }

  /// Write the head of a freshly reserved node, tower slots start null
  /// 写入新分配节点的头部，塔指针初始为空
  ///
  /// # Safety
  /// See [`crate::View::init_node`].
  pub(crate) unsafe fn init(buf: &'a Buf, off: u32, top: usize, head: &NodeHead) -> Self {
    assert!(top < MAX_HEIGHT, "node top {top} >= {MAX_HEIGHT}");
    assert!(off as usize + node_size(top) <= buf.cap());
    let node = Self::new(buf, off);
    unsafe {
      node.field::<u32>(KEY_OFF).write(head.key_off);
      node.field::<u16>(KEY_SIZE).write(head.key_size);
      node.field::<u16>(TOP).write(top as u16);
      node.field::<u64>(SCORE).write(head.score.to_bits());
    }
    node.val_cell().store(pack(head.val_off, head.val_size), Ordering::Relaxed);
    for level in 0..=top {
      node.slot(level).store(0, Ordering::Relaxed);
    }
    node
  }

  #[inline(always)]
  unsafe fn field<T>(&self, at: usize) -> *mut T {
    unsafe { self.buf.as_ptr().add(self.off as usize + at).cast::<T>() }
  }

  #[inline(always)]
  fn val_cell(&self) -> &'a AtomicU64 {
    unsafe { &*self.field::<u64>(VAL).cast::<AtomicU64>() }
  }

  #[inline(always)]
  fn slot(&self, level: usize) -> &'a AtomicU32 {
    let top = self.top();
    assert!(
      level <= top && self.off as usize + node_size(level) <= self.buf.cap(),
      "level {level} out of node {} top {top}",
      self.off
    );
    unsafe { &*self.field::<u32>(NODE_HEAD + level * OFFSET_SIZE).cast::<AtomicU32>() }
  }

  /// Arena offset of this node / 节点在 arena 中的偏移
  #[inline(always)]
  pub fn offset(&self) -> u32 {
    self.off
  }

  #[inline(always)]
  pub fn top(&self) -> usize {
    unsafe { self.field::<u16>(TOP).read() as usize }
  }

  #[inline(always)]
  pub fn score(&self) -> f64 {
    f64::from_bits(unsafe { self.field::<u64>(SCORE).read() })
  }

  #[inline]
  pub fn key(&self) -> &'a [u8] {
    let (off, size) = unsafe {
      (
        self.field::<u32>(KEY_OFF).read(),
        self.field::<u16>(KEY_SIZE).read(),
      )
    };
    crate::slice(self.buf, off, size as u32)
  }

  /// (offset, size) of the current encoded value
  /// 当前编码值的 (偏移, 大小)
  #[inline]
  pub fn val_pos(&self) -> (u32, u32) {
    let v = self.val_cell().load(Ordering::Acquire);
    (v as u32, (v >> 32) as u32)
  }

  #[inline]
  pub fn val(&self) -> &'a [u8] {
    let (off, size) = self.val_pos();
    crate::slice(self.buf, off, size)
  }

  /// Publish a new value, the bytes must already be written
  /// 发布新值，字节须已写入
  #[inline]
  pub fn set_val(&self, off: u32, size: u32) {
    self.val_cell().store(pack(off, size), Ordering::Release);
  }

  /// Forward pointer at `level`, 0 = none
  /// `level` 层的后继偏移，0 表示无
  #[inline(always)]
  pub fn next(&self, level: usize) -> u32 {
    self.slot(level).load(Ordering::Acquire)
  }

  #[inline(always)]
  pub fn set_next(&self, level: usize, off: u32) {
    self.slot(level).store(off, Ordering::Release);
  }

  /// Swap forward pointer if it still equals `cur`, returns the observed value on failure
  /// 若后继仍为 `cur` 则替换，失败时返回观察到的值
  #[inline]
  pub fn cas_next(&self, level: usize, cur: u32, new: u32) -> Result<(), u32> {
    self
      .slot(level)
      .compare_exchange(cur, new, Ordering::AcqRel, Ordering::Acquire)
      .map(|_| ())
  }
}

impl std::fmt::Debug for Node<'_> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Node")
      .field("off", &self.off)
      .field("top", &self.top())
      .field("score", &self.score())
      .finish()
  }
}
