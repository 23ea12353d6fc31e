#![cfg_attr(docsrs, feature(doc_cfg))]

//! Growable bump arena addressed by `u32` offsets
//! 以 `u32` 偏移寻址的可增长 bump 分配器
//!
//! Offset 0 is the null sentinel and is never handed out. Growth copies the
//! whole buffer, so an offset keeps addressing the same bytes forever.
//! 偏移 0 为空哨兵，永不分配。扩容整体拷贝，偏移永久指向相同字节。

mod buf;
mod node;

use std::{
  slice::{from_raw_parts, from_raw_parts_mut},
  sync::atomic::{AtomicU32, Ordering},
};

use parking_lot::{RwLock, RwLockReadGuard};

use buf::Buf;
pub use buf::{ALIGN, MIN_CAP};
pub use node::{MAX_HEIGHT, MAX_NODE_SIZE, NODE_HEAD, Node, NodeHead};
use node::{NODE_ALIGN, node_size};

/// Upper bound of a single growth step (1 GiB)
/// 单次扩容上限（1 GiB）
pub const MAX_GROW: usize = 1 << 30;

#[inline(always)]
fn slice(buf: &Buf, off: u32, size: u32) -> &[u8] {
  let end = off as usize + size as usize;
  assert!(end <= buf.cap(), "range {off}+{size} out of arena {}", buf.cap());
  unsafe { from_raw_parts(buf.as_ptr().add(off as usize), size as usize) }
}

/// Bump arena / bump 分配器
///
/// Reservation is a lock-free `fetch_add`. Every byte access holds a shared
/// guard, only growth takes the exclusive one. Never call an allocating method
/// while a [`View`] is alive on the same thread.
/// 预留为无锁 `fetch_add`。读写字节持共享锁，仅扩容持独占锁。
/// 同一线程持有 [`View`] 时不可调用分配方法。
pub struct Arena {
  n: AtomicU32,
  buf: RwLock<Buf>,
}

impl Arena {
  pub fn new(size: u32) -> Self {
    Self {
      n: AtomicU32::new(1),
      buf: RwLock::new(Buf::zeroed(size as usize)),
    }
  }

  /// Bytes consumed, including the null byte
  /// 已用字节（含空哨兵字节）
  #[inline]
  pub fn size(&self) -> usize {
    self.n.load(Ordering::Acquire) as usize
  }

  /// Current buffer length / 当前缓冲区长度
  #[inline]
  pub fn cap(&self) -> usize {
    self.buf.read().cap()
  }

  /// Reserve `size` bytes, returns the start offset
  /// 预留 `size` 字节，返回起始偏移
  pub fn alloc(&self, size: u32) -> u32 {
    let start = self.n.fetch_add(size, Ordering::AcqRel);
    let end = start as u64 + size as u64;
    assert!(
      end + MAX_NODE_SIZE as u64 <= u32::MAX as u64,
      "arena offset overflow: {start}+{size}"
    );
    // Keep room for a full node so nothing straddles a resize
    // 预留整节点空间，避免分配跨越扩容边界
    let need = end as usize + MAX_NODE_SIZE;
    if need > self.buf.read().cap() {
      self.grow(need, size as usize);
    }
    start
  }

  #[cold]
  fn grow(&self, need: usize, size: usize) {
    let mut buf = self.buf.write();
    // Another writer may have grown already
    // 其他写者可能已扩容
    while buf.cap() < need {
      let old = buf.cap();
      let add = old.min(MAX_GROW).max(size);
      buf.grow_to(old + add);
      log::debug!("arena grow {old} -> {}, need {need}", buf.cap());
    }
  }

  /// Reserve an 8-byte aligned node with levels `0..=top`
  /// 预留 8 字节对齐、层为 `0..=top` 的节点
  pub fn put_node(&self, top: usize) -> u32 {
    assert!(top < MAX_HEIGHT, "node top {top} >= {MAX_HEIGHT}");
    let size = node_size(top) as u32 + NODE_ALIGN;
    let off = self.alloc(size);
    (off + NODE_ALIGN) & !NODE_ALIGN
  }

  /// Copy key bytes in / 拷贝键
  #[inline]
  pub fn put_key(&self, key: &[u8]) -> u32 {
    self.put_bytes(key)
  }

  /// Copy an encoded value in / 拷贝编码后的值
  #[inline]
  pub fn put_val(&self, val: &[u8]) -> u32 {
    self.put_bytes(val)
  }

  /// Reserve `size` bytes and let `fill` encode into them
  /// 预留 `size` 字节并由 `fill` 编码写入
  pub fn put_val_with(&self, size: u32, fill: impl FnOnce(&mut [u8])) -> u32 {
    let off = self.alloc(size);
    let buf = self.buf.read();
    assert!(off as usize + size as usize <= buf.cap());
    // SAFETY: [off, off + size) was reserved by this call alone
    // [off, off + size) 仅由本次调用独占
    let dst = unsafe { from_raw_parts_mut(buf.as_ptr().add(off as usize), size as usize) };
    fill(dst);
    off
  }

  fn put_bytes(&self, data: &[u8]) -> u32 {
    let size = u32::try_from(data.len())
      .unwrap_or_else(|_| panic!("record too large: {}", data.len()));
    self.put_val_with(size, |dst| dst.copy_from_slice(data))
  }

  /// Copy `size` bytes at `off` out / 拷出 `off` 处 `size` 字节
  #[inline]
  pub fn get(&self, off: u32, size: u32) -> Box<[u8]> {
    self.view().bytes(off, size).into()
  }

  /// Shared view for reads and node linkage
  /// 用于读取与节点链接的共享视图
  #[inline]
  pub fn view(&self) -> View<'_> {
    View(self.buf.read())
  }
}

impl std::fmt::Debug for Arena {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Arena")
      .field("size", &self.size())
      .field("cap", &self.cap())
      .finish()
  }
}

/// Shared guard over the arena buffer, blocks growth while alive
/// arena 缓冲区的共享守卫，存活期间阻止扩容
pub struct View<'a>(RwLockReadGuard<'a, Buf>);

impl View<'_> {
  /// Node at `off`, `None` for the null offset
  /// `off` 处的节点，空偏移返回 `None`
  #[inline(always)]
  pub fn node(&self, off: u32) -> Option<Node<'_>> {
    if off == 0 {
      None
    } else {
      Some(Node::new(&self.0, off))
    }
  }

  /// Node at a non-null offset, panics on 0 or an unaligned offset
  /// 非空且对齐偏移处的节点，否则 panic
  #[inline(always)]
  pub fn at(&self, off: u32) -> Node<'_> {
    Node::new(&self.0, off)
  }

  /// Initialise a node reserved by [`Arena::put_node`] with the same `top`
  /// 初始化由 [`Arena::put_node`] 以相同 `top` 预留的节点
  ///
  /// # Safety
  /// `off` must come from [`Arena::put_node`] called with this `top`, and the
  /// node must not be reachable by any other thread yet. The head is written
  /// with plain stores.
  /// `off` 须来自以相同 `top` 调用的 [`Arena::put_node`]，且节点尚未对其他线程可见。
  #[inline]
  pub unsafe fn init_node(&self, off: u32, top: usize, head: &NodeHead) -> Node<'_> {
    unsafe { Node::init(&self.0, off, top, head) }
  }

  #[inline]
  pub fn bytes(&self, off: u32, size: u32) -> &[u8] {
    slice(&self.0, off, size)
  }
}
