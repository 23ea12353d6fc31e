//! Zeroed 8-byte aligned region
//! 零初始化的 8 字节对齐内存区

use std::{
  alloc::{Layout, alloc_zeroed, dealloc, handle_alloc_error},
  ptr::{NonNull, copy_nonoverlapping},
};

/// Node records are 8-byte aligned, so the base must be too
/// 节点按 8 字节对齐，基址同样需要
pub const ALIGN: usize = 8;

/// Smallest region ever allocated / 最小分配尺寸
pub const MIN_CAP: usize = 64;

#[inline(always)]
fn layout(cap: usize) -> Layout {
  match Layout::from_size_align(cap, ALIGN) {
    Ok(lo) => lo,
    Err(e) => panic!("arena layout {cap}: {e}"),
  }
}

pub(crate) struct Buf {
  ptr: NonNull<u8>,
  cap: usize,
}

// SAFETY: every byte range is either reserved by exactly one writer or already
// published read-only; atomic fields are accessed through atomics only.
// 每段字节要么只被一个写者独占，要么已发布为只读；原子字段只经原子操作访问
unsafe impl Send for Buf {}
unsafe impl Sync for Buf {}

impl Buf {
  pub(crate) fn zeroed(cap: usize) -> Self {
    let cap = cap.max(MIN_CAP);
    let lo = layout(cap);
    let ptr = unsafe { alloc_zeroed(lo) };
    let ptr = NonNull::new(ptr).unwrap_or_else(|| handle_alloc_error(lo));
    Self { ptr, cap }
  }

  #[inline(always)]
  pub(crate) fn cap(&self) -> usize {
    self.cap
  }

  #[inline(always)]
  pub(crate) fn as_ptr(&self) -> *mut u8 {
    self.ptr.as_ptr()
  }

  /// Copy into a bigger region, old bytes keep their offsets
  /// 拷贝到更大的内存区，旧字节偏移不变
  pub(crate) fn grow_to(&mut self, cap: usize) {
    debug_assert!(cap > self.cap);
    let new = Self::zeroed(cap);
    unsafe { copy_nonoverlapping(self.ptr.as_ptr(), new.ptr.as_ptr(), self.cap) };
    *self = new;
  }
}

impl Drop for Buf {
  fn drop(&mut self) {
    unsafe { dealloc(self.ptr.as_ptr(), layout(self.cap)) }
  }
}
