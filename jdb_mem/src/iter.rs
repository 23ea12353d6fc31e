//! Level 0 iterator
//! 第 0 层迭代器

use std::iter::FusedIterator;

use jdb_arena::Arena;
use jdb_comm::Entry;

/// Ascending iterator yielding owned entries.
/// Takes a short arena view per step, so growth is never blocked for long.
/// 升序迭代器，产出条目副本；每步短暂持有视图，不会长时间阻塞扩容
pub struct Iter<'a> {
  arena: &'a Arena,
  next: u32,
}

impl<'a> Iter<'a> {
  #[inline]
  pub(crate) fn new(arena: &'a Arena, next: u32) -> Self {
    Self { arena, next }
  }
}

impl Iterator for Iter<'_> {
  type Item = Entry;

  #[inline]
  fn next(&mut self) -> Option<Self::Item> {
    let view = self.arena.view();
    let node = view.node(self.next)?;
    self.next = node.next(0);
    Some(Entry::decode(node.key(), node.val()))
  }
}

impl FusedIterator for Iter<'_> {}
