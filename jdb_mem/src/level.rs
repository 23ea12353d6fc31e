//! Random tower height 随机塔高

/// Random bit source owned by a skip list
/// 跳表持有的随机位来源
pub trait Coin {
  fn flip(&mut self) -> bool;
}

impl Coin for fastrand::Rng {
  #[inline]
  fn flip(&mut self) -> bool {
    self.bool()
  }
}

/// Top level index of a new node: starts at 1, +1 per heads, capped at `max_level`
/// 新节点最高层：从 1 开始，正面则加 1，上限 `max_level`
#[inline]
pub fn random_level<C: Coin + ?Sized>(coin: &mut C, max_level: usize) -> usize {
  let mut level = max_level.min(1);
  while level < max_level && coin.flip() {
    level += 1;
  }
  level
}
