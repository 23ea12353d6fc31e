//! Key score: first 8 bytes big-endian, widened to f64
//! 键分值：前 8 字节大端，转为 f64

use std::cmp::Ordering;

use jdb_arena::Node;

#[inline]
pub fn score(key: &[u8]) -> f64 {
  let mut h = 0u64;
  for (i, &b) in key.iter().take(8).enumerate() {
    h |= (b as u64) << (56 - 8 * i);
  }
  h as f64
}

/// Order `(score, key)` against a node, score first then raw bytes
/// 按 `(score, key)` 与节点比较，先比分值再比原始字节
#[inline(always)]
pub(crate) fn cmp(score: f64, key: &[u8], node: &Node) -> Ordering {
  match score.total_cmp(&node.score()) {
    Ordering::Equal => key.cmp(node.key()),
    o => o,
  }
}
