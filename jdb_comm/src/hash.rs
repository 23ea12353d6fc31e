//! 哈希封装 Hash wrapper

/// Fixed seed, outputs are stable across runs
/// 固定种子，跨进程输出稳定
const SEED: u32 = 0xbc9f_1d34;
const M: u32 = 0xc6a4_a793;

/// Murmur 风格 32 位哈希 Murmur-style 32-bit hash
///
/// Not for security use. Feeds the bloom filter.
/// 非安全用途，用于布隆过滤器
#[inline]
pub fn hash(data: &[u8]) -> u32 {
  let mut h = SEED ^ (data.len() as u32).wrapping_mul(M);

  let mut words = data.chunks_exact(4);
  for w in &mut words {
    h = h.wrapping_add(u32::from_le_bytes([w[0], w[1], w[2], w[3]]));
    h = h.wrapping_mul(M);
    h ^= h >> 16;
  }

  let tail = words.remainder();
  if !tail.is_empty() {
    for (i, &b) in tail.iter().enumerate() {
      h = h.wrapping_add((b as u32) << (8 * i));
    }
    h = h.wrapping_mul(M);
    h ^= h >> 24;
  }
  h
}

/// 当前秒级时间戳 Current timestamp in seconds
#[inline]
pub fn now_sec() -> u64 {
  coarsetime::Clock::now_since_epoch().as_secs()
}
