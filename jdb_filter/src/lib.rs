#![cfg_attr(docsrs, feature(doc_cfg))]

//! Bloom filter built once from a batch of key hashes
//! 由一批键哈希一次性构建的布隆过滤器
//!
//! Layout: bit array followed by one byte holding the number of hash rounds.
//! 布局：位数组，末尾一字节记录哈希轮数。

use std::f64::consts::LN_2;

use jdb_comm::hash;

/// Rounds above this mark a corrupt filter
/// 超过此值视为损坏
pub const MAX_ROUNDS: u8 = 30;

/// Smallest bit array / 最小位数组
pub const MIN_BITS: usize = 64;

/// Used when the target rate cannot be sized (~1% false positives)
/// 无法计算时使用（约 1% 误判）
pub const DEFAULT_BITS_PER_KEY: usize = 10;

/// Bits per key needed for false positive rate `fp`
/// 达到误判率 `fp` 所需的每键位数
pub fn bits_per_key(num_entries: usize, fp: f64) -> usize {
  if num_entries == 0 || !(fp > 0.0 && fp < 1.0) {
    return DEFAULT_BITS_PER_KEY;
  }
  (-fp.ln() / (LN_2 * LN_2)).ceil() as usize
}

/// Bit count of a `bytes` long array, `None` when it cannot be probed with `u32`
/// `bytes` 字节位数组的位数，超出 `u32` 时为 `None`
#[inline(always)]
fn bit_len(bytes: usize) -> Option<u32> {
  bytes
    .checked_mul(8)
    .and_then(|n| u32::try_from(n).ok())
    .filter(|&n| n != 0)
}

#[inline(always)]
fn rounds(bits_per_key: usize) -> u8 {
  ((bits_per_key as f64 * LN_2).round() as usize).clamp(1, MAX_ROUNDS as usize) as u8
}

/// 布隆过滤器 Bloom filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter(Box<[u8]>);

impl Filter {
  /// Build from key hashes (see [`jdb_comm::hash`])
  /// 从键哈希构建（见 [`jdb_comm::hash`]）
  pub fn new(hashes: &[u32], bits_per_key: usize) -> Self {
    let k = rounds(bits_per_key);
    let bytes = bits_per_key
      .saturating_mul(hashes.len())
      .max(MIN_BITS)
      .div_ceil(8);
    let bits = bit_len(bytes)
      .unwrap_or_else(|| panic!("filter too large: {bytes} bytes for {} keys", hashes.len()));

    let mut buf = vec![0u8; bytes + 1];
    for &h in hashes {
      let mut h = h;
      let delta = h.rotate_right(17);
      for _ in 0..k {
        let pos = h % bits;
        buf[(pos / 8) as usize] |= 1 << (pos % 8);
        h = h.wrapping_add(delta);
      }
    }
    buf[bytes] = k;
    Self(buf.into())
  }

  /// Build from raw keys / 从原始键构建
  pub fn from_keys<K: AsRef<[u8]>>(keys: impl IntoIterator<Item = K>, bits_per_key: usize) -> Self {
    let li: Vec<u32> = keys.into_iter().map(|k| hash(k.as_ref())).collect();
    Self::new(&li, bits_per_key)
  }

  /// `false` means definitely absent / `false` 表示一定不存在
  pub fn may_contain(&self, h: u32) -> bool {
    let f = &self.0;
    if f.len() < 2 {
      return false;
    }
    let k = f[f.len() - 1];
    // Unknown encoding, fail open
    // 未知编码，按可能存在处理
    if k > MAX_ROUNDS {
      return true;
    }

    let Some(bits) = bit_len(f.len() - 1) else {
      return true;
    };
    let delta = h.rotate_right(17);
    let mut h = h;
    for _ in 0..k {
      let pos = h % bits;
      if f[(pos / 8) as usize] & (1 << (pos % 8)) == 0 {
        return false;
      }
      h = h.wrapping_add(delta);
    }
    true
  }

  #[inline]
  pub fn may_contain_key(&self, key: &[u8]) -> bool {
    self.may_contain(hash(key))
  }

  /// Stored hash rounds, 0 for an empty filter
  /// 存储的哈希轮数，空过滤器为 0
  #[inline]
  pub fn hash_rounds(&self) -> u8 {
    if self.0.len() < 2 { 0 } else { self.0[self.0.len() - 1] }
  }

  /// 内存占用 Size in bytes
  #[inline]
  pub fn len(&self) -> usize {
    self.0.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.0.len() < 2
  }

  #[inline]
  pub fn as_bytes(&self) -> &[u8] {
    &self.0
  }
}

impl From<Box<[u8]>> for Filter {
  /// Load bytes written by an earlier build
  /// 加载先前构建写出的字节
  fn from(buf: Box<[u8]>) -> Self {
    if buf.len() >= 2 {
      let k = buf[buf.len() - 1];
      if k > MAX_ROUNDS {
        log::warn!("filter hash rounds {k} > {MAX_ROUNDS}, always may contain");
      } else if bit_len(buf.len() - 1).is_none() {
        log::warn!("filter {} bytes exceeds u32 bits, always may contain", buf.len());
      }
    }
    Self(buf)
  }
}

impl From<Vec<u8>> for Filter {
  #[inline]
  fn from(buf: Vec<u8>) -> Self {
    buf.into_boxed_slice().into()
  }
}

impl AsRef<[u8]> for Filter {
  #[inline]
  fn as_ref(&self) -> &[u8] {
    &self.0
  }
}
