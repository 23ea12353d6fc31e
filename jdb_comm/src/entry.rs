//! Entry and its value codec
//! 条目及其值编解码

/// Value head: 1 (meta) + 8 (expires_at)
/// 值头：1 (meta) + 8 (expires_at)
pub const VAL_HEAD: usize = 9;

/// Key/value unit handed to and returned by the memtable
/// 写入内存表与从内存表返回的键值单元
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
  pub key: Box<[u8]>,
  pub val: Box<[u8]>,
  /// Opaque flag byte owned by the engine
  /// 引擎自定义的标志字节
  pub meta: u8,
  /// Expiry in seconds since epoch, 0 = never
  /// 过期时间（秒），0 表示永不过期
  pub expires_at: u64,
}

impl Entry {
  #[inline]
  pub fn new(key: impl AsRef<[u8]>, val: impl AsRef<[u8]>) -> Self {
    Self {
      key: key.as_ref().into(),
      val: val.as_ref().into(),
      meta: 0,
      expires_at: 0,
    }
  }

  #[inline]
  pub fn with_meta(mut self, meta: u8) -> Self {
    self.meta = meta;
    self
  }

  #[inline]
  pub fn with_expires_at(mut self, expires_at: u64) -> Self {
    self.expires_at = expires_at;
    self
  }

  /// Encoded value size / 编码后值大小
  #[inline]
  pub fn encoded_size(&self) -> usize {
    VAL_HEAD + self.val.len()
  }

  /// Encode value into `buf`, `buf.len()` must equal `encoded_size()`
  /// 将值编码到 `buf`，长度必须等于 `encoded_size()`
  #[inline]
  pub fn encode_val(&self, buf: &mut [u8]) {
    debug_assert_eq!(buf.len(), self.encoded_size());
    buf[0] = self.meta;
    buf[1..VAL_HEAD].copy_from_slice(&self.expires_at.to_le_bytes());
    buf[VAL_HEAD..].copy_from_slice(&self.val);
  }

  /// Rebuild from key and encoded value
  /// 从键与编码后的值重建
  pub fn decode(key: impl Into<Box<[u8]>>, buf: &[u8]) -> Self {
    assert!(buf.len() >= VAL_HEAD, "value shorter than head: {}", buf.len());
    let mut ts = [0u8; 8];
    ts.copy_from_slice(&buf[1..VAL_HEAD]);
    Self {
      key: key.into(),
      val: buf[VAL_HEAD..].into(),
      meta: buf[0],
      expires_at: u64::from_le_bytes(ts),
    }
  }

  #[inline]
  pub fn is_expired(&self, now: u64) -> bool {
    self.expires_at != 0 && self.expires_at <= now
  }
}
