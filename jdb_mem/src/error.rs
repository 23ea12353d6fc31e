//! Error types
//! 错误类型

use thiserror::Error;

/// 结果类型 Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Rejected writes, the list is left untouched
/// 被拒绝的写入，跳表保持不变
#[derive(Debug, Error)]
pub enum Error {
  /// Key longer than `u16::MAX`
  /// 键长超过 `u16::MAX`
  #[error("key too large: {0}")]
  KeyTooLarge(usize),

  /// Encoded value longer than [`crate::MAX_VAL_SIZE`]
  /// 编码值超过 [`crate::MAX_VAL_SIZE`]
  #[error("value too large: {0}")]
  ValTooLarge(usize),
}
