#![cfg_attr(docsrs, feature(doc_cfg))]

//! Shared pieces of the memtable core
//! 内存表核心的公共部分

mod entry;
mod hash;

pub use entry::{Entry, VAL_HEAD};
pub use hash::{hash, now_sec};
