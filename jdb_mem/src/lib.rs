#![cfg_attr(docsrs, feature(doc_cfg))]

//! Arena skip list memtable
//! arena 跳表内存表
//!
//! Write with [`SkipList::add`], read with [`SkipList::search`], and on seal walk
//! [`SkipList::iter`] and build the segment filter with [`SkipList::filter`].
//! 用 [`SkipList::add`] 写入、[`SkipList::search`] 读取，封存时遍历
//! [`SkipList::iter`] 并用 [`SkipList::filter`] 构建段过滤器。

mod conf;
mod error;
mod iter;
mod level;
mod score;
mod skl;

pub use conf::{DEFAULT_ARENA_SIZE, MemConf};
pub use error::{Error, Result};
pub use iter::Iter;
pub use jdb_comm::Entry;
pub use jdb_filter::Filter;
pub use level::{Coin, random_level};
pub use score::score;
pub use skl::{MAX_VAL_SIZE, SkipList};
