use std::{
  collections::BTreeMap,
  sync::atomic::{AtomicBool, Ordering},
  thread,
};

use aok::{OK, Void};
use jdb_arena::{Arena, MAX_HEIGHT};
use jdb_mem::{
  Coin, DEFAULT_ARENA_SIZE, Entry, Error, MemConf, SkipList, random_level, score,
};
use log::info;
use proptest::prelude::*;

#[static_init::constructor(0)]
extern "C" fn _log_init() {
  log_init::init();
}

/// Replays a fixed sequence of flips / 按固定序列回放抛硬币结果
struct Script {
  li: Vec<bool>,
  pos: usize,
}

impl Script {
  fn new(li: &[bool]) -> Self {
    Self {
      li: li.to_vec(),
      pos: 0,
    }
  }
}

impl Coin for Script {
  fn flip(&mut self) -> bool {
    let b = self.li[self.pos % self.li.len()];
    self.pos += 1;
    b
  }
}

fn keys<C: Coin>(list: &SkipList<C>) -> Vec<Vec<u8>> {
  list.iter().map(|e| e.key.to_vec()).collect()
}

fn kv(i: usize) -> Entry {
  Entry::new(format!("key{i:06}"), format!("val{i}"))
}

#[test]
fn test_add_sorted() -> Void {
  let list = SkipList::new(1024);
  for k in ["a", "c", "b"] {
    list.add(&Entry::new(k, k))?;
  }
  assert_eq!(keys(&list), vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
  assert_eq!(list.len(), 3);
  assert_eq!(list.first().map(|e| e.key), Some(b"a"[..].into()));
  OK
}

#[test]
fn test_overwrite() -> Void {
  let list = SkipList::new(1024);
  list.add(&Entry::new("k", "v1"))?;
  let size = list.size();
  list.add(&Entry::new("k", "v2"))?;

  let e = list.search(b"k").unwrap();
  assert_eq!(&*e.val, b"v2");
  assert_eq!(list.len(), 1);
  // 覆盖只追加新值 Overwrite only appends the new value
  assert!(list.size() > size);
  assert_eq!(list.iter().count(), 1);
  OK
}

#[test]
fn test_search_missing() -> Void {
  let list = SkipList::new(1024);
  assert!(list.search(b"nope").is_none());
  assert!(list.is_empty());

  list.add(&Entry::new("b", "1"))?;
  assert!(list.search(b"a").is_none());
  assert!(list.search(b"c").is_none());
  assert!(list.search(b"b\0").is_none());
  assert!(list.contains(b"b"));
  OK
}

#[test]
fn test_meta_roundtrip() -> Void {
  let list = SkipList::new(1024);
  let e = Entry::new("k", "v").with_meta(7).with_expires_at(99);
  list.add(&e)?;
  assert_eq!(list.search(b"k"), Some(e));
  OK
}

/// 共享 8 字节前缀的键分值相同，需按字节排序
/// Keys sharing an 8-byte prefix share a score and fall back to bytes
#[test]
fn test_prefix_collision() -> Void {
  let list = SkipList::new(4096);
  let li: [&[u8]; 6] = [
    b"abcdefgh9",
    b"abcdefgh",
    b"abcdefgh10",
    b"abcdefgh1",
    b"abcdefg",
    b"abcdefgh\0",
  ];
  for (i, k) in li.iter().enumerate() {
    list.add(&Entry::new(k, i.to_string()))?;
  }
  assert_eq!(score(b"abcdefgh"), score(b"abcdefgh10"));

  let mut expect: Vec<Vec<u8>> = li.iter().map(|k| k.to_vec()).collect();
  expect.sort();
  assert_eq!(keys(&list), expect);

  for (i, k) in li.iter().enumerate() {
    assert_eq!(&*list.search(k).unwrap().val, i.to_string().as_bytes());
  }
  OK
}

#[test]
fn test_empty_key() -> Void {
  let list = SkipList::new(1024);
  list.add(&Entry::new("", "empty"))?;
  list.add(&Entry::new("\0", "nul"))?;
  assert_eq!(&*list.search(b"").unwrap().val, b"empty");
  assert_eq!(keys(&list), vec![b"".to_vec(), b"\0".to_vec()]);
  OK
}

#[test]
fn test_key_too_large() {
  let list = SkipList::new(1024);
  let key = vec![1u8; u16::MAX as usize + 1];
  let r = list.add(&Entry::new(&key, "v"));
  assert!(matches!(r, Err(Error::KeyTooLarge(n)) if n == key.len()));
  assert!(list.is_empty());

  let key = vec![1u8; u16::MAX as usize];
  assert!(list.add(&Entry::new(&key, "v")).is_ok());
  assert!(list.contains(&key));
}

#[test]
fn test_score() {
  assert_eq!(score(b""), 0.0);
  assert_eq!(score(&[1]), (1u64 << 56) as f64);
  assert_eq!(score(&[0, 0, 0, 0, 0, 0, 0, 1]), 1.0);
  assert!(score(b"a") < score(b"b"));
  assert!(score(b"ab") > score(b"a"));
  assert_eq!(score(b"abcdefgh"), score(b"abcdefghZZZ"));
}

#[test]
fn test_random_level() {
  assert_eq!(random_level(&mut Script::new(&[false]), 47), 1);
  assert_eq!(random_level(&mut Script::new(&[true, false]), 47), 2);
  assert_eq!(random_level(&mut Script::new(&[true]), 47), 47);
  assert_eq!(random_level(&mut Script::new(&[true]), 5), 5);
  // 单层跳表 Single level list
  assert_eq!(random_level(&mut Script::new(&[true]), 0), 0);
}

#[test]
fn test_scripted_heights() -> Void {
  // a: false -> 1; b: true, false -> 2; c: true x3 -> capped at 3
  let coin = Script::new(&[false, true, false, true, true, true]);
  let list = SkipList::with_arena(Arena::new(4096), 4, coin);
  assert_eq!(list.max_level(), 3);
  for k in ["a", "b", "c"] {
    list.add(&Entry::new(k, k))?;
  }
  // 覆盖不消耗硬币 Overwrite does not flip the coin
  list.add(&Entry::new("a", "again"))?;
  assert_eq!(list.height_histogram(), vec![0, 1, 1, 1]);
  OK
}

#[test]
fn test_height_distribution() -> Void {
  let n = 20_000;
  let list = SkipList::with_coin(DEFAULT_ARENA_SIZE >> 4, fastrand::Rng::with_seed(42));
  for i in 0..n {
    list.add(&kv(i))?;
  }
  let hist = list.height_histogram();
  assert_eq!(hist.len(), MAX_HEIGHT);
  assert_eq!(hist.iter().sum::<usize>(), n);
  assert_eq!(hist[0], 0);
  info!("height histogram {:?}", &hist[..12]);

  // at_least[l] = nodes with top >= l, should halve per level
  // at_least[l] 为最高层 >= l 的节点数，应逐层减半
  let at_least: Vec<usize> = (0..hist.len()).map(|l| hist[l..].iter().sum()).collect();
  assert_eq!(at_least[1], n);
  for l in 2..6 {
    let ratio = at_least[l] as f64 / at_least[l - 1] as f64;
    assert!((0.44..0.56).contains(&ratio), "level {l} ratio {ratio}");
  }
  OK
}

#[test]
fn test_single_level() -> Void {
  let conf = MemConf {
    arena_size: 1024,
    max_height: 1,
    ..MemConf::default()
  };
  let list = SkipList::with_conf(&conf);
  assert_eq!(list.max_level(), 0);
  for i in (0..100).rev() {
    list.add(&kv(i))?;
  }
  assert_eq!(list.height_histogram(), vec![100]);
  assert_eq!(keys(&list), (0..100).map(|i| kv(i).key.to_vec()).collect::<Vec<_>>());
  OK
}

#[test]
fn test_seek() -> Void {
  let list = SkipList::new(4096);
  for k in ["b", "d", "f"] {
    list.add(&Entry::new(k, k))?;
  }
  let from = |k: &[u8]| list.seek(k).map(|e| e.key.to_vec()).collect::<Vec<_>>();
  assert_eq!(from(b"a"), vec![b"b".to_vec(), b"d".to_vec(), b"f".to_vec()]);
  assert_eq!(from(b"d"), vec![b"d".to_vec(), b"f".to_vec()]);
  assert_eq!(from(b"e"), vec![b"f".to_vec()]);
  assert!(from(b"g").is_empty());
  OK
}

#[test]
fn test_arena_growth() -> Void {
  let list = SkipList::new(64);
  let cap = list.arena().cap();
  let n = 5000;
  for i in 0..n {
    list.add(&kv(i))?;
  }
  assert!(list.arena().cap() > cap);
  assert!(list.size() <= list.arena().cap());
  for i in 0..n {
    assert_eq!(list.search(&kv(i).key), Some(kv(i)));
  }
  assert_eq!(list.iter().count(), n);
  OK
}

#[test]
fn test_seal_filter() -> Void {
  let conf = MemConf::default().with_fp(1000, 0.01);
  assert_eq!(conf.bits_per_key, 10);

  let list = SkipList::new(1 << 16);
  for i in 0..1000 {
    list.add(&kv(i))?;
  }
  let filter = list.filter(conf.bits_per_key as usize);
  for e in list.iter() {
    assert!(filter.may_contain_key(&e.key));
  }
  let miss = (0..10_000)
    .filter(|i| filter.may_contain_key(format!("miss{i}").as_bytes()))
    .count();
  assert!(miss < 200, "false positives {miss}");

  list.close();
  OK
}

#[test]
fn test_conf_serde() -> Void {
  let conf = MemConf::default();
  assert_eq!(conf.max_level(), MAX_HEIGHT - 1);

  let json = serde_json::to_string(&conf)?;
  let back: MemConf = serde_json::from_str(&json)?;
  assert_eq!(back, conf);

  let part: MemConf = serde_json::from_str(r#"{"max_height":8}"#)?;
  assert_eq!(part.max_height, 8);
  assert_eq!(part.arena_size, DEFAULT_ARENA_SIZE);
  assert_eq!(part.max_level(), 7);

  let huge = MemConf {
    max_height: 200,
    ..conf
  };
  assert_eq!(huge.max_level(), MAX_HEIGHT - 1);
  OK
}

#[test]
fn test_error_display() {
  assert_eq!(Error::KeyTooLarge(70000).to_string(), "key too large: 70000");
  assert_eq!(Error::ValTooLarge(5).to_string(), "value too large: 5");
}

/// 单写者多读者 One writer, many readers
#[test]
fn test_concurrent_readers() -> Void {
  let list = SkipList::new(64);
  let done = AtomicBool::new(false);
  let n = 5000;

  thread::scope(|s| {
    for t in 0..4u64 {
      let (list, done) = (&list, &done);
      s.spawn(move || {
        let mut rng = fastrand::Rng::with_seed(t);
        while !done.load(Ordering::Acquire) {
          let i = rng.usize(0..n);
          if let Some(e) = list.search(&kv(i).key) {
            assert_eq!(e, kv(i));
          }
          let li = keys(list);
          assert!(li.windows(2).all(|w| w[0] < w[1]));
        }
      });
    }

    for i in 0..n {
      list.add(&kv(i)).unwrap();
    }
    done.store(true, Ordering::Release);
  });

  assert_eq!(list.len(), n);
  OK
}

/// 多写者并发插入 Concurrent writers
#[test]
fn test_concurrent_writers() -> Void {
  let list = SkipList::new(64);
  let n = 2000;

  thread::scope(|s| {
    for t in 0..4 {
      let list = &list;
      s.spawn(move || {
        // 交错写入不相交的键 Interleaved disjoint keys
        for i in (t..n).step_by(4) {
          list.add(&kv(i)).unwrap();
        }
        // 所有线程写同一组键 Every thread writes the same keys
        for i in 0..200 {
          list.add(&Entry::new(format!("shared{i:03}"), format!("t{t}"))).unwrap();
        }
      });
    }
  });

  assert_eq!(list.len(), n + 200);
  let li = keys(&list);
  assert_eq!(li.len(), n + 200);
  assert!(li.windows(2).all(|w| w[0] < w[1]));
  for i in 0..n {
    assert_eq!(list.search(&kv(i).key), Some(kv(i)));
  }
  for i in 0..200 {
    let e = list.search(format!("shared{i:03}").as_bytes()).unwrap();
    assert_eq!(e.val.len(), 2);
    assert_eq!(e.val[0], b't');
  }
  OK
}

#[test]
fn test_send_sync() {
  fn check<T: Send + Sync>() {}
  check::<SkipList>();
  check::<Arena>();
}

proptest! {
  #![proptest_config(ProptestConfig::with_cases(64))]

  /// 有序且读己之写 Sorted and read-your-writes
  #[test]
  fn prop_matches_btree(
    kvs in prop::collection::vec(
      (
        prop::collection::vec(any::<u8>(), 0..24),
        prop::collection::vec(any::<u8>(), 0..64),
      ),
      1..200,
    )
  ) {
    let list = SkipList::new(256);
    let mut expect = BTreeMap::new();
    for (k, v) in &kvs {
      list.add(&Entry::new(k, v)).unwrap();
      expect.insert(k.clone(), v.clone());
      let got = list.search(k).unwrap();
      prop_assert_eq!(&*got.val, &v[..]);
    }

    prop_assert_eq!(list.len(), expect.len());
    let got: Vec<(Vec<u8>, Vec<u8>)> = list.iter().map(|e| (e.key.to_vec(), e.val.to_vec())).collect();
    let want: Vec<(Vec<u8>, Vec<u8>)> = expect.into_iter().collect();
    prop_assert_eq!(got, want);
  }
}
