//! Property-based tests for the table cache.
//!
//! # Properties Tested
//!
//! 1. **Mirror Property**: after any sequence of inserts and removals, the id
//!    index and the key index hold exactly the same instances
//! 2. **Counter Property**: N lookups through the engine always add up to
//!    `hits + misses == N`, and neither counter ever decreases
//! 3. **Single Fallback Property**: each distinct id is fetched at most once
//!    while its row stays live

use proptest::prelude::*;
use std::sync::Arc;
use table_cache::{CacheEntity, CacheStore, InMemorySession, TableCache, UnitOfWork};

#[derive(Debug, Clone)]
struct Genre {
    id: u8,
    name: String,
}

impl CacheEntity for Genre {
    type Id = u8;
    type Key = String;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn cache_key(&self) -> Self::Key {
        self.name.clone()
    }

    fn cache_prefix() -> &'static str {
        "genre"
    }
}

#[derive(Debug, Clone)]
enum Op {
    Insert(u8),
    Remove(u8),
    Clear,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..16).prop_map(Op::Insert),
        2 => (0u8..16).prop_map(Op::Remove),
        1 => Just(Op::Clear),
    ]
}

fn genre(id: u8) -> Genre {
    Genre {
        id,
        name: format!("genre-{}", id),
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("Failed to build runtime")
}

proptest! {
    #[test]
    fn prop_indices_stay_mirrored(ops in prop::collection::vec(op_strategy(), 0..64)) {
        let store: CacheStore<Genre> = CacheStore::new();

        for op in ops {
            match op {
                Op::Insert(id) => store.insert(Arc::new(genre(id))),
                Op::Remove(id) => {
                    store.remove(&genre(id));
                }
                Op::Clear => store.clear(),
            }

            let stats = store.stats();
            prop_assert_eq!(stats.ids, stats.keys);

            for id in 0u8..16 {
                let by_id = store.get_by_id(&id);
                let by_key = store.get_by_key(&genre(id).name);
                match (by_id, by_key) {
                    (Some(a), Some(b)) => prop_assert!(Arc::ptr_eq(&a, &b)),
                    (None, None) => {}
                    _ => prop_assert!(false, "indices disagree about genre {}", id),
                }
            }
        }
    }

    #[test]
    fn prop_counters_add_up(lookups in prop::collection::vec(0u8..24, 1..64)) {
        let mut session = InMemorySession::new();
        for id in 0u8..16 {
            session.add(genre(id));
        }
        let cache = TableCache::new();
        let rt = runtime();

        let mut last = (0, 0);
        for id in &lookups {
            rt.block_on(cache.by_id::<Genre, _>(&session, id))
                .expect("Failed to look up genre");

            let stats = cache.stats::<Genre>(session.context()).expect("stats");
            prop_assert!(stats.hits >= last.0);
            prop_assert!(stats.misses >= last.1);
            last = (stats.hits, stats.misses);
        }

        let stats = cache.stats::<Genre>(session.context()).expect("stats");
        prop_assert_eq!(stats.lookups(), lookups.len() as u64);

        // Ids 16.. do not exist: they miss every time and are never cached.
        let mut known: Vec<u8> = lookups.iter().copied().filter(|id| *id < 16).collect();
        known.sort_unstable();
        known.dedup();
        let unknown = lookups.iter().filter(|id| **id >= 16).count();
        prop_assert_eq!(session.fetch_count(), known.len() + unknown);
        prop_assert_eq!(stats.ids, known.len());
    }
}
