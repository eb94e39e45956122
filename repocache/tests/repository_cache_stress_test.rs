// Copyright 2025 repocache Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use rand::{rngs::SmallRng, Rng, SeedableRng};
use repocache::{Cache, CacheBuilder, EvictionConfig, FifoConfig, LruConfig, PathKey, ReferenceMode};

const THREADS: u64 = 8;
const SHARED_KEYS: u64 = 256;
const OWNED_KEYS: u64 = 64;
const ANCHORS: u64 = 32;
const OPS: usize = 50_000;
const TIME_BOUND: Duration = Duration::from_secs(120);

fn shared(n: u64) -> PathKey {
    PathKey::new(0, ["shared".to_string(), n.to_string()])
}

fn owned(thread: u64, n: u64) -> PathKey {
    PathKey::new(thread as i32 + 1, ["owned".to_string(), n.to_string()])
}

fn anchor(n: u64) -> PathKey {
    PathKey::new(-1, ["anchor".to_string(), n.to_string()])
}

/// Random operations on the shared key space, plus operations on thread owned keys checked against a local model.
fn worker(cache: Cache<PathKey, u64>, id: u64) {
    let mut rng = SmallRng::seed_from_u64(id);
    // Last written value and mode of every owned key.
    let mut model: HashMap<u64, (u64, ReferenceMode)> = HashMap::new();

    for op in 0..OPS {
        let value = rng.random::<u64>();

        let n = rng.random_range(0..SHARED_KEYS);
        match rng.random_range(0..6) {
            0 | 1 => {
                cache.get(&shared(n));
            }
            2 => cache.put(shared(n), value),
            3 => {
                cache.put_if_absent(shared(n), value);
            }
            4 => cache.hang(shared(n), value),
            _ => {
                cache.remove(&shared(n));
            }
        }

        let n = rng.random_range(0..OWNED_KEYS);
        let key = owned(id, n);
        match rng.random_range(0..5) {
            0 => {
                cache.put(key, value);
                model.insert(n, (value, ReferenceMode::Soft));
            }
            1 => {
                cache.hang(key, value);
                model.insert(n, (value, ReferenceMode::Pinned));
            }
            2 => {
                cache.remove(&key);
                model.remove(&n);
            }
            3 => {
                if cache.put_if_absent(key, value) {
                    model.insert(n, (value, ReferenceMode::Soft));
                }
            }
            _ => {}
        }

        let key = owned(id, n);
        match (cache.get(&key), model.get(&n)) {
            (Some(entry), Some((v, _))) => assert_eq!(*entry, *v, "lost update, op: {op}, key: {key:?}"),
            (None, Some((_, ReferenceMode::Pinned))) => panic!("pinned entry lost, op: {op}, key: {key:?}"),
            // Soft entries may be evicted or swept at any time.
            (None, Some((_, ReferenceMode::Soft))) => {
                model.remove(&n);
            }
            (Some(entry), None) => panic!("removed entry resurrected, op: {op}, entry: {entry:?}"),
            (None, None) => {}
        }
    }
}

fn stress(eviction_config: EvictionConfig) {
    let cache: Cache<PathKey, u64> = CacheBuilder::new(128)
        .with_shards(4)
        .with_eviction_config(eviction_config)
        .build()
        .unwrap();

    for n in 0..ANCHORS {
        cache.hang(anchor(n), n);
    }

    let stop = Arc::new(AtomicBool::new(false));
    let start = Instant::now();

    let sweeper = {
        let cache = cache.clone();
        let stop = stop.clone();
        thread::spawn(move || {
            let mut sweeps = 0;
            while !stop.load(Ordering::Relaxed) {
                cache.clear_soft_refs();
                sweeps += 1;
                thread::sleep(Duration::from_millis(1));
            }
            sweeps
        })
    };

    let workers = (0..THREADS)
        .map(|id| {
            let cache = cache.clone();
            thread::spawn(move || worker(cache, id))
        })
        .collect::<Vec<_>>();
    workers.into_iter().for_each(|handle| handle.join().unwrap());

    stop.store(true, Ordering::Relaxed);
    let sweeps = sweeper.join().unwrap();
    let elapsed = start.elapsed();
    tracing::info!(?elapsed, sweeps, "[stress]: done");

    assert!(elapsed < TIME_BOUND, "stress exceeded the time bound: {elapsed:?}");
    assert!(cache.usage() <= cache.capacity());
    for n in 0..ANCHORS {
        assert_eq!(*cache.get(&anchor(n)).unwrap(), n);
    }
}

#[test_log::test]
fn test_lru_stress() {
    stress(LruConfig::default().into());
}

#[test_log::test]
fn test_fifo_stress() {
    stress(FifoConfig::default().into());
}
