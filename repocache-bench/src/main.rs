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

//! Multi-thread contention bench for the repository cache.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use anyhow::anyhow;
use clap::Parser;
use itertools::Itertools;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use repocache::{Cache, CacheBuilder, Error, ErrorKind, EvictionConfig, FifoConfig, LruConfig, PathKey};

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Command line arguments of the bench.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// Worker thread count.
    #[arg(long, default_value_t = 8)]
    threads: usize,

    /// Key space of the workload.
    #[arg(long, default_value_t = 10000)]
    keys: u64,

    /// Operations per worker thread.
    #[arg(long, default_value_t = 1_000_000)]
    ops: usize,

    /// In-memory cache shards.
    #[arg(long, default_value_t = 8)]
    shards: usize,

    /// Soft entry capacity.
    #[arg(long, default_value_t = 4096)]
    capacity: usize,

    /// Eviction algorithm of the soft entries. (lru | fifo)
    #[arg(long, default_value = "lru", value_parser = parse_eviction)]
    eviction: EvictionConfig,

    /// Interval between `clear_soft_refs` calls, 0 disables the sweeper. (ms)
    #[arg(long, default_value_t = 100)]
    sweep_interval: u64,

    /// Pinned entries installed before the workload and verified after it.
    #[arg(long, default_value_t = 256)]
    anchors: u64,

    /// Time bound of the workload. (s)
    #[arg(short, long, default_value_t = 60)]
    time: u64,

    /// Seed of the per-thread random generators.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Print prometheus metrics after the bench.
    #[cfg(feature = "prometheus")]
    #[arg(long, default_value_t = false)]
    metrics: bool,
}

fn parse_eviction(s: &str) -> repocache::Result<EvictionConfig> {
    match s {
        "lru" => Ok(LruConfig::default().into()),
        "fifo" => Ok(FifoConfig::default().into()),
        _ => Err(Error::new(ErrorKind::Parse, "unsupported eviction algorithm").with_context("value", s)),
    }
}

#[derive(Debug, Default)]
struct Stats {
    ops: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    puts: AtomicU64,
    put_if_absent_wins: AtomicU64,
    hangs: AtomicU64,
    removes: AtomicU64,
    sweeps: AtomicU64,
}

fn key(n: u64) -> PathKey {
    PathKey::new((n % 16) as i32, ["bench".to_string(), n.to_string()])
}

fn anchor(n: u64) -> PathKey {
    PathKey::new(-1, ["anchor".to_string(), n.to_string()])
}

fn work(id: usize, args: &Args, cache: &Cache<PathKey, u64>, stats: &Stats, stop: &AtomicBool) {
    let mut rng = SmallRng::seed_from_u64(args.seed.wrapping_add(id as u64));

    for _ in 0..args.ops {
        if stop.load(Ordering::Relaxed) {
            return;
        }

        let n = rng.random_range(0..args.keys);
        match rng.random_range(0..100) {
            0..50 => match cache.get(&key(n)) {
                Some(entry) => {
                    assert_eq!(*entry, n, "value mismatch, key: {:?}", entry.key());
                    stats.hits.fetch_add(1, Ordering::Relaxed);
                }
                None => {
                    stats.misses.fetch_add(1, Ordering::Relaxed);
                    if cache.put_if_absent(key(n), n) {
                        stats.put_if_absent_wins.fetch_add(1, Ordering::Relaxed);
                    }
                }
            },
            50..75 => {
                cache.put(key(n), n);
                stats.puts.fetch_add(1, Ordering::Relaxed);
            }
            75..85 => {
                if cache.put_if_absent(key(n), n) {
                    stats.put_if_absent_wins.fetch_add(1, Ordering::Relaxed);
                }
            }
            85..90 => {
                cache.hang(key(n), n);
                stats.hangs.fetch_add(1, Ordering::Relaxed);
            }
            _ => {
                cache.remove(&key(n));
                stats.removes.fetch_add(1, Ordering::Relaxed);
            }
        }
        stats.ops.fetch_add(1, Ordering::Relaxed);
    }
}

fn sweep(interval: Duration, cache: &Cache<PathKey, u64>, stats: &Stats, stop: &AtomicBool) {
    while !stop.load(Ordering::Relaxed) {
        thread::sleep(interval);
        cache.clear_soft_refs();
        stats.sweeps.fetch_add(1, Ordering::Relaxed);
    }
}

fn init_logger() {
    use tracing_subscriber::{prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_line_number(true))
        .with(EnvFilter::from_default_env())
        .init();
}

#[cfg(feature = "deadlock")]
fn detect_deadlock() {
    thread::spawn(move || loop {
        thread::sleep(Duration::from_secs(1));
        let deadlocks = parking_lot::deadlock::check_deadlock();
        if deadlocks.is_empty() {
            continue;
        }

        println!("{} deadlocks detected", deadlocks.len());
        for (i, threads) in deadlocks.iter().enumerate() {
            println!("Deadlock #{}", i);
            for t in threads {
                println!("Thread Id {:#?}", t.thread_id());
                println!("{:#?}", t.backtrace());
            }
        }
        panic!()
    });
}

fn main() -> anyhow::Result<()> {
    init_logger();

    #[cfg(feature = "deadlock")]
    detect_deadlock();

    let args = Args::parse();
    println!("{:#?}", args);
    if args.keys == 0 {
        return Err(Error::invalid_config("keys", args.keys, "key space must not be empty").into());
    }

    let builder = CacheBuilder::new(args.capacity)
        .with_name("bench")
        .with_shards(args.shards)
        .with_eviction_config(args.eviction.clone());

    #[cfg(feature = "prometheus")]
    let registry = prometheus::Registry::new();
    #[cfg(feature = "prometheus")]
    let builder =
        builder.with_metrics_registry(repocache::PrometheusMetricsRegistry::new(registry.clone()));

    let cache: Cache<PathKey, u64> = builder.build()?;

    for n in 0..args.anchors {
        cache.hang(anchor(n), n);
    }

    let stats = Arc::new(Stats::default());
    let stop = Arc::new(AtomicBool::new(false));
    let start = Instant::now();

    let workers: Vec<JoinHandle<()>> = (0..args.threads)
        .map(|id| {
            let (args, cache, stats, stop) = (args.clone(), cache.clone(), stats.clone(), stop.clone());
            thread::spawn(move || work(id, &args, &cache, &stats, &stop))
        })
        .collect_vec();

    let sweeper = (args.sweep_interval > 0).then(|| {
        let (cache, stats, stop) = (cache.clone(), stats.clone(), stop.clone());
        let interval = Duration::from_millis(args.sweep_interval);
        thread::spawn(move || sweep(interval, &cache, &stats, &stop))
    });

    let deadline = start + Duration::from_secs(args.time);
    let mut last = (Instant::now(), 0);
    while !workers.iter().all(|handle| handle.is_finished()) {
        if Instant::now() >= deadline {
            stop.store(true, Ordering::Relaxed);
            return Err(anyhow!(
                "bench exceeded the time bound of {}",
                humantime::format_duration(Duration::from_secs(args.time))
            ));
        }
        thread::sleep(Duration::from_millis(10));

        if last.0.elapsed() >= REPORT_INTERVAL {
            let ops = stats.ops.load(Ordering::Relaxed);
            let ops_per_sec = (ops - last.1) as f64 / last.0.elapsed().as_secs_f64();
            tracing::info!(
                ops,
                ops_per_sec = ops_per_sec as u64,
                len = cache.len(),
                usage = cache.usage(),
                pinned = cache.pinned(),
                "[bench]: progress"
            );
            last = (Instant::now(), ops);
        }
    }

    for handle in workers {
        handle.join().map_err(|_| anyhow!("bench worker panicked"))?;
    }
    stop.store(true, Ordering::Relaxed);
    if let Some(handle) = sweeper {
        handle.join().map_err(|_| anyhow!("bench sweeper panicked"))?;
    }
    let elapsed = start.elapsed();

    let lost = (0..args.anchors)
        .filter(|n| cache.get(&anchor(*n)).is_none_or(|entry| *entry != *n))
        .count();

    let ops = stats.ops.load(Ordering::Relaxed);
    println!();
    println!("elapsed:             {}", humantime::format_duration(elapsed));
    println!("ops:                 {ops}");
    println!("ops/s:               {:.0}", ops as f64 / elapsed.as_secs_f64());
    println!("hits:                {}", stats.hits.load(Ordering::Relaxed));
    println!("misses:              {}", stats.misses.load(Ordering::Relaxed));
    println!("puts:                {}", stats.puts.load(Ordering::Relaxed));
    println!("put_if_absent wins:  {}", stats.put_if_absent_wins.load(Ordering::Relaxed));
    println!("hangs:               {}", stats.hangs.load(Ordering::Relaxed));
    println!("removes:             {}", stats.removes.load(Ordering::Relaxed));
    println!("sweeps:              {}", stats.sweeps.load(Ordering::Relaxed));
    println!("entries:             {}", cache.len());
    println!("usage / capacity:    {} / {}", cache.usage(), cache.capacity());
    println!("pinned:              {}", cache.pinned());

    #[cfg(feature = "prometheus")]
    if args.metrics {
        use prometheus::{Encoder, TextEncoder};

        let mut buf = vec![];
        TextEncoder::new().encode(&registry.gather(), &mut buf)?;
        println!("\n{}", String::from_utf8(buf)?);
    }

    if lost > 0 {
        return Err(anyhow!("{lost} pinned entries lost"));
    }
    Ok(())
}
