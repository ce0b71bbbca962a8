#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

use color_eyre::eyre;
use criterion::{black_box, Criterion};
use setcache::{
    cache::{replacement::mix, MainMemory, NextLevel, Prefetch, ReplacementPolicy},
    config, Cache, Command,
};

const TRACE_LEN: u64 = 100_000;

fn trace(num_blocks: u64) -> Vec<(Command, u64)> {
    (0..TRACE_LEN)
        .map(|i| {
            let r = mix(0x5eed, i, 0);
            let cmd = if r % 4 == 0 {
                Command::WRITE
            } else {
                Command::READ
            };
            (cmd, (r % num_blocks) * 64)
        })
        .collect()
}

fn l1_config(associativity: usize, policy: ReplacementPolicy) -> config::Cache {
    config::Cache {
        name: "dl1".to_string(),
        num_sets: 64,
        block_size: 64,
        associativity,
        replacement_policy: policy,
        ..config::Cache::default()
    }
}

pub fn run_single(config: config::Cache, trace: &[(Command, u64)]) -> eyre::Result<u64> {
    let mut cache = Cache::new(config, MainMemory::default())?;
    let mut cycles = 0;
    for (now, &(cmd, addr)) in trace.iter().enumerate() {
        cycles += cache.access(cmd, addr, 8, None, now as u64).latency;
    }
    Ok(cycles)
}

pub fn run_hierarchy(trace: &[(Command, u64)]) -> eyre::Result<u64> {
    let l2_config = config::Cache {
        name: "ul2".to_string(),
        num_sets: 1024,
        block_size: 64,
        associativity: 16,
        hit_latency: 6,
        prefetch: Prefetch::ON_MISS,
        ..config::Cache::default()
    };
    let l2 = Cache::new(l2_config, MainMemory::default())?;
    let l1_config = l1_config(4, ReplacementPolicy::LRU);
    let next = NextLevel::new(&l1_config, l2)?;
    let mut l1 = Cache::new(l1_config, next)?;
    let mut cycles = 0;
    for (now, &(cmd, addr)) in trace.iter().enumerate() {
        cycles += l1.access(cmd, addr, 8, None, now as u64).latency;
    }
    cycles += l1.flush(TRACE_LEN);
    Ok(cycles)
}

pub fn policy_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("policy");
    group.sample_size(20);
    let trace = trace(4096);

    for policy in [
        ReplacementPolicy::LRU,
        ReplacementPolicy::FIFO,
        ReplacementPolicy::RANDOM,
    ] {
        group.bench_function(format!("{policy}/4-way"), |b| {
            b.iter(|| run_single(black_box(l1_config(4, policy)), &trace).unwrap());
        });
    }
}

pub fn assoc_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("assoc");
    group.sample_size(20);
    let trace = trace(16 * 1024);

    for associativity in [4, 16, 64] {
        group.bench_function(format!("hashed/{associativity}-way"), |b| {
            b.iter(|| {
                run_single(
                    black_box(l1_config(associativity, ReplacementPolicy::LRU)),
                    &trace,
                )
                .unwrap()
            });
        });
        group.bench_function(format!("linear/{associativity}-way"), |b| {
            let config = config::Cache {
                hash_threshold: usize::MAX,
                ..l1_config(associativity, ReplacementPolicy::LRU)
            };
            b.iter(|| run_single(black_box(config.clone()), &trace).unwrap());
        });
    }
}

pub fn hierarchy_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("hierarchy");
    group.sample_size(10);
    group.sampling_mode(criterion::SamplingMode::Flat);
    let trace = trace(64 * 1024);

    group.bench_function("l1-l2-mem", |b| {
        b.iter(|| run_hierarchy(black_box(&trace)).unwrap());
    });
}

criterion::criterion_group!(
    benches,
    policy_benchmark,
    assoc_benchmark,
    hierarchy_benchmark
);
// criterion::criterion_main!(benches);

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    benches();
    criterion::Criterion::default()
        .configure_from_args()
        .final_summary();
    Ok(())
}
