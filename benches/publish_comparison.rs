use core::hint::black_box;

use criterion::AxisScale;
use criterion::BatchSize;
use criterion::Criterion;
use criterion::PlotConfiguration;
use criterion::Throughput;
use criterion::criterion_group;
use criterion::criterion_main;
use freeze_hash::HashMapBuilder;
use freeze_hash::HashSetBuilder;
use freeze_hash::ImmutableHashMap;
use freeze_hash::ImmutableHashSet;
use hashbrown::HashMap as HashbrownMap;
use hashbrown::HashSet as HashbrownSet;
use rand::SeedableRng;
use rand::TryRngCore;
use rand::rngs::OsRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;

const SIZES: [usize; 6] = [16, 128, 1024, 8192, 65536, 262144];

fn random_keys(count: usize) -> Vec<u64> {
    let mut rng = OsRng;
    (0..count)
        .map(|_| rng.try_next_u64().expect("os rng"))
        .collect()
}

fn group_for<'a>(
    c: &'a mut Criterion,
    name: &str,
) -> criterion::BenchmarkGroup<'a, criterion::measurement::WallTime> {
    let mut group = c.benchmark_group(name);
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));
    group
}

fn bench_collect(c: &mut Criterion) {
    let mut group = group_for(c, "collect_set");

    for &size in SIZES.iter() {
        let keys = random_keys(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("freeze_hash/{size}"), |b| {
            b.iter_batched(
                || keys.clone(),
                |keys| black_box(keys.into_iter().collect::<ImmutableHashSet<u64>>()),
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("hashbrown/{size}"), |b| {
            b.iter_batched(
                || keys.clone(),
                |keys| black_box(keys.into_iter().collect::<HashbrownSet<u64>>()),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_find_hit_miss(c: &mut Criterion) {
    let mut group = group_for(c, "find_hit_miss");

    for &size in SIZES.iter() {
        let keys = random_keys(size * 2);
        let present = &keys[..size];
        let mut probes: Vec<u64> = keys.clone();
        probes.shuffle(&mut SmallRng::from_os_rng());

        let ours: ImmutableHashSet<u64> = present.iter().copied().collect();
        let theirs: HashbrownSet<u64> = present.iter().copied().collect();

        group.throughput(Throughput::Elements(probes.len() as u64));

        group.bench_function(format!("freeze_hash/{size}"), |b| {
            b.iter(|| {
                let mut hits = 0usize;
                for probe in &probes {
                    hits += usize::from(ours.contains(probe));
                }
                black_box(hits)
            })
        });

        group.bench_function(format!("hashbrown/{size}"), |b| {
            b.iter(|| {
                let mut hits = 0usize;
                for probe in &probes {
                    hits += usize::from(theirs.contains(probe));
                }
                black_box(hits)
            })
        });
    }

    group.finish();
}

/// Snapshot after every batch of writes: `build()` against cloning a
/// hashbrown map.
fn bench_snapshot_workload(c: &mut Criterion) {
    let mut group = group_for(c, "snapshot_every_64_writes");

    for &size in SIZES[..5].iter() {
        let keys = random_keys(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("freeze_hash/{size}"), |b| {
            b.iter_batched(
                || keys.clone(),
                |keys| {
                    let mut builder = HashMapBuilder::new();
                    let mut snapshots: Vec<ImmutableHashMap<u64, u64>> = Vec::new();
                    for (i, key) in keys.into_iter().enumerate() {
                        builder.insert(key, i as u64).expect("insert");
                        if i % 64 == 63 {
                            snapshots.push(builder.build().expect("build"));
                        }
                    }
                    black_box(snapshots)
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("hashbrown/{size}"), |b| {
            b.iter_batched(
                || keys.clone(),
                |keys| {
                    let mut map = HashbrownMap::new();
                    let mut snapshots: Vec<HashbrownMap<u64, u64>> = Vec::new();
                    for (i, key) in keys.into_iter().enumerate() {
                        map.insert(key, i as u64);
                        if i % 64 == 63 {
                            snapshots.push(map.clone());
                        }
                    }
                    black_box(snapshots)
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_publish_only(c: &mut Criterion) {
    let mut group = group_for(c, "publish_without_writes");

    for &size in SIZES.iter() {
        let mut builder: HashSetBuilder<u64> = random_keys(size).into_iter().collect();

        group.bench_function(format!("freeze_hash/{size}"), |b| {
            b.iter(|| black_box(builder.build().expect("build")))
        });
    }

    group.finish();
}

fn bench_churn_after_publish(c: &mut Criterion) {
    let mut group = group_for(c, "remove_insert_after_publish");

    for &size in SIZES[..5].iter() {
        let keys = random_keys(size);
        let value: ImmutableHashSet<u64> = keys.iter().copied().collect();
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("freeze_hash/{size}"), |b| {
            b.iter_batched(
                || value.to_builder(),
                |mut builder| {
                    for key in &keys {
                        builder.remove(key).expect("remove");
                        builder.insert(*key).expect("insert");
                    }
                    black_box(builder.build().expect("build"))
                },
                BatchSize::SmallInput,
            )
        });

        let theirs: HashbrownSet<u64> = keys.iter().copied().collect();
        group.bench_function(format!("hashbrown/{size}"), |b| {
            b.iter_batched(
                || theirs.clone(),
                |mut set| {
                    for key in &keys {
                        set.remove(key);
                        set.insert(*key);
                    }
                    black_box(set)
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_collect,
    bench_find_hit_miss,
    bench_snapshot_workload,
    bench_publish_only,
    bench_churn_after_publish,
);

criterion_main!(benches);
