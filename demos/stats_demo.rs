use clap::Parser;
use freeze_hash::HashMapBuilder;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'c', long = "target_capacity", default_value_t = 1000)]
    target_capacity: usize,

    /// Percentage of entries removed after the table is filled.
    #[arg(short = 'r', long = "remove_percent", default_value_t = 25)]
    remove_percent: u64,
}

fn main() {
    let args = Args::parse();

    println!(
        "Creating HashMapBuilder with target capacity: {}",
        args.target_capacity
    );

    let mut builder: HashMapBuilder<u64, u64> =
        HashMapBuilder::with_capacity(args.target_capacity).expect("capacity");

    println!("Actual capacity: {}", builder.capacity());
    println!("Filling builder with u64 keys...");

    let num_values = builder.capacity() as u64;
    for key in 0..num_values {
        builder.try_add(key, key * 2).expect("fresh key");
    }
    let full = builder.build().expect("build");
    println!("Published {} entries", full.len());
    full.debug_stats().print();

    let removed = (0..num_values)
        .filter(|key| key % 100 < args.remove_percent)
        .filter(|key| builder.remove(key).expect("remove").is_some())
        .count();
    println!("Removed {removed} entries after publishing");
    builder.debug_stats().print();

    builder.trim_to_len().expect("trim");
    println!("After trim_to_len:");
    builder.debug_stats().print();

    let trimmed = builder.build().expect("build");
    println!(
        "Published snapshots: {} and {} entries, equal: {}",
        full.len(),
        trimmed.len(),
        full == trimmed
    );
}
