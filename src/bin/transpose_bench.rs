//! Naive vs cache-blocked matrix transpose on a single pinned core
//!
//! Detects the L1d geometry, derives a block size from it, then times one
//! naive and one blocked out-of-place transpose of an `n x n` `i32` matrix,
//! followed by a sweep over fixed candidate block sizes.
use blocked_transpose_rs::affinity::OsScheduler;
use blocked_transpose_rs::cache::HardwareCpuid;
use blocked_transpose_rs::harness::{self, BenchConfig, DEFAULT_DIMENSION, Harness};
use clap::Parser;
use log::warn;

// use faster/smaller `mimalloc` allocator
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "transpose_bench")]
#[command(about = "Benchmark naive vs cache-blocked matrix transpose")]
struct Cli {
    /// Matrix dimension n (positive integer)
    #[arg(short = 'n', long = "size", value_name = "N", allow_hyphen_values = true)]
    size: Option<String>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let n = harness::resolve_dimension(cli.size.as_deref()).unwrap_or_else(|e| {
        warn!("{e}, using default dimension {DEFAULT_DIMENSION}");
        DEFAULT_DIMENSION
    });

    let config = BenchConfig {
        sizes: vec![n],
        ..BenchConfig::default()
    };
    let report = Harness::new(HardwareCpuid, OsScheduler, config).run();
    println!("{report}");
}
