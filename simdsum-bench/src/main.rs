//! simdsum - summation throughput across SIMD tiers.
//!
//! Sums a large buffer of random `i32`, `f32` or `f64` values with every
//! variant the CPU can run, from the scalar baseline up to AVX, and prints
//! one line per variant:
//!
//! ```text
//! sumfloat_avx_4loop:	12034 M/s	129 ms //12912384
//! ```
//!
//! Defaults come from `SIMDSUM_*` environment variables (see
//! [`simdsum_core::BenchConfig::from_env`]); flags override them.

mod harness;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use simdsum_core::{print_caps, BenchConfig, ElementFamily, SimdTier, SplitMix64};
use simdsum_kernels::{Dispatcher, Reducible};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Benchmark SIMD summation kernels
#[derive(Parser, Debug)]
#[command(name = "simdsum")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Element family to benchmark
    #[arg(long, value_enum, default_value_t = FamilyArg::All)]
    family: FamilyArg,

    /// Repetitions per variant
    #[arg(long)]
    loops: Option<usize>,

    /// Element count (all families)
    #[arg(long)]
    len: Option<usize>,

    /// PRNG seed for the buffer contents
    #[arg(long)]
    seed: Option<u64>,

    /// Highest tier to dispatch (none, mmx, sse, avx)
    #[arg(long)]
    max_tier: Option<SimdTier>,

    /// Print detected CPU capabilities and exit
    #[arg(long)]
    caps: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FamilyArg {
    Int,
    Float,
    Double,
    All,
}

impl FamilyArg {
    fn families(self) -> &'static [ElementFamily] {
        match self {
            FamilyArg::Int => &[ElementFamily::Int32],
            FamilyArg::Float => &[ElementFamily::Float32],
            FamilyArg::Double => &[ElementFamily::Float64],
            FamilyArg::All => &ElementFamily::ALL,
        }
    }
}

impl Cli {
    /// Environment config with flags applied on top.
    fn config(&self) -> BenchConfig {
        let mut cfg = BenchConfig::from_env();
        if let Some(loops) = self.loops {
            cfg.loops = loops;
        }
        if let Some(len) = self.len {
            cfg.set_len(len);
        }
        if self.seed.is_some() {
            cfg.seed = self.seed;
        }
        if self.max_tier.is_some() {
            cfg.max_tier = self.max_tier;
        }
        cfg
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let rust_log = std::env::var("RUST_LOG").ok();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(log_filter(cli.verbose, rust_log.as_deref()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if cli.caps {
        print_caps();
        return Ok(());
    }

    let cfg = cli.config();
    let seed = cfg.seed.unwrap_or_else(clock_seed);
    tracing::debug!(?cfg, seed, "configuration");

    let mut dispatcher = Dispatcher::detect();
    if let Some(tier) = cfg.max_tier {
        dispatcher = dispatcher.with_ceiling(tier);
    }

    let mut rng = SplitMix64::new(seed);
    for (i, &family) in cli.family.families().iter().enumerate() {
        if i > 0 {
            println!();
        }
        print_banner(family);
        match family {
            ElementFamily::Int32 => report::<i32>(&dispatcher, &cfg, &mut rng)?,
            ElementFamily::Float32 => report::<f32>(&dispatcher, &cfg, &mut rng)?,
            ElementFamily::Float64 => report::<f64>(&dispatcher, &cfg, &mut rng)?,
        }
    }

    Ok(())
}

/// `RUST_LOG` directives when set and valid, else `info` (`debug` with `--verbose`).
fn log_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    let fallback = if verbose { "debug" } else { "info" };
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(fallback))
}

fn report<T: Reducible>(dispatcher: &Dispatcher, cfg: &BenchConfig, rng: &mut SplitMix64) -> Result<()> {
    let results = harness::run_family::<T>(dispatcher, cfg, rng)?;
    for m in &results {
        println!("{}", m.report_line());
    }
    let mismatches = results.iter().filter(|m| !m.matches_baseline).count();
    if mismatches > 0 {
        tracing::warn!(family = %T::FAMILY, mismatches, "variants disagree with the baseline");
    }
    Ok(())
}

fn print_banner(family: ElementFamily) {
    let caps = simdsum_core::detect();
    println!(
        "simdsum{} v{} ({}bit)",
        family.short_name(),
        env!("CARGO_PKG_VERSION"),
        usize::BITS
    );
    println!(
        "Compiler: rustc ({}, {})",
        std::env::consts::ARCH,
        if cfg!(debug_assertions) { "debug" } else { "release" }
    );
    println!("CPU:\t{}", caps.brand.as_deref().unwrap_or("unknown"));
    println!();
}

fn clock_seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x5EED)
}
