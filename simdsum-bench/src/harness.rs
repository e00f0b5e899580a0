//! Timed runs of every dispatched variant over one buffer.

use std::hint::black_box;
use std::time::{Duration, Instant};

use simdsum_core::{AlignedBuf, BenchConfig, Element, ElementFamily, SplitMix64};
use simdsum_kernels::{Dispatcher, Reducer, Reducible};

/// Multiplier on `len * max|x| * epsilon` for float results.
const FLOAT_TOLERANCE_FACTOR: f64 = 4.0;

/// Outcome of one variant.
#[derive(Debug, Clone)]
pub struct Measurement<T> {
    pub name: &'static str,
    pub elapsed: Duration,
    /// Millions (2^20) of elements per second.
    pub mps: f64,
    /// Result of the last repetition.
    pub sum: T,
    pub matches_baseline: bool,
}

impl<T: Element> Measurement<T> {
    /// `name:\t<M/s> M/s\t<ms> ms //<sum>`
    pub fn report_line(&self) -> String {
        let mut line = format!(
            "{}:\t{:.0} M/s\t{} ms //{}",
            self.name,
            self.mps,
            self.elapsed.as_millis(),
            self.sum
        );
        if !self.matches_baseline {
            line.push_str("\t!= baseline");
        }
        line
    }
}

/// `loops * len / (1024^2 * secs)`.
pub fn throughput_mps(loops: usize, len: usize, elapsed: Duration) -> f64 {
    let elements = loops as f64 * len as f64;
    elements / (1024.0 * 1024.0 * elapsed.as_secs_f64())
}

/// Exact for integers; `len * max|x| * eps * k` for floats.
pub fn agrees_with_baseline<T: Element>(buf: &[T], got: T, expected: T) -> bool {
    let eps = match T::FAMILY {
        ElementFamily::Int32 => return got == expected,
        ElementFamily::Float32 => f32::EPSILON as f64,
        ElementFamily::Float64 => f64::EPSILON,
    };
    let max = buf.iter().map(|x| x.to_f64().abs()).fold(0.0, f64::max);
    let tolerance = buf.len() as f64 * max * eps * FLOAT_TOLERANCE_FACTOR;
    (got.to_f64() - expected.to_f64()).abs() <= tolerance
}

/// Run one variant `loops` times.
pub fn run_variant<T: Element>(
    reducer: Reducer<T>,
    buf: &AlignedBuf<T>,
    loops: usize,
    expected: T,
) -> Measurement<T> {
    let mut sum = T::ZERO;
    let start = Instant::now();
    for _ in 0..loops {
        sum = black_box(reducer.reduce(black_box(buf)));
    }
    let elapsed = start.elapsed();

    let matches_baseline = agrees_with_baseline(buf, sum, expected);
    if !matches_baseline {
        tracing::warn!(
            variant = reducer.name(),
            got = %sum,
            expected = %expected,
            "result differs from baseline"
        );
    }

    Measurement {
        name: reducer.name(),
        elapsed,
        mps: throughput_mps(loops, buf.len(), elapsed),
        sum,
        matches_baseline,
    }
}

/// Fill a buffer for `T` from `cfg` and measure every variant `dispatcher` allows.
pub fn run_family<T: Reducible>(
    dispatcher: &Dispatcher,
    cfg: &BenchConfig,
    rng: &mut SplitMix64,
) -> anyhow::Result<Vec<Measurement<T>>> {
    let family = T::FAMILY;
    let len = cfg.len_for(family);
    let mut buf = AlignedBuf::<T>::zeroed(len)?;
    rng.fill_masked(&mut buf, cfg.mask_for(family));
    if let Some(sample) = buf.get(2) {
        tracing::debug!(%family, len, sample = %sample, "buffer initialized");
    }

    let expected = dispatcher.baseline::<T>().reduce(&buf);
    let variants = dispatcher.available::<T>();
    tracing::info!(
        %family,
        tier = %dispatcher.tier(family),
        variants = variants.len(),
        loops = cfg.loops,
        "running family"
    );

    Ok(variants
        .into_iter()
        .map(|reducer| run_variant(reducer, &buf, cfg.loops, expected))
        .collect())
}
