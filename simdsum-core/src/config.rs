//! Runtime-configurable benchmark parameters.
//!
//! All values have defaults matching the classic simdsum programs. Override
//! via environment variables (prefixed `SIMDSUM_`) or by constructing a
//! custom `BenchConfig`; the harness applies its command-line flags last.

use std::str::FromStr;

use crate::caps::SimdTier;
use crate::element::ElementFamily;

/// Parameters for one benchmark run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchConfig {
    /// Repetitions of each variant.
    pub loops: usize,

    /// Element counts per family.
    pub int_len: usize,
    pub float_len: usize,
    pub double_len: usize,

    /// PRNG seed for buffer contents. `None` seeds from the clock.
    pub seed: Option<u64>,

    /// Dispatch ceiling. `None` uses the detected tier.
    pub max_tier: Option<SimdTier>,

    /// Fill masks: every element is `rand & mask`, keeping values small.
    /// At the default lengths the integer sum wraps and the `f32` sum rounds.
    pub int_mask: u32,
    pub float_mask: u32,
    pub double_mask: u32,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            loops: 4000,
            int_len: 409_600,
            float_len: 409_600,
            double_len: 204_800, // same byte size as the other two
            seed: None,
            max_tier: None,
            int_mask: 0x7fff,
            float_mask: 0x3f,
            double_mask: 0x7fff,
        }
    }
}

impl BenchConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `SIMDSUM_LOOPS`
    /// - `SIMDSUM_INT_LEN`
    /// - `SIMDSUM_FLOAT_LEN`
    /// - `SIMDSUM_DOUBLE_LEN`
    /// - `SIMDSUM_SEED`
    /// - `SIMDSUM_MAX_TIER` (`none`, `mmx`, `sse`, `avx`)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(n) = parse_var(&lookup, "SIMDSUM_LOOPS") {
            cfg.loops = n;
        }
        if let Some(n) = parse_var(&lookup, "SIMDSUM_INT_LEN") {
            cfg.int_len = n;
        }
        if let Some(n) = parse_var(&lookup, "SIMDSUM_FLOAT_LEN") {
            cfg.float_len = n;
        }
        if let Some(n) = parse_var(&lookup, "SIMDSUM_DOUBLE_LEN") {
            cfg.double_len = n;
        }
        if let Some(s) = parse_var(&lookup, "SIMDSUM_SEED") {
            cfg.seed = Some(s);
        }
        if let Some(t) = parse_var::<SimdTier, _>(&lookup, "SIMDSUM_MAX_TIER") {
            cfg.max_tier = Some(t);
        }

        cfg
    }

    /// Element count for a family.
    pub fn len_for(&self, family: ElementFamily) -> usize {
        match family {
            ElementFamily::Int32 => self.int_len,
            ElementFamily::Float32 => self.float_len,
            ElementFamily::Float64 => self.double_len,
        }
    }

    /// Override the element count of every family.
    pub fn set_len(&mut self, len: usize) {
        self.int_len = len;
        self.float_len = len;
        self.double_len = len;
    }

    /// Fill mask for a family.
    pub fn mask_for(&self, family: ElementFamily) -> u32 {
        match family {
            ElementFamily::Int32 => self.int_mask,
            ElementFamily::Float32 => self.float_mask,
            ElementFamily::Float64 => self.double_mask,
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}
