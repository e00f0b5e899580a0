//! Capability detection: which SIMD tier each element family may use on this CPU.
//!
//! Tier ladders (cheapest-first):
//!
//! ```text
//! ┌──────────┬──────────────┬──────────────────┬──────────────────┐
//! │ family   │ None         │ Legacy64 / V128  │ Vector256        │
//! ├──────────┼──────────────┼──────────────────┼──────────────────┤
//! │ i32      │ scalar loop  │ MMX  (2 lanes)   │ n/a              │
//! │          │              │ SSE2 (4 lanes)   │                  │
//! │ f32      │ scalar loop  │ SSE  (4 lanes)   │ AVX (8 lanes)    │
//! │ f64      │ scalar loop  │ SSE2 (2 lanes)   │ AVX (4 lanes)    │
//! └──────────┴──────────────┴──────────────────┴──────────────────┘
//! ```
//!
//! Detection runs once per process; every later query reads the cached
//! [`CpuCaps`].

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::element::ElementFamily;
use crate::error::SumError;

/// Detected SIMD capabilities of the current hardware.
#[derive(Clone, Debug, Default)]
pub struct CpuCaps {
    pub mmx: bool,
    pub sse: bool,
    pub sse2: bool,
    /// Includes the OS check that YMM state is saved on context switch.
    pub avx: bool,
    /// Processor brand string, if the CPU reports one.
    pub brand: Option<String>,
}

static CAPS: OnceLock<CpuCaps> = OnceLock::new();

/// Detect hardware capabilities (cached after first call).
pub fn detect() -> &'static CpuCaps {
    CAPS.get_or_init(|| {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        {
            let caps = CpuCaps {
                mmx: is_x86_feature_detected!("mmx"),
                sse: is_x86_feature_detected!("sse"),
                sse2: is_x86_feature_detected!("sse2"),
                avx: is_x86_feature_detected!("avx"),
                brand: cpu_brand(),
            };
            tracing::debug!(
                mmx = caps.mmx,
                sse = caps.sse,
                sse2 = caps.sse2,
                avx = caps.avx,
                "detected cpu capabilities"
            );
            caps
        }
        #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
        {
            CpuCaps::default()
        }
    })
}

/// Read the 48-byte brand string from CPUID leaves 0x8000_0002..=0x8000_0004.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn cpu_brand() -> Option<String> {
    #[cfg(target_arch = "x86")]
    use core::arch::x86::__cpuid;
    #[cfg(target_arch = "x86_64")]
    use core::arch::x86_64::__cpuid;

    // `__cpuid` is an unsafe fn on older toolchains.
    #[allow(unused_unsafe)]
    let max_ext = unsafe { __cpuid(0x8000_0000) }.eax;
    if max_ext < 0x8000_0004 {
        return None;
    }

    let mut bytes = Vec::with_capacity(48);
    for leaf in 0x8000_0002u32..=0x8000_0004 {
        #[allow(unused_unsafe)]
        let r = unsafe { __cpuid(leaf) };
        for reg in [r.eax, r.ebx, r.ecx, r.edx] {
            bytes.extend_from_slice(&reg.to_le_bytes());
        }
    }
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let brand = String::from_utf8_lossy(&bytes[..end]).trim().to_string();
    if brand.is_empty() {
        None
    } else {
        Some(brand)
    }
}

/// Ordered SIMD capability level. Higher tiers use wider registers.
///
/// Not every tier exists in every family; see [`SimdTier::tiers_for`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum SimdTier {
    /// Scalar baseline, always available.
    #[default]
    None,
    /// 64-bit MMX registers (integer family only).
    Legacy64,
    /// 128-bit SSE / SSE2 registers.
    Vector128,
    /// 256-bit AVX registers (float families only).
    Vector256,
}

impl SimdTier {
    /// The tier ladder of a family, lowest first.
    pub fn tiers_for(family: ElementFamily) -> &'static [SimdTier] {
        match family {
            ElementFamily::Int32 => &[SimdTier::None, SimdTier::Legacy64, SimdTier::Vector128],
            ElementFamily::Float32 | ElementFamily::Float64 => {
                &[SimdTier::None, SimdTier::Vector128, SimdTier::Vector256]
            }
        }
    }

    /// Whether this tier is on the family's ladder.
    pub fn is_member(self, family: ElementFamily) -> bool {
        Self::tiers_for(family).contains(&self)
    }

    /// Register width in bits (0 for the scalar tier).
    pub fn register_bits(self) -> usize {
        match self {
            SimdTier::None => 0,
            SimdTier::Legacy64 => 64,
            SimdTier::Vector128 => 128,
            SimdTier::Vector256 => 256,
        }
    }

    /// Number of lanes a register of this tier holds for `family`.
    pub fn lanes(self, family: ElementFamily) -> usize {
        match self {
            SimdTier::None => 1,
            _ => self.register_bits() / 8 / family.element_size(),
        }
    }

    /// Instruction-set name of this tier for a family, as used in variant names.
    pub fn label(self, family: ElementFamily) -> &'static str {
        match (self, family) {
            (SimdTier::None, _) => "base",
            (SimdTier::Legacy64, _) => "mmx",
            // Integer and double adds need SSE2, but the variants are still named "sse".
            (SimdTier::Vector128, _) => "sse",
            (SimdTier::Vector256, _) => "avx",
        }
    }

    /// The instruction set the CPU must report for this tier in `family`.
    pub fn required_isa(self, family: ElementFamily) -> &'static str {
        match (self, family) {
            (SimdTier::None, _) => "none",
            (SimdTier::Legacy64, _) => "mmx",
            (SimdTier::Vector128, ElementFamily::Float32) => "sse",
            (SimdTier::Vector128, _) => "sse2",
            (SimdTier::Vector256, _) => "avx",
        }
    }
}

impl fmt::Display for SimdTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SimdTier::None => "none",
            SimdTier::Legacy64 => "legacy64",
            SimdTier::Vector128 => "vector128",
            SimdTier::Vector256 => "vector256",
        };
        f.write_str(name)
    }
}

impl FromStr for SimdTier {
    type Err = SumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "base" | "scalar" => Ok(SimdTier::None),
            "mmx" | "legacy64" => Ok(SimdTier::Legacy64),
            "sse" | "sse2" | "vector128" => Ok(SimdTier::Vector128),
            "avx" | "vector256" => Ok(SimdTier::Vector256),
            other => Err(SumError::InvalidTier(other.to_string())),
        }
    }
}

impl CpuCaps {
    /// Highest tier of `family` these capabilities support.
    pub fn max_tier(&self, family: ElementFamily) -> SimdTier {
        match family {
            ElementFamily::Int32 => {
                if self.sse2 {
                    SimdTier::Vector128
                } else if self.mmx {
                    SimdTier::Legacy64
                } else {
                    SimdTier::None
                }
            }
            ElementFamily::Float32 => {
                if self.avx {
                    SimdTier::Vector256
                } else if self.sse {
                    SimdTier::Vector128
                } else {
                    SimdTier::None
                }
            }
            ElementFamily::Float64 => {
                if self.avx {
                    SimdTier::Vector256
                } else if self.sse2 {
                    SimdTier::Vector128
                } else {
                    SimdTier::None
                }
            }
        }
    }

    /// Whether the CPU supports one specific tier of a family.
    ///
    /// Checked per instruction set, so a masked-off feature is honoured even
    /// when a wider one is present.
    pub fn supports(&self, family: ElementFamily, tier: SimdTier) -> bool {
        if !tier.is_member(family) {
            return false;
        }
        match (tier, family) {
            (SimdTier::None, _) => true,
            (SimdTier::Legacy64, _) => self.mmx,
            (SimdTier::Vector128, ElementFamily::Float32) => self.sse,
            (SimdTier::Vector128, _) => self.sse2,
            (SimdTier::Vector256, _) => self.avx,
        }
    }
}

/// Highest SIMD tier of `family` the executing CPU supports.
pub fn detect_tier(family: ElementFamily) -> SimdTier {
    detect().max_tier(family)
}

/// Print detected capabilities summary.
pub fn print_caps() {
    let caps = detect();
    println!("=== SIMD Capabilities ===");
    println!("  CPU:    {}", caps.brand.as_deref().unwrap_or("unknown"));
    println!("  MMX:    {}", caps.mmx);
    println!("  SSE:    {}", caps.sse);
    println!("  SSE2:   {}", caps.sse2);
    println!("  AVX:    {}", caps.avx);
    for family in ElementFamily::ALL {
        let tier = caps.max_tier(family);
        println!(
            "  {:<6}  {} ({}, needs {})",
            family,
            tier,
            tier.label(family),
            tier.required_isa(family)
        );
    }
}
