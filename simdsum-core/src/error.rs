use crate::caps::SimdTier;
use crate::element::ElementFamily;

pub type Result<T> = std::result::Result<T, SumError>;

#[derive(Debug, thiserror::Error)]
pub enum SumError {
    #[error("{family} variant `{variant}` needs tier {required}, but dispatch is capped at {ceiling}")]
    TierUnavailable {
        family: ElementFamily,
        variant: &'static str,
        required: SimdTier,
        ceiling: SimdTier,
    },

    #[error("no {family} reduction variant named `{name}`")]
    UnknownVariant { family: ElementFamily, name: String },

    #[error("buffer at {addr:#x} is not aligned to {required} bytes")]
    Misaligned { addr: usize, required: usize },

    #[error("buffer of {len} {family} elements exceeds the addressable size")]
    BufferTooLarge { len: usize, family: ElementFamily },

    #[error("unknown SIMD tier `{0}` (expected none, mmx, sse or avx)")]
    InvalidTier(String),
}
