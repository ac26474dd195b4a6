//! Error taxonomy. None of these abort a benchmark run; the harness and binary
//! downgrade each one to a warning and carry on with a fallback.
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BenchError {
    /// CPUID (or the deterministic cache parameters leaf) is not available
    #[error("cache descriptor query is not supported on this CPU")]
    HardwareQueryUnsupported,

    /// Leaf walk finished without a data/unified cache descriptor
    #[error("no data or unified cache descriptor found within {bound} subleaves")]
    NoCacheDescriptor { bound: u32 },

    /// Platform has no usable affinity API
    #[error("CPU affinity control is not supported on this platform")]
    AffinityUnsupported,

    /// OS refused the affinity restriction
    #[error("OS denied pinning to CPU core {core}")]
    AffinityDenied { core: usize },

    /// Matrix dimension argument was non-positive or not an integer
    #[error("invalid matrix dimension '{0}' (expected a positive integer)")]
    InvalidDimension(String),

    #[error("block size must be at least 1")]
    InvalidBlockSize,

    /// Source and destination matrices differ in dimension
    #[error("matrix dimension mismatch: source is {src}x{src}, destination is {dst}x{dst}")]
    DimensionMismatch { src: usize, dst: usize },
}
