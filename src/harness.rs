//! # Benchmark harness
//!
//! Probe, pin, derive the block size, then for each matrix size time the naive
//! kernel once, the derived blocked kernel once, and each sweep candidate once.
//! One sample per configuration, trials strictly sequential, fresh matrices
//! for every trial.
use crate::affinity::{self, PinOutcome, SchedulerControl};
use crate::block::block_size_for;
use crate::cache::{self, CacheGeometry, CpuidSource};
use crate::error::BenchError;
use crate::transpose::{self, Element, SquareMatrix};
use log::{debug, error, info, warn};
use std::hint::black_box;
use std::time::{Duration, Instant};

/// Matrix side used when none (or an invalid one) is given
pub const DEFAULT_DIMENSION: usize = 1024;
/// Block sizes swept alongside the derived one
pub const DEFAULT_CANDIDATES: [usize; 5] = [16, 32, 64, 128, 256];

/// Which kernel family a run uses. Never mixed within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransposeMode {
    /// Write the transpose of `A` into a second matrix `B`
    #[default]
    OutOfPlace,
    /// Swap off-diagonal pairs within a single matrix
    InPlace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchConfig {
    pub sizes: Vec<usize>,
    pub candidates: Vec<usize>,
    pub mode: TransposeMode,
}

impl Default for BenchConfig {
    fn default() -> Self {
        BenchConfig {
            sizes: vec![DEFAULT_DIMENSION],
            candidates: DEFAULT_CANDIDATES.to_vec(),
            mode: TransposeMode::default(),
        }
    }
}

/// Parse a matrix dimension argument. `None` gives [`DEFAULT_DIMENSION`].
/// Rejects values whose `n x n` matrix byte size doesn't fit in `usize`.
pub fn resolve_dimension(raw: Option<&str>) -> Result<usize, BenchError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_DIMENSION);
    };
    let invalid = || BenchError::InvalidDimension(raw.to_string());
    let n = raw
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|&n| n > 0)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(invalid)?;
    n.checked_mul(n)
        .and_then(|elems| elems.checked_mul(std::mem::size_of::<Element>()))
        .ok_or_else(invalid)?;
    Ok(n)
}

/// Wall-clock cost of running `f` once
pub fn time_it<R>(f: impl FnOnce() -> R) -> (R, Duration) {
    let start = Instant::now();
    let out = black_box(f());
    (out, start.elapsed())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSample {
    pub block_size: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Naive,
    Blocked { block_size: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkResult {
    pub matrix_size: usize,
    pub naive_elapsed: Duration,
    pub block_elapsed: Duration,
    pub block_size_used: usize,
    pub sweep: Vec<SweepSample>,
    /// Every blocked output matched the naive output
    pub verified: bool,
}

impl BenchmarkResult {
    /// `naive / blocked`, above 1.0 means blocking helped
    pub fn speedup(&self) -> f64 {
        let blocked = self.block_elapsed.as_secs_f64();
        if blocked == 0.0 {
            return f64::INFINITY;
        }
        self.naive_elapsed.as_secs_f64() / blocked
    }

    /// Naive vs the derived block size. Ties go to naive.
    pub fn winner(&self) -> Strategy {
        if self.block_elapsed < self.naive_elapsed {
            Strategy::Blocked {
                block_size: self.block_size_used,
            }
        } else {
            Strategy::Naive
        }
    }

    /// Fastest of naive, the derived size and the sweep. Ties go to naive,
    /// then to whichever blocked run came first.
    pub fn fastest(&self) -> Strategy {
        let mut best = (Strategy::Naive, self.naive_elapsed);
        let blocked = std::iter::once((self.block_size_used, self.block_elapsed))
            .chain(self.sweep.iter().map(|s| (s.block_size, s.elapsed)));
        for (block_size, elapsed) in blocked {
            if elapsed < best.1 {
                best = (Strategy::Blocked { block_size }, elapsed);
            }
        }
        best.0
    }
}

/// Everything a run produced
#[derive(Debug, Clone, PartialEq)]
pub struct BenchReport {
    pub pin: PinOutcome,
    pub geometry: CacheGeometry,
    /// `false` when fallback geometry was substituted
    pub geometry_detected: bool,
    pub block_size: usize,
    pub mode: TransposeMode,
    pub results: Vec<BenchmarkResult>,
}

pub struct Harness<C, S> {
    cpuid: C,
    scheduler: S,
    config: BenchConfig,
}

impl<C: CpuidSource, S: SchedulerControl> Harness<C, S> {
    pub fn new(cpuid: C, scheduler: S, config: BenchConfig) -> Self {
        Harness {
            cpuid,
            scheduler,
            config,
        }
    }

    /// Run every configured size. Degraded conditions are logged, never returned.
    pub fn run(&self) -> BenchReport {
        let pin = affinity::pin_preferred_core(&self.scheduler);
        let (geometry, geometry_detected) = cache::detect(&self.cpuid);
        let block_size = block_size_for::<Element>(geometry);
        info!(
            "L1d {} B, {}-way, {} B lines -> block size {block_size}",
            geometry.l1_size_bytes(),
            geometry.associativity(),
            geometry.line_size_bytes()
        );

        let candidates: Vec<usize> = self
            .config
            .candidates
            .iter()
            .copied()
            .filter(|&c| {
                if c == 0 {
                    warn!("Skipping block size candidate 0");
                }
                c > 0
            })
            .collect();

        let mut results = Vec::with_capacity(self.config.sizes.len());
        for &n in &self.config.sizes {
            match self.run_size(n, block_size, &candidates) {
                Ok(result) => results.push(result),
                Err(e) => error!("Trial for {n}x{n} failed: {e}"),
            }
        }

        BenchReport {
            pin,
            geometry,
            geometry_detected,
            block_size,
            mode: self.config.mode,
            results,
        }
    }

    fn run_size(
        &self,
        n: usize,
        block_size: usize,
        candidates: &[usize],
    ) -> Result<BenchmarkResult, BenchError> {
        debug!("Benchmarking {n}x{n} ({:?})", self.config.mode);
        let input = SquareMatrix::sequential(n);

        let (reference, naive_elapsed) = self.time_naive(&input)?;
        let (blocked, block_elapsed) = self.time_blocked(&input, block_size)?;
        let mut verified = blocked == reference;

        let mut sweep = Vec::with_capacity(candidates.len());
        for &candidate in candidates {
            let (out, elapsed) = self.time_blocked(&input, candidate)?;
            verified &= out == reference;
            sweep.push(SweepSample {
                block_size: candidate,
                elapsed,
            });
        }

        if !verified {
            error!("Blocked transpose of {n}x{n} disagrees with naive transpose");
        }

        Ok(BenchmarkResult {
            matrix_size: n,
            naive_elapsed,
            block_elapsed,
            block_size_used: block_size,
            sweep,
            verified,
        })
    }

    fn time_naive(&self, input: &SquareMatrix) -> Result<(SquareMatrix, Duration), BenchError> {
        match self.config.mode {
            TransposeMode::OutOfPlace => {
                let mut out = SquareMatrix::zeros(input.dimension());
                let (res, elapsed) = time_it(|| transpose::transpose_naive(input, &mut out));
                res?;
                Ok((out, elapsed))
            }
            TransposeMode::InPlace => {
                let mut m = input.clone();
                let ((), elapsed) = time_it(|| transpose::transpose_in_place_naive(&mut m));
                Ok((m, elapsed))
            }
        }
    }

    fn time_blocked(
        &self,
        input: &SquareMatrix,
        block_size: usize,
    ) -> Result<(SquareMatrix, Duration), BenchError> {
        let (res, out, elapsed) = match self.config.mode {
            TransposeMode::OutOfPlace => {
                let mut out = SquareMatrix::zeros(input.dimension());
                let (res, elapsed) =
                    time_it(|| transpose::transpose_blocked(input, &mut out, block_size));
                (res, out, elapsed)
            }
            TransposeMode::InPlace => {
                let mut m = input.clone();
                let (res, elapsed) =
                    time_it(|| transpose::transpose_in_place_blocked(&mut m, block_size));
                (res, m, elapsed)
            }
        };
        res?;
        Ok((out, elapsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affinity::tests::StubScheduler;
    use crate::cache::tests::{ScriptedCpuid, encode};

    fn small_config(mode: TransposeMode) -> BenchConfig {
        BenchConfig {
            sizes: vec![1, 17, 64],
            candidates: vec![4, 0, 100],
            mode,
        }
    }

    #[test]
    fn dimension_parsing() {
        assert_eq!(resolve_dimension(None), Ok(DEFAULT_DIMENSION));
        assert_eq!(resolve_dimension(Some("512")), Ok(512));
        assert_eq!(resolve_dimension(Some(" 7 ")), Ok(7));
        for bad in ["0", "-3", "abc", "", "1.5", "9223372036854775808"] {
            assert_eq!(
                resolve_dimension(Some(bad)),
                Err(BenchError::InvalidDimension(bad.to_string()))
            );
        }
    }

    #[test]
    fn dimension_too_large_for_memory() {
        // n * n * 4 bytes overflows usize on 64-bit
        assert_eq!(
            resolve_dimension(Some("5000000000")),
            Err(BenchError::InvalidDimension("5000000000".to_string()))
        );
        assert_eq!(
            resolve_dimension(Some(&i64::MAX.to_string())),
            Err(BenchError::InvalidDimension(i64::MAX.to_string()))
        );
        // largest n with n * n * 4 <= usize::MAX still parses
        let edge = ((usize::MAX / std::mem::size_of::<Element>()) as f64).sqrt() as usize - 1;
        assert_eq!(resolve_dimension(Some(&edge.to_string())), Ok(edge));
    }

    #[test]
    fn pin_failure_still_produces_results() {
        let scheduler =
            StubScheduler::new(Some(vec![3]), Err(BenchError::AffinityDenied { core: 3 }));
        let config = small_config(TransposeMode::OutOfPlace);
        let harness = Harness::new(ScriptedCpuid::default(), scheduler, config);
        let report = harness.run();

        assert_eq!(report.pin, PinOutcome { core: 3, pinned: false });
        assert!(!report.geometry_detected);
        assert_eq!(report.geometry, CacheGeometry::FALLBACK);
        assert_eq!(report.block_size, 64);
        assert_eq!(report.results.len(), 3);
        for (result, n) in report.results.iter().zip([1, 17, 64]) {
            assert_eq!(result.matrix_size, n);
            assert_eq!(result.block_size_used, 64);
            assert!(result.verified);
            let swept: Vec<usize> = result.sweep.iter().map(|s| s.block_size).collect();
            assert_eq!(swept, vec![4, 100]);
        }
    }

    #[test]
    fn unsupported_affinity_in_place_run() {
        let scheduler = StubScheduler::new(None, Err(BenchError::AffinityUnsupported));
        let mut cpu = ScriptedCpuid {
            max_basic: Some(4),
            ..Default::default()
        };
        // 24 KiB 3-way L1d
        cpu.leaves.insert((4, 0), encode(1, 1, 3, 1, 64, 128));
        let harness = Harness::new(cpu, scheduler, small_config(TransposeMode::InPlace));
        let report = harness.run();

        assert_eq!(report.pin.core, 0);
        assert!(report.geometry_detected);
        assert_eq!(report.block_size, 32);
        assert_eq!(report.mode, TransposeMode::InPlace);
        assert!(report.results.iter().all(|r| r.verified));
    }

    fn result(naive_us: u64, block_us: u64, sweep: &[(usize, u64)]) -> BenchmarkResult {
        BenchmarkResult {
            matrix_size: 8,
            naive_elapsed: Duration::from_micros(naive_us),
            block_elapsed: Duration::from_micros(block_us),
            block_size_used: 16,
            sweep: sweep
                .iter()
                .map(|&(block_size, us)| SweepSample {
                    block_size,
                    elapsed: Duration::from_micros(us),
                })
                .collect(),
            verified: true,
        }
    }

    #[test]
    fn ties_go_to_naive() {
        let r = result(100, 100, &[(32, 100)]);
        assert_eq!(r.winner(), Strategy::Naive);
        assert_eq!(r.fastest(), Strategy::Naive);
        assert_eq!(result(90, 100, &[]).winner(), Strategy::Naive);
    }

    #[test]
    fn blocked_wins_when_faster() {
        let r = result(400, 100, &[(32, 80), (64, 80)]);
        assert_eq!(r.winner(), Strategy::Blocked { block_size: 16 });
        assert_eq!(r.fastest(), Strategy::Blocked { block_size: 32 });
        assert!((r.speedup() - 4.0).abs() < 1e-9);
    }
}
