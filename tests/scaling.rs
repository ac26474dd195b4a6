//! Timing trend check. Environment dependent, run with `--ignored` on a quiet machine.

use blocked_transpose_rs::block::block_size_for;
use blocked_transpose_rs::cache::{HardwareCpuid, detect};
use blocked_transpose_rs::harness::time_it;
use blocked_transpose_rs::transpose::{SquareMatrix, transpose_blocked, transpose_naive};
use std::time::Duration;

const TRIALS: usize = 5;

fn median(mut samples: Vec<Duration>) -> Duration {
    samples.sort();
    samples[samples.len() / 2]
}

/// naive / blocked ratio for an n x n matrix, median of several trials
fn ratio(n: usize, block: usize) -> f64 {
    let a = SquareMatrix::sequential(n);
    let mut naive = Vec::with_capacity(TRIALS);
    let mut blocked = Vec::with_capacity(TRIALS);
    for _ in 0..TRIALS {
        let mut b = SquareMatrix::zeros(n);
        naive.push(time_it(|| transpose_naive(&a, &mut b)).1);
        let mut b = SquareMatrix::zeros(n);
        blocked.push(time_it(|| transpose_blocked(&a, &mut b, block)).1);
    }
    median(naive).as_secs_f64() / median(blocked).as_secs_f64().max(f64::MIN_POSITIVE)
}

#[test]
#[ignore]
fn blocking_pays_off_as_matrix_outgrows_l1() {
    let (geometry, _) = detect(&HardwareCpuid);
    let block = block_size_for::<i32>(geometry);
    let small = ratio(128, block);
    let large = ratio(2048, block);
    assert!(
        large >= small * 0.9,
        "expected blocking advantage to grow with n: 128 -> {small:.2}x, 2048 -> {large:.2}x"
    );
}
