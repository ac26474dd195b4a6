//! Console report. All times are in microseconds.
use crate::harness::{BenchReport, BenchmarkResult, Strategy, TransposeMode};
use crate::transpose::Element;
use crate::{format_size, format_size_fixed_int};
use std::fmt;
use std::time::Duration;

fn micros(d: Duration) -> f64 {
    d.as_secs_f64() * 1e6
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Naive => write!(f, "naive"),
            Strategy::Blocked { block_size } => write!(f, "blocked ({block_size})"),
        }
    }
}

impl fmt::Display for TransposeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransposeMode::OutOfPlace => write!(f, "out-of-place"),
            TransposeMode::InPlace => write!(f, "in-place"),
        }
    }
}

fn write_sweep(f: &mut fmt::Formatter<'_>, r: &BenchmarkResult) -> fmt::Result {
    if r.sweep.is_empty() {
        return Ok(());
    }
    let n = r.matrix_size;
    writeln!(f, "\nBlock size sweep ({n}x{n}):")?;
    writeln!(f, "{:>8} {:>14} {:>10}", "Block", "Time (us)", "Speed-up")?;
    writeln!(f, "{:-<8} {:-<14} {:-<10}", "", "", "")?;
    for s in &r.sweep {
        let blocked = s.elapsed.as_secs_f64().max(f64::MIN_POSITIVE);
        let speedup = r.naive_elapsed.as_secs_f64() / blocked;
        writeln!(f, "{:>8} {:>14.2} {:>9.2}x", s.block_size, micros(s.elapsed), speedup)?;
    }
    writeln!(f, "Fastest: {}", r.fastest())
}

impl fmt::Display for BenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Blocked vs Naive Matrix Transpose")?;
        writeln!(f, "=================================")?;

        if self.pin.pinned {
            writeln!(f, "Pinned to CPU core: {}", self.pin.core)?;
        } else {
            writeln!(f, "WARNING: couldn't pin to CPU core {}, running unpinned", self.pin.core)?;
        }

        let g = &self.geometry;
        let source = if self.geometry_detected {
            "detected"
        } else {
            "FALLBACK, detection failed"
        };
        writeln!(
            f,
            "L1d cache: {}, {}-way, {} B lines ({source})",
            format_size_fixed_int(g.l1_size_bytes() as u64).trim_start(),
            g.associativity(),
            g.line_size_bytes()
        )?;
        writeln!(f, "Derived block size: {}", self.block_size)?;
        writeln!(f, "Mode: {}\n", self.mode)?;

        writeln!(
            f,
            "{:>11} {:>12} {:>14} {:>14} {:>10} {:>14}",
            "Size", "Footprint", "Naive (us)", "Blocked (us)", "Speed-up", "Winner"
        )?;
        writeln!(f, "{:-<11} {:-<12} {:-<14} {:-<14} {:-<10} {:-<14}", "", "", "", "", "", "")?;
        for r in &self.results {
            let n = r.matrix_size;
            let footprint = (n * n * std::mem::size_of::<Element>()) as f32;
            writeln!(
                f,
                "{:>11} {:>12} {:>14.2} {:>14.2} {:>9.2}x {:>14}{}",
                format!("{n}x{n}"),
                format_size(footprint),
                micros(r.naive_elapsed),
                micros(r.block_elapsed),
                r.speedup(),
                r.winner().to_string(),
                if r.verified { "" } else { "  MISMATCH" }
            )?;
        }

        for r in &self.results {
            write_sweep(f, r)?;
        }
        Ok(())
    }
}
