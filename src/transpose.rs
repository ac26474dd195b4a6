//! # Transpose kernels
//!
//! Square row-major `i32` matrices and two families of kernels:
//! - out-of-place: `dst[j][i] = src[i][j]`, naive sweep or tile by tile
//! - in-place: swap each off-diagonal pair once, naive sweep or tile by tile
//!
//! The blocked kernels must match their naive counterpart element for element.
use crate::error::BenchError;

/// Element type of the benchmarked matrices
pub type Element = i32;

/// `n x n` row-major matrix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SquareMatrix {
    n: usize,
    data: Vec<Element>,
}

impl SquareMatrix {
    /// Zero-filled matrix
    pub fn zeros(n: usize) -> Self {
        SquareMatrix {
            n,
            data: vec![0; n * n],
        }
    }

    /// Matrix with `m[i][j] = f(i, j)`
    pub fn from_fn(n: usize, mut f: impl FnMut(usize, usize) -> Element) -> Self {
        let mut data = Vec::with_capacity(n * n);
        for i in 0..n {
            for j in 0..n {
                data.push(f(i, j));
            }
        }
        SquareMatrix { n, data }
    }

    /// Matrix filled with `i * n + j`, the benchmark input. Values wrap
    /// modulo 2^32 once `n * n` exceeds `i32::MAX` (n > 46340).
    pub fn sequential(n: usize) -> Self {
        Self::from_fn(n, |i, j| i.wrapping_mul(n).wrapping_add(j) as Element)
    }

    pub fn from_rows(rows: &[Vec<Element>]) -> Result<Self, BenchError> {
        let n = rows.len();
        if let Some(bad) = rows.iter().find(|r| r.len() != n) {
            return Err(BenchError::DimensionMismatch { src: n, dst: bad.len() });
        }
        Ok(SquareMatrix {
            n,
            data: rows.concat(),
        })
    }

    pub fn dimension(&self) -> usize {
        self.n
    }

    pub fn get(&self, i: usize, j: usize) -> Element {
        self.data[i * self.n + j]
    }

    pub fn row(&self, i: usize) -> &[Element] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    pub fn as_slice(&self) -> &[Element] {
        &self.data
    }
}

fn check_dims(src: &SquareMatrix, dst: &SquareMatrix) -> Result<usize, BenchError> {
    if src.n != dst.n {
        return Err(BenchError::DimensionMismatch { src: src.n, dst: dst.n });
    }
    Ok(src.n)
}

/// Out-of-place transpose, one full row sweep of `src`
pub fn transpose_naive(src: &SquareMatrix, dst: &mut SquareMatrix) -> Result<(), BenchError> {
    let n = check_dims(src, dst)?;
    let (a, b) = (&src.data, &mut dst.data);
    for i in 0..n {
        for j in 0..n {
            b[j * n + i] = a[i * n + j];
        }
    }
    Ok(())
}

/// Out-of-place transpose over `block_size` tiles. Edge tiles are clamped to `n`.
pub fn transpose_blocked(
    src: &SquareMatrix,
    dst: &mut SquareMatrix,
    block_size: usize,
) -> Result<(), BenchError> {
    let n = check_dims(src, dst)?;
    if block_size == 0 {
        return Err(BenchError::InvalidBlockSize);
    }
    let (a, b) = (&src.data, &mut dst.data);
    for i in (0..n).step_by(block_size) {
        let i_end = (i + block_size).min(n);
        for j in (0..n).step_by(block_size) {
            let j_end = (j + block_size).min(n);
            for bi in i..i_end {
                for bj in j..j_end {
                    b[bj * n + bi] = a[bi * n + bj];
                }
            }
        }
    }
    Ok(())
}

/// In-place transpose swapping each `(i, j)`, `i < j` pair once
pub fn transpose_in_place_naive(m: &mut SquareMatrix) {
    let n = m.n;
    for i in 0..n {
        for j in i + 1..n {
            m.data.swap(i * n + j, j * n + i);
        }
    }
}

/// In-place transpose over `block_size` tiles. Only `bi < bj` cells swap, so
/// each pair is touched exactly once across all tiles.
pub fn transpose_in_place_blocked(
    m: &mut SquareMatrix,
    block_size: usize,
) -> Result<(), BenchError> {
    if block_size == 0 {
        return Err(BenchError::InvalidBlockSize);
    }
    let n = m.n;
    for i in (0..n).step_by(block_size) {
        let i_end = (i + block_size).min(n);
        // tiles strictly below the diagonal hold no bi < bj cells
        for j in (i..n).step_by(block_size) {
            let j_end = (j + block_size).min(n);
            for bi in i..i_end {
                for bj in j.max(bi + 1)..j_end {
                    m.data.swap(bi * n + bj, bj * n + bi);
                }
            }
        }
    }
    Ok(())
}
