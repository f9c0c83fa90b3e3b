//
// Copyright (c) 2013, Intel Corporation
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions
// are met:
//
// * Redistributions of source code must retain the above copyright
//       notice, this list of conditions and the following disclaimer.
// * Redistributions in binary form must reproduce the above
//       copyright notice, this list of conditions and the following
//       disclaimer in the documentation and/or other materials provided
//       with the distribution.
// * Neither the name of Intel Corporation nor the names of its
//       contributors may be used to endorse or promote products
//       derived from this software without specific prior written
//       permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS
// "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT
// LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS
// FOR A PARTICULAR PURPOSE ARE DISCLAIMED. IN NO EVENT SHALL THE
// COPYRIGHT OWNER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT,
// INCIDENTAL, SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING,
// BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR SERVICES;
// LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER
// CAUSED AND ON ANY THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT
// LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN
// ANY WAY OUT OF THE USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE
// POSSIBILITY OF SUCH DAMAGE.

use rand::distributions::{Distribution, Uniform};

use crate::error::{Error, Result};
use crate::rng;

/// Dense row-major matrix of doubles.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix {
            data: vec![0.0; rows * cols],
            rows,
            cols,
        }
    }

    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::invalid(format!(
                "{} values cannot fill a {}x{} matrix",
                data.len(),
                rows,
                cols
            )));
        }
        Ok(Matrix { data, rows, cols })
    }

    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map_or(0, |r| r.len());
        if rows.iter().any(|r| r.len() != cols) {
            return Err(Error::invalid("rows have different lengths"));
        }
        let data = rows.iter().flatten().copied().collect();
        Ok(Matrix {
            data,
            rows: rows.len(),
            cols,
        })
    }

    /// `n x n` matrix with entries uniform in `[-100, 100)`.
    pub fn random(n: usize, seed: u64) -> Self {
        Matrix::random_in(n, n, -100.0, 100.0, seed)
    }

    pub fn random_in(rows: usize, cols: usize, low: f64, high: f64, seed: u64) -> Self {
        let mut gen = rng::seeded(seed);
        let dist = Uniform::new(low, high);
        let data = (0..rows * cols).map(|_| dist.sample(&mut gen)).collect();
        Matrix { data, rows, cols }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    /// Copies the `size x size` block whose top-left corner is `(row0, col0)`.
    pub fn block(&self, row0: usize, col0: usize, size: usize) -> Vec<f64> {
        let mut out = Vec::with_capacity(size * size);
        for i in row0..row0 + size {
            out.extend_from_slice(&self.data[i * self.cols + col0..i * self.cols + col0 + size]);
        }
        out
    }

    pub fn set_block(&mut self, row0: usize, col0: usize, size: usize, block: &[f64]) {
        for (i, src) in block.chunks_exact(size).enumerate() {
            let start = (row0 + i) * self.cols + col0;
            self.data[start..start + size].copy_from_slice(src);
        }
    }
}

pub fn row_min(row: &[f64]) -> f64 {
    row.iter().copied().fold(f64::MAX, f64::min)
}

/// Largest of the row minima.
pub fn maximin_sequential(matrix: &Matrix) -> f64 {
    let mut max_of_mins = f64::MIN;
    for i in 0..matrix.rows() {
        max_of_mins = max_of_mins.max(row_min(matrix.row(i)));
    }
    max_of_mins
}

/// `C += A * B` for row-major `A (m x k)`, `B (k x n)`, `C (m x n)`.
pub fn matmul_accumulate(a: &[f64], b: &[f64], c: &mut [f64], m: usize, k: usize, n: usize) {
    debug_assert_eq!(a.len(), m * k);
    debug_assert_eq!(b.len(), k * n);
    debug_assert_eq!(c.len(), m * n);
    c.chunks_exact_mut(n)
        .zip(a.chunks_exact(k))
        .take(m)
        // ci : ith row of C, ai : ith row of A
        .for_each(|(ci, ai)| {
            ai.iter().zip(b.chunks_exact(n)).for_each(|(aik, bk)| {
                ci.iter_mut().zip(bk.iter()).for_each(|(cij, bkj)| {
                    *cij += aik * bkj;
                })
            })
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game() -> Matrix {
        Matrix::from_rows(&[
            vec![5.0, 3.0, 7.0],
            vec![2.0, 8.0, 1.0],
            vec![6.0, 4.0, 9.0],
        ])
        .unwrap()
    }

    #[test]
    fn maximin_of_small_game() {
        assert_eq!(maximin_sequential(&game()), 4.0);
    }

    #[test]
    fn maximin_of_empty_matrix_is_lowest() {
        assert_eq!(maximin_sequential(&Matrix::zeros(0, 0)), f64::MIN);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        assert!(Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0]]).is_err());
    }

    #[test]
    fn matmul_small() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [5.0, 6.0, 7.0, 8.0];
        let mut c = [1.0; 4];
        matmul_accumulate(&a, &b, &mut c, 2, 2, 2);
        assert_eq!(c, [20.0, 23.0, 44.0, 51.0]);
    }

    #[test]
    fn blocks_round_trip() {
        let m = Matrix::random(6, 3);
        let mut copy = Matrix::zeros(6, 6);
        for bi in 0..3 {
            for bj in 0..3 {
                copy.set_block(bi * 2, bj * 2, 2, &m.block(bi * 2, bj * 2, 2));
            }
        }
        assert_eq!(copy, m);
    }

    #[test]
    fn random_matrix_is_seeded() {
        assert_eq!(Matrix::random(5, 12345), Matrix::random(5, 12345));
        assert_eq!(Matrix::random(5, 12345).row(1).len(), 5);
    }
}
