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

use std::fmt;

use clap::ValueEnum;
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::Serialize;

use common::matrix::{maximin_sequential, row_min};
use common::timer::time_ms;
use common::{cli, verify, Matrix, Result};

pub const SEED: u64 = 42;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Sequential,
    Reduction,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Sequential => f.write_str("sequential"),
            Method::Reduction => f.write_str("reduction"),
        }
    }
}

/// Rows are spread over the team; the row minima meet in a max reduction.
pub fn maximin_reduction(pool: &ThreadPool, matrix: &Matrix) -> f64 {
    pool.install(|| {
        (0..matrix.rows())
            .into_par_iter()
            .map(|i| row_min(matrix.row(i)))
            .reduce(|| f64::MIN, f64::max)
    })
}

pub fn maximin(pool: &ThreadPool, matrix: &Matrix, method: Method) -> f64 {
    match method {
        Method::Sequential => maximin_sequential(matrix),
        Method::Reduction => maximin_reduction(pool, matrix),
    }
}

/// The 3x3 game `[[5,3,7],[2,8,1],[6,4,9]]` has value 4; a random 100x100
/// matrix must give the same answer either way.
pub fn self_check() -> Result<()> {
    let game = Matrix::from_rows(&[
        vec![5.0, 3.0, 7.0],
        vec![2.0, 8.0, 1.0],
        vec![6.0, 4.0, 9.0],
    ])?;
    let pool = cli::thread_pool(2)?;
    verify::check("3x3 sequential", 4.0, maximin_sequential(&game))?;
    verify::check("3x3 reduction", 4.0, maximin_reduction(&pool, &game))?;

    let matrix = Matrix::random(100, 12345);
    let pool = cli::thread_pool(4)?;
    verify::check(
        "100x100",
        maximin_sequential(&matrix),
        maximin_reduction(&pool, &matrix),
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct Record {
    #[serde(rename = "N")]
    pub n: usize,
    pub num_threads: usize,
    pub method: Method,
    pub iteration: usize,
    pub execution_time_ms: f64,
    pub result_value: f64,
}

pub fn run_benchmark(
    pool: &ThreadPool,
    matrix: &Matrix,
    method: Method,
    iterations: usize,
) -> Vec<Record> {
    if method == Method::Reduction {
        let warmup = maximin_reduction(pool, matrix);
        log::debug!("warmup maximin = {}", warmup);
    }
    (0..iterations)
        .map(|iteration| {
            let (result_value, execution_time_ms) = time_ms(|| maximin(pool, matrix, method));
            Record {
                n: matrix.rows(),
                num_threads: pool.current_num_threads(),
                method,
                iteration,
                execution_time_ms,
                result_value,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_check_passes() {
        self_check().unwrap();
    }

    #[test]
    fn reduction_matches_on_random_sizes() {
        let pool = cli::thread_pool(3).unwrap();
        for n in [1, 2, 17, 200] {
            let matrix = Matrix::random(n, SEED);
            assert_eq!(
                maximin_reduction(&pool, &matrix),
                maximin_sequential(&matrix)
            );
        }
    }

    #[test]
    fn empty_matrix() {
        let pool = cli::thread_pool(2).unwrap();
        assert_eq!(maximin_reduction(&pool, &Matrix::zeros(0, 0)), f64::MIN);
    }

    #[test]
    fn one_record_per_iteration() {
        let pool = cli::thread_pool(2).unwrap();
        let matrix = Matrix::random(10, SEED);
        let records = run_benchmark(&pool, &matrix, Method::Reduction, 4);
        assert_eq!(records.len(), 4);
        assert!(records
            .iter()
            .all(|r| r.result_value == maximin_sequential(&matrix) && r.n == 10));
    }
}
