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
use std::ops::Range;

use clap::ValueEnum;
use rand::distributions::{Distribution, Uniform};
use rayon::ThreadPool;
use serde::Serialize;

use common::matrix::row_min;
use common::schedule::parallel_fold;
use common::timer::time_ms;
use common::{cli, rng, verify, Matrix, Result, Schedule};

/// Structure of the generated matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Dense,
    /// non-zero only where `|i - j| <= bandwidth`
    Banded,
    /// non-zero only where `j <= i`
    Lower,
    /// non-zero only where `j >= i`
    Upper,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Dense => "dense",
            Kind::Banded => "banded",
            Kind::Lower => "lower",
            Kind::Upper => "upper",
        };
        f.write_str(name)
    }
}

/// A square matrix whose entries are random inside its structural region
/// and zero outside.
#[derive(Debug, Clone)]
pub struct SpecialMatrix {
    matrix: Matrix,
    kind: Kind,
    bandwidth: usize,
}

impl SpecialMatrix {
    pub fn generate(n: usize, kind: Kind, bandwidth: usize, seed: u64) -> Self {
        let mut special = SpecialMatrix {
            matrix: Matrix::zeros(n, n),
            kind,
            bandwidth,
        };
        let mut gen = rng::seeded(seed);
        let dist = Uniform::new(-100.0, 100.0);
        for i in 0..n {
            for j in special.columns(i) {
                special.matrix.set(i, j, dist.sample(&mut gen));
            }
        }
        special
    }

    pub fn size(&self) -> usize {
        self.matrix.rows()
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn bandwidth(&self) -> usize {
        self.bandwidth
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.matrix.get(i, j)
    }

    /// Columns of row `i` inside the structural region.
    pub fn columns(&self, i: usize) -> Range<usize> {
        let n = self.size();
        match self.kind {
            Kind::Dense => 0..n,
            Kind::Banded => {
                let end = i.saturating_add(self.bandwidth).saturating_add(1);
                i.saturating_sub(self.bandwidth)..end.min(n)
            }
            Kind::Lower => 0..i + 1,
            Kind::Upper => i..n,
        }
    }

    pub fn row_min(&self, i: usize) -> f64 {
        row_min(&self.matrix.row(i)[self.columns(i)])
    }
}

pub fn maximin_sequential(matrix: &SpecialMatrix) -> f64 {
    (0..matrix.size()).fold(f64::MIN, |acc, i| acc.max(matrix.row_min(i)))
}

pub fn maximin_parallel(
    pool: &ThreadPool,
    matrix: &SpecialMatrix,
    schedule: Schedule,
    chunk: usize,
) -> f64 {
    parallel_fold(
        pool,
        matrix.size(),
        schedule,
        chunk,
        f64::MIN,
        |acc, i| acc.max(matrix.row_min(i)),
        f64::max,
    )
}

/// The reference cases: a 3x3 dense matrix on two threads, then 100x100
/// banded, lower and upper matrices on four.
pub fn self_check() -> Result<()> {
    let cases: [(&str, usize, Kind, usize, u64, usize, &[Schedule]); 4] = [
        (
            "3x3 dense",
            3,
            Kind::Dense,
            0,
            12345,
            2,
            &[Schedule::Static, Schedule::Dynamic, Schedule::Guided],
        ),
        (
            "100x100 banded",
            100,
            Kind::Banded,
            5,
            54321,
            4,
            &[Schedule::Static, Schedule::Dynamic, Schedule::Guided],
        ),
        ("100x100 lower", 100, Kind::Lower, 0, 11111, 4, &[Schedule::Static]),
        ("100x100 upper", 100, Kind::Upper, 0, 22222, 4, &[Schedule::Dynamic]),
    ];
    for (label, n, kind, bandwidth, seed, threads, schedules) in cases {
        let matrix = SpecialMatrix::generate(n, kind, bandwidth, seed);
        let pool = cli::thread_pool(threads)?;
        let expected = maximin_sequential(&matrix);
        for &schedule in schedules {
            let got = maximin_parallel(&pool, &matrix, schedule, 0);
            verify::check(&format!("{} {}", label, schedule), expected, got)?;
        }
        log::debug!("self-check {} passed: {}", label, expected);
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct Record {
    #[serde(rename = "N")]
    pub n: usize,
    pub matrix_type: Kind,
    pub bandwidth: usize,
    pub num_threads: usize,
    pub schedule: Schedule,
    pub chunk_size: usize,
    pub iteration: usize,
    pub execution_time_ms: f64,
    pub result_value: f64,
}

pub fn run_benchmark(
    pool: &ThreadPool,
    matrix: &SpecialMatrix,
    schedule: Schedule,
    chunk: usize,
    iterations: usize,
) -> Vec<Record> {
    let warmup = maximin_parallel(pool, matrix, schedule, chunk);
    log::debug!("warmup maximin = {}", warmup);
    (0..iterations)
        .map(|iteration| {
            let (result_value, execution_time_ms) =
                time_ms(|| maximin_parallel(pool, matrix, schedule, chunk));
            Record {
                n: matrix.size(),
                matrix_type: matrix.kind(),
                bandwidth: matrix.bandwidth(),
                num_threads: pool.current_num_threads(),
                schedule,
                chunk_size: chunk,
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
    fn zeros_outside_the_structure() {
        let banded = SpecialMatrix::generate(20, Kind::Banded, 2, 1);
        let lower = SpecialMatrix::generate(20, Kind::Lower, 0, 1);
        let upper = SpecialMatrix::generate(20, Kind::Upper, 0, 1);
        for i in 0..20usize {
            for j in 0..20usize {
                if i.abs_diff(j) > 2 {
                    assert_eq!(banded.get(i, j), 0.0);
                } else {
                    assert_ne!(banded.get(i, j), 0.0);
                }
                if j > i {
                    assert_eq!(lower.get(i, j), 0.0);
                }
                if j < i {
                    assert_eq!(upper.get(i, j), 0.0);
                }
            }
        }
    }

    #[test]
    fn structural_row_ranges() {
        let m = SpecialMatrix::generate(10, Kind::Banded, 3, 7);
        assert_eq!(m.columns(0), 0..4);
        assert_eq!(m.columns(5), 2..9);
        assert_eq!(m.columns(9), 6..10);
        let m = SpecialMatrix::generate(10, Kind::Lower, 0, 7);
        assert_eq!(m.columns(0), 0..1);
        let m = SpecialMatrix::generate(10, Kind::Upper, 0, 7);
        assert_eq!(m.columns(9), 9..10);
    }

    #[test]
    fn band_wider_than_the_matrix_is_dense() {
        let m = SpecialMatrix::generate(6, Kind::Banded, usize::MAX, 3);
        for i in 0..6 {
            assert_eq!(m.columns(i), 0..6);
        }
        assert!(maximin_sequential(&m) > f64::MIN);
    }

    #[test]
    fn row_minimum_ignores_structural_zeros() {
        // row 0 holds a single structural entry; the zero next to it is outside
        let m = SpecialMatrix {
            matrix: Matrix::from_rows(&[vec![3.0, 0.0], vec![-1.0, 2.0]]).unwrap(),
            kind: Kind::Lower,
            bandwidth: 0,
        };
        assert_eq!(m.row_min(0), 3.0);
        assert_eq!(maximin_sequential(&m), 3.0);
    }

    #[test]
    fn every_schedule_and_chunk_agrees() {
        let pool = cli::thread_pool(3).unwrap();
        let m = SpecialMatrix::generate(257, Kind::Banded, 7, 42);
        let expected = maximin_sequential(&m);
        for schedule in [Schedule::Static, Schedule::Dynamic, Schedule::Guided] {
            for chunk in [0, 1, 10, 300] {
                assert_eq!(maximin_parallel(&pool, &m, schedule, chunk), expected);
            }
        }
    }

    #[test]
    fn csv_columns() {
        let pool = cli::thread_pool(2).unwrap();
        let m = SpecialMatrix::generate(8, Kind::Upper, 0, 42);
        let records = run_benchmark(&pool, &m, Schedule::Guided, 2, 1);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("special.csv");
        common::report::append_csv(&path, &records).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(
            "N,matrix_type,bandwidth,num_threads,schedule,chunk_size,iteration,execution_time_ms,result_value\n8,upper,0,2,guided,2,0,"
        ));
    }
}
