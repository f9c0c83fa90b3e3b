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
use parking_lot::Mutex;
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::Serialize;

use common::timer::time_ms;
use common::{cli, rng, verify, Result};

pub const SEED_A: u64 = 12345;
pub const SEED_B: u64 = 67890;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    Sequential,
    Reduction,
    NoReduction,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Sequential => "sequential",
            Method::Reduction => "reduction",
            Method::NoReduction => "no-reduction",
        };
        f.write_str(name)
    }
}

/// The two input vectors, uniform over `[-100, 100)`.
pub fn vectors(len: usize) -> (Vec<f64>, Vec<f64>) {
    (
        rng::uniform_vec(len, -100.0, 100.0, SEED_A),
        rng::uniform_vec(len, -100.0, 100.0, SEED_B),
    )
}

pub fn sequential(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn reduction(pool: &ThreadPool, a: &[f64], b: &[f64]) -> f64 {
    pool.install(|| a.par_iter().zip(b.par_iter()).map(|(x, y)| x * y).sum())
}

/// Each team member sums its share privately and adds it to a shared total
/// under a lock.
pub fn no_reduction(pool: &ThreadPool, a: &[f64], b: &[f64]) -> f64 {
    let n = a.len();
    let total = Mutex::new(0.0);
    pool.broadcast(|ctx| {
        let (me, team) = (ctx.index(), ctx.num_threads());
        let range = me * n / team..(me + 1) * n / team;
        let local = sequential(&a[range.clone()], &b[range]);
        *total.lock() += local;
    });
    total.into_inner()
}

pub fn dot(pool: &ThreadPool, a: &[f64], b: &[f64], method: Method) -> f64 {
    match method {
        Method::Sequential => sequential(a, b),
        Method::Reduction => reduction(pool, a, b),
        Method::NoReduction => no_reduction(pool, a, b),
    }
}

/// Runs both parallel methods on 10 000 elements with four threads and
/// compares them with the sequential product.
pub fn self_check() -> Result<()> {
    let (a, b) = vectors(10_000);
    let pool = cli::thread_pool(4)?;
    let expected = sequential(&a, &b);
    verify::check("reduction", expected, reduction(&pool, &a, &b))?;
    verify::check("no-reduction", expected, no_reduction(&pool, &a, &b))?;
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub vector_size: usize,
    pub num_threads: usize,
    pub method: Method,
    pub iteration: usize,
    pub execution_time_ms: f64,
    pub result_value: f64,
}

pub fn run_benchmark(
    pool: &ThreadPool,
    a: &[f64],
    b: &[f64],
    method: Method,
    iterations: usize,
) -> Vec<Record> {
    let mut records = Vec::with_capacity(iterations);
    for iteration in 0..iterations {
        if iteration == 0 {
            let warmup = dot(pool, a, b, method);
            log::debug!("warmup result {:e}", warmup);
        }
        let (result_value, execution_time_ms) = time_ms(|| dot(pool, a, b, method));
        records.push(Record {
            vector_size: a.len(),
            num_threads: pool.current_num_threads(),
            method,
            iteration,
            execution_time_ms,
            result_value,
        });
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_check_passes() {
        self_check().unwrap();
    }

    #[test]
    fn methods_agree_on_odd_lengths() {
        let pool = cli::thread_pool(3).unwrap();
        for len in [0, 1, 2, 1001] {
            let (a, b) = vectors(len);
            let expected = sequential(&a, &b);
            for method in [Method::Reduction, Method::NoReduction] {
                assert!(verify::agrees(expected, dot(&pool, &a, &b, method), verify::TOLERANCE));
            }
        }
    }

    #[test]
    fn orthogonal_vectors() {
        let pool = cli::thread_pool(2).unwrap();
        let a = [1.0, 0.0, 1.0, 0.0];
        let b = [0.0, 2.0, 0.0, 2.0];
        assert_eq!(no_reduction(&pool, &a, &b), 0.0);
    }

    #[test]
    fn csv_rows_use_the_expected_columns() {
        let pool = cli::thread_pool(2).unwrap();
        let (a, b) = vectors(100);
        let records = run_benchmark(&pool, &a, &b, Method::NoReduction, 2);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dot.csv");
        common::report::append_csv(&path, &records).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("vector_size,num_threads,method,iteration,execution_time_ms,result_value")
        );
        assert!(lines.next().unwrap().starts_with("100,2,no-reduction,0,"));
    }
}
