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
use std::sync::atomic::{AtomicU64, Ordering};

use clap::ValueEnum;
use parking_lot::{Mutex, MutexGuard};
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::Serialize;

use common::timer::time_ms;
use common::{cli, rng, verify, Result};

pub const SEED: u64 = 42;

/// How the per-thread partial sums reach the shared total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Sequential,
    /// rayon's own parallel sum
    Builtin,
    /// compare-and-swap on the bits of an f64
    Atomic,
    /// scoped mutex guard around the update
    Critical,
    /// explicit lock and fair unlock
    Lock,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Sequential => "sequential",
            Method::Builtin => "builtin",
            Method::Atomic => "atomic",
            Method::Critical => "critical",
            Method::Lock => "lock",
        };
        f.write_str(name)
    }
}

/// Uniform values over `[0, 100)`.
pub fn array(len: usize) -> Vec<f64> {
    rng::uniform_vec(len, 0.0, 100.0, SEED)
}

pub fn sequential(data: &[f64]) -> f64 {
    data.iter().sum()
}

pub fn builtin(pool: &ThreadPool, data: &[f64]) -> f64 {
    pool.install(|| data.par_iter().sum())
}

/// Every team member sums a contiguous block and hands its partial to
/// `merge`.
fn team_partials<F>(pool: &ThreadPool, data: &[f64], merge: F)
where
    F: Fn(f64) + Sync,
{
    let n = data.len();
    pool.broadcast(|ctx| {
        let (me, team) = (ctx.index(), ctx.num_threads());
        merge(sequential(&data[me * n / team..(me + 1) * n / team]));
    });
}

/// An f64 accumulator updated with a compare-and-swap loop on its bits.
#[derive(Debug, Default)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        AtomicF64(AtomicU64::new(value.to_bits()))
    }

    pub fn fetch_add(&self, delta: f64) -> f64 {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + delta).to_bits();
            match self
                .0
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(previous) => return f64::from_bits(previous),
                Err(actual) => current = actual,
            }
        }
    }

    pub fn into_inner(self) -> f64 {
        f64::from_bits(self.0.into_inner())
    }
}

pub fn atomic(pool: &ThreadPool, data: &[f64]) -> f64 {
    let total = AtomicF64::new(0.0);
    team_partials(pool, data, |partial| {
        total.fetch_add(partial);
    });
    total.into_inner()
}

pub fn critical(pool: &ThreadPool, data: &[f64]) -> f64 {
    let total = Mutex::new(0.0);
    team_partials(pool, data, |partial| *total.lock() += partial);
    total.into_inner()
}

pub fn lock(pool: &ThreadPool, data: &[f64]) -> f64 {
    let total = Mutex::new(0.0);
    team_partials(pool, data, |partial| {
        let mut guard = total.lock();
        *guard += partial;
        MutexGuard::unlock_fair(guard);
    });
    total.into_inner()
}

pub fn reduce(pool: &ThreadPool, data: &[f64], method: Method) -> f64 {
    match method {
        Method::Sequential => sequential(data),
        Method::Builtin => builtin(pool, data),
        Method::Atomic => atomic(pool, data),
        Method::Critical => critical(pool, data),
        Method::Lock => lock(pool, data),
    }
}

/// Result of one method in [`verify_methods`].
#[derive(Debug, Clone)]
pub struct Verification {
    pub method: Method,
    pub result: f64,
    pub error: f64,
}

/// Sums `size` elements with every parallel method on four threads and
/// checks each against the sequential sum.
pub fn verify_methods(size: usize) -> Result<(f64, Vec<Verification>)> {
    let data = array(size);
    let pool = cli::thread_pool(4)?;
    let expected = sequential(&data);
    let outcomes: Vec<Verification> = [Method::Builtin, Method::Atomic, Method::Critical, Method::Lock]
        .into_iter()
        .map(|method| {
            let result = reduce(&pool, &data, method);
            Verification {
                method,
                result,
                error: (result - expected).abs(),
            }
        })
        .collect();
    for outcome in &outcomes {
        verify::check(&outcome.method.to_string(), expected, outcome.result)?;
    }
    Ok((expected, outcomes))
}

#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub array_size: usize,
    pub num_threads: usize,
    pub method: Method,
    pub execution_time_ms: f64,
    pub result: f64,
}

/// Mean time over `runs`, result of the last run.
pub fn run_benchmark(pool: &ThreadPool, data: &[f64], method: Method, runs: usize) -> Record {
    let mut total_ms = 0.0;
    let mut result = 0.0;
    for _ in 0..runs {
        let (value, ms) = time_ms(|| reduce(pool, data, method));
        total_ms += ms;
        result = value;
    }
    log::debug!("{} over {} runs: {:.3} ms total", method, runs, total_ms);
    Record {
        array_size: data.len(),
        num_threads: pool.current_num_threads(),
        method,
        execution_time_ms: total_ms / runs.max(1) as f64,
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_passes() {
        let (expected, outcomes) = verify_methods(10_000).unwrap();
        assert!(expected > 0.0);
        assert!(outcomes.iter().all(|o| o.error < 1e-6 * expected));
    }

    #[test]
    fn atomic_f64_accumulates() {
        let acc = AtomicF64::new(1.5);
        assert_eq!(acc.fetch_add(2.0), 1.5);
        assert_eq!(acc.into_inner(), 3.5);
    }

    #[test]
    fn atomic_under_contention() {
        let pool = cli::thread_pool(8).unwrap();
        let acc = AtomicF64::default();
        pool.broadcast(|_| {
            for _ in 0..1000 {
                acc.fetch_add(1.0);
            }
        });
        assert_eq!(acc.into_inner(), 8000.0);
    }

    #[test]
    fn methods_agree_on_small_arrays() {
        // fewer elements than threads leaves some blocks empty
        let pool = cli::thread_pool(6).unwrap();
        for n in [0, 1, 5, 97] {
            let data = array(n);
            let expected = sequential(&data);
            for method in [Method::Builtin, Method::Atomic, Method::Critical, Method::Lock] {
                assert!(verify::agrees(expected, reduce(&pool, &data, method), verify::TOLERANCE));
            }
        }
    }

    #[test]
    fn values_lie_in_range() {
        assert!(array(1000).iter().all(|&v| (0.0..100.0).contains(&v)));
    }

    #[test]
    fn csv_columns() {
        let pool = cli::thread_pool(2).unwrap();
        let record = run_benchmark(&pool, &array(10), Method::Lock, 2);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reduction.csv");
        common::report::append_csv(&path, &[record]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("array_size,num_threads,method,execution_time_ms,result\n10,2,lock,"));
    }
}
