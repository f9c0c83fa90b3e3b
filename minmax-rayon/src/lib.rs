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

use common::timer::time_ms;
use common::{verify, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    /// rayon reduction with min/max as the combining operator
    Reduction,
    /// one storage slot per team member, combined sequentially
    NoReduction,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Reduction => f.write_str("reduction"),
            Method::NoReduction => f.write_str("no-reduction"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Min,
    Max,
}

impl Operation {
    fn identity(self) -> f64 {
        match self {
            Operation::Min => f64::MAX,
            Operation::Max => -f64::MAX,
        }
    }

    fn pick(self, a: f64, b: f64) -> f64 {
        match self {
            Operation::Min => a.min(b),
            Operation::Max => a.max(b),
        }
    }
}

pub fn sequential(data: &[f64], op: Operation) -> f64 {
    data.iter().fold(op.identity(), |acc, &x| op.pick(acc, x))
}

pub fn with_reduction(pool: &ThreadPool, data: &[f64], op: Operation) -> f64 {
    pool.install(|| {
        data.par_iter()
            .copied()
            .reduce(|| op.identity(), |a, b| op.pick(a, b))
    })
}

/// Every thread of the team scans its contiguous share and leaves the result
/// in its own slot; the slots are then combined on the calling thread.
pub fn with_thread_storage(pool: &ThreadPool, data: &[f64], op: Operation) -> f64 {
    let n = data.len();
    let storage = pool.broadcast(|ctx| {
        let team = ctx.num_threads();
        let me = ctx.index();
        sequential(&data[me * n / team..(me + 1) * n / team], op)
    });
    storage.into_iter().fold(op.identity(), |acc, x| op.pick(acc, x))
}

pub fn extremum(pool: &ThreadPool, data: &[f64], method: Method, op: Operation) -> f64 {
    match method {
        Method::Reduction => with_reduction(pool, data, op),
        Method::NoReduction => with_thread_storage(pool, data, op),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Measurement {
    pub method: Method,
    pub operation: Operation,
    pub threads: usize,
    pub size: usize,
    pub result: f64,
    pub time_ms: f64,
    pub run: usize,
}

/// One warmup, then `runs` rounds each timing a min and a max search. Both
/// results are checked against the sequential scan.
pub fn benchmark(
    pool: &ThreadPool,
    data: &[f64],
    method: Method,
    runs: usize,
) -> Result<Vec<Measurement>> {
    let expected_min = sequential(data, Operation::Min);
    let expected_max = sequential(data, Operation::Max);

    let warmup = extremum(pool, data, method, Operation::Min);
    log::debug!("warmup {} min = {}", method, warmup);

    let mut measurements = Vec::with_capacity(2 * runs);
    for run in 0..runs {
        for (op, expected) in [
            (Operation::Min, expected_min),
            (Operation::Max, expected_max),
        ] {
            let (result, ms) = time_ms(|| extremum(pool, data, method, op));
            verify::check(&format!("{} {:?}", method, op), expected, result)?;
            measurements.push(Measurement {
                method,
                operation: op,
                threads: pool.current_num_threads(),
                size: data.len(),
                result,
                time_ms: ms,
                run,
            });
        }
    }
    Ok(measurements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::cli::thread_pool;
    use common::rng;

    #[test]
    fn both_methods_match_sequential() {
        let data = rng::uniform_vec(100_003, -1000.0, 1000.0, rng::DEFAULT_SEED);
        let pool = thread_pool(4).unwrap();
        for method in [Method::Reduction, Method::NoReduction] {
            for op in [Operation::Min, Operation::Max] {
                assert_eq!(extremum(&pool, &data, method, op), sequential(&data, op));
            }
        }
    }

    #[test]
    fn more_threads_than_elements() {
        let pool = thread_pool(4).unwrap();
        let data = [3.0, -1.0];
        assert_eq!(with_thread_storage(&pool, &data, Operation::Min), -1.0);
        assert_eq!(with_thread_storage(&pool, &data, Operation::Max), 3.0);
    }

    #[test]
    fn benchmark_emits_min_then_max() {
        let pool = thread_pool(2).unwrap();
        let data = rng::uniform_vec(1000, -1000.0, 1000.0, 1);
        let rows = benchmark(&pool, &data, Method::NoReduction, 3).unwrap();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0].operation, Operation::Min);
        assert_eq!(rows[1].operation, Operation::Max);
        assert_eq!(rows[5].run, 2);
        assert!(rows.iter().all(|r| r.threads == 2 && r.size == 1000));
    }

    #[test]
    fn json_names_match_the_cli() {
        let m = Measurement {
            method: Method::NoReduction,
            operation: Operation::Max,
            threads: 1,
            size: 1,
            result: 0.5,
            time_ms: 0.0,
            run: 0,
        };
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.starts_with(r#"{"method":"no-reduction","operation":"max""#));
    }
}
