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
use rand::Rng;
use rayon::ThreadPool;
use serde::Serialize;

use common::schedule::parallel_fold;
use common::timer::time_ms;
use common::{cli, rng, verify, Result, Schedule};

/// Loop strategies compared by the benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Sequential,
    Static,
    Dynamic,
    Guided,
}

impl Strategy {
    pub fn schedule(self) -> Option<Schedule> {
        match self {
            Strategy::Sequential => None,
            Strategy::Static => Some(Schedule::Static),
            Strategy::Dynamic => Some(Schedule::Dynamic),
            Strategy::Guided => Some(Schedule::Guided),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.schedule() {
            None => f.write_str("sequential"),
            Some(schedule) => schedule.fmt(f),
        }
    }
}

/// `work` random draws `v` in `[0, 1)`, each contributing
/// `sin v cos v + sqrt v + ln(v + 1)`. The generator is seeded from the
/// iteration so every schedule sees the same values.
pub fn heavy_work(iteration: usize, work: usize) -> f64 {
    let mut gen = rng::seeded(12345 * iteration as u64);
    let mut sum = 0.0;
    for _ in 0..work {
        let v: f64 = gen.gen();
        sum += v.sin() * v.cos() + v.sqrt() + (v + 1.0).ln();
    }
    sum
}

pub fn light_work(iteration: usize) -> f64 {
    iteration as f64 * 0.001
}

/// Every tenth iteration is heavy, every fifth medium, the rest light.
pub fn iteration_cost(i: usize) -> f64 {
    if i % 10 == 0 {
        heavy_work(i, 10_000)
    } else if i % 5 == 0 {
        heavy_work(i, 5_000)
    } else {
        light_work(i)
    }
}

pub fn uneven_loop(pool: &ThreadPool, iterations: usize, strategy: Strategy, chunk: usize) -> f64 {
    match strategy.schedule() {
        None => (0..iterations).map(iteration_cost).sum(),
        Some(schedule) => parallel_fold(
            pool,
            iterations,
            schedule,
            chunk,
            0.0,
            |acc, i| acc + iteration_cost(i),
            |a, b| a + b,
        ),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub num_iterations: usize,
    pub num_threads: usize,
    pub schedule: Strategy,
    pub chunk_size: usize,
    pub execution_time_ms: f64,
    pub result: f64,
}

/// Times `runs` executions of the loop and reports the mean time with the
/// result of the last run.
pub fn run_benchmark(
    pool: &ThreadPool,
    iterations: usize,
    strategy: Strategy,
    chunk: usize,
    runs: usize,
) -> Record {
    let mut total_ms = 0.0;
    let mut result = 0.0;
    for run in 0..runs {
        let (value, ms) = time_ms(|| uneven_loop(pool, iterations, strategy, chunk));
        log::debug!("run {} took {:.3} ms", run, ms);
        total_ms += ms;
        result = value;
    }
    Record {
        num_iterations: iterations,
        num_threads: pool.current_num_threads(),
        schedule: strategy,
        chunk_size: chunk,
        execution_time_ms: total_ms / runs.max(1) as f64,
        result,
    }
}

/// Result of one schedule in [`verify_schedules`].
#[derive(Debug, Clone)]
pub struct Verification {
    pub strategy: Strategy,
    pub result: f64,
    pub error: f64,
}

/// Runs every parallel schedule with four threads and default chunking and
/// compares it with the sequential loop.
pub fn verify_schedules(iterations: usize) -> Result<(f64, Vec<Verification>)> {
    let pool = cli::thread_pool(4)?;
    let expected = uneven_loop(&pool, iterations, Strategy::Sequential, 0);
    let mut outcomes = Vec::new();
    for strategy in [Strategy::Static, Strategy::Dynamic, Strategy::Guided] {
        let result = uneven_loop(&pool, iterations, strategy, 0);
        outcomes.push(Verification {
            strategy,
            result,
            error: (result - expected).abs(),
        });
    }
    for outcome in &outcomes {
        verify::check(&outcome.strategy.to_string(), expected, outcome.result)?;
    }
    Ok((expected, outcomes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heavy_work_is_deterministic() {
        assert_eq!(heavy_work(20, 100), heavy_work(20, 100));
        assert_ne!(heavy_work(20, 100), heavy_work(30, 100));
        assert_eq!(heavy_work(7, 0), 0.0);
    }

    #[test]
    fn costs_follow_the_pattern() {
        assert_eq!(iteration_cost(3), 0.003);
        assert_eq!(iteration_cost(15), heavy_work(15, 5_000));
        assert_eq!(iteration_cost(20), heavy_work(20, 10_000));
    }

    #[test]
    fn schedules_agree_with_sequential() {
        let (expected, outcomes) = verify_schedules(200).unwrap();
        assert!(expected > 0.0);
        assert_eq!(outcomes.len(), 3);
    }

    #[test]
    fn chunked_schedules_agree() {
        let pool = cli::thread_pool(3).unwrap();
        let expected = uneven_loop(&pool, 150, Strategy::Sequential, 0);
        for strategy in [Strategy::Static, Strategy::Dynamic, Strategy::Guided] {
            let got = uneven_loop(&pool, 150, strategy, 7);
            assert!(verify::agrees(expected, got, verify::TOLERANCE));
        }
    }

    #[test]
    fn record_averages_runs() {
        let pool = cli::thread_pool(2).unwrap();
        let record = run_benchmark(&pool, 50, Strategy::Dynamic, 4, 3);
        assert_eq!(record.num_threads, 2);
        assert_eq!(record.chunk_size, 4);
        assert!(record.execution_time_ms >= 0.0);
        assert!(verify::agrees(
            uneven_loop(&pool, 50, Strategy::Sequential, 0),
            record.result,
            verify::TOLERANCE
        ));
    }

    #[test]
    fn csv_columns() {
        let pool = cli::thread_pool(1).unwrap();
        let record = run_benchmark(&pool, 4, Strategy::Static, 0, 1);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scheduling.csv");
        common::report::append_csv(&path, &[record]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(
            "num_iterations,num_threads,schedule,chunk_size,execution_time_ms,result\n4,1,static,0,"
        ));
    }
}
