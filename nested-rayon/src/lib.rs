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
use common::{cli, verify, Error, Matrix, Result};

pub const SEED: u64 = 42;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Sequential,
    /// one pool, rows spread over it
    Flat,
    /// rows over an outer pool, each row minimum inside an inner pool
    Nested,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Sequential => "sequential",
            Method::Flat => "flat",
            Method::Nested => "nested",
        };
        f.write_str(name)
    }
}

/// Thread counts as written on the command line: `8` or `outer:inner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Team {
    Flat(usize),
    Nested { outer: usize, inner: usize },
}

impl Team {
    pub fn parse(s: &str) -> std::result::Result<Team, String> {
        let count = |part: &str| match part.trim().parse::<usize>() {
            Ok(0) => Err(format!("thread counts must be >= 1 in '{}'", s)),
            Ok(n) => Ok(n),
            Err(e) => Err(format!("'{}': {}", s, e)),
        };
        match s.split_once(':') {
            Some((outer, inner)) => Ok(Team::Nested {
                outer: count(outer)?,
                inner: count(inner)?,
            }),
            None => Ok(Team::Flat(count(s)?)),
        }
    }

    pub fn total(self) -> usize {
        match self {
            Team::Flat(n) => n,
            Team::Nested { outer, inner } => outer * inner,
        }
    }

    pub fn outer(self) -> usize {
        match self {
            Team::Flat(_) => 0,
            Team::Nested { outer, .. } => outer,
        }
    }

    pub fn inner(self) -> usize {
        match self {
            Team::Flat(_) => 0,
            Team::Nested { inner, .. } => inner,
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Team::Flat(n) => write!(f, "{}", n),
            Team::Nested { outer, inner } => write!(f, "{}:{}", outer, inner),
        }
    }
}

/// An outer pool plus one inner pool per outer worker, so that every outer
/// thread owns `inner` threads of its own.
pub struct NestedPools {
    outer: ThreadPool,
    inner: Vec<ThreadPool>,
}

impl NestedPools {
    pub fn new(outer: usize, inner: usize) -> Result<Self> {
        let inner = (0..outer)
            .map(|_| cli::thread_pool(inner))
            .collect::<Result<Vec<_>>>()?;
        Ok(NestedPools {
            outer: cli::thread_pool(outer)?,
            inner,
        })
    }

    fn inner_pool(&self) -> &ThreadPool {
        let me = rayon::current_thread_index().unwrap_or(0);
        &self.inner[me % self.inner.len()]
    }

    pub fn maximin(&self, matrix: &Matrix) -> f64 {
        self.outer.install(|| {
            (0..matrix.rows())
                .into_par_iter()
                .map(|i| {
                    self.inner_pool().install(|| {
                        matrix
                            .row(i)
                            .par_iter()
                            .copied()
                            .reduce(|| f64::MAX, f64::min)
                    })
                })
                .reduce(|| f64::MIN, f64::max)
        })
    }

    /// `(outer index, outer size, inner index, inner size)` for every thread
    /// of the nested team.
    pub fn members(&self) -> Vec<(usize, usize, usize, usize)> {
        self.outer
            .broadcast(|o| {
                let (oi, on) = (o.index(), o.num_threads());
                self.inner[oi].broadcast(move |i| (oi, on, i.index(), i.num_threads()))
            })
            .into_iter()
            .flatten()
            .collect()
    }
}

pub fn maximin_flat(pool: &ThreadPool, matrix: &Matrix) -> f64 {
    pool.install(|| {
        (0..matrix.rows())
            .into_par_iter()
            .map(|i| row_min(matrix.row(i)))
            .reduce(|| f64::MIN, f64::max)
    })
}

/// The thread layout a method runs on.
pub enum Executor {
    Sequential,
    Flat(ThreadPool),
    Nested(NestedPools),
}

impl Executor {
    pub fn new(method: Method, team: Team) -> Result<Self> {
        match (method, team) {
            (Method::Sequential, _) => Ok(Executor::Sequential),
            (Method::Flat, team) => Ok(Executor::Flat(cli::thread_pool(team.total())?)),
            (Method::Nested, Team::Nested { outer, inner }) => {
                Ok(Executor::Nested(NestedPools::new(outer, inner)?))
            }
            (Method::Nested, Team::Flat(_)) => Err(Error::invalid(
                "the nested method takes threads as outer:inner, e.g. 2:2",
            )),
        }
    }

    pub fn maximin(&self, matrix: &Matrix) -> f64 {
        match self {
            Executor::Sequential => maximin_sequential(matrix),
            Executor::Flat(pool) => maximin_flat(pool, matrix),
            Executor::Nested(pools) => pools.maximin(matrix),
        }
    }
}

/// The 3x3 game with value 4 on every method, then a random 100x100 matrix
/// where flat (4 threads) and nested (2:2) must match the sequential answer.
pub fn self_check() -> Result<()> {
    let game = Matrix::from_rows(&[
        vec![5.0, 3.0, 7.0],
        vec![2.0, 8.0, 1.0],
        vec![6.0, 4.0, 9.0],
    ])?;
    let flat = cli::thread_pool(2)?;
    let nested = NestedPools::new(2, 2)?;
    verify::check("3x3 sequential", 4.0, maximin_sequential(&game))?;
    verify::check("3x3 flat", 4.0, maximin_flat(&flat, &game))?;
    verify::check("3x3 nested", 4.0, nested.maximin(&game))?;

    let matrix = Matrix::random(100, 12345);
    let expected = maximin_sequential(&matrix);
    let flat = cli::thread_pool(4)?;
    verify::check("100x100 flat", expected, maximin_flat(&flat, &matrix))?;
    verify::check("100x100 nested", expected, nested.maximin(&matrix))
}

#[derive(Debug, Clone, Serialize)]
pub struct Record {
    #[serde(rename = "N")]
    pub n: usize,
    pub num_threads: usize,
    pub outer_threads: usize,
    pub inner_threads: usize,
    pub method: Method,
    pub iteration: usize,
    pub execution_time_ms: f64,
    pub result_value: f64,
}

pub fn run_benchmark(
    matrix: &Matrix,
    method: Method,
    team: Team,
    iterations: usize,
) -> Result<Vec<Record>> {
    let executor = Executor::new(method, team)?;
    if method != Method::Sequential {
        let warmup = executor.maximin(matrix);
        log::debug!("warmup maximin = {}", warmup);
    }
    let records = (0..iterations)
        .map(|iteration| {
            let (result_value, execution_time_ms) = time_ms(|| executor.maximin(matrix));
            Record {
                n: matrix.rows(),
                num_threads: team.total(),
                outer_threads: team.outer(),
                inner_threads: team.inner(),
                method,
                iteration,
                execution_time_ms,
                result_value,
            }
        })
        .collect();
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_check_passes() {
        self_check().unwrap();
    }

    #[test]
    fn team_parsing() {
        assert_eq!(Team::parse("4"), Ok(Team::Flat(4)));
        assert_eq!(Team::parse("4:2"), Ok(Team::Nested { outer: 4, inner: 2 }));
        assert_eq!(Team::parse("4:2").unwrap().total(), 8);
        assert!(Team::parse("0").is_err());
        assert!(Team::parse("2:0").is_err());
        assert!(Team::parse("two").is_err());
        assert!(Team::parse("2:").is_err());
    }

    #[test]
    fn nested_needs_outer_inner() {
        assert!(matches!(
            Executor::new(Method::Nested, Team::Flat(4)),
            Err(Error::InvalidArgument(_))
        ));
        let flat = Executor::new(Method::Flat, Team::Nested { outer: 2, inner: 3 }).unwrap();
        assert!(matches!(flat, Executor::Flat(ref pool) if pool.current_num_threads() == 6));
    }

    #[test]
    fn every_outer_thread_sees_its_own_inner_team() {
        let pools = NestedPools::new(2, 2).unwrap();
        let mut members = pools.members();
        members.sort();
        assert_eq!(
            members,
            vec![(0, 2, 0, 2), (0, 2, 1, 2), (1, 2, 0, 2), (1, 2, 1, 2)]
        );
    }

    #[test]
    fn nested_matches_sequential() {
        let pools = NestedPools::new(3, 2).unwrap();
        for n in [1, 7, 64] {
            let matrix = Matrix::random(n, SEED);
            assert_eq!(pools.maximin(&matrix), maximin_sequential(&matrix));
        }
    }

    #[test]
    fn csv_columns() {
        let matrix = Matrix::random(6, SEED);
        let team = Team::Nested { outer: 2, inner: 2 };
        let records = run_benchmark(&matrix, Method::Nested, team, 2).unwrap();
        assert_eq!(records.len(), 2);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested.csv");
        common::report::append_csv(&path, &records).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(
            "N,num_threads,outer_threads,inner_threads,method,iteration,execution_time_ms,result_value\n6,4,2,2,nested,0,"
        ));
    }
}
