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
use serde::Serialize;

use comm::{ReduceOp, World};
use common::{rng, Error, Result};

pub const SEED: u64 = 42;
pub const DEFAULT_LENGTH: usize = 10_000_000;

/// Where the vector comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    /// every rank draws its own share from seed `42 + rank`
    Local,
    /// the root draws the whole vector and scatters equal blocks
    Scatter,
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distribution::Local => f.write_str("local"),
            Distribution::Scatter => f.write_str("scatter"),
        }
    }
}

/// Length of the share of `rank`; the last rank also takes the remainder.
pub fn share_len(rank: usize, size: usize, n: usize) -> usize {
    let len = n / size;
    if rank + 1 == size {
        len + n % size
    } else {
        len
    }
}

pub fn local_share(rank: usize, size: usize, n: usize) -> Vec<i32> {
    rng::uniform_i32_vec(share_len(rank, size, n), SEED + rank as u64)
}

/// The whole vector as it ends up spread over `size` ranks.
pub fn full_vector(distribution: Distribution, size: usize, n: usize) -> Vec<i32> {
    match distribution {
        Distribution::Local => (0..size).flat_map(|rank| local_share(rank, size, n)).collect(),
        Distribution::Scatter => rng::uniform_i32_vec(n / size * size, SEED),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Row {
    pub processes: usize,
    pub n: usize,
    pub time_s: f64,
    pub min: i32,
}

/// Times the local minimum plus the reduction to rank 0, starting after a
/// barrier. The root checks the result against a sequential search.
pub fn measure(processes: usize, n: usize, distribution: Distribution) -> Result<Row> {
    let world = World::new(processes)?;
    let rows = world.try_run(|comm| -> Result<Option<Row>> {
        let (rank, size) = (comm.rank(), comm.size());
        let (local, total) = match distribution {
            Distribution::Local => (local_share(rank, size, n), n),
            Distribution::Scatter => {
                let count = n / size * size;
                let all = if rank == 0 {
                    rng::uniform_i32_vec(count, SEED)
                } else {
                    Vec::new()
                };
                (comm.scatter(&all, 0)?, count)
            }
        };
        log::debug!("rank {} holds {} values", rank, local.len());

        comm.barrier()?;
        let start = comm.wtime();
        let local_min = local.iter().copied().min().unwrap_or(i32::MAX);
        let global = comm.reduce(&[local_min], ReduceOp::Min, 0)?;
        let time_s = comm.wtime() - start;

        Ok(global.and_then(|v| v.first().copied()).map(|min| Row {
            processes: size,
            n: total,
            time_s,
            min,
        }))
    })?;
    let row = rows
        .into_iter()
        .flatten()
        .next()
        .ok_or_else(|| Error::invalid("the root reported no result"))?;

    let expected = full_vector(distribution, processes, n)
        .into_iter()
        .min()
        .unwrap_or(i32::MAX);
    if expected != row.min {
        return Err(Error::Validation {
            label: "global minimum".to_string(),
            expected: f64::from(expected),
            observed: f64::from(row.min),
            tolerance: 0.0,
        });
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shares_cover_the_vector() {
        for (size, n) in [(1, 10), (3, 10), (4, 3), (4, 16)] {
            let total: usize = (0..size).map(|r| share_len(r, size, n)).sum();
            assert_eq!(total, n);
        }
        assert_eq!(share_len(2, 3, 10), 4);
        assert_eq!(share_len(0, 3, 10), 3);
    }

    #[test]
    fn local_distribution() {
        for processes in 1..=4 {
            let row = measure(processes, 10_001, Distribution::Local).unwrap();
            assert_eq!(row.processes, processes);
            assert_eq!(row.n, 10_001);
            assert!(row.time_s >= 0.0);
        }
    }

    #[test]
    fn scatter_drops_the_remainder() {
        let row = measure(3, 1000, Distribution::Scatter).unwrap();
        assert_eq!(row.n, 999);
        assert_eq!(row.min, rng::uniform_i32_vec(999, SEED).into_iter().min().unwrap());
    }

    #[test]
    fn fewer_values_than_ranks() {
        let row = measure(4, 2, Distribution::Local).unwrap();
        assert_eq!(row.min, local_share(3, 4, 2).into_iter().min().unwrap());
        let row = measure(4, 2, Distribution::Scatter).unwrap();
        assert_eq!((row.n, row.min), (0, i32::MAX));
    }

    #[test]
    fn semicolon_row() {
        let row = Row {
            processes: 4,
            n: 100,
            time_s: 0.5,
            min: -7,
        };
        let mut out = Vec::new();
        common::report::write_rows(&mut out, &[row], false).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "4;100;0.5;-7\n");
    }

    #[test]
    fn csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minmax.csv");
        let row = measure(2, 50, Distribution::Local).unwrap();
        common::report::append_csv(&path, &[row]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("processes,n,time_s,min\n2,50,"));
    }
}
