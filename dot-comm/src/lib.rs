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
use common::{rng, verify, Error, Result};

pub const SEED_A: u64 = 42;
pub const SEED_B: u64 = 43;
pub const DEFAULT_LENGTH: usize = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    /// every rank draws its own shares from seeds `42 + rank` and `43 + rank`
    Local,
    /// the root draws both vectors and scatters equal blocks
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

fn share_len(rank: usize, size: usize, n: usize) -> usize {
    if rank + 1 == size {
        n / size + n % size
    } else {
        n / size
    }
}

fn uniform(len: usize, seed: u64) -> Vec<f64> {
    rng::uniform_vec(len, -100.0, 100.0, seed)
}

/// The shares of `a` and `b` that `rank` generates itself.
pub fn local_shares(rank: usize, size: usize, n: usize) -> (Vec<f64>, Vec<f64>) {
    let len = share_len(rank, size, n);
    let offset = rank as u64;
    (uniform(len, SEED_A + offset), uniform(len, SEED_B + offset))
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Sequential product over the vectors as they are spread over `size` ranks.
pub fn reference(distribution: Distribution, size: usize, n: usize) -> f64 {
    match distribution {
        Distribution::Local => (0..size)
            .map(|rank| {
                let (a, b) = local_shares(rank, size, n);
                dot(&a, &b)
            })
            .sum(),
        Distribution::Scatter => {
            let count = n / size * size;
            dot(&uniform(count, SEED_A), &uniform(count, SEED_B))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Row {
    pub processes: usize,
    pub n: usize,
    pub time_s: f64,
    pub dot: f64,
}

/// Times the local products plus the sum reduction to rank 0, starting after
/// a barrier.
pub fn measure(processes: usize, n: usize, distribution: Distribution) -> Result<Row> {
    let world = World::new(processes)?;
    let rows = world.try_run(|comm| -> Result<Option<Row>> {
        let (rank, size) = (comm.rank(), comm.size());
        let (a, b, total) = match distribution {
            Distribution::Local => {
                let (a, b) = local_shares(rank, size, n);
                (a, b, n)
            }
            Distribution::Scatter => {
                let count = n / size * size;
                let (all_a, all_b) = if rank == 0 {
                    (uniform(count, SEED_A), uniform(count, SEED_B))
                } else {
                    (Vec::new(), Vec::new())
                };
                let a = comm.scatter(&all_a, 0)?;
                let b = comm.scatter(&all_b, 0)?;
                (a, b, count)
            }
        };

        comm.barrier()?;
        let start = comm.wtime();
        let local = dot(&a, &b);
        let global = comm.reduce(&[local], ReduceOp::Sum, 0)?;
        let time_s = comm.wtime() - start;
        log::debug!("rank {}: local product {:e}", rank, local);

        Ok(global.and_then(|v| v.first().copied()).map(|dot| Row {
            processes: size,
            n: total,
            time_s,
            dot,
        }))
    })?;
    let row = rows
        .into_iter()
        .flatten()
        .next()
        .ok_or_else(|| Error::invalid("the root reported no result"))?;
    verify::check("dot product", reference(distribution, processes, n), row.dot)?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_and_scatter_on_small_worlds() {
        for processes in 1..=4 {
            let local = measure(processes, 5_003, Distribution::Local).unwrap();
            assert_eq!(local.n, 5_003);
            let scattered = measure(processes, 5_003, Distribution::Scatter).unwrap();
            assert_eq!(scattered.n, 5_003 / processes * processes);
        }
    }

    #[test]
    fn scatter_on_one_rank_is_the_plain_product() {
        let row = measure(1, 100, Distribution::Scatter).unwrap();
        let expected = dot(&uniform(100, SEED_A), &uniform(100, SEED_B));
        assert!(verify::agrees(expected, row.dot, verify::TOLERANCE));
    }

    #[test]
    fn shares_use_rank_seeds() {
        let (a0, _) = local_shares(0, 2, 10);
        let (a1, b1) = local_shares(1, 2, 10);
        assert_eq!(a0, uniform(5, 42));
        assert_eq!(a1, uniform(5, 43));
        assert_eq!(b1, uniform(5, 44));
    }

    #[test]
    fn semicolon_row() {
        let row = Row {
            processes: 2,
            n: 8,
            time_s: 0.25,
            dot: 1.5,
        };
        let mut out = Vec::new();
        common::report::write_rows(&mut out, &[row], false).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "2;8;0.25;1.5\n");
    }
}
