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

use comm::{linear, Comm, CommError, ReduceOp, World};
use common::{Error, Result};

pub const DEFAULT_ITERATIONS: usize = 100;
pub const DEFAULT_SIZES: [usize; 6] = [1, 10, 100, 1000, 10_000, 100_000];
const ROOT: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
pub enum Operation {
    Broadcast,
    Reduce,
    Scatter,
    Gather,
    Allgather,
    Alltoall,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::Broadcast,
        Operation::Reduce,
        Operation::Scatter,
        Operation::Gather,
        Operation::Allgather,
        Operation::Alltoall,
    ];
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Broadcast => "Broadcast",
            Operation::Reduce => "Reduce",
            Operation::Scatter => "Scatter",
            Operation::Gather => "Gather",
            Operation::Allgather => "Allgather",
            Operation::Alltoall => "Alltoall",
        };
        f.write_str(name)
    }
}

/// Which implementation of an operation to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Implementation {
    /// the root loops over its peers, see [`comm::linear`]
    Linear,
    /// the tree and ring algorithms on [`Comm`]
    Tree,
}

/// Iterations used for one data size.
pub fn iterations_for(data_size: usize, iterations: usize) -> usize {
    if data_size >= 100_000 {
        iterations.min(10)
    } else if data_size >= 10_000 {
        iterations.min(20)
    } else {
        iterations
    }
}

/// Inputs of one rank: `data_size` values for the rooted operations and
/// `data_size` per rank for scatter and all-to-all.
struct Buffers {
    local: Vec<i64>,
    spread: Vec<i64>,
}

impl Buffers {
    fn new(rank: usize, size: usize, data_size: usize) -> Self {
        let base = rank as i64 * 100;
        Buffers {
            local: (0..data_size as i64).map(|i| base + i).collect(),
            spread: (0..(data_size * size) as i64).map(|i| base + i).collect(),
        }
    }
}

/// One call of `op`. Rooted operations return an empty vector off the root.
fn call(comm: &Comm, op: Operation, imp: Implementation, buffers: &Buffers) -> Result<Vec<i64>> {
    let out = match (op, imp) {
        (Operation::Broadcast, Implementation::Linear) => {
            let mut data = buffers.local.clone();
            linear::broadcast(comm, &mut data, ROOT)?;
            data
        }
        (Operation::Broadcast, Implementation::Tree) => {
            let mut data = buffers.local.clone();
            comm.broadcast(&mut data, ROOT)?;
            data
        }
        (Operation::Reduce, Implementation::Linear) => {
            linear::reduce(comm, &buffers.local, ReduceOp::Sum, ROOT)?.unwrap_or_default()
        }
        (Operation::Reduce, Implementation::Tree) => comm
            .reduce(&buffers.local, ReduceOp::Sum, ROOT)?
            .unwrap_or_default(),
        (Operation::Scatter, Implementation::Linear) => {
            linear::scatter(comm, &buffers.spread, ROOT)?
        }
        (Operation::Scatter, Implementation::Tree) => comm.scatter(&buffers.spread, ROOT)?,
        (Operation::Gather, Implementation::Linear) => {
            linear::gather(comm, &buffers.local, ROOT)?.unwrap_or_default()
        }
        (Operation::Gather, Implementation::Tree) => {
            comm.gather(&buffers.local, ROOT)?.unwrap_or_default()
        }
        (Operation::Allgather, Implementation::Linear) => linear::all_gather(comm, &buffers.local)?,
        (Operation::Allgather, Implementation::Tree) => comm.all_gather(&buffers.local)?,
        (Operation::Alltoall, Implementation::Linear) => linear::all_to_all(comm, &buffers.spread)?,
        (Operation::Alltoall, Implementation::Tree) => comm.all_to_all(&buffers.spread)?,
    };
    Ok(out)
}

/// Both implementations must leave every rank with the same result.
fn check_identical(comm: &Comm, op: Operation, buffers: &Buffers) -> Result<()> {
    let linear = call(comm, op, Implementation::Linear, buffers)?;
    let tree = call(comm, op, Implementation::Tree, buffers)?;
    if linear.len() != tree.len() {
        return Err(CommError::Truncated {
            expected: linear.len(),
            received: tree.len(),
        }
        .into());
    }
    match linear.iter().zip(&tree).position(|(l, t)| l != t) {
        None => Ok(()),
        Some(i) => Err(Error::Validation {
            label: format!("{} element {} on rank {}", op, i, comm.rank()),
            expected: linear[i] as f64,
            observed: tree[i] as f64,
            tolerance: 0.0,
        }),
    }
}

/// Average seconds per call, measured on this rank from a barrier.
fn time_per_call(
    comm: &Comm,
    op: Operation,
    imp: Implementation,
    buffers: &Buffers,
    iterations: usize,
) -> Result<f64> {
    comm.barrier()?;
    let start = comm.wtime();
    for _ in 0..iterations {
        call(comm, op, imp, buffers)?;
    }
    Ok((comm.wtime() - start) / iterations as f64)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Row {
    pub operation: Operation,
    pub processes: usize,
    pub data_size: usize,
    pub custom_time_s: f64,
    pub builtin_time_s: f64,
    pub speedup: f64,
}

/// Checks and times the linear against the tree version of every operation
/// for every data size. Times are those seen by the root.
pub fn benchmark(
    processes: usize,
    operations: &[Operation],
    sizes: &[usize],
    iterations: usize,
) -> Result<Vec<Row>> {
    if iterations == 0 {
        return Err(Error::invalid("at least one iteration is needed"));
    }
    let world = World::new(processes)?;
    let per_rank = world.try_run(|comm| -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        for &op in operations {
            for &data_size in sizes {
                let buffers = Buffers::new(comm.rank(), comm.size(), data_size);
                check_identical(comm, op, &buffers)?;

                let iterations = iterations_for(data_size, iterations);
                let custom_time_s =
                    time_per_call(comm, op, Implementation::Linear, &buffers, iterations)?;
                let builtin_time_s =
                    time_per_call(comm, op, Implementation::Tree, &buffers, iterations)?;
                if comm.rank() == ROOT {
                    log::debug!("{} of {} values: {} iterations", op, data_size, iterations);
                    rows.push(Row {
                        operation: op,
                        processes: comm.size(),
                        data_size,
                        custom_time_s,
                        builtin_time_s,
                        speedup: if builtin_time_s > 0.0 {
                            custom_time_s / builtin_time_s
                        } else {
                            0.0
                        },
                    });
                }
            }
        }
        Ok(rows)
    })?;
    Ok(per_rank.into_iter().next().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_caps() {
        assert_eq!(iterations_for(1000, 100), 100);
        assert_eq!(iterations_for(10_000, 100), 20);
        assert_eq!(iterations_for(100_000, 100), 10);
        assert_eq!(iterations_for(100_000, 3), 3);
    }

    #[test]
    fn every_operation_on_odd_world() {
        let rows = benchmark(5, &Operation::ALL, &[1, 7, 64], 3).unwrap();
        assert_eq!(rows.len(), 18);
        assert_eq!(rows[0].operation, Operation::Broadcast);
        assert_eq!(rows[17].operation, Operation::Alltoall);
        assert!(rows.iter().all(|r| r.processes == 5 && r.custom_time_s >= 0.0));
    }

    #[test]
    fn single_rank_world() {
        let rows = benchmark(1, &Operation::ALL, &[4], 2).unwrap();
        assert_eq!(rows.len(), 6);
    }

    #[test]
    fn buffers_follow_rank() {
        let b = Buffers::new(3, 4, 2);
        assert_eq!(b.local, vec![300, 301]);
        assert_eq!(b.spread.len(), 8);
        assert_eq!(b.spread[7], 307);
    }

    #[test]
    fn reduce_sums_on_the_root() {
        let world = World::new(3).unwrap();
        let got = world
            .try_run(|comm| {
                let buffers = Buffers::new(comm.rank(), comm.size(), 2);
                call(comm, Operation::Reduce, Implementation::Tree, &buffers)
            })
            .unwrap();
        assert_eq!(got[0], vec![300, 303]);
        assert!(got[1].is_empty());
    }

    #[test]
    fn zero_iterations_is_rejected() {
        assert!(matches!(
            benchmark(2, &Operation::ALL, &[1], 0),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn semicolon_row() {
        let row = Row {
            operation: Operation::Allgather,
            processes: 4,
            data_size: 10,
            custom_time_s: 0.5,
            builtin_time_s: 0.25,
            speedup: 2.0,
        };
        let mut out = Vec::new();
        common::report::write_rows(&mut out, &[row], false).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Allgather;4;10;0.5;0.25;2.0\n");
    }
}
