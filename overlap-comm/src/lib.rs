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

use std::time::Duration;

use serde::Serialize;

use comm::{Comm, ReduceOp, World};
use common::timer::spin_for;
use common::{Error, Result};

pub const DEFAULT_ITERATIONS: usize = 100;
/// Message sizes of the comparison grid, in bytes.
pub const DATA_SIZES: [usize; 4] = [1024, 10240, 102_400, 1_048_576];
/// Compute phases of the comparison grid, in microseconds.
pub const COMPUTE_US: [u64; 4] = [10, 100, 1000, 10_000];
/// Iteration cap for messages of a mebibyte and more.
const LARGE_ITERATIONS: usize = 20;
const TAG: comm::Tag = 0;

/// `(left, right)` neighbours of `rank` on a ring of `size`.
pub fn ring_neighbours(rank: usize, size: usize) -> (usize, usize) {
    ((rank + size - 1) % size, (rank + 1) % size)
}

/// Every byte a rank sends carries its rank.
fn payload(rank: usize, bytes: usize) -> Vec<u8> {
    vec![(rank % 256) as u8; bytes]
}

fn check_from_left(received: &[u8], left: usize, bytes: usize) -> Result<()> {
    if received.len() != bytes {
        return Err(comm::CommError::Truncated {
            expected: bytes,
            received: received.len(),
        }
        .into());
    }
    let expected = (left % 256) as u8;
    match received.iter().position(|&b| b != expected) {
        None => Ok(()),
        Some(i) => Err(Error::Validation {
            label: format!("byte {} from rank {}", i, left),
            expected: f64::from(expected),
            observed: f64::from(received[i]),
            tolerance: 0.0,
        }),
    }
}

/// How a rank interleaves its compute phase with the ring exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    /// compute, then a combined send and receive
    Blocking,
    /// post the receive and the send, compute, then wait for both
    Nonblocking,
}

fn step(comm: &Comm, exchange: Exchange, message: &[u8], compute: Duration) -> Result<()> {
    let (left, right) = ring_neighbours(comm.rank(), comm.size());
    if message.is_empty() {
        spin_for(compute);
        return Ok(());
    }
    let received = match exchange {
        Exchange::Blocking => {
            spin_for(compute);
            comm.sendrecv(message, right, TAG, left, TAG)?
        }
        Exchange::Nonblocking => {
            let incoming = comm.irecv::<u8>(left, TAG)?;
            let outgoing = comm.isend(message, right, TAG);
            spin_for(compute);
            outgoing.wait()?;
            incoming.wait()?
        }
    };
    check_from_left(&received, left, message.len())
}

/// Runs `iterations` steps between a barrier and the end of the loop and
/// returns the slowest rank's time on the root.
fn timed_loop(
    comm: &Comm,
    exchange: Exchange,
    bytes: usize,
    compute_us: u64,
    iterations: usize,
) -> Result<Option<f64>> {
    let message = payload(comm.rank(), bytes);
    let compute = Duration::from_micros(compute_us);
    comm.barrier()?;
    let start = comm.wtime();
    for _ in 0..iterations {
        step(comm, exchange, &message, compute)?;
    }
    let total = comm.wtime() - start;
    let max = comm.reduce(&[total], ReduceOp::Max, 0)?;
    Ok(max.and_then(|v| v.first().copied()))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RingRow {
    pub label: String,
    pub processes: usize,
    pub compute_us: u64,
    pub bytes: usize,
    pub max_time_s: f64,
}

/// Blocking ring: every iteration computes for `compute_us`, then passes
/// `bytes` to the right neighbour. No message is sent when `bytes` is zero.
pub fn ring(
    processes: usize,
    label: &str,
    compute_us: u64,
    bytes: usize,
    iterations: usize,
) -> Result<RingRow> {
    let world = World::new(processes)?;
    let times = world.try_run(|comm| {
        timed_loop(comm, Exchange::Blocking, bytes, compute_us, iterations)
    })?;
    let max_time_s = times
        .into_iter()
        .flatten()
        .next()
        .ok_or_else(|| Error::invalid("the root reported no result"))?;
    Ok(RingRow {
        label: label.to_string(),
        processes,
        compute_us,
        bytes,
        max_time_s,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompareRow {
    pub label: String,
    pub processes: usize,
    pub data_size: usize,
    pub compute_us: u64,
    pub blocking_time_s: f64,
    pub nonblocking_time_s: f64,
    pub speedup: f64,
}

pub fn label(data_size: usize, compute_us: u64) -> String {
    format!("D{}_C{}", data_size, compute_us)
}

/// Iterations used for one message size.
pub fn iterations_for(data_size: usize, iterations: usize) -> usize {
    if data_size >= 1_048_576 {
        iterations.min(LARGE_ITERATIONS)
    } else {
        iterations
    }
}

/// Blocking against nonblocking exchange for every pair of `sizes` and
/// `computes`, all in one world.
pub fn compare_grid(
    processes: usize,
    sizes: &[usize],
    computes: &[u64],
    iterations: usize,
) -> Result<Vec<CompareRow>> {
    let world = World::new(processes)?;
    let per_rank = world.try_run(|comm| -> Result<Vec<CompareRow>> {
        let mut rows = Vec::new();
        for &data_size in sizes {
            let iterations = iterations_for(data_size, iterations);
            for &compute_us in computes {
                let blocking =
                    timed_loop(comm, Exchange::Blocking, data_size, compute_us, iterations)?;
                let nonblocking =
                    timed_loop(comm, Exchange::Nonblocking, data_size, compute_us, iterations)?;
                if let (Some(blocking_time_s), Some(nonblocking_time_s)) = (blocking, nonblocking)
                {
                    log::debug!(
                        "{}: blocking {:e} s, nonblocking {:e} s",
                        label(data_size, compute_us),
                        blocking_time_s,
                        nonblocking_time_s
                    );
                    rows.push(CompareRow {
                        label: label(data_size, compute_us),
                        processes: comm.size(),
                        data_size,
                        compute_us,
                        blocking_time_s,
                        nonblocking_time_s,
                        speedup: if nonblocking_time_s > 0.0 {
                            blocking_time_s / nonblocking_time_s
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

pub fn compare(processes: usize, iterations: usize) -> Result<Vec<CompareRow>> {
    compare_grid(processes, &DATA_SIZES, &COMPUTE_US, iterations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbours_wrap() {
        assert_eq!(ring_neighbours(0, 4), (3, 1));
        assert_eq!(ring_neighbours(3, 4), (2, 0));
        assert_eq!(ring_neighbours(0, 1), (0, 0));
    }

    #[test]
    fn ring_reports_the_slowest_rank() {
        let row = ring(3, "Default", 100, 1024, 10).unwrap();
        assert_eq!((row.processes, row.compute_us, row.bytes), (3, 100, 1024));
        // ten compute phases of 100 us each
        assert!(row.max_time_s >= 1.0e-3);
    }

    #[test]
    fn ring_without_messages() {
        let row = ring(2, "compute-only", 10, 0, 5).unwrap();
        assert_eq!(row.bytes, 0);
        assert!(row.max_time_s > 0.0);
    }

    #[test]
    fn payload_must_come_from_the_left() {
        assert!(check_from_left(&payload(2, 16), 2, 16).is_ok());
        assert!(matches!(
            check_from_left(&payload(1, 16), 2, 16),
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            check_from_left(&payload(2, 8), 2, 16),
            Err(Error::Comm(_))
        ));
    }

    #[test]
    fn small_grid() {
        let rows = compare_grid(4, &[64, 1_048_576], &[0, 50], 3).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].label, "D64_C0");
        assert_eq!(rows[3].label, "D1048576_C50");
        assert!(rows.iter().all(|r| r.processes == 4 && r.speedup >= 0.0));
    }

    #[test]
    fn large_messages_run_fewer_iterations() {
        assert_eq!(iterations_for(102_400, 100), 100);
        assert_eq!(iterations_for(1_048_576, 100), 20);
        assert_eq!(iterations_for(1_048_576, 5), 5);
    }

    #[test]
    fn semicolon_rows() {
        let row = ring(1, "solo", 0, 4, 1).unwrap();
        let mut out = Vec::new();
        common::report::write_rows(&mut out, &[row], false).unwrap();
        assert!(String::from_utf8(out).unwrap().starts_with("solo;1;0;4;"));
    }
}
