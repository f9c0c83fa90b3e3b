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

use comm::{Comm, World};
use common::{Error, Result, Summary};

pub const MIB: usize = 1024 * 1024;
pub const DEFAULT_MAX_BYTES: usize = 16 * MIB;
const TAG: comm::Tag = 0;

/// How the two ranks trade the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// rank 0 sends and waits for the echo, rank 1 receives then sends back
    Pingpong,
    /// both ranks send and receive in one combined call
    Sendrecv,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Pingpong => f.write_str("pingpong"),
            Method::Sendrecv => f.write_str("sendrecv"),
        }
    }
}

/// Message sizes of a sweep: 0, then every power of two up to `max_bytes`.
pub fn sweep_sizes(max_bytes: usize) -> Vec<usize> {
    let mut sizes = vec![0];
    let mut bytes = 1;
    while bytes <= max_bytes {
        sizes.push(bytes);
        bytes *= 2;
    }
    sizes
}

/// Fewer repetitions for larger messages.
pub fn sweep_iterations(bytes: usize) -> usize {
    if bytes > MIB {
        20
    } else if bytes > 64 * 1024 {
        100
    } else {
        1000
    }
}

/// Bytes `0, 1, .., 255, 0, 1, ..`.
pub fn payload(bytes: usize) -> Vec<u8> {
    (0..bytes).map(|i| (i % 256) as u8).collect()
}

fn check_payload(received: &[u8], expected: &[u8]) -> Result<()> {
    if received.len() != expected.len() {
        return Err(comm::CommError::Truncated {
            expected: expected.len(),
            received: received.len(),
        }
        .into());
    }
    match received.iter().zip(expected).position(|(r, e)| r != e) {
        None => Ok(()),
        Some(i) => Err(Error::Validation {
            label: format!("payload byte {}", i),
            expected: f64::from(expected[i]),
            observed: f64::from(received[i]),
            tolerance: 0.0,
        }),
    }
}

fn two_ranks(processes: usize) -> Result<World> {
    if processes != 2 {
        return Err(Error::invalid(format!(
            "this benchmark needs exactly 2 processes, got {}",
            processes
        )));
    }
    Ok(World::new(processes)?)
}

/// One round trip between ranks 0 and 1, verifying what comes back.
fn round_trip(comm: &Comm, method: Method, message: &[u8]) -> Result<()> {
    let peer = 1 - comm.rank();
    let received: Vec<u8> = match (method, comm.rank()) {
        (Method::Pingpong, 0) => {
            comm.send(message, peer, TAG)?;
            comm.recv(peer, TAG)?
        }
        (Method::Pingpong, _) => {
            let received = comm.recv(peer, TAG)?;
            comm.send(message, peer, TAG)?;
            received
        }
        (Method::Sendrecv, _) => comm.sendrecv(message, peer, TAG, peer, TAG)?,
    };
    check_payload(&received, message)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SweepRow {
    pub bytes: usize,
    pub iterations: usize,
    /// one-way time
    pub time_s: f64,
    pub bandwidth_mb_s: f64,
}

/// Latency and bandwidth for every size of [`sweep_sizes`].
pub fn sweep(processes: usize, method: Method, max_bytes: usize) -> Result<Vec<SweepRow>> {
    let world = two_ranks(processes)?;
    let rows = world.try_run(|comm| -> Result<Vec<SweepRow>> {
        let mut rows = Vec::new();
        for bytes in sweep_sizes(max_bytes) {
            let iterations = sweep_iterations(bytes);
            let message = payload(bytes);
            comm.barrier()?;
            let start = comm.wtime();
            for _ in 0..iterations {
                round_trip(comm, method, &message)?;
            }
            let time_s = (comm.wtime() - start) / (2 * iterations) as f64;
            let bandwidth_mb_s = if bytes > 0 && time_s > 1e-9 {
                bytes as f64 / time_s / MIB as f64
            } else {
                0.0
            };
            log::debug!("rank {}: {} bytes in {:e} s", comm.rank(), bytes, time_s);
            rows.push(SweepRow {
                bytes,
                iterations,
                time_s,
                bandwidth_mb_s,
            });
        }
        Ok(rows)
    })?;
    Ok(rows.into_iter().next().unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExchangeStats {
    pub message_size_bytes: usize,
    pub iterations: usize,
    pub avg_time_ms: f64,
    pub median_time_ms: f64,
    pub min_time_ms: f64,
    pub max_time_ms: f64,
    pub std_dev_ms: f64,
    pub bandwidth_mbps: f64,
}

impl ExchangeStats {
    /// Statistics over round-trip times; the message crosses the link twice
    /// per round trip.
    pub fn from_times(message_size: usize, times_ms: &[f64]) -> Option<Self> {
        let s = Summary::from_samples(times_ms)?;
        let bandwidth_mbps = if s.mean > 0.0 {
            (2.0 * message_size as f64 / MIB as f64) / (s.mean / 1000.0)
        } else {
            0.0
        };
        Some(ExchangeStats {
            message_size_bytes: message_size,
            iterations: s.count,
            avg_time_ms: s.mean,
            median_time_ms: s.median,
            min_time_ms: s.min,
            max_time_ms: s.max,
            std_dev_ms: s.std_dev,
            bandwidth_mbps,
        })
    }
}

/// One warmup round trip, then `iterations` timed ones with a barrier after
/// each.
pub fn exchange(processes: usize, message_size: usize, iterations: usize) -> Result<ExchangeStats> {
    let world = two_ranks(processes)?;
    let message = payload(message_size);
    let times = world.try_run(|comm| -> Result<Vec<f64>> {
        round_trip(comm, Method::Pingpong, &message)?;
        comm.barrier()?;
        let mut times = Vec::with_capacity(iterations);
        for _ in 0..iterations {
            let start = comm.wtime();
            round_trip(comm, Method::Pingpong, &message)?;
            times.push((comm.wtime() - start) * 1.0e3);
            comm.barrier()?;
        }
        Ok(times)
    })?;
    let root = times.into_iter().next().unwrap_or_default();
    ExchangeStats::from_times(message_size, &root)
        .ok_or_else(|| Error::invalid("at least one iteration is needed"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_and_iterations() {
        assert_eq!(sweep_sizes(8), vec![0, 1, 2, 4, 8]);
        assert_eq!(sweep_sizes(DEFAULT_MAX_BYTES).len(), 26);
        assert_eq!(sweep_iterations(64 * 1024), 1000);
        assert_eq!(sweep_iterations(128 * 1024), 100);
        assert_eq!(sweep_iterations(MIB), 100);
        assert_eq!(sweep_iterations(2 * MIB), 20);
    }

    #[test]
    fn both_methods_sweep() {
        for method in [Method::Pingpong, Method::Sendrecv] {
            let rows = sweep(2, method, 1024).unwrap();
            assert_eq!(rows.len(), 12);
            assert_eq!(rows[0].bandwidth_mb_s, 0.0);
            assert!(rows.iter().all(|r| r.time_s >= 0.0 && r.iterations == 1000));
        }
    }

    #[test]
    fn needs_two_processes() {
        assert!(matches!(sweep(3, Method::Pingpong, 1), Err(Error::InvalidArgument(_))));
        assert!(matches!(exchange(1, 8, 1), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn exchange_statistics() {
        let stats = exchange(2, 4096, 10).unwrap();
        assert_eq!(stats.iterations, 10);
        assert_eq!(stats.message_size_bytes, 4096);
        assert!(stats.min_time_ms <= stats.median_time_ms);
        assert!(stats.median_time_ms <= stats.max_time_ms);
    }

    #[test]
    fn bandwidth_counts_both_directions() {
        let stats = ExchangeStats::from_times(MIB, &[1000.0, 1000.0]).unwrap();
        assert_eq!(stats.bandwidth_mbps, 2.0);
        assert!(ExchangeStats::from_times(MIB, &[]).is_none());
    }

    #[test]
    fn corrupted_payload_is_detected() {
        let mut bad = payload(300);
        bad[257] = 0;
        assert!(check_payload(&payload(300), &payload(300)).is_ok());
        assert!(matches!(check_payload(&bad, &payload(300)), Err(Error::Validation { .. })));
        assert!(matches!(check_payload(&bad[..10], &payload(300)), Err(Error::Comm(_))));
    }

    #[test]
    fn csv_header() {
        let stats = ExchangeStats::from_times(16, &[1.0]).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exchange.csv");
        common::report::append_csv(&path, &[stats]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(
            "message_size_bytes,iterations,avg_time_ms,median_time_ms,min_time_ms,max_time_ms,std_dev_ms,bandwidth_mbps\n16,1,"
        ));
    }
}
