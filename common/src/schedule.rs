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
use std::sync::atomic::{AtomicUsize, Ordering};

use clap::ValueEnum;
use rayon::ThreadPool;
use serde::Serialize;

/// How the iterations of a parallel loop are handed out to the thread team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Schedule {
    Static,
    Dynamic,
    Guided,
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Schedule::Static => "static",
            Schedule::Dynamic => "dynamic",
            Schedule::Guided => "guided",
        };
        f.write_str(name)
    }
}

/// Folds `0..n` across every thread of `pool`, handing out indices according
/// to `schedule` and `chunk` (0 picks the schedule's default). Each thread
/// folds its indices into a private partial starting from `identity`; the
/// partials are combined in thread order.
pub fn parallel_fold<T, F, C>(
    pool: &ThreadPool,
    n: usize,
    schedule: Schedule,
    chunk: usize,
    identity: T,
    fold: F,
    combine: C,
) -> T
where
    T: Clone + Send + Sync,
    F: Fn(T, usize) -> T + Sync,
    C: Fn(T, T) -> T,
{
    // a chunk longer than the loop behaves like one covering all of it
    let chunk = chunk.min(n.max(1));
    let cursor = AtomicUsize::new(0);
    let partials = pool.broadcast(|ctx| {
        let me = ctx.index();
        let team = ctx.num_threads();
        let mut acc = identity.clone();
        match schedule {
            Schedule::Static if chunk == 0 => {
                for i in me * n / team..(me + 1) * n / team {
                    acc = fold(acc, i);
                }
            }
            Schedule::Static => {
                let mut start = me * chunk;
                while start < n {
                    for i in start..(start + chunk).min(n) {
                        acc = fold(acc, i);
                    }
                    start += team * chunk;
                }
            }
            Schedule::Dynamic => {
                let step = chunk.max(1);
                loop {
                    let start = cursor.fetch_add(step, Ordering::Relaxed);
                    if start >= n {
                        break;
                    }
                    for i in start..(start + step).min(n) {
                        acc = fold(acc, i);
                    }
                }
            }
            Schedule::Guided => {
                let min_step = chunk.max(1);
                let mut start = cursor.load(Ordering::Relaxed);
                while start < n {
                    let remaining = n - start;
                    let step = remaining.div_ceil(team).max(min_step).min(remaining);
                    match cursor.compare_exchange_weak(
                        start,
                        start + step,
                        Ordering::Relaxed,
                        Ordering::Relaxed,
                    ) {
                        Ok(_) => {
                            for i in start..start + step {
                                acc = fold(acc, i);
                            }
                            start = cursor.load(Ordering::Relaxed);
                        }
                        Err(current) => start = current,
                    }
                }
            }
        }
        acc
    });
    partials.into_iter().fold(identity, combine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::thread_pool;

    fn visits(schedule: Schedule, chunk: usize, n: usize) -> Vec<usize> {
        let pool = thread_pool(4).unwrap();
        parallel_fold(
            &pool,
            n,
            schedule,
            chunk,
            vec![0usize; n],
            |mut seen, i| {
                seen[i] += 1;
                seen
            },
            |a, b| a.iter().zip(&b).map(|(x, y)| x + y).collect(),
        )
    }

    #[test]
    fn every_index_visited_once() {
        for schedule in [Schedule::Static, Schedule::Dynamic, Schedule::Guided] {
            for chunk in [0, 1, 3, 64] {
                for n in [0, 1, 7, 1000] {
                    let counts = visits(schedule, chunk, n);
                    assert!(
                        counts.iter().all(|&c| c == 1),
                        "{} chunk {} n {}",
                        schedule,
                        chunk,
                        n
                    );
                }
            }
        }
    }

    #[test]
    fn oversized_chunks_cover_the_loop() {
        for schedule in [Schedule::Static, Schedule::Dynamic, Schedule::Guided] {
            for chunk in [11, usize::MAX] {
                let counts = visits(schedule, chunk, 10);
                assert!(counts.iter().all(|&c| c == 1), "{} chunk {}", schedule, chunk);
            }
        }
    }

    #[test]
    fn sums_match_sequential() {
        let pool = thread_pool(3).unwrap();
        let n = 10_001;
        let expected: u64 = (0..n as u64).sum();
        for schedule in [Schedule::Static, Schedule::Dynamic, Schedule::Guided] {
            let got = parallel_fold(&pool, n, schedule, 17, 0u64, |acc, i| acc + i as u64, |a, b| a + b);
            assert_eq!(got, expected);
        }
    }

    #[test]
    fn static_blocks_are_contiguous() {
        let pool = thread_pool(2).unwrap();
        // each thread records (first, last) of the indices it saw
        let spans = parallel_fold(
            &pool,
            10,
            Schedule::Static,
            0,
            Vec::<(usize, usize)>::new(),
            |mut acc, i| {
                match acc.last_mut() {
                    Some(span) if span.1 + 1 == i => span.1 = i,
                    _ => acc.push((i, i)),
                }
                acc
            },
            |mut a, b| {
                a.extend(b);
                a
            },
        );
        assert_eq!(spans, vec![(0, 4), (5, 9)]);
    }
}
