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

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel;
use parking_lot::{Condvar, Mutex};

use crate::error::{CommError, Result};
use crate::p2p::Comm;
use crate::Tag;

/// How long a blocked rank waits before looking at the abort flag again.
pub(crate) const POLL: Duration = Duration::from_millis(10);

/// State every rank of a world can see.
pub(crate) struct Shared {
    pub(crate) epoch: Instant,
    aborted: AtomicBool,
    failed_rank: Mutex<Option<usize>>,
    /// Receives currently posted, keyed by (receiver, source, tag).
    pub(crate) posted: Mutex<HashMap<(usize, usize, Tag), usize>>,
    pub(crate) posted_cv: Condvar,
}

impl Shared {
    fn new() -> Self {
        Shared {
            epoch: Instant::now(),
            aborted: AtomicBool::new(false),
            failed_rank: Mutex::new(None),
            posted: Mutex::new(HashMap::new()),
            posted_cv: Condvar::new(),
        }
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Marks `rank` as the cause of the abort unless another rank got there first.
    pub(crate) fn abort(&self, rank: usize) {
        let mut failed = self.failed_rank.lock();
        if failed.is_none() {
            *failed = Some(rank);
        }
        self.aborted.store(true, Ordering::Release);
        self.posted_cv.notify_all();
    }

    pub(crate) fn post(&self, key: (usize, usize, Tag)) {
        *self.posted.lock().entry(key).or_insert(0) += 1;
        self.posted_cv.notify_all();
    }

    pub(crate) fn unpost(&self, key: (usize, usize, Tag)) {
        let mut posted = self.posted.lock();
        if let Some(count) = posted.get_mut(&key) {
            *count -= 1;
            if *count == 0 {
                posted.remove(&key);
            }
        }
    }

    pub(crate) fn is_posted(&self, key: &(usize, usize, Tag)) -> bool {
        self.posted.lock().contains_key(key)
    }
}

struct AbortOnPanic<'a> {
    shared: &'a Shared,
    rank: usize,
}

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            log::error!("rank {} panicked, aborting the world", self.rank);
            self.shared.abort(self.rank);
        }
    }
}

/// A fixed set of ranks. Each call to [`World::run`] starts a fresh set of
/// rank threads with empty mailboxes.
#[derive(Debug, Clone, Copy)]
pub struct World {
    size: usize,
}

impl World {
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(CommError::EmptyWorld);
        }
        Ok(World { size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Runs `body` on every rank and returns the per-rank results in rank order.
    pub fn run<F, R>(&self, body: F) -> Result<Vec<R>>
    where
        F: Fn(&Comm) -> R + Sync,
        R: Send,
    {
        let (results, _) = self.launch(|comm| Ok::<R, CommError>(body(comm)));
        results
            .into_iter()
            .map(|joined| joined.and_then(|r| r))
            .collect()
    }

    /// Like [`World::run`] for fallible bodies. The first rank to fail aborts
    /// the others and its error is the one returned.
    pub fn try_run<F, R, E>(&self, body: F) -> std::result::Result<Vec<R>, E>
    where
        F: Fn(&Comm) -> std::result::Result<R, E> + Sync,
        R: Send,
        E: From<CommError> + Send,
    {
        let (results, failed_rank) = self.launch(body);

        let mut outcomes = Vec::with_capacity(results.len());
        for joined in results {
            match joined {
                Err(panicked) => return Err(E::from(panicked)),
                Ok(outcome) => outcomes.push(outcome),
            }
        }
        if let Some(rank) = failed_rank {
            if let Some(Err(err)) = outcomes.into_iter().nth(rank) {
                return Err(err);
            }
            return Err(E::from(CommError::Aborted));
        }
        outcomes.into_iter().collect()
    }

    #[allow(clippy::type_complexity)]
    fn launch<F, R, E>(
        &self,
        body: F,
    ) -> (Vec<Result<std::result::Result<R, E>>>, Option<usize>)
    where
        F: Fn(&Comm) -> std::result::Result<R, E> + Sync,
        R: Send,
        E: Send,
    {
        let shared = Arc::new(Shared::new());
        let (outboxes, inboxes): (Vec<_>, Vec<_>) =
            (0..self.size).map(|_| channel::unbounded()).unzip();
        let comms: Vec<Comm> = inboxes
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| Comm::new(rank, inbox, outboxes.clone(), shared.clone()))
            .collect();
        drop(outboxes);
        log::debug!("starting world with {} ranks", self.size);

        let body = &body;
        let results = crossbeam::thread::scope(|s| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| {
                    s.spawn(move |_| {
                        let _guard = AbortOnPanic {
                            shared: comm.shared(),
                            rank: comm.rank(),
                        };
                        let outcome = body(&comm);
                        if outcome.is_err() {
                            comm.shared().abort(comm.rank());
                        }
                        outcome
                    })
                })
                .collect();
            handles
                .into_iter()
                .enumerate()
                .map(|(rank, h)| h.join().map_err(|_| CommError::RankPanicked(rank)))
                .collect::<Vec<_>>()
        });
        // Every handle was joined above, so the scope itself cannot report a panic.
        let results = results.unwrap_or_default();
        let failed_rank = *shared.failed_rank.lock();
        (results, failed_rank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_come_back_in_rank_order() {
        let world = World::new(4).unwrap();
        let ranks = world.run(|comm| (comm.rank(), comm.size())).unwrap();
        assert_eq!(ranks, vec![(0, 4), (1, 4), (2, 4), (3, 4)]);
    }

    #[test]
    fn empty_world_is_rejected() {
        assert_eq!(World::new(0).unwrap_err(), CommError::EmptyWorld);
    }

    #[test]
    fn first_failure_is_reported_and_others_abort() {
        let world = World::new(3).unwrap();
        let err = world
            .try_run(|comm| {
                if comm.rank() == 2 {
                    return Err(CommError::InvalidTopology("rank 2 gave up".into()));
                }
                // blocks until the abort wakes it
                comm.recv::<u8>(2, 0).map(|_| ())
            })
            .unwrap_err();
        assert_eq!(err, CommError::InvalidTopology("rank 2 gave up".into()));
    }

    #[test]
    fn panicking_rank_is_reported() {
        let world = World::new(2).unwrap();
        let err = world
            .try_run(|comm| {
                if comm.rank() == 1 {
                    panic!("boom");
                }
                comm.recv::<u8>(1, 0).map(|_| ())
            })
            .unwrap_err();
        assert_eq!(err, CommError::RankPanicked(1));
    }

    #[test]
    fn explicit_abort_stops_blocked_ranks() {
        let world = World::new(2).unwrap();
        let results = world
            .run(|comm| {
                if comm.rank() == 0 {
                    comm.abort();
                    Ok(Vec::new())
                } else {
                    comm.recv::<u8>(0, 5)
                }
            })
            .unwrap();
        assert_eq!(results[1], Err(CommError::Aborted));
    }
}
