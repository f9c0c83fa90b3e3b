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

//! Naive collectives in which the root talks to every other rank in turn.
//! They produce the same results as the tree versions on [`Comm`] and serve
//! as the baseline those are measured against.

use crate::error::{CommError, Result};
use crate::p2p::Comm;
use crate::{Element, ReduceOp, Reducible, Tag};

const TAG_BCAST: Tag = u32::MAX - 8;
const TAG_REDUCE: Tag = u32::MAX - 9;
const TAG_SCATTER: Tag = u32::MAX - 10;
const TAG_GATHER: Tag = u32::MAX - 11;
const TAG_ALLTOALL: Tag = u32::MAX - 12;

pub fn broadcast<T: Element>(comm: &Comm, data: &mut Vec<T>, root: usize) -> Result<()> {
    comm.check_rank(root)?;
    if comm.rank() == root {
        for dst in (0..comm.size()).filter(|&r| r != root) {
            comm.post_message(data.clone(), dst, TAG_BCAST, None)?;
        }
    } else {
        *data = comm.recv_raw(root, TAG_BCAST)?;
    }
    Ok(())
}

/// The root folds in every other rank's contribution in rank order.
pub fn reduce<T: Reducible>(
    comm: &Comm,
    data: &[T],
    op: ReduceOp,
    root: usize,
) -> Result<Option<Vec<T>>> {
    comm.check_rank(root)?;
    if comm.rank() != root {
        comm.post_message(data.to_vec(), root, TAG_REDUCE, None)?;
        return Ok(None);
    }
    let mut acc = data.to_vec();
    for src in (0..comm.size()).filter(|&r| r != root) {
        let incoming = comm.recv_raw::<T>(src, TAG_REDUCE)?;
        op.combine_into(&mut acc, &incoming)?;
    }
    Ok(Some(acc))
}

pub fn scatter<T: Element>(comm: &Comm, data: &[T], root: usize) -> Result<Vec<T>> {
    comm.check_rank(root)?;
    let size = comm.size();
    if comm.rank() != root {
        return comm.recv_raw(root, TAG_SCATTER);
    }
    if data.len() % size != 0 {
        return Err(CommError::Indivisible {
            len: data.len(),
            parts: size,
        });
    }
    let count = data.len() / size;
    for dst in (0..size).filter(|&r| r != root) {
        comm.post_message(data[dst * count..(dst + 1) * count].to_vec(), dst, TAG_SCATTER, None)?;
    }
    Ok(data[root * count..(root + 1) * count].to_vec())
}

pub fn gather<T: Element>(comm: &Comm, data: &[T], root: usize) -> Result<Option<Vec<T>>> {
    comm.check_rank(root)?;
    if comm.rank() != root {
        comm.post_message(data.to_vec(), root, TAG_GATHER, None)?;
        return Ok(None);
    }
    let mut all = Vec::with_capacity(data.len() * comm.size());
    for src in 0..comm.size() {
        if src == root {
            all.extend_from_slice(data);
        } else {
            all.extend(comm.recv_raw::<T>(src, TAG_GATHER)?);
        }
    }
    Ok(Some(all))
}

/// Gather to rank 0 followed by a linear broadcast.
pub fn all_gather<T: Element>(comm: &Comm, data: &[T]) -> Result<Vec<T>> {
    let mut all = gather(comm, data, 0)?.unwrap_or_default();
    broadcast(comm, &mut all, 0)?;
    Ok(all)
}

/// Every rank sends all of its blocks, then receives from every rank.
pub fn all_to_all<T: Element>(comm: &Comm, data: &[T]) -> Result<Vec<T>> {
    let (rank, size) = (comm.rank(), comm.size());
    if data.len() % size != 0 {
        return Err(CommError::Indivisible {
            len: data.len(),
            parts: size,
        });
    }
    let count = data.len() / size;
    for dst in (0..size).filter(|&r| r != rank) {
        comm.post_message(data[dst * count..(dst + 1) * count].to_vec(), dst, TAG_ALLTOALL, None)?;
    }
    let mut result = Vec::with_capacity(data.len());
    for src in 0..size {
        if src == rank {
            result.extend_from_slice(&data[rank * count..(rank + 1) * count]);
        } else {
            result.extend(comm.recv_raw::<T>(src, TAG_ALLTOALL)?);
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::World;

    #[test]
    fn linear_and_tree_agree() {
        let world = World::new(5).unwrap();
        let got = world
            .run(|comm| {
                let r = comm.rank() as i32;
                let local: Vec<i32> = (0..4).map(|i| r * 100 + i).collect();
                let root_data: Vec<i32> = (0..20).collect();

                let mut a = if r == 2 { local.clone() } else { Vec::new() };
                let mut b = a.clone();
                broadcast(comm, &mut a, 2).unwrap();
                comm.broadcast(&mut b, 2).unwrap();

                let reduced = (
                    reduce(comm, &local, ReduceOp::Sum, 1).unwrap(),
                    comm.reduce(&local, ReduceOp::Sum, 1).unwrap(),
                );
                let scattered = (
                    scatter(comm, &root_data, 0).unwrap(),
                    comm.scatter(&root_data, 0).unwrap(),
                );
                let gathered = (
                    gather(comm, &local, 4).unwrap(),
                    comm.gather(&local, 4).unwrap(),
                );
                let all = (all_gather(comm, &local).unwrap(), comm.all_gather(&local).unwrap());
                let exchanged = (
                    all_to_all(comm, &root_data).unwrap(),
                    comm.all_to_all(&root_data).unwrap(),
                );
                a == b
                    && reduced.0 == reduced.1
                    && scattered.0 == scattered.1
                    && gathered.0 == gathered.1
                    && all.0 == all.1
                    && exchanged.0 == exchanged.1
            })
            .unwrap();
        assert!(got.into_iter().all(|same| same));
    }
}
