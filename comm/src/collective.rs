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

use crate::error::{CommError, Result};
use crate::p2p::Comm;
use crate::{Element, ReduceOp, Reducible, Tag};

pub(crate) const TAG_BARRIER: Tag = u32::MAX;
pub(crate) const TAG_BCAST: Tag = u32::MAX - 1;
pub(crate) const TAG_REDUCE: Tag = u32::MAX - 2;
pub(crate) const TAG_SCATTER: Tag = u32::MAX - 3;
pub(crate) const TAG_GATHER: Tag = u32::MAX - 4;
pub(crate) const TAG_ALLGATHER: Tag = u32::MAX - 5;
pub(crate) const TAG_ALLTOALL: Tag = u32::MAX - 6;

impl Comm {
    /// Rank relative to `root`, so that the root is always 0.
    fn relative(&self, root: usize) -> usize {
        (self.rank() + self.size() - root) % self.size()
    }

    fn absolute(&self, relative: usize, root: usize) -> usize {
        (relative + root) % self.size()
    }

    /// Dissemination barrier: `ceil(log2 p)` rounds of one send and one receive.
    pub fn barrier(&self) -> Result<()> {
        let (rank, size) = (self.rank(), self.size());
        let mut distance = 1;
        while distance < size {
            self.post_message(Vec::<u8>::new(), (rank + distance) % size, TAG_BARRIER, None)?;
            self.recv_raw::<u8>((rank + size - distance) % size, TAG_BARRIER)?;
            distance <<= 1;
        }
        Ok(())
    }

    /// Binomial-tree broadcast of `data` from `root`. On the other ranks
    /// `data` is replaced by the root's vector.
    pub fn broadcast<T: Element>(&self, data: &mut Vec<T>, root: usize) -> Result<()> {
        self.check_rank(root)?;
        let size = self.size();
        let relative = self.relative(root);

        let mut mask = 1;
        while mask < size {
            if relative & mask != 0 {
                *data = self.recv_raw(self.absolute(relative - mask, root), TAG_BCAST)?;
                break;
            }
            mask <<= 1;
        }
        mask >>= 1;
        while mask > 0 {
            if relative + mask < size {
                let dst = self.absolute(relative + mask, root);
                self.post_message(data.clone(), dst, TAG_BCAST, None)?;
            }
            mask >>= 1;
        }
        Ok(())
    }

    /// Binomial-tree element-wise reduction. The root gets `Some(result)`.
    pub fn reduce<T: Reducible>(
        &self,
        data: &[T],
        op: ReduceOp,
        root: usize,
    ) -> Result<Option<Vec<T>>> {
        self.check_rank(root)?;
        let size = self.size();
        let relative = self.relative(root);
        let mut acc = data.to_vec();

        let mut mask = 1;
        while mask < size {
            if relative & mask == 0 {
                let child = relative | mask;
                if child < size {
                    let incoming = self.recv_raw::<T>(self.absolute(child, root), TAG_REDUCE)?;
                    op.combine_into(&mut acc, &incoming)?;
                }
            } else {
                let parent = self.absolute(relative & !mask, root);
                self.post_message(acc, parent, TAG_REDUCE, None)?;
                return Ok(None);
            }
            mask <<= 1;
        }
        Ok(Some(acc))
    }

    pub fn all_reduce<T: Reducible>(&self, data: &[T], op: ReduceOp) -> Result<Vec<T>> {
        let mut result = self.reduce(data, op, 0)?.unwrap_or_default();
        self.broadcast(&mut result, 0)?;
        Ok(result)
    }

    /// Binomial-tree scatter. `data` is read on the root only and must hold
    /// an equal block for every rank; each rank returns its block.
    pub fn scatter<T: Element>(&self, data: &[T], root: usize) -> Result<Vec<T>> {
        self.check_rank(root)?;
        let size = self.size();
        let relative = self.relative(root);

        // blocks for relative ranks relative..relative+n, in relative order
        let mut held = Vec::new();
        let mut count = 0;
        if relative == 0 {
            if data.len() % size != 0 {
                return Err(CommError::Indivisible {
                    len: data.len(),
                    parts: size,
                });
            }
            count = data.len() / size;
            held.extend_from_slice(&data[root * count..]);
            held.extend_from_slice(&data[..root * count]);
        }

        let mut mask = 1;
        while mask < size {
            if relative & mask != 0 {
                let src = self.absolute(relative - mask, root);
                held = self.recv_raw(src, TAG_SCATTER)?;
                let blocks = mask.min(size - relative);
                count = held.len() / blocks;
                break;
            }
            mask <<= 1;
        }
        mask >>= 1;
        while mask > 0 {
            if relative + mask < size {
                let rest = held.split_off(mask * count);
                self.post_message(rest, self.absolute(relative + mask, root), TAG_SCATTER, None)?;
            }
            mask >>= 1;
        }
        Ok(held)
    }

    /// Binomial-tree gather of equally sized blocks. The root gets
    /// `Some(all blocks in rank order)`.
    pub fn gather<T: Element>(&self, data: &[T], root: usize) -> Result<Option<Vec<T>>> {
        self.check_rank(root)?;
        let size = self.size();
        let relative = self.relative(root);
        let mut held = data.to_vec();

        let mut mask = 1;
        while mask < size {
            if relative & mask == 0 {
                let child = relative | mask;
                if child < size {
                    let incoming = self.recv_raw::<T>(self.absolute(child, root), TAG_GATHER)?;
                    held.extend(incoming);
                }
            } else {
                let parent = self.absolute(relative & !mask, root);
                self.post_message(held, parent, TAG_GATHER, None)?;
                return Ok(None);
            }
            mask <<= 1;
        }
        if held.len() != data.len() * size {
            return Err(CommError::Truncated {
                expected: data.len() * size,
                received: held.len(),
            });
        }
        // held is in relative order; rank 0 sits at relative position size - root
        let split = ((size - root) % size) * data.len();
        held.rotate_left(split);
        Ok(Some(held))
    }

    /// Ring all-gather: `p - 1` steps, each forwarding the block received in
    /// the previous step to the right neighbour.
    pub fn all_gather<T: Element>(&self, data: &[T]) -> Result<Vec<T>> {
        let (rank, size) = (self.rank(), self.size());
        let count = data.len();
        let right = (rank + 1) % size;
        let left = (rank + size - 1) % size;

        let Some(&fill) = data.first() else {
            return Ok(Vec::new());
        };
        let mut result = vec![fill; count * size];
        result[rank * count..(rank + 1) * count].copy_from_slice(data);

        for step in 0..size - 1 {
            let send_block = (rank + size - step) % size;
            let recv_block = (rank + size - step - 1) % size;
            let outgoing = result[send_block * count..(send_block + 1) * count].to_vec();
            self.post_message(outgoing, right, TAG_ALLGATHER, None)?;
            let incoming = self.recv_raw::<T>(left, TAG_ALLGATHER)?;
            if incoming.len() != count {
                return Err(CommError::Truncated {
                    expected: count,
                    received: incoming.len(),
                });
            }
            result[recv_block * count..(recv_block + 1) * count].copy_from_slice(&incoming);
        }
        Ok(result)
    }

    /// Pairwise all-to-all: in step `s` each rank sends its block for
    /// `rank + s` and receives from `rank - s`.
    pub fn all_to_all<T: Element>(&self, data: &[T]) -> Result<Vec<T>> {
        let (rank, size) = (self.rank(), self.size());
        if data.len() % size != 0 {
            return Err(CommError::Indivisible {
                len: data.len(),
                parts: size,
            });
        }
        let count = data.len() / size;
        let mut result = data.to_vec();

        for step in 1..size {
            let dst = (rank + step) % size;
            let src = (rank + size - step) % size;
            self.post_message(data[dst * count..(dst + 1) * count].to_vec(), dst, TAG_ALLTOALL, None)?;
            let incoming = self.recv_raw::<T>(src, TAG_ALLTOALL)?;
            if incoming.len() != count {
                return Err(CommError::Truncated {
                    expected: count,
                    received: incoming.len(),
                });
            }
            result[src * count..(src + 1) * count].copy_from_slice(&incoming);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use crate::{ReduceOp, World};

    #[test]
    fn broadcast_from_every_root() {
        for size in 1..=5 {
            let world = World::new(size).unwrap();
            for root in 0..size {
                let got = world
                    .run(|comm| {
                        let mut data = if comm.rank() == root {
                            vec![root as i32, 7, 9]
                        } else {
                            Vec::new()
                        };
                        comm.broadcast(&mut data, root).unwrap();
                        data
                    })
                    .unwrap();
                assert!(got.iter().all(|d| *d == vec![root as i32, 7, 9]));
            }
        }
    }

    #[test]
    fn reduce_sum_min_max() {
        let world = World::new(5).unwrap();
        let got = world
            .run(|comm| {
                let r = comm.rank() as i64;
                let sum = comm.reduce(&[r, 2 * r], ReduceOp::Sum, 3).unwrap();
                let min = comm.reduce(&[r - 2], ReduceOp::Min, 0).unwrap();
                let max = comm.all_reduce(&[-r], ReduceOp::Max).unwrap();
                (sum, min, max)
            })
            .unwrap();
        assert_eq!(got[3].0, Some(vec![10, 20]));
        assert!(got.iter().enumerate().all(|(r, g)| r == 3 || g.0.is_none()));
        assert_eq!(got[0].1, Some(vec![-2]));
        assert!(got.iter().all(|g| g.2 == vec![0]));
    }

    #[test]
    fn scatter_then_gather_restores_the_data() {
        for size in 1..=6 {
            let world = World::new(size).unwrap();
            for root in [0, size - 1, size / 2] {
                let got = world
                    .run(|comm| {
                        let data: Vec<u32> = if comm.rank() == root {
                            (0..(size * 3) as u32).collect()
                        } else {
                            Vec::new()
                        };
                        let block = comm.scatter(&data, root).unwrap();
                        let back = comm.gather(&block, root).unwrap();
                        (block, back)
                    })
                    .unwrap();
                for (rank, (block, back)) in got.iter().enumerate() {
                    let first = (rank * 3) as u32;
                    assert_eq!(*block, vec![first, first + 1, first + 2]);
                    if rank == root {
                        assert_eq!(*back, Some((0..(size * 3) as u32).collect()));
                    } else {
                        assert!(back.is_none());
                    }
                }
            }
        }
    }

    #[test]
    fn scatter_rejects_uneven_data() {
        let world = World::new(3).unwrap();
        let got = world
            .try_run(|comm| comm.scatter(&[1, 2, 3, 4], 0))
            .unwrap_err();
        assert_eq!(got, crate::CommError::Indivisible { len: 4, parts: 3 });
    }

    #[test]
    fn all_gather_and_all_to_all() {
        let world = World::new(4).unwrap();
        let got = world
            .run(|comm| {
                let r = comm.rank();
                let gathered = comm.all_gather(&[r, r + 10]).unwrap();
                let send: Vec<usize> = (0..4).map(|dst| 10 * r + dst).collect();
                let exchanged = comm.all_to_all(&send).unwrap();
                (gathered, exchanged)
            })
            .unwrap();
        for (r, (gathered, exchanged)) in got.iter().enumerate() {
            assert_eq!(*gathered, vec![0, 10, 1, 11, 2, 12, 3, 13]);
            let expected: Vec<usize> = (0..4).map(|src| 10 * src + r).collect();
            assert_eq!(*exchanged, expected);
        }
    }

    #[test]
    fn barrier_orders_phases() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let arrived = AtomicUsize::new(0);
        let world = World::new(5).unwrap();
        let seen = world
            .run(|comm| {
                arrived.fetch_add(1, Ordering::SeqCst);
                comm.barrier().unwrap();
                arrived.load(Ordering::SeqCst)
            })
            .unwrap();
        assert!(seen.iter().all(|&n| n == 5));
    }
}
