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

use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};

use crate::error::{CommError, Result};
use crate::world::{Shared, POLL};
use crate::{Element, SendMode, Tag, TAG_UB};

pub(crate) struct BufferPool {
    capacity: usize,
    in_use: AtomicUsize,
}

/// Space held in an attached buffer by a message that has not been received yet.
pub(crate) struct BufferLease {
    pool: Arc<BufferPool>,
    bytes: usize,
}

impl Drop for BufferLease {
    fn drop(&mut self) {
        self.pool.in_use.fetch_sub(self.bytes, Ordering::AcqRel);
    }
}

impl BufferPool {
    fn lease(pool: &Arc<BufferPool>, bytes: usize) -> Result<BufferLease> {
        let mut used = pool.in_use.load(Ordering::Acquire);
        loop {
            let available = pool.capacity - used;
            if bytes > available {
                return Err(CommError::BufferExhausted {
                    requested: bytes,
                    available,
                });
            }
            match pool.in_use.compare_exchange_weak(
                used,
                used + bytes,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Ok(BufferLease {
                        pool: pool.clone(),
                        bytes,
                    })
                }
                Err(current) => used = current,
            }
        }
    }
}

pub(crate) struct Envelope {
    src: usize,
    tag: Tag,
    payload: Box<dyn Any + Send>,
    _lease: Option<BufferLease>,
}

/// One rank's endpoint into its world.
pub struct Comm {
    rank: usize,
    size: usize,
    inbox: Receiver<Envelope>,
    outboxes: Vec<Sender<Envelope>>,
    /// Arrived messages that did not match the receive in progress.
    pending: RefCell<VecDeque<Envelope>>,
    buffer: RefCell<Option<Arc<BufferPool>>>,
    shared: Arc<Shared>,
}

impl Comm {
    pub(crate) fn new(
        rank: usize,
        inbox: Receiver<Envelope>,
        outboxes: Vec<Sender<Envelope>>,
        shared: Arc<Shared>,
    ) -> Self {
        Comm {
            rank,
            size: outboxes.len(),
            inbox,
            outboxes,
            pending: RefCell::new(VecDeque::new()),
            buffer: RefCell::new(None),
            shared,
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }

    /// Seconds since the world started, on a clock shared by all ranks.
    pub fn wtime(&self) -> f64 {
        self.shared.epoch.elapsed().as_secs_f64()
    }

    /// Aborts the whole world. Ranks blocked in communication return
    /// [`CommError::Aborted`].
    pub fn abort(&self) {
        log::warn!("rank {} aborted the world", self.rank);
        self.shared.abort(self.rank);
    }

    pub(crate) fn check_rank(&self, rank: usize) -> Result<()> {
        if rank >= self.size {
            return Err(CommError::InvalidRank {
                rank,
                size: self.size,
            });
        }
        Ok(())
    }

    fn check_tag(tag: Tag) -> Result<()> {
        if tag > TAG_UB {
            return Err(CommError::InvalidTag(tag));
        }
        Ok(())
    }

    pub fn send<T: Element>(&self, data: &[T], dst: usize, tag: Tag) -> Result<()> {
        self.send_mode(SendMode::Standard, data, dst, tag)
    }

    /// Sends an owned vector without copying it.
    pub fn send_vec<T: Element>(&self, data: Vec<T>, dst: usize, tag: Tag) -> Result<()> {
        Self::check_tag(tag)?;
        self.post_message(data, dst, tag, None)
    }

    pub fn send_mode<T: Element>(
        &self,
        mode: SendMode,
        data: &[T],
        dst: usize,
        tag: Tag,
    ) -> Result<()> {
        Self::check_tag(tag)?;
        self.check_rank(dst)?;
        let key = (dst, self.rank, tag);
        match mode {
            SendMode::Standard => self.post_message(data.to_vec(), dst, tag, None),
            SendMode::Synchronous => {
                self.wait_posted(key)?;
                self.post_message(data.to_vec(), dst, tag, None)
            }
            SendMode::Buffered => {
                let pool = self
                    .buffer
                    .borrow()
                    .clone()
                    .ok_or(CommError::MissingBuffer)?;
                let lease = BufferPool::lease(&pool, mem::size_of_val(data))?;
                self.post_message(data.to_vec(), dst, tag, Some(lease))
            }
            SendMode::Ready => {
                if !self.shared.is_posted(&key) {
                    return Err(CommError::NotReady { dst, tag });
                }
                self.post_message(data.to_vec(), dst, tag, None)
            }
        }
    }

    pub(crate) fn post_message<T: Element>(
        &self,
        data: Vec<T>,
        dst: usize,
        tag: Tag,
        lease: Option<BufferLease>,
    ) -> Result<()> {
        self.check_rank(dst)?;
        if self.shared.is_aborted() {
            return Err(CommError::Aborted);
        }
        let envelope = Envelope {
            src: self.rank,
            tag,
            payload: Box::new(data),
            _lease: lease,
        };
        self.outboxes[dst]
            .send(envelope)
            .map_err(|_| CommError::Disconnected)
    }

    fn wait_posted(&self, key: (usize, usize, Tag)) -> Result<()> {
        let mut posted = self.shared.posted.lock();
        while !posted.contains_key(&key) {
            if self.shared.is_aborted() {
                return Err(CommError::Aborted);
            }
            self.shared.posted_cv.wait_for(&mut posted, POLL);
        }
        Ok(())
    }

    /// Blocks until a message from `src` with `tag` arrives.
    pub fn recv<T: Element>(&self, src: usize, tag: Tag) -> Result<Vec<T>> {
        Self::check_tag(tag)?;
        self.recv_raw(src, tag)
    }

    pub(crate) fn recv_raw<T: Element>(&self, src: usize, tag: Tag) -> Result<Vec<T>> {
        self.check_rank(src)?;
        if let Some(envelope) = self.take_pending(src, tag) {
            return unpack(envelope);
        }
        let key = (self.rank, src, tag);
        self.shared.post(key);
        let envelope = self.wait_message(src, tag);
        self.shared.unpost(key);
        unpack(envelope?)
    }

    /// Receives into `buf`, returning the number of elements written. A
    /// message longer than `buf` is an error.
    pub fn recv_into<T: Element>(&self, buf: &mut [T], src: usize, tag: Tag) -> Result<usize> {
        let data = self.recv::<T>(src, tag)?;
        if data.len() > buf.len() {
            return Err(CommError::Truncated {
                expected: buf.len(),
                received: data.len(),
            });
        }
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }

    /// Sends `data` to `dst` and receives from `src` in one call.
    pub fn sendrecv<T: Element>(
        &self,
        data: &[T],
        dst: usize,
        send_tag: Tag,
        src: usize,
        recv_tag: Tag,
    ) -> Result<Vec<T>> {
        self.send(data, dst, send_tag)?;
        self.recv(src, recv_tag)
    }

    /// Like [`Comm::sendrecv`] with the received message replacing `buf`; both
    /// messages must have the same length.
    pub fn sendrecv_replace<T: Element>(
        &self,
        buf: &mut Vec<T>,
        dst: usize,
        send_tag: Tag,
        src: usize,
        recv_tag: Tag,
    ) -> Result<()> {
        let incoming = self.sendrecv(buf, dst, send_tag, src, recv_tag)?;
        if incoming.len() != buf.len() {
            return Err(CommError::Truncated {
                expected: buf.len(),
                received: incoming.len(),
            });
        }
        *buf = incoming;
        Ok(())
    }

    /// Makes `bytes` of buffer space available to [`SendMode::Buffered`] sends.
    pub fn attach_buffer(&self, bytes: usize) {
        *self.buffer.borrow_mut() = Some(Arc::new(BufferPool {
            capacity: bytes,
            in_use: AtomicUsize::new(0),
        }));
    }

    /// Waits until every buffered message has been received, then detaches the
    /// buffer and returns its size.
    pub fn detach_buffer(&self) -> Result<usize> {
        let pool = self
            .buffer
            .borrow_mut()
            .take()
            .ok_or(CommError::MissingBuffer)?;
        while pool.in_use.load(Ordering::Acquire) > 0 {
            if self.shared.is_aborted() {
                return Err(CommError::Aborted);
            }
            std::thread::sleep(POLL / 10);
        }
        Ok(pool.capacity)
    }

    pub(crate) fn take_pending(&self, src: usize, tag: Tag) -> Option<Envelope> {
        let mut pending = self.pending.borrow_mut();
        let pos = pending.iter().position(|e| e.src == src && e.tag == tag)?;
        pending.remove(pos)
    }

    /// Pulls messages off the mailbox until one from `src` with `tag` shows up.
    pub(crate) fn wait_message(&self, src: usize, tag: Tag) -> Result<Envelope> {
        loop {
            match self.inbox.recv_timeout(POLL) {
                Ok(envelope) if envelope.src == src && envelope.tag == tag => {
                    return Ok(envelope)
                }
                Ok(envelope) => self.pending.borrow_mut().push_back(envelope),
                Err(RecvTimeoutError::Timeout) => {
                    if self.shared.is_aborted() {
                        return Err(CommError::Aborted);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return Err(CommError::Disconnected),
            }
        }
    }
}

pub(crate) fn unpack<T: Element>(envelope: Envelope) -> Result<Vec<T>> {
    let Envelope {
        src, tag, payload, ..
    } = envelope;
    payload
        .downcast::<Vec<T>>()
        .map(|data| *data)
        .map_err(|_| CommError::TypeMismatch { src, tag })
}

#[cfg(test)]
mod tests {
    use crate::{CommError, SendMode, World};

    #[test]
    fn messages_match_on_source_and_tag() {
        let world = World::new(3).unwrap();
        let got = world
            .run(|comm| match comm.rank() {
                0 => {
                    let b = comm.recv::<i32>(2, 7).unwrap();
                    let a = comm.recv::<i32>(1, 7).unwrap();
                    let c = comm.recv::<i32>(1, 3).unwrap();
                    vec![a, b, c]
                }
                r => {
                    comm.send(&[r as i32; 2], 0, 3).unwrap();
                    comm.send(&[10 * r as i32], 0, 7).unwrap();
                    Vec::new()
                }
            })
            .unwrap();
        assert_eq!(got[0], vec![vec![10], vec![20], vec![1, 1]]);
    }

    #[test]
    fn same_source_and_tag_do_not_overtake() {
        let world = World::new(2).unwrap();
        let got = world
            .run(|comm| {
                if comm.rank() == 0 {
                    for i in 0..100u32 {
                        comm.send(&[i], 1, 0).unwrap();
                    }
                    Vec::new()
                } else {
                    (0..100).map(|_| comm.recv::<u32>(0, 0).unwrap()[0]).collect()
                }
            })
            .unwrap();
        assert_eq!(got[1], (0..100).collect::<Vec<u32>>());
    }

    #[test]
    fn wrong_element_type_is_reported() {
        let world = World::new(2).unwrap();
        let got = world
            .run(|comm| {
                if comm.rank() == 0 {
                    comm.send(&[1.5f64], 1, 4).map(|_| ())
                } else {
                    comm.recv::<i32>(0, 4).map(|_| ())
                }
            })
            .unwrap();
        assert_eq!(got[1], Err(CommError::TypeMismatch { src: 0, tag: 4 }));
    }

    #[test]
    fn reserved_tags_and_bad_ranks_are_rejected() {
        let world = World::new(1).unwrap();
        let got = world
            .run(|comm| {
                (
                    comm.send(&[0u8], 0, u32::MAX).unwrap_err(),
                    comm.send(&[0u8], 3, 0).unwrap_err(),
                )
            })
            .unwrap();
        assert_eq!(got[0].0, CommError::InvalidTag(u32::MAX));
        assert_eq!(got[0].1, CommError::InvalidRank { rank: 3, size: 1 });
    }

    #[test]
    fn recv_into_checks_capacity() {
        let world = World::new(1).unwrap();
        let got = world
            .run(|comm| {
                comm.send(&[1, 2, 3], 0, 0).unwrap();
                comm.send(&[4, 5, 6, 7], 0, 0).unwrap();
                let mut buf = [0; 3];
                let n = comm.recv_into(&mut buf, 0, 0).unwrap();
                let err = comm.recv_into(&mut buf, 0, 0).unwrap_err();
                (n, buf, err)
            })
            .unwrap();
        assert_eq!(got[0].0, 3);
        assert_eq!(got[0].1, [1, 2, 3]);
        assert_eq!(
            got[0].2,
            CommError::Truncated {
                expected: 3,
                received: 4
            }
        );
    }

    #[test]
    fn ring_sendrecv_replace() {
        let world = World::new(4).unwrap();
        let got = world
            .run(|comm| {
                let (r, p) = (comm.rank(), comm.size());
                let mut buf = vec![r as u64; 8];
                comm.sendrecv_replace(&mut buf, (r + 1) % p, 1, (r + p - 1) % p, 1)
                    .unwrap();
                buf[0]
            })
            .unwrap();
        assert_eq!(got, vec![3, 0, 1, 2]);
    }

    #[test]
    fn ready_send_without_posted_receive_fails() {
        let world = World::new(1).unwrap();
        let got = world
            .run(|comm| comm.send_mode(SendMode::Ready, &[1u8], 0, 9))
            .unwrap();
        assert_eq!(got[0], Err(CommError::NotReady { dst: 0, tag: 9 }));
    }

    #[test]
    fn synchronous_send_waits_for_the_receiver() {
        let world = World::new(2).unwrap();
        let got = world
            .run(|comm| {
                if comm.rank() == 0 {
                    comm.send_mode(SendMode::Synchronous, &[42u16], 1, 2).unwrap();
                    0
                } else {
                    std::thread::sleep(std::time::Duration::from_millis(20));
                    comm.recv::<u16>(0, 2).unwrap()[0]
                }
            })
            .unwrap();
        assert_eq!(got[1], 42);
    }

    #[test]
    fn buffered_send_needs_space() {
        let world = World::new(1).unwrap();
        let got = world
            .run(|comm| {
                let missing = comm.send_mode(SendMode::Buffered, &[0u8; 4], 0, 0);
                comm.attach_buffer(16);
                let fits = comm.send_mode(SendMode::Buffered, &[0u32; 4], 0, 0);
                let full = comm.send_mode(SendMode::Buffered, &[0u8; 1], 0, 0);
                comm.recv::<u32>(0, 0).unwrap();
                let after = comm.send_mode(SendMode::Buffered, &[0u8; 16], 0, 0);
                comm.recv::<u8>(0, 0).unwrap();
                let detached = comm.detach_buffer();
                (missing, fits, full, after, detached)
            })
            .unwrap();
        let (missing, fits, full, after, detached) = got[0].clone();
        assert_eq!(missing, Err(CommError::MissingBuffer));
        assert_eq!(fits, Ok(()));
        assert_eq!(
            full,
            Err(CommError::BufferExhausted {
                requested: 1,
                available: 0
            })
        );
        assert_eq!(after, Ok(()));
        assert_eq!(detached, Ok(16));
    }
}
