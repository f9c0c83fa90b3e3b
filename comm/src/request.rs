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

use std::marker::PhantomData;

use crate::error::Result;
use crate::p2p::{unpack, Comm};
use crate::{Element, Tag};

/// Handle of a send started with [`Comm::isend`]. Sends are eager, so the
/// outcome is already known when the handle is created.
#[must_use = "a send request should be waited on"]
#[derive(Debug)]
pub struct SendRequest {
    outcome: Result<()>,
}

impl SendRequest {
    pub fn wait(self) -> Result<()> {
        self.outcome
    }
}

/// Handle of a receive posted with [`Comm::irecv`]. The receive counts as
/// posted for synchronous and ready senders until it completes or the
/// handle is dropped.
#[must_use = "a receive request does nothing unless waited on"]
pub struct RecvRequest<'a, T: Element> {
    comm: &'a Comm,
    src: usize,
    tag: Tag,
    active: bool,
    _marker: PhantomData<T>,
}

impl<'a, T: Element> RecvRequest<'a, T> {
    pub fn source(&self) -> usize {
        self.src
    }

    /// Blocks until the message arrives.
    pub fn wait(mut self) -> Result<Vec<T>> {
        let envelope = match self.comm.take_pending(self.src, self.tag) {
            Some(envelope) => Ok(envelope),
            None => self.comm.wait_message(self.src, self.tag),
        };
        self.release();
        unpack(envelope?)
    }

    fn release(&mut self) {
        if self.active {
            self.comm
                .shared()
                .unpost((self.comm.rank(), self.src, self.tag));
            self.active = false;
        }
    }
}

impl<T: Element> Drop for RecvRequest<'_, T> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Waits on every request in order and returns the messages in the same order.
pub fn wait_all<T: Element>(requests: Vec<RecvRequest<'_, T>>) -> Result<Vec<Vec<T>>> {
    requests.into_iter().map(RecvRequest::wait).collect()
}

impl Comm {
    pub fn isend<T: Element>(&self, data: &[T], dst: usize, tag: Tag) -> SendRequest {
        SendRequest {
            outcome: self.send(data, dst, tag),
        }
    }

    /// Posts a receive for a message from `src` with `tag` and returns at once.
    pub fn irecv<T: Element>(&self, src: usize, tag: Tag) -> Result<RecvRequest<'_, T>> {
        self.check_rank(src)?;
        self.shared().post((self.rank(), src, tag));
        Ok(RecvRequest {
            comm: self,
            src,
            tag,
            active: true,
            _marker: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{wait_all, SendMode, World};

    #[test]
    fn posted_irecv_allows_ready_send() {
        let world = World::new(2).unwrap();
        let got = world
            .run(|comm| {
                let peer = 1 - comm.rank();
                let request = comm.irecv::<f64>(peer, 11).unwrap();
                comm.barrier().unwrap();
                comm.send_mode(SendMode::Ready, &[comm.rank() as f64; 3], peer, 11)
                    .unwrap();
                request.wait().unwrap()
            })
            .unwrap();
        assert_eq!(got, vec![vec![1.0; 3], vec![0.0; 3]]);
    }

    #[test]
    fn wait_all_keeps_request_order() {
        let world = World::new(3).unwrap();
        let got = world
            .run(|comm| {
                if comm.rank() == 0 {
                    let requests = vec![
                        comm.irecv::<usize>(2, 0).unwrap(),
                        comm.irecv::<usize>(1, 0).unwrap(),
                    ];
                    wait_all(requests).unwrap()
                } else {
                    comm.isend(&[comm.rank()], 0, 0).wait().unwrap();
                    Vec::new()
                }
            })
            .unwrap();
        assert_eq!(got[0], vec![vec![2], vec![1]]);
    }

    #[test]
    fn dropped_request_is_no_longer_posted() {
        let world = World::new(1).unwrap();
        let got = world
            .run(|comm| {
                drop(comm.irecv::<u8>(0, 1).unwrap());
                comm.send_mode(SendMode::Ready, &[1u8], 0, 1).is_err()
            })
            .unwrap();
        assert!(got[0]);
    }
}
