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

//! An in-process message-passing runtime. Every rank of a [`World`] is a
//! thread; ranks exchange typed vectors through per-rank mailboxes, matched
//! by source and tag, and build collectives, topologies and nonblocking
//! requests on top of that.
//!
//! ```
//! use comm::World;
//!
//! let sums = World::new(4)
//!     .unwrap()
//!     .run(|comm| comm.all_reduce(&[comm.rank() as u64], comm::ReduceOp::Sum))
//!     .unwrap();
//! assert!(sums.into_iter().all(|s| s.unwrap() == vec![6]));
//! ```

mod cart;
mod collective;
mod error;
pub mod linear;
mod p2p;
mod request;
mod world;

use std::ops::Add;

pub use cart::{dims_create, CartComm};
pub use error::{CommError, Result};
pub use p2p::Comm;
pub use request::{wait_all, RecvRequest, SendRequest};
pub use world::World;

pub type Tag = u32;

/// Largest tag available to user messages; the tags above it belong to the
/// collectives.
pub const TAG_UB: Tag = u32::MAX - 32;

/// Anything that can travel in a message.
pub trait Element: Copy + Send + 'static {}

impl<T: Copy + Send + 'static> Element for T {}

/// Elements that can be combined by a [`ReduceOp`].
pub trait Reducible: Element + PartialOrd + Add<Output = Self> {}

impl<T: Element + PartialOrd + Add<Output = T>> Reducible for T {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Min,
    Max,
}

impl ReduceOp {
    pub fn apply<T: Reducible>(self, a: T, b: T) -> T {
        match self {
            ReduceOp::Sum => a + b,
            ReduceOp::Min => {
                if b < a {
                    b
                } else {
                    a
                }
            }
            ReduceOp::Max => {
                if b > a {
                    b
                } else {
                    a
                }
            }
        }
    }

    /// Element-wise `acc[i] = acc[i] op other[i]`.
    pub fn combine_into<T: Reducible>(self, acc: &mut [T], other: &[T]) -> Result<()> {
        if acc.len() != other.len() {
            return Err(CommError::Truncated {
                expected: acc.len(),
                received: other.len(),
            });
        }
        for (a, &b) in acc.iter_mut().zip(other) {
            *a = self.apply(*a, b);
        }
        Ok(())
    }
}

/// Completion semantics of a point-to-point send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendMode {
    /// Eager: the message is queued at the destination and the call returns.
    #[default]
    Standard,
    /// Returns once the destination has posted a matching receive.
    Synchronous,
    /// Copies the message into space taken from the attached buffer.
    Buffered,
    /// Legal only when the matching receive is already posted.
    Ready,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduce_ops() {
        assert_eq!(ReduceOp::Sum.apply(2, 3), 5);
        assert_eq!(ReduceOp::Min.apply(2.5, -1.0), -1.0);
        assert_eq!(ReduceOp::Max.apply(-7, -3), -3);
    }

    #[test]
    fn combine_requires_equal_lengths() {
        let mut acc = vec![1, 5, 3];
        ReduceOp::Max.combine_into(&mut acc, &[4, 2, 3]).unwrap();
        assert_eq!(acc, vec![4, 5, 3]);
        assert!(ReduceOp::Sum.combine_into(&mut acc, &[1]).is_err());
    }
}
