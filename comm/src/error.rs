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

use thiserror::Error;

use crate::Tag;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommError {
    #[error("a world needs at least one rank")]
    EmptyWorld,

    #[error("rank {rank} is outside a world of size {size}")]
    InvalidRank { rank: usize, size: usize },

    #[error("tag {0} is reserved")]
    InvalidTag(Tag),

    #[error("message from rank {src} with tag {tag} has a different element type")]
    TypeMismatch { src: usize, tag: Tag },

    #[error("expected {expected} elements, received {received}")]
    Truncated { expected: usize, received: usize },

    #[error("{len} elements cannot be split evenly over {parts} ranks")]
    Indivisible { len: usize, parts: usize },

    #[error("no buffer attached for a buffered send")]
    MissingBuffer,

    #[error("buffered send of {requested} bytes exceeds the {available} bytes left in the attached buffer")]
    BufferExhausted { requested: usize, available: usize },

    #[error("ready send to rank {dst} with tag {tag} before the receive was posted")]
    NotReady { dst: usize, tag: Tag },

    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    #[error("world aborted")]
    Aborted,

    #[error("rank {0} panicked")]
    RankPanicked(usize),

    #[error("mailbox disconnected")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, CommError>;
