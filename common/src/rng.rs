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

use rand::distributions::{Distribution, Uniform};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub const DEFAULT_SEED: u64 = 42;

pub fn seeded(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// `len` values drawn uniformly from `[low, high)`.
pub fn uniform_vec(len: usize, low: f64, high: f64, seed: u64) -> Vec<f64> {
    let mut rng = seeded(seed);
    let dist = Uniform::new(low, high);
    (0..len).map(|_| dist.sample(&mut rng)).collect()
}

/// `len` integers drawn from the whole `i32` range.
pub fn uniform_i32_vec(len: usize, seed: u64) -> Vec<i32> {
    let mut rng = seeded(seed);
    (0..len).map(|_| rng.gen::<i32>()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        assert_eq!(uniform_vec(64, -1.0, 1.0, 7), uniform_vec(64, -1.0, 1.0, 7));
        assert_ne!(uniform_vec(64, -1.0, 1.0, 7), uniform_vec(64, -1.0, 1.0, 8));
    }

    #[test]
    fn values_stay_in_range() {
        let v = uniform_vec(10_000, -100.0, 100.0, DEFAULT_SEED);
        assert!(v.iter().all(|&x| (-100.0..100.0).contains(&x)));
    }

    #[test]
    fn integer_stream_is_reproducible() {
        let a = uniform_i32_vec(1000, 42);
        assert_eq!(a, uniform_i32_vec(1000, 42));
        assert!(a.iter().any(|&x| x < 0) && a.iter().any(|&x| x > 0));
    }
}
