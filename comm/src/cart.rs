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

use std::ops::Deref;

use crate::error::{CommError, Result};
use crate::p2p::Comm;

/// Splits `nodes` ranks over `ndims` dimensions as evenly as possible, the
/// largest extent first.
pub fn dims_create(nodes: usize, ndims: usize) -> Result<Vec<usize>> {
    if nodes == 0 || ndims == 0 {
        return Err(CommError::InvalidTopology(format!(
            "cannot lay out {} ranks over {} dimensions",
            nodes, ndims
        )));
    }
    let mut factors = Vec::new();
    let mut rest = nodes;
    let mut f = 2;
    while f * f <= rest {
        while rest % f == 0 {
            factors.push(f);
            rest /= f;
        }
        f += 1;
    }
    if rest > 1 {
        factors.push(rest);
    }

    let mut dims = vec![1; ndims];
    for factor in factors.into_iter().rev() {
        if let Some(smallest) = dims.iter_mut().min() {
            *smallest *= factor;
        }
    }
    dims.sort_unstable_by(|a, b| b.cmp(a));
    Ok(dims)
}

/// A Cartesian grid laid over the ranks of a [`Comm`] in row-major order.
pub struct CartComm<'a> {
    comm: &'a Comm,
    dims: Vec<usize>,
    periods: Vec<bool>,
    coords: Vec<usize>,
}

impl<'a> CartComm<'a> {
    pub fn new(comm: &'a Comm, dims: &[usize], periods: &[bool]) -> Result<Self> {
        if dims.len() != periods.len() {
            return Err(CommError::InvalidTopology(
                "dims and periods differ in length".to_string(),
            ));
        }
        let cells: usize = dims.iter().product();
        if cells != comm.size() {
            return Err(CommError::InvalidTopology(format!(
                "a {:?} grid has {} cells but the world has {} ranks",
                dims,
                cells,
                comm.size()
            )));
        }
        let mut cart = CartComm {
            comm,
            dims: dims.to_vec(),
            periods: periods.to_vec(),
            coords: Vec::new(),
        };
        cart.coords = cart.coords_of(comm.rank());
        Ok(cart)
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Coordinates of this rank.
    pub fn coords(&self) -> &[usize] {
        &self.coords
    }

    pub fn coords_of(&self, rank: usize) -> Vec<usize> {
        let mut coords = vec![0; self.dims.len()];
        let mut rest = rank;
        for (c, &d) in coords.iter_mut().zip(&self.dims).rev() {
            *c = rest % d;
            rest /= d;
        }
        coords
    }

    /// Rank at `coords`, wrapping periodic dimensions. `None` when a
    /// coordinate falls off a non-periodic edge.
    pub fn rank_of(&self, coords: &[isize]) -> Option<usize> {
        let mut rank = 0;
        for ((&c, &d), &periodic) in coords.iter().zip(&self.dims).zip(&self.periods) {
            let d = d as isize;
            let c = if periodic {
                c.rem_euclid(d)
            } else if (0..d).contains(&c) {
                c
            } else {
                return None;
            };
            rank = rank * d as usize + c as usize;
        }
        Some(rank)
    }

    /// Neighbours `disp` steps away along `dim`, as `(source, dest)`: this rank
    /// receives from `source` and sends to `dest` in a shift.
    pub fn shift(&self, dim: usize, disp: isize) -> (Option<usize>, Option<usize>) {
        let here: Vec<isize> = self.coords.iter().map(|&c| c as isize).collect();
        let mut to = here.clone();
        let mut from = here;
        to[dim] += disp;
        from[dim] -= disp;
        (self.rank_of(&from), self.rank_of(&to))
    }
}

impl Deref for CartComm<'_> {
    type Target = Comm;

    fn deref(&self) -> &Comm {
        self.comm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::World;

    #[test]
    fn balanced_dims() {
        assert_eq!(dims_create(16, 2).unwrap(), vec![4, 4]);
        assert_eq!(dims_create(12, 2).unwrap(), vec![4, 3]);
        assert_eq!(dims_create(7, 2).unwrap(), vec![7, 1]);
        assert_eq!(dims_create(24, 3).unwrap(), vec![4, 3, 2]);
        assert!(dims_create(0, 2).is_err());
    }

    #[test]
    fn grid_must_cover_the_world() {
        let world = World::new(6).unwrap();
        let got = world
            .run(|comm| CartComm::new(comm, &[2, 2], &[true, true]).is_err())
            .unwrap();
        assert!(got.iter().all(|&e| e));
    }

    #[test]
    fn periodic_shifts_wrap() {
        let world = World::new(9).unwrap();
        let got = world
            .run(|comm| {
                let cart = CartComm::new(comm, &[3, 3], &[true, true]).unwrap();
                (cart.coords().to_vec(), cart.shift(1, -1), cart.shift(0, 1))
            })
            .unwrap();
        // rank 3 sits at (1, 0)
        assert_eq!(got[3].0, vec![1, 0]);
        assert_eq!(got[3].1, (Some(4), Some(5)));
        assert_eq!(got[3].2, (Some(0), Some(6)));
    }

    #[test]
    fn open_edges_have_no_neighbour() {
        let world = World::new(4).unwrap();
        let got = world
            .run(|comm| {
                let cart = CartComm::new(comm, &[2, 2], &[false, false]).unwrap();
                cart.shift(0, 1)
            })
            .unwrap();
        assert_eq!(got[0], (None, Some(2)));
        assert_eq!(got[2], (Some(0), None));
    }
}
