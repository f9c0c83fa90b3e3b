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

use clap::ValueEnum;
use serde::Serialize;

use comm::{CartComm, Comm, CommError, SendMode, World};
use common::matrix::matmul_accumulate;
use common::{verify, Error, Matrix, Result};

pub const SEED_A: u64 = 42;
pub const SEED_B: u64 = 43;
pub const DEFAULT_ORDER: usize = 576;
/// Buffer attached on every rank for buffered shifts.
pub const BUFFER_BYTES: usize = 128 * 1024 * 1024;

const TAG_A: comm::Tag = 1;
const TAG_B: comm::Tag = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// row stripes of A, B broadcast to everyone
    Striped,
    /// square blocks shifted around a periodic process grid
    Cannon,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Striped => f.write_str("striped"),
            Algorithm::Cannon => f.write_str("cannon"),
        }
    }
}

/// Send mode of the Cannon shifts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Standard,
    Synchronous,
    Buffered,
    Ready,
}

impl From<Mode> for SendMode {
    fn from(mode: Mode) -> SendMode {
        match mode {
            Mode::Standard => SendMode::Standard,
            Mode::Synchronous => SendMode::Synchronous,
            Mode::Buffered => SendMode::Buffered,
            Mode::Ready => SendMode::Ready,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Standard => f.write_str("standard"),
            Mode::Synchronous => f.write_str("synchronous"),
            Mode::Buffered => f.write_str("buffered"),
            Mode::Ready => f.write_str("ready"),
        }
    }
}

/// The seeded input matrices, entries in `[-1, 1)`.
pub fn inputs(order: usize) -> (Matrix, Matrix) {
    (
        Matrix::random_in(order, order, -1.0, 1.0, SEED_A),
        Matrix::random_in(order, order, -1.0, 1.0, SEED_B),
    )
}

/// Sequential `A x B` of the seeded inputs.
pub fn reference(order: usize) -> Result<Matrix> {
    let (a, b) = inputs(order);
    let mut c = vec![0.0; order * order];
    matmul_accumulate(a.as_slice(), b.as_slice(), &mut c, order, order, order);
    Matrix::from_vec(order, order, c)
}

/// Side of the process grid for `processes` ranks, if it is a square.
pub fn grid_side(processes: usize) -> Option<usize> {
    let q = (processes as f64).sqrt().round() as usize;
    (q * q == processes).then_some(q)
}

/// Checks that `order` can be split over `processes` ranks the way
/// `algorithm` splits it.
pub fn check_layout(algorithm: Algorithm, processes: usize, order: usize) -> Result<()> {
    match algorithm {
        Algorithm::Striped if order % processes != 0 => Err(Error::invalid(format!(
            "matrix order {} is not divisible by {} processes",
            order, processes
        ))),
        Algorithm::Striped => Ok(()),
        Algorithm::Cannon => {
            let q = grid_side(processes).ok_or_else(|| {
                Error::invalid(format!(
                    "cannon needs a square number of processes, got {}",
                    processes
                ))
            })?;
            if order % q != 0 {
                return Err(Error::invalid(format!(
                    "matrix order {} is not divisible by the grid side {}",
                    order, q
                )));
            }
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Row {
    pub algorithm: Algorithm,
    pub mode: Mode,
    pub processes: usize,
    pub order: usize,
    pub time_s: f64,
}

/// What rank 0 hands back: its timing and the assembled product.
type RootResult = Option<(f64, Matrix)>;

/// Timed from a barrier before the scatter to a barrier after the gather.
fn striped(comm: &Comm, order: usize) -> Result<RootResult> {
    let rows = order / comm.size();
    let (a, mut b) = if comm.rank() == 0 {
        let (a, b) = inputs(order);
        (a.into_vec(), b.into_vec())
    } else {
        (Vec::new(), Vec::new())
    };

    comm.barrier()?;
    let start = comm.wtime();
    let stripe = comm.scatter(&a, 0)?;
    comm.broadcast(&mut b, 0)?;
    let mut c = vec![0.0; rows * order];
    matmul_accumulate(&stripe, &b, &mut c, rows, order, order);
    let gathered = comm.gather(&c, 0)?;
    comm.barrier()?;
    let time_s = comm.wtime() - start;

    match gathered {
        Some(data) => Ok(Some((time_s, Matrix::from_vec(order, order, data)?))),
        None => Ok(None),
    }
}

fn neighbours(cart: &CartComm<'_>, dim: usize, disp: isize) -> Result<(usize, usize)> {
    match cart.shift(dim, disp) {
        (Some(src), Some(dst)) => Ok((src, dst)),
        _ => Err(CommError::InvalidTopology("cannon needs a periodic grid".to_string()).into()),
    }
}

/// Packs the `bs x bs` blocks of `m` in rank order of `cart`.
fn blocks_by_rank(cart: &CartComm<'_>, m: &Matrix, bs: usize) -> Vec<f64> {
    (0..cart.size())
        .flat_map(|rank| {
            let at = cart.coords_of(rank);
            m.block(at[0] * bs, at[1] * bs, bs)
        })
        .collect()
}

/// One step of the block rotation: A moves one column left, B one row up.
/// Both receives are posted before either send.
fn rotate(cart: &CartComm<'_>, mode: Mode, a: &mut Vec<f64>, b: &mut Vec<f64>) -> Result<()> {
    let (right, left) = neighbours(cart, 1, -1)?;
    let (down, up) = neighbours(cart, 0, -1)?;

    let next_a = cart.irecv::<f64>(right, TAG_A)?;
    let next_b = cart.irecv::<f64>(down, TAG_B)?;
    if mode == Mode::Ready {
        cart.barrier()?;
    }
    cart.send_mode(mode.into(), a, left, TAG_A)?;
    cart.send_mode(mode.into(), b, up, TAG_B)?;
    *a = next_a.wait()?;
    *b = next_b.wait()?;
    Ok(())
}

/// Timed from a barrier after the initial skew to a barrier after the last
/// multiply; scattering, skewing and gathering are not timed.
fn cannon(comm: &Comm, order: usize, mode: Mode) -> Result<RootResult> {
    let q = grid_side(comm.size())
        .ok_or_else(|| CommError::InvalidTopology("process count is not a square".to_string()))?;
    let bs = order / q;
    let cart = CartComm::new(comm, &[q, q], &[true, true])?;
    let (row, col) = (cart.coords()[0], cart.coords()[1]);

    let (all_a, all_b) = if cart.rank() == 0 {
        let (a, b) = inputs(order);
        (blocks_by_rank(&cart, &a, bs), blocks_by_rank(&cart, &b, bs))
    } else {
        (Vec::new(), Vec::new())
    };
    let mut a = cart.scatter(&all_a, 0)?;
    let mut b = cart.scatter(&all_b, 0)?;

    // skew: row i of A moves i places left, column j of B moves j places up
    if row > 0 {
        let (src, dst) = neighbours(&cart, 1, -(row as isize))?;
        cart.sendrecv_replace(&mut a, dst, TAG_A, src, TAG_A)?;
    }
    if col > 0 {
        let (src, dst) = neighbours(&cart, 0, -(col as isize))?;
        cart.sendrecv_replace(&mut b, dst, TAG_B, src, TAG_B)?;
    }

    if mode == Mode::Buffered {
        cart.attach_buffer(BUFFER_BYTES);
    }
    let mut c = vec![0.0; bs * bs];
    cart.barrier()?;
    let start = cart.wtime();
    for step in 0..q {
        matmul_accumulate(&a, &b, &mut c, bs, bs, bs);
        if step + 1 < q {
            rotate(&cart, mode, &mut a, &mut b)?;
        }
    }
    cart.barrier()?;
    let time_s = cart.wtime() - start;
    if mode == Mode::Buffered {
        let bytes = cart.detach_buffer()?;
        log::debug!("rank {} detached {} bytes", cart.rank(), bytes);
    }

    let Some(blocks) = cart.gather(&c, 0)? else {
        return Ok(None);
    };
    let mut product = Matrix::zeros(order, order);
    for (rank, block) in blocks.chunks_exact(bs * bs).enumerate() {
        let at = cart.coords_of(rank);
        product.set_block(at[0] * bs, at[1] * bs, bs, block);
    }
    Ok(Some((time_s, product)))
}

/// Element-wise comparison against the sequential product.
pub fn check_product(expected: &Matrix, observed: &Matrix) -> Result<()> {
    for i in 0..expected.rows() {
        for j in 0..expected.cols() {
            let (e, o) = (expected.get(i, j), observed.get(i, j));
            if !verify::agrees(e, o, verify::TOLERANCE) {
                return Err(Error::Validation {
                    label: format!("C[{}][{}]", i, j),
                    expected: e,
                    observed: o,
                    tolerance: verify::TOLERANCE,
                });
            }
        }
    }
    Ok(())
}

/// Multiplies the seeded matrices of `order` on `processes` ranks and checks
/// the product on the root.
pub fn measure(algorithm: Algorithm, mode: Mode, processes: usize, order: usize) -> Result<Row> {
    if algorithm == Algorithm::Striped && mode != Mode::Standard {
        return Err(Error::invalid("send modes apply to the cannon algorithm only"));
    }
    let world = World::new(processes)?;
    check_layout(algorithm, processes, order)?;

    let results = world.try_run(|comm| -> Result<RootResult> {
        match algorithm {
            Algorithm::Striped => striped(comm, order),
            Algorithm::Cannon => cannon(comm, order, mode),
        }
    })?;
    let (time_s, product) = results
        .into_iter()
        .flatten()
        .next()
        .ok_or_else(|| Error::invalid("the root reported no result"))?;

    check_product(&reference(order)?, &product)?;
    log::debug!("{} product of order {} validates", algorithm, order);
    Ok(Row {
        algorithm,
        mode,
        processes,
        order,
        time_s,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_sides() {
        assert_eq!(grid_side(1), Some(1));
        assert_eq!(grid_side(4), Some(2));
        assert_eq!(grid_side(9), Some(3));
        assert_eq!(grid_side(2), None);
        assert_eq!(grid_side(8), None);
    }

    #[test]
    fn layout_errors() {
        assert!(check_layout(Algorithm::Striped, 4, 16).is_ok());
        assert!(matches!(
            check_layout(Algorithm::Striped, 3, 16),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            check_layout(Algorithm::Cannon, 2, 16),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            check_layout(Algorithm::Cannon, 9, 16),
            Err(Error::InvalidArgument(_))
        ));
        assert!(check_layout(Algorithm::Cannon, 9, 18).is_ok());
    }

    #[test]
    fn striped_on_small_worlds() {
        for processes in [1, 2, 4] {
            let row = measure(Algorithm::Striped, Mode::Standard, processes, 24).unwrap();
            assert_eq!((row.processes, row.order), (processes, 24));
            assert!(row.time_s >= 0.0);
        }
    }

    #[test]
    fn cannon_in_every_mode() {
        for mode in [Mode::Standard, Mode::Synchronous, Mode::Buffered, Mode::Ready] {
            for processes in [1, 4, 9] {
                let row = measure(Algorithm::Cannon, mode, processes, 18).unwrap();
                assert_eq!(row.mode, mode);
            }
        }
    }

    #[test]
    fn modes_need_cannon() {
        assert!(matches!(
            measure(Algorithm::Striped, Mode::Ready, 2, 8),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn block_layout_follows_the_grid() {
        let world = World::new(4).unwrap();
        let packed = world
            .run(|comm| {
                let cart = CartComm::new(comm, &[2, 2], &[true, true]).unwrap();
                let m = Matrix::from_vec(4, 4, (0..16).map(f64::from).collect()).unwrap();
                blocks_by_rank(&cart, &m, 2)
            })
            .unwrap();
        assert_eq!(
            packed[0],
            vec![
                0.0, 1.0, 4.0, 5.0, 2.0, 3.0, 6.0, 7.0, 8.0, 9.0, 12.0, 13.0, 10.0, 11.0, 14.0,
                15.0
            ]
        );
    }

    #[test]
    fn reference_matches_row_by_column_sums() {
        let (a, b) = inputs(3);
        let c = reference(3).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                let sum: f64 = (0..3).map(|k| a.get(i, k) * b.get(k, j)).sum();
                assert!(verify::agrees(sum, c.get(i, j), verify::TOLERANCE));
            }
        }
    }

    #[test]
    fn corrupted_product_is_reported() {
        let expected = reference(4).unwrap();
        let mut observed = expected.clone();
        observed.set(3, 1, observed.get(3, 1) + 1.0);
        assert!(check_product(&expected, &expected).is_ok());
        match check_product(&expected, &observed) {
            Err(Error::Validation { label, .. }) => assert_eq!(label, "C[3][1]"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn semicolon_row() {
        let row = Row {
            algorithm: Algorithm::Cannon,
            mode: Mode::Buffered,
            processes: 4,
            order: 8,
            time_s: 0.5,
        };
        let mut out = Vec::new();
        common::report::write_rows(&mut out, &[row], true).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "algorithm;mode;processes;order;time_s\ncannon;buffered;4;8;0.5\n"
        );
    }
}
