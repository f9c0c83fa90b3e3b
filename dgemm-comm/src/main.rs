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

//////////////////////////////////////////////
//
// NAME:    dgemm-comm
//
// PURPOSE: This program measures distributed dense matrix multiplication
//          C = A x B over ranks that only share data by message passing.
//
// USAGE:   dgemm-comm <striped|cannon> <processes> [order] [--mode M] [--header]
//
//          striped scatters row stripes of A and broadcasts B; cannon
//          rotates square blocks around a periodic sqrt(p) x sqrt(p) grid,
//          with the block shifts sent in mode M (standard, synchronous,
//          buffered or ready). The output is one row
//          algorithm;mode;processes;order;time_s.
//
///////////////////////////////////////////////

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use common::{cli, report};
use dgemm_comm::{measure, Algorithm, Mode, DEFAULT_ORDER};

#[derive(Parser, Debug)]
#[command(version, about = "Distributed matrix multiplication", long_about = None)]
struct Args {
    #[arg(value_enum)]
    algorithm: Algorithm,
    /// Number of ranks
    #[arg(value_parser = cli::positive)]
    processes: usize,
    /// Matrix order
    #[arg(value_parser = cli::positive, default_value_t = DEFAULT_ORDER)]
    order: usize,
    /// Send mode of the cannon block shifts
    #[arg(short, long, value_enum, default_value_t = Mode::Standard)]
    mode: Mode,
    /// Print the column names before the row
    #[arg(long)]
    header: bool,
}

fn run(args: Args) -> anyhow::Result<()> {
    log::info!(
        "{} multiply of order {} on {} ranks ({} sends)",
        args.algorithm,
        args.order,
        args.processes,
        args.mode
    );
    let row = measure(args.algorithm, args.mode, args.processes, args.order)
        .with_context(|| format!("{} multiplication failed", args.algorithm))?;
    report::print_rows(&[row], args.header)?;
    Ok(())
}

fn main() -> ExitCode {
    cli::init_logging();
    let args: Args = cli::parse();
    cli::exit_with(run(args))
}
