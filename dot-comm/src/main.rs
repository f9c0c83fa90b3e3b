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
// NAME:    dot-comm
//
// PURPOSE: This program measures a distributed dot product: every rank
//          multiplies its shares of two random vectors and the partial
//          sums are added in a reduction on rank 0.
//
// USAGE:   dot-comm <processes> [n] [--distribution local|scatter] [--output results.csv]
//
//          The output is one row processes;n;time_s;dot.
//
///////////////////////////////////////////////

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use common::{cli, report};
use dot_comm::{measure, Distribution, DEFAULT_LENGTH};

#[derive(Parser, Debug)]
#[command(version, about = "Distributed dot product", long_about = None)]
struct Args {
    /// Number of ranks
    #[arg(value_parser = cli::positive)]
    processes: usize,
    /// Length of both vectors
    #[arg(value_parser = cli::positive, default_value_t = DEFAULT_LENGTH)]
    n: usize,
    #[arg(short, long, value_enum, default_value_t = Distribution::Local)]
    distribution: Distribution,
    /// Also append the row to this CSV file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn run(args: Args) -> anyhow::Result<()> {
    log::info!(
        "dot product of length {} on {} ranks ({} data)",
        args.n,
        args.processes,
        args.distribution
    );
    let row = measure(args.processes, args.n, args.distribution)
        .context("distributed dot product failed")?;
    report::print_rows(&[row], false)?;
    if let Some(path) = &args.output {
        report::append_csv(path, &[row])?;
    }
    Ok(())
}

fn main() -> ExitCode {
    cli::init_logging();
    let args: Args = cli::parse();
    cli::exit_with(run(args))
}
