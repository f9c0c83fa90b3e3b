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
// NAME:    minmax-comm
//
// PURPOSE: This program measures a distributed minimum search: every rank
//          scans its share of a random integer vector and the partial
//          minima meet in a reduction on rank 0.
//
// USAGE:   minmax-comm <processes> [n] [--distribution local|scatter] [--output results.csv]
//
//          The output is one row processes;n;time_s;min.
//
///////////////////////////////////////////////

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use common::{cli, report};
use minmax_comm::{measure, Distribution, DEFAULT_LENGTH};

#[derive(Parser, Debug)]
#[command(version, about = "Distributed minimum search", long_about = None)]
struct Args {
    /// Number of ranks
    #[arg(value_parser = cli::positive)]
    processes: usize,
    /// Total vector length
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
        "searching {} values on {} ranks ({} data)",
        args.n,
        args.processes,
        args.distribution
    );
    let row = measure(args.processes, args.n, args.distribution)
        .context("distributed minimum failed")?;
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
