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
// NAME:    minmax
//
// PURPOSE: This program measures parallel minimum and maximum searches
//          over a random vector, with and without a reduction clause.
//
// USAGE:   minmax-rayon <size> <threads> <method> <runs> [output.csv]
//
//          method is `reduction` or `no-reduction`. Every measurement is
//          printed as one JSON object per line.
//
///////////////////////////////////////////////

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use common::{cli, report, rng};
use minmax_rayon::{benchmark, Method};

#[derive(Parser, Debug)]
#[command(version, about = "Parallel min/max search", long_about = None)]
struct Args {
    /// Number of elements
    #[arg(value_parser = cli::positive)]
    size: usize,
    /// Threads in the team
    #[arg(value_parser = cli::positive)]
    threads: usize,
    method: Method,
    /// Timed repetitions
    #[arg(value_parser = cli::positive)]
    runs: usize,
    /// Append the measurements to this CSV file
    output: Option<PathBuf>,
}

fn run(args: Args) -> anyhow::Result<()> {
    log::info!("Parallel Research Kernels: min/max search ({})", args.method);

    let data = rng::uniform_vec(args.size, -1000.0, 1000.0, rng::DEFAULT_SEED);
    let pool = cli::thread_pool(args.threads)?;

    let measurements = benchmark(&pool, &data, args.method, args.runs)?;
    report::print_json(&measurements)?;
    if let Some(path) = &args.output {
        report::append_csv(path, &measurements)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    cli::init_logging();
    let args: Args = cli::parse();
    cli::exit_with(run(args))
}
