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
// NAME:    collectives-comm
//
// PURPOSE: This program compares naive collectives, in which the root
//          exchanges a message with every other rank in turn, against tree
//          and ring based versions of the same operations.
//
// USAGE:   collectives-comm <processes> [--iterations N] [--sizes 1,10,...]
//                           [--operations broadcast,reduce,...]
//
//          Each operation is first checked to give identical results in
//          both versions, then timed. The output has one row
//          operation;processes;data_size;custom_time_s;builtin_time_s;speedup
//          per operation and data size.
//
///////////////////////////////////////////////

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use collectives_comm::{benchmark, Operation, DEFAULT_ITERATIONS, DEFAULT_SIZES};
use common::{cli, report};

#[derive(Parser, Debug)]
#[command(version, about = "Linear against tree collectives", long_about = None)]
struct Args {
    /// Number of ranks
    #[arg(value_parser = cli::positive)]
    processes: usize,
    /// Calls per measurement, capped at 20 from 10000 values and 10 from 100000
    #[arg(short, long, value_parser = cli::positive, default_value_t = DEFAULT_ITERATIONS)]
    iterations: usize,
    /// Values per rank
    #[arg(short, long, value_delimiter = ',', value_parser = cli::positive)]
    sizes: Vec<usize>,
    #[arg(short, long, value_enum, value_delimiter = ',')]
    operations: Vec<Operation>,
}

fn run(args: Args) -> anyhow::Result<()> {
    let sizes = if args.sizes.is_empty() {
        DEFAULT_SIZES.to_vec()
    } else {
        args.sizes
    };
    let operations = if args.operations.is_empty() {
        Operation::ALL.to_vec()
    } else {
        args.operations
    };
    log::info!(
        "{} operations x {} sizes on {} ranks",
        operations.len(),
        sizes.len(),
        args.processes
    );

    let rows = benchmark(args.processes, &operations, &sizes, args.iterations)
        .context("collective benchmark failed")?;
    report::print_rows(&rows, true)?;
    Ok(())
}

fn main() -> ExitCode {
    cli::init_logging();
    let args: Args = cli::parse();
    cli::exit_with(run(args))
}
