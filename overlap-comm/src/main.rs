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
// NAME:    overlap-comm
//
// PURPOSE: This program measures how much of a ring exchange can hide
//          behind an emulated compute phase.
//
// USAGE:   overlap-comm ring <processes> [label] [compute_us] [bytes] [--iterations N]
//          overlap-comm compare <processes> [--iterations N]
//
//          ring prints label;processes;compute_us;bytes;max_time_s for a
//          blocking exchange after each compute phase. compare sweeps
//          message sizes and compute lengths and prints blocking and
//          nonblocking times side by side with the speedup.
//
///////////////////////////////////////////////

use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

use common::{cli, report};
use overlap_comm::{compare, ring, DEFAULT_ITERATIONS};

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute, then pass a message to the right neighbour
    Ring {
        #[arg(value_parser = cli::positive)]
        processes: usize,
        #[arg(default_value = "Default")]
        label: String,
        /// Length of each compute phase in microseconds
        #[arg(default_value_t = 1000)]
        compute_us: u64,
        /// Message size; zero skips the exchange
        #[arg(default_value_t = 1024)]
        bytes: usize,
        #[arg(short, long, value_parser = cli::positive, default_value_t = DEFAULT_ITERATIONS)]
        iterations: usize,
    },
    /// Blocking against nonblocking exchange over a grid of sizes
    Compare {
        #[arg(value_parser = cli::positive)]
        processes: usize,
        /// Iterations per configuration, at most 20 for 1 MiB messages
        #[arg(short, long, value_parser = cli::positive, default_value_t = DEFAULT_ITERATIONS)]
        iterations: usize,
    },
}

#[derive(Parser, Debug)]
#[command(version, about = "Communication and computation overlap", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

fn run(args: Args) -> anyhow::Result<()> {
    match args.command {
        Command::Ring {
            processes,
            label,
            compute_us,
            bytes,
            iterations,
        } => {
            let row = ring(processes, &label, compute_us, bytes, iterations)
                .with_context(|| format!("ring run {} failed", label))?;
            report::print_rows(&[row], false)?;
        }
        Command::Compare {
            processes,
            iterations,
        } => {
            log::info!("comparing exchanges on {} ranks", processes);
            let rows = compare(processes, iterations).context("overlap comparison failed")?;
            report::print_rows(&rows, true)?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    cli::init_logging();
    let args: Args = cli::parse();
    cli::exit_with(run(args))
}
