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
// NAME:    pingpong
//
// PURPOSE: This program measures point-to-point latency and bandwidth
//          between two ranks by bouncing a message back and forth.
//
// USAGE:   pingpong-comm sweep [--method pingpong|sendrecv] [--max-bytes N]
//          pingpong-comm exchange <message_size> <iterations> [output.csv]
//
//          sweep prints bytes;iterations;time_s;bandwidth_mb_s for message
//          sizes 0, 1, 2, 4, ... up to max-bytes; time_s is the one-way
//          time. exchange times single round trips of one size.
//
///////////////////////////////////////////////

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

use common::{cli, report};
use pingpong_comm::{exchange, sweep, Method, DEFAULT_MAX_BYTES};

#[derive(Subcommand, Debug)]
enum Command {
    /// Latency and bandwidth over a range of message sizes
    Sweep {
        #[arg(short, long, value_enum, default_value_t = Method::Pingpong)]
        method: Method,
        /// Largest message in bytes
        #[arg(long, default_value_t = DEFAULT_MAX_BYTES)]
        max_bytes: usize,
    },
    /// Round-trip statistics for one message size
    Exchange {
        message_size: usize,
        #[arg(value_parser = cli::positive)]
        iterations: usize,
        output: Option<PathBuf>,
    },
}

#[derive(Parser, Debug)]
#[command(version, about = "Ping-pong between two ranks", long_about = None)]
struct Args {
    /// Number of ranks; the benchmark needs exactly two
    #[arg(short, long, global = true, default_value_t = 2)]
    processes: usize,
    #[command(subcommand)]
    command: Command,
}

fn run(args: Args) -> anyhow::Result<()> {
    match args.command {
        Command::Sweep { method, max_bytes } => {
            log::info!("{} sweep up to {} bytes", method, max_bytes);
            let rows = sweep(args.processes, method, max_bytes).context("ping-pong sweep failed")?;
            report::print_rows(&rows, true)?;
        }
        Command::Exchange {
            message_size,
            iterations,
            output,
        } => {
            println!("Parallel Research Kernels");
            println!("Rust message exchange between two ranks");
            println!("Message size          = {} bytes", message_size);
            println!("Number of iterations  = {}", iterations);

            let stats = exchange(args.processes, message_size, iterations)
                .context("message exchange failed")?;
            println!("Average time (ms)     = {:.6}", stats.avg_time_ms);
            println!("Median time (ms)      = {:.6}", stats.median_time_ms);
            println!("Min time (ms)         = {:.6}", stats.min_time_ms);
            println!("Max time (ms)         = {:.6}", stats.max_time_ms);
            println!("Std deviation (ms)    = {:.6}", stats.std_dev_ms);
            println!("Bandwidth (MB/s)      = {:.2}", stats.bandwidth_mbps);

            if let Some(path) = &output {
                report::append_csv(path, &[stats])
                    .with_context(|| format!("could not write {}", path.display()))?;
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    cli::init_logging();
    let args: Args = cli::parse();
    cli::exit_with(run(args))
}
