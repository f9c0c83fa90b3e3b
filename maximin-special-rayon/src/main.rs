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
// NAME:    maximin-special
//
// PURPOSE: This program measures maximin searches over structured
//          matrices (dense, banded, lower and upper triangular) under
//          static, dynamic and guided loop schedules.
//
// USAGE:   maximin-special-rayon <N> <kind> <bandwidth> <threads> <schedule> <chunk> <iterations> [output.csv]
//
//          bandwidth only matters for banded matrices; chunk 0 selects
//          the default chunking of the schedule.
//
///////////////////////////////////////////////

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use common::{cli, report, Schedule, Summary};
use maximin_special_rayon::{run_benchmark, self_check, Kind, SpecialMatrix};

#[derive(Parser, Debug)]
#[command(version, about = "Maximin of structured matrices", long_about = None)]
struct Args {
    #[arg(value_parser = cli::positive)]
    n: usize,
    kind: Kind,
    bandwidth: usize,
    #[arg(value_parser = cli::positive)]
    threads: usize,
    schedule: Schedule,
    /// Iterations per chunk, 0 for the schedule's default
    chunk: usize,
    #[arg(value_parser = cli::positive)]
    iterations: usize,
    output: Option<PathBuf>,
}

fn run(args: Args) -> anyhow::Result<()> {
    println!("Parallel Research Kernels");
    println!("Rust rayon maximin over structured matrices");

    self_check().context("correctness verification failed")?;
    println!("Self-check passed");

    if args.kind == Kind::Banded {
        println!(
            "Matrix                = {}x{} {} (bandwidth {})",
            args.n, args.n, args.kind, args.bandwidth
        );
    } else {
        println!("Matrix                = {}x{} {}", args.n, args.n, args.kind);
    }
    println!("Number of threads     = {}", args.threads);
    println!("Schedule              = {} (chunk {})", args.schedule, args.chunk);

    let matrix = SpecialMatrix::generate(args.n, args.kind, args.bandwidth, 42);
    let pool = cli::thread_pool(args.threads)?;
    let records = run_benchmark(&pool, &matrix, args.schedule, args.chunk, args.iterations);

    let times: Vec<f64> = records.iter().map(|r| r.execution_time_ms).collect();
    if let Some(s) = Summary::from_samples(&times) {
        println!("Time (ms): avg {:.3} min {:.3} max {:.3}", s.mean, s.min, s.max);
    }
    if let Some(first) = records.first() {
        println!("Maximin               = {:.6}", first.result_value);
    }
    if let Some(path) = &args.output {
        report::append_csv(path, &records)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    cli::init_logging();
    let args: Args = cli::parse();
    cli::exit_with(run(args))
}
