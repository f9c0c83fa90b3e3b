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
// NAME:    reduction
//
// PURPOSE: This program measures the sum of an array where per-thread
//          partial sums are combined by the runtime's reduction, by
//          atomic updates, by a critical section or by an explicit lock.
//
// USAGE:   reduction-rayon <array_size> <threads> <method> <runs> [output.csv]
//          reduction-rayon --verify
//
//          method is one of sequential, builtin, atomic, critical, lock.
//
///////////////////////////////////////////////

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use common::{cli, report};
use reduction_rayon::{array, run_benchmark, verify_methods, Method};

const VERIFY_SIZE: usize = 10_000;

#[derive(Parser, Debug)]
#[command(version, about = "Reductions under different synchronization", long_about = None)]
struct Args {
    /// Check every method against the sequential sum and exit
    #[arg(long)]
    verify: bool,
    #[arg(value_parser = cli::positive, required_unless_present = "verify")]
    array_size: Option<usize>,
    #[arg(value_parser = cli::positive, required_unless_present = "verify")]
    threads: Option<usize>,
    #[arg(required_unless_present = "verify")]
    method: Option<Method>,
    #[arg(value_parser = cli::positive, required_unless_present = "verify")]
    runs: Option<usize>,
    output: Option<PathBuf>,
}

fn verify() -> anyhow::Result<()> {
    let (expected, outcomes) =
        verify_methods(VERIFY_SIZE).context("correctness verification failed")?;
    println!("Sequential result: {:.6}", expected);
    for outcome in &outcomes {
        println!(
            "{:<9} result: {:.6} (error: {:.3e})",
            outcome.method.to_string(),
            outcome.result,
            outcome.error
        );
    }
    println!("All methods agree");
    Ok(())
}

fn run(args: Args) -> anyhow::Result<()> {
    if args.verify {
        return verify();
    }
    let (Some(size), Some(threads), Some(method), Some(runs)) =
        (args.array_size, args.threads, args.method, args.runs)
    else {
        anyhow::bail!("array_size, threads, method and runs are required");
    };

    println!("Parallel Research Kernels");
    println!("Rust rayon reduction with explicit synchronization");
    println!("Array size            = {}", size);
    println!("Number of threads     = {}", threads);
    println!("Method                = {}", method);
    println!("Number of runs        = {}", runs);

    let data = array(size);
    let pool = cli::thread_pool(threads)?;
    let record = run_benchmark(&pool, &data, method, runs);

    println!("Average time (ms)     = {:.3}", record.execution_time_ms);
    println!("Result                = {:.6}", record.result);

    if let Some(path) = &args.output {
        report::append_csv(path, &[record])
            .with_context(|| format!("could not write {}", path.display()))?;
    }
    Ok(())
}

fn main() -> ExitCode {
    cli::init_logging();
    let args: Args = cli::parse();
    cli::exit_with(run(args))
}
