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
// NAME:    schedule
//
// PURPOSE: This program measures how static, dynamic and guided loop
//          schedules cope with an uneven workload where every tenth
//          iteration is heavy and every fifth is medium.
//
// USAGE:   schedule-rayon <iterations> <threads> <schedule> <chunk> <runs> [output.csv]
//          schedule-rayon --verify
//
//          schedule is one of sequential, static, dynamic, guided; chunk 0
//          selects the default chunking of the schedule.
//
///////////////////////////////////////////////

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use common::{cli, report};
use schedule_rayon::{run_benchmark, verify_schedules, Strategy};

const VERIFY_ITERATIONS: usize = 1000;

#[derive(Parser, Debug)]
#[command(version, about = "Loop scheduling under an uneven workload", long_about = None)]
struct Args {
    /// Compare every schedule with the sequential loop and exit
    #[arg(long)]
    verify: bool,
    #[arg(value_parser = cli::positive, required_unless_present = "verify")]
    iterations: Option<usize>,
    #[arg(value_parser = cli::positive, required_unless_present = "verify")]
    threads: Option<usize>,
    #[arg(required_unless_present = "verify")]
    schedule: Option<Strategy>,
    /// Iterations per chunk, 0 for the schedule's default
    #[arg(required_unless_present = "verify")]
    chunk: Option<usize>,
    #[arg(value_parser = cli::positive, required_unless_present = "verify")]
    runs: Option<usize>,
    output: Option<PathBuf>,
}

fn verify() -> anyhow::Result<()> {
    println!("Verifying schedules with {} iterations on 4 threads", VERIFY_ITERATIONS);
    let (expected, outcomes) =
        verify_schedules(VERIFY_ITERATIONS).context("schedule verification failed")?;
    println!("sequential: {:.10}", expected);
    for outcome in &outcomes {
        println!(
            "{:<10}: {:.10} (error {:.3e})",
            outcome.strategy.to_string(),
            outcome.result,
            outcome.error
        );
    }
    println!("All schedules agree");
    Ok(())
}

fn run(args: Args) -> anyhow::Result<()> {
    if args.verify {
        return verify();
    }
    let (Some(iterations), Some(threads), Some(schedule), Some(chunk), Some(runs)) = (
        args.iterations,
        args.threads,
        args.schedule,
        args.chunk,
        args.runs,
    ) else {
        anyhow::bail!("iterations, threads, schedule, chunk and runs are required");
    };

    println!("Parallel Research Kernels");
    println!("Rust rayon loop scheduling");
    println!("Number of iterations  = {}", iterations);
    println!("Number of threads     = {}", threads);
    println!("Schedule              = {} (chunk {})", schedule, chunk);
    println!("Number of runs        = {}", runs);
    println!("Workload: i%10==0 heavy (10000), i%5==0 medium (5000), otherwise light");

    let pool = cli::thread_pool(threads)?;
    let record = run_benchmark(&pool, iterations, schedule, chunk, runs);

    println!("Average time (ms)     = {:.3}", record.execution_time_ms);
    println!("Result                = {:.10}", record.result);

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
