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
// NAME:    dot
//
// PURPOSE: This program measures the dot product of two random vectors
//          computed sequentially, with a parallel reduction, and with
//          private partial sums merged under a lock.
//
// USAGE:   dot-rayon <vector_size> <threads> <method> <iterations> [output.csv]
//
//          The output consists of a self-check, per-method timing
//          statistics and optionally one CSV row per iteration.
//
///////////////////////////////////////////////

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use common::{cli, report, Summary};
use dot_rayon::{run_benchmark, self_check, vectors, Method};

#[derive(Parser, Debug)]
#[command(version, about = "Dot product of two vectors", long_about = None)]
struct Args {
    #[arg(value_parser = cli::positive)]
    vector_size: usize,
    #[arg(value_parser = cli::positive)]
    threads: usize,
    method: Method,
    #[arg(value_parser = cli::positive)]
    iterations: usize,
    /// Append one row per iteration to this CSV file
    output: Option<PathBuf>,
}

fn run(args: Args) -> anyhow::Result<()> {
    println!("Parallel Research Kernels");
    println!("Rust rayon dot product: s = a . b");

    self_check().context("correctness verification failed")?;
    println!("Self-check passed");

    println!("Vector length         = {}", args.vector_size);
    println!("Number of threads     = {}", args.threads);
    println!("Method                = {}", args.method);
    println!("Number of iterations  = {}", args.iterations);

    let (a, b) = vectors(args.vector_size);
    let pool = cli::thread_pool(args.threads)?;
    let records = run_benchmark(&pool, &a, &b, args.method, args.iterations);

    let times: Vec<f64> = records.iter().map(|r| r.execution_time_ms).collect();
    if let Some(s) = Summary::from_samples(&times) {
        println!(
            "Time (ms): avg {:.6} min {:.6} max {:.6} median {:.6} std_dev {:.6}",
            s.mean, s.min, s.max, s.median, s.std_dev
        );
    }
    if let Some(last) = records.last() {
        println!("Result                = {:.15e}", last.result_value);
    }

    if let Some(path) = &args.output {
        report::append_csv(path, &records)
            .with_context(|| format!("could not write {}", path.display()))?;
    }
    Ok(())
}

fn main() -> ExitCode {
    cli::init_logging();
    let args: Args = cli::parse();
    cli::exit_with(run(args))
}
