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
// NAME:    integrate
//
// PURPOSE: This program measures numerical integration with the left
//          rectangle rule, sequentially and as a parallel reduction.
//
// USAGE:   integrate-rayon <function> <a> <b> <N> <threads> <method> <iterations> [output.csv]
//
//          function is one of x2, sin, exp, arctan, circle. The output
//          consists of the self-check, the error against the closed form
//          and timing statistics.
//
///////////////////////////////////////////////

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use common::{cli, report, Summary};
use integrate_rayon::{run_benchmark, self_check, Function, Method, Problem};

#[derive(Parser, Debug)]
#[command(version, about = "Rectangle rule integration", long_about = None)]
struct Args {
    function: Function,
    /// Lower bound
    #[arg(allow_negative_numbers = true)]
    a: f64,
    /// Upper bound
    #[arg(allow_negative_numbers = true)]
    b: f64,
    /// Number of panels
    #[arg(value_parser = cli::positive)]
    n: usize,
    #[arg(value_parser = cli::positive)]
    threads: usize,
    method: Method,
    #[arg(value_parser = cli::positive)]
    iterations: usize,
    output: Option<PathBuf>,
}

fn run(args: Args) -> anyhow::Result<()> {
    println!("Parallel Research Kernels");
    println!("Rust rayon numerical integration: I = h * sum f(a + i h)");

    let cases = self_check().context("correctness verification failed")?;
    for case in &cases {
        println!(
            "Check {:<22} exact {:.10} sequential {:.10} reduction {:.10}",
            case.label, case.exact, case.sequential, case.reduction
        );
    }

    let problem = Problem {
        func: args.function,
        a: args.a,
        b: args.b,
        n: args.n,
    };
    let pool = cli::thread_pool(args.threads)?;
    let records = run_benchmark(&pool, &problem, args.method, args.iterations)?;

    println!("Function              = {}", args.function);
    println!("Interval              = [{}, {}]", args.a, args.b);
    println!("Number of panels      = {}", args.n);
    println!("Number of threads     = {}", args.threads);
    if let Some(last) = records.last() {
        let exact = args.function.exact(args.a, args.b);
        println!("Result                = {:.15e}", last.result_value);
        println!("Error                 = {:.3e}", (last.result_value - exact).abs());
    }
    let times: Vec<f64> = records.iter().map(|r| r.execution_time_ms).collect();
    if let Some(s) = Summary::from_samples(&times) {
        println!(
            "Time (ms): avg {:.6} min {:.6} max {:.6}",
            s.mean, s.min, s.max
        );
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
