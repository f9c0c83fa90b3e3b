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
// NAME:    nested
//
// PURPOSE: This program measures a maximin search parallelized over rows
//          only (flat) and over rows with each row minimum reduced by a
//          second, inner team (nested).
//
// USAGE:   nested-rayon <N> <threads|outer:inner> <method> <iterations> [output.csv]
//          nested-rayon --check
//
//          The nested method requires the outer:inner thread form.
//          --check prints the thread pairs of a 2x2 nested region.
//
///////////////////////////////////////////////

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use common::{cli, report, Matrix, Summary};
use nested_rayon::{run_benchmark, self_check, Method, NestedPools, Team, SEED};

#[derive(Parser, Debug)]
#[command(version, about = "Flat and nested maximin", long_about = None)]
struct Args {
    /// Print the thread layout of a 2x2 nested region and exit
    #[arg(long)]
    check: bool,
    #[arg(value_parser = cli::positive, required_unless_present = "check")]
    n: Option<usize>,
    /// Total threads, or outer:inner for the nested method
    #[arg(value_parser = Team::parse, required_unless_present = "check")]
    threads: Option<Team>,
    #[arg(required_unless_present = "check")]
    method: Option<Method>,
    #[arg(value_parser = cli::positive, required_unless_present = "check")]
    iterations: Option<usize>,
    output: Option<PathBuf>,
}

fn check_nesting() -> anyhow::Result<()> {
    let pools = NestedPools::new(2, 2)?;
    let mut members = pools.members();
    members.sort();
    for (outer, outer_size, inner, inner_size) in &members {
        println!(
            "Outer thread {}/{} -> Inner thread {}/{}",
            outer, outer_size, inner, inner_size
        );
    }
    println!("Nested region ran {} threads", members.len());
    Ok(())
}

fn run(args: Args) -> anyhow::Result<()> {
    if args.check {
        return check_nesting();
    }
    let (Some(n), Some(team), Some(method), Some(iterations)) =
        (args.n, args.threads, args.method, args.iterations)
    else {
        anyhow::bail!("N, threads, method and iterations are required");
    };

    println!("Parallel Research Kernels");
    println!("Rust rayon nested maximin");

    self_check().context("correctness verification failed")?;
    println!("Self-check passed");

    println!("Matrix order          = {}", n);
    match team {
        Team::Nested { outer, inner } if method == Method::Nested => println!(
            "Method                = {} (outer {}, inner {}, total {})",
            method,
            outer,
            inner,
            team.total()
        ),
        _ => println!("Method                = {} (threads {})", method, team.total()),
    }

    let matrix = Matrix::random(n, SEED);
    let records = run_benchmark(&matrix, method, team, iterations)?;

    let times: Vec<f64> = records.iter().map(|r| r.execution_time_ms).collect();
    if let Some(s) = Summary::from_samples(&times) {
        println!("Time (ms): avg {:.3} min {:.3} max {:.3}", s.mean, s.min, s.max);
    }
    if let Some(first) = records.first() {
        println!("Maximin               = {:.6}", first.result_value);
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
