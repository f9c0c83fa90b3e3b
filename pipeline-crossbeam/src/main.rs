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
// NAME:    pipeline
//
// PURPOSE: This program computes dot products for a file of vector pairs,
//          either reading everything before computing or overlapping the
//          input with the computation in a producer/consumer pipeline.
//
// USAGE:   pipeline-crossbeam generate <pairs> <vector_size> <file>
//          pipeline-crossbeam benchmark <file> <threads> <method> <runs> [--output results.csv]
//          pipeline-crossbeam full <file> <runs>
//          pipeline-crossbeam verify <file>
//
//          method is sequential or sections. Each dot product is repeated
//          so that the computation outweighs the input.
//
///////////////////////////////////////////////

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

use common::{cli, report};
use pipeline_crossbeam::{benchmark, compare, generate, verify, Method};

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a file of random vector pairs
    Generate {
        #[arg(value_parser = cli::positive)]
        pairs: usize,
        #[arg(value_parser = cli::positive)]
        vector_size: usize,
        file: PathBuf,
    },
    /// Time one method on an existing file
    Benchmark {
        file: PathBuf,
        #[arg(value_parser = cli::positive)]
        threads: usize,
        method: Method,
        #[arg(value_parser = cli::positive)]
        runs: usize,
        /// Append the averaged timings to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compare sequential with two-thread sections
    Full {
        file: PathBuf,
        #[arg(value_parser = cli::positive)]
        runs: usize,
    },
    /// Check that both methods give the same products
    Verify { file: PathBuf },
}

#[derive(Parser, Debug)]
#[command(version, about = "Pipelined dot products", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

fn run(args: Args) -> anyhow::Result<()> {
    match args.command {
        Command::Generate {
            pairs,
            vector_size,
            file,
        } => {
            generate(&file, pairs, vector_size)
                .with_context(|| format!("could not write {}", file.display()))?;
            println!("Generated test data: {}", file.display());
            println!("  Pairs: {}, Vector size: {}", pairs, vector_size);
        }
        Command::Benchmark {
            file,
            threads,
            method,
            runs,
            output,
        } => {
            println!("Parallel Research Kernels");
            println!("Rust crossbeam pipelined dot products");
            println!("Data file             = {}", file.display());
            println!("Number of threads     = {}", threads);
            println!("Method                = {}", method);
            println!("Number of runs        = {}", runs);

            let m = benchmark(&file, method, threads, runs)
                .with_context(|| format!("benchmark on {} failed", file.display()))?;
            println!("Total time (ms)       = {:.2}", m.total_time_ms);
            println!("Input time (ms)       = {:.2}", m.input_time_ms);
            println!("Compute time (ms)     = {:.2}", m.computation_time_ms);
            if let Some(path) = &output {
                report::append_csv(path, &[m])?;
            }
        }
        Command::Full { file, runs } => {
            let c = compare(&file, runs)
                .with_context(|| format!("benchmark on {} failed", file.display()))?;
            println!(
                "Dataset: {} pairs, vector size {} (averaged over {} runs)",
                c.sequential.num_pairs, c.sequential.vector_size, runs
            );
            println!(
                "{:<20}{:<15}{:<15}{:<15}",
                "Method", "Total (ms)", "Input (ms)", "Compute (ms)"
            );
            for (label, m) in [("Sequential", &c.sequential), ("Sections (2 thr)", &c.sections)] {
                println!(
                    "{:<20}{:<15.2}{:<15.2}{:<15.2}",
                    label, m.total_time_ms, m.input_time_ms, m.computation_time_ms
                );
            }
            println!("Speedup:    {:.2}x", c.speedup);
            println!("Efficiency: {:.1}%", c.efficiency);
            println!("Theoretical pipeline speedup: {:.2}x", c.pipeline_bound);
            match c.mismatch {
                None => println!("All {} results match", c.sequential.results.len()),
                Some(pair) => anyhow::bail!("results differ at pair {}", pair),
            }
        }
        Command::Verify { file } => {
            let (seq, par) =
                verify(&file).with_context(|| format!("verification of {} failed", file.display()))?;
            for (s, p) in seq.results.iter().zip(&par.results).take(5) {
                println!(
                    "Pair {}: sequential {:.6} sections {:.6}",
                    s.pair_id, s.result, p.result
                );
            }
            println!("All {} results match", seq.results.len());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    cli::init_logging();
    let args: Args = cli::parse();
    cli::exit_with(run(args))
}
