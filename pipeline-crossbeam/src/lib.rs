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

//! Dot products over a file of vector pairs, with the input and the
//! computation either run one after the other or overlapped as a
//! producer/consumer pipeline.

use std::fmt;
use std::path::Path;

use clap::ValueEnum;
use crossbeam::channel;
use serde::Serialize;

use common::timer::{time_ms, Stopwatch};
use common::verify::{agrees, TOLERANCE};

pub mod data;
pub mod error;

pub use data::{generate, Pair, PairReader};
pub use error::{PipelineError, Result};

/// Repetitions of every dot product, so that computing dominates reading.
pub const REPEAT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// read the whole file, then compute
    Sequential,
    /// one reader thread feeding consumer threads over a channel
    Sections,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Sequential => f.write_str("sequential"),
            Method::Sections => f.write_str("sections"),
        }
    }
}

pub fn dot_repeated(a: &[f64], b: &[f64]) -> f64 {
    let mut result = 0.0;
    for _ in 0..REPEAT {
        result = a.iter().zip(b).map(|(x, y)| x * y).sum();
    }
    result
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PairResult {
    pub pair_id: usize,
    pub result: f64,
    pub computation_time_ms: f64,
}

fn compute(pair: &Pair) -> PairResult {
    let (result, computation_time_ms) = time_ms(|| dot_repeated(&pair.a, &pair.b));
    PairResult {
        pair_id: pair.id,
        result,
        computation_time_ms,
    }
}

/// Times averaged over the runs, results of the last run.
#[derive(Debug, Clone, Serialize)]
pub struct Measurement {
    pub method: Method,
    pub num_threads: usize,
    pub num_pairs: usize,
    pub vector_size: usize,
    pub total_time_ms: f64,
    pub input_time_ms: f64,
    pub computation_time_ms: f64,
    #[serde(skip)]
    pub results: Vec<PairResult>,
}

pub fn sequential(path: &Path, runs: usize) -> Result<Measurement> {
    let (mut input_ms, mut compute_ms) = (0.0, 0.0);
    let mut last = Measurement {
        method: Method::Sequential,
        num_threads: 1,
        num_pairs: 0,
        vector_size: 0,
        total_time_ms: 0.0,
        input_time_ms: 0.0,
        computation_time_ms: 0.0,
        results: Vec::new(),
    };
    for _ in 0..runs {
        let input = Stopwatch::start();
        let reader = PairReader::open(path)?;
        last.num_pairs = reader.pairs();
        last.vector_size = reader.size();
        let pairs = reader.collect::<Result<Vec<_>>>()?;
        input_ms += input.elapsed_ms();

        let (results, ms) = time_ms(|| pairs.iter().map(compute).collect::<Vec<_>>());
        compute_ms += ms;
        last.results = results;
    }
    let runs = runs.max(1) as f64;
    last.input_time_ms = input_ms / runs;
    last.computation_time_ms = compute_ms / runs;
    last.total_time_ms = last.input_time_ms + last.computation_time_ms;
    Ok(last)
}

struct Run {
    input_ms: f64,
    compute_ms: f64,
    results: Vec<PairResult>,
}

/// One reader thread parses pairs into an unbounded channel while
/// `consumers` threads drain it.
fn pipeline<R>(reader: PairReader<R>, consumers: usize) -> Result<Run>
where
    R: std::io::BufRead + Send,
{
    let (tx, rx) = channel::unbounded::<Pair>();
    let run = crossbeam::thread::scope(|s| -> Result<Run> {
        let producer = s.spawn(move |_| -> Result<f64> {
            let timer = Stopwatch::start();
            for pair in reader {
                tx.send(pair?).map_err(|_| PipelineError::Disconnected)?;
            }
            Ok(timer.elapsed_ms())
        });
        let workers: Vec<_> = (0..consumers)
            .map(|_| {
                let rx = rx.clone();
                s.spawn(move |_| {
                    let timer = Stopwatch::start();
                    let results: Vec<PairResult> = rx.iter().map(|pair| compute(&pair)).collect();
                    (results, timer.elapsed_ms())
                })
            })
            .collect();
        drop(rx);

        let input_ms = producer
            .join()
            .map_err(|_| PipelineError::Panicked("reader"))??;
        let mut compute_ms: f64 = 0.0;
        let mut results = Vec::new();
        for worker in workers {
            let (partial, ms) = worker
                .join()
                .map_err(|_| PipelineError::Panicked("consumer"))?;
            compute_ms = compute_ms.max(ms);
            results.extend(partial);
        }
        results.sort_by_key(|r| r.pair_id);
        Ok(Run {
            input_ms,
            compute_ms,
            results,
        })
    })
    .map_err(|_| PipelineError::Panicked("pipeline"))??;
    Ok(run)
}

pub fn sections(path: &Path, threads: usize, runs: usize) -> Result<Measurement> {
    let consumers = threads.saturating_sub(1).max(1);
    let (mut total_ms, mut input_ms, mut compute_ms) = (0.0, 0.0, 0.0);
    let mut last = Measurement {
        method: Method::Sections,
        num_threads: threads,
        num_pairs: 0,
        vector_size: 0,
        total_time_ms: 0.0,
        input_time_ms: 0.0,
        computation_time_ms: 0.0,
        results: Vec::new(),
    };
    for run in 0..runs {
        let total = Stopwatch::start();
        let reader = PairReader::open(path)?;
        last.num_pairs = reader.pairs();
        last.vector_size = reader.size();
        let outcome = pipeline(reader, consumers)?;
        total_ms += total.elapsed_ms();
        input_ms += outcome.input_ms;
        compute_ms += outcome.compute_ms;
        log::debug!(
            "run {}: input {:.3} ms, compute {:.3} ms",
            run,
            outcome.input_ms,
            outcome.compute_ms
        );
        last.results = outcome.results;
    }
    let runs = runs.max(1) as f64;
    last.total_time_ms = total_ms / runs;
    last.input_time_ms = input_ms / runs;
    last.computation_time_ms = compute_ms / runs;
    Ok(last)
}

pub fn benchmark(path: &Path, method: Method, threads: usize, runs: usize) -> Result<Measurement> {
    match method {
        Method::Sequential => sequential(path, runs),
        Method::Sections => sections(path, threads, runs),
    }
}

/// First pair whose results do not agree within [`TOLERANCE`].
pub fn first_mismatch(expected: &[PairResult], observed: &[PairResult]) -> Option<usize> {
    if expected.len() != observed.len() {
        return Some(expected.len().min(observed.len()));
    }
    expected
        .iter()
        .zip(observed)
        .position(|(e, o)| !agrees(e.result, o.result, TOLERANCE))
}

/// Sequential and two-thread pipelined results for the same file.
pub fn verify(path: &Path) -> Result<(Measurement, Measurement)> {
    let seq = sequential(path, 1)?;
    let par = sections(path, 2, 1)?;
    if let Some(pair) = first_mismatch(&seq.results, &par.results) {
        let value = |m: &Measurement| m.results.get(pair).map_or(f64::NAN, |r| r.result);
        return Err(PipelineError::Mismatch {
            pair,
            sequential: value(&seq),
            sections: value(&par),
        });
    }
    Ok((seq, par))
}

#[derive(Debug, Clone)]
pub struct Comparison {
    pub sequential: Measurement,
    pub sections: Measurement,
    pub speedup: f64,
    /// percent of the ideal two-thread speedup
    pub efficiency: f64,
    /// `(t_in + t_comp) / max(t_in, t_comp)` of the sequential run
    pub pipeline_bound: f64,
    pub mismatch: Option<usize>,
}

pub fn compare(path: &Path, runs: usize) -> Result<Comparison> {
    let sequential = sequential(path, runs)?;
    let sections = sections(path, 2, runs)?;
    let speedup = sequential.total_time_ms / sections.total_time_ms;
    let (t_in, t_comp) = (sequential.input_time_ms, sequential.computation_time_ms);
    let mismatch = first_mismatch(&sequential.results, &sections.results);
    Ok(Comparison {
        speedup,
        efficiency: speedup / 2.0 * 100.0,
        pipeline_bound: (t_in + t_comp) / t_in.max(t_comp),
        mismatch,
        sequential,
        sections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn dataset(pairs: usize, size: usize) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.txt");
        generate(&path, pairs, size).unwrap();
        (dir, path)
    }

    #[test]
    fn repeated_dot_is_the_dot() {
        assert_eq!(dot_repeated(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]), 32.0);
        assert_eq!(dot_repeated(&[], &[]), 0.0);
    }

    #[test]
    fn sections_match_sequential() {
        let (_dir, path) = dataset(20, 64);
        let (seq, par) = verify(&path).unwrap();
        assert_eq!(seq.results.len(), 20);
        assert_eq!(par.num_pairs, 20);
        assert_eq!(par.vector_size, 64);
        assert!(par.results.iter().enumerate().all(|(i, r)| r.pair_id == i));
    }

    #[test]
    fn many_consumers() {
        let (_dir, path) = dataset(33, 16);
        let seq = sequential(&path, 1).unwrap();
        let par = sections(&path, 5, 2).unwrap();
        assert_eq!(first_mismatch(&seq.results, &par.results), None);
        assert!(par.total_time_ms >= 0.0);
    }

    #[test]
    fn comparison_reports_the_pipeline_bound() {
        let (_dir, path) = dataset(10, 32);
        let c = compare(&path, 1).unwrap();
        assert_eq!(c.mismatch, None);
        assert!(c.pipeline_bound >= 1.0 && c.pipeline_bound <= 2.0);
        assert!((c.efficiency - c.speedup * 50.0).abs() < 1e-9);
    }

    #[test]
    fn mismatches_are_located() {
        let r = |pair_id, result| PairResult {
            pair_id,
            result,
            computation_time_ms: 0.0,
        };
        let a = [r(0, 1.0), r(1, 2.0), r(2, 3.0)];
        let b = [r(0, 1.0), r(1, 2.1), r(2, 3.0)];
        assert_eq!(first_mismatch(&a, &b), Some(1));
        assert_eq!(first_mismatch(&a, &a[..2]), Some(2));
        assert_eq!(first_mismatch(&a, &a), None);
    }

    #[test]
    fn large_results_agree_relatively() {
        let r = |result| PairResult {
            pair_id: 0,
            result,
            computation_time_ms: 0.0,
        };
        let big = [r(1.0e9)];
        assert_eq!(first_mismatch(&big, &[r(1.0e9 + 100.0)]), None);
        assert_eq!(first_mismatch(&big, &[r(1.0e9 + 1.0e4)]), Some(0));
    }

    #[test]
    fn malformed_file_fails_both_methods() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.txt");
        fs::write(&path, "3 2\n1 2\n3 4\n5\n").unwrap();
        assert!(matches!(sequential(&path, 1), Err(PipelineError::Malformed { .. })));
        assert!(matches!(sections(&path, 2, 1), Err(PipelineError::Malformed { .. })));
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            verify(&dir.path().join("absent.txt")),
            Err(PipelineError::Io(_))
        ));
    }

    #[test]
    fn csv_row_leaves_out_the_results() {
        let (_dir, path) = dataset(2, 4);
        let m = sequential(&path, 1).unwrap();
        let out = path.with_file_name("pipeline.csv");
        common::report::append_csv(&out, &[m]).unwrap();
        let text = fs::read_to_string(&out).unwrap();
        assert!(text.starts_with(
            "method,num_threads,num_pairs,vector_size,total_time_ms,input_time_ms,computation_time_ms\nsequential,1,2,4,"
        ));
    }
}
