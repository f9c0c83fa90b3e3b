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

use std::f64::consts::PI;
use std::fmt;

use clap::ValueEnum;
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::Serialize;

use common::timer::time_ms;
use common::{cli, verify, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Function {
    /// x^2
    X2,
    /// sin(x)
    Sin,
    /// e^x
    Exp,
    /// 1 / (1 + x^2)
    Arctan,
    /// sqrt(1 - x^2), defined on [-1, 1]
    Circle,
}

impl Function {
    pub fn eval(self, x: f64) -> f64 {
        match self {
            Function::X2 => x * x,
            Function::Sin => x.sin(),
            Function::Exp => x.exp(),
            Function::Arctan => 1.0 / (1.0 + x * x),
            Function::Circle => (1.0 - x * x).sqrt(),
        }
    }

    pub fn antiderivative(self, x: f64) -> f64 {
        match self {
            Function::X2 => x * x * x / 3.0,
            Function::Sin => -x.cos(),
            Function::Exp => x.exp(),
            Function::Arctan => x.atan(),
            Function::Circle => 0.5 * (x * (1.0 - x * x).sqrt() + x.asin()),
        }
    }

    pub fn exact(self, a: f64, b: f64) -> f64 {
        self.antiderivative(b) - self.antiderivative(a)
    }

    pub fn check_domain(self, a: f64, b: f64) -> Result<()> {
        if !a.is_finite() || !b.is_finite() {
            return Err(Error::invalid(format!("bounds must be finite, got [{}, {}]", a, b)));
        }
        if self == Function::Circle && (a.abs() > 1.0 || b.abs() > 1.0) {
            return Err(Error::invalid(format!(
                "circle is only defined on [-1, 1], got [{}, {}]",
                a, b
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Function::X2 => "x2",
            Function::Sin => "sin",
            Function::Exp => "exp",
            Function::Arctan => "arctan",
            Function::Circle => "circle",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Sequential,
    Reduction,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Sequential => f.write_str("sequential"),
            Method::Reduction => f.write_str("reduction"),
        }
    }
}

/// Left rectangle rule with `n` panels.
pub fn sequential(func: Function, a: f64, b: f64, n: usize) -> f64 {
    let h = (b - a) / n as f64;
    let mut sum = 0.0;
    for i in 0..n {
        sum += func.eval(a + i as f64 * h);
    }
    h * sum
}

pub fn reduction(pool: &ThreadPool, func: Function, a: f64, b: f64, n: usize) -> f64 {
    let h = (b - a) / n as f64;
    let sum: f64 = pool.install(|| {
        (0..n)
            .into_par_iter()
            .map(|i| func.eval(a + i as f64 * h))
            .sum()
    });
    h * sum
}

pub fn integrate(pool: &ThreadPool, method: Method, func: Function, a: f64, b: f64, n: usize) -> f64 {
    match method {
        Method::Sequential => sequential(func, a, b, n),
        Method::Reduction => reduction(pool, func, a, b, n),
    }
}

/// Outcome of one reference integral of the self-check.
#[derive(Debug, Clone)]
pub struct CheckCase {
    pub label: &'static str,
    pub exact: f64,
    pub sequential: f64,
    pub reduction: f64,
}

/// Integrates x^2 over [0, 1], sin over [0, pi] and 1/(1+x^2) over [0, 1]
/// with a million panels, sequentially and with four threads.
pub fn self_check() -> Result<Vec<CheckCase>> {
    const N: usize = 1_000_000;
    let pool = cli::thread_pool(4)?;
    let cases = [
        ("x^2 on [0, 1]", Function::X2, 0.0, 1.0),
        ("sin on [0, pi]", Function::Sin, 0.0, PI),
        ("1/(1+x^2) on [0, 1]", Function::Arctan, 0.0, 1.0),
    ];
    let mut out = Vec::with_capacity(cases.len());
    for (label, func, a, b) in cases {
        let case = CheckCase {
            label,
            exact: func.exact(a, b),
            sequential: sequential(func, a, b, N),
            reduction: reduction(&pool, func, a, b, N),
        };
        verify::check(label, case.sequential, case.reduction)?;
        verify::check(label, case.exact, case.sequential)?;
        out.push(case);
    }
    Ok(out)
}

#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub function: Function,
    pub a: f64,
    pub b: f64,
    #[serde(rename = "N")]
    pub n: usize,
    pub num_threads: usize,
    pub method: Method,
    pub iteration: usize,
    pub execution_time_ms: f64,
    pub result_value: f64,
}

pub struct Problem {
    pub func: Function,
    pub a: f64,
    pub b: f64,
    pub n: usize,
}

pub fn run_benchmark(
    pool: &ThreadPool,
    problem: &Problem,
    method: Method,
    iterations: usize,
) -> Result<Vec<Record>> {
    let Problem { func, a, b, n } = *problem;
    func.check_domain(a, b)?;
    if method == Method::Reduction {
        let warmup = reduction(pool, func, a, b, n);
        log::debug!("warmup {} = {:e}", func, warmup);
    }
    let records = (0..iterations)
        .map(|iteration| {
            let (result_value, execution_time_ms) =
                time_ms(|| integrate(pool, method, func, a, b, n));
            Record {
                function: func,
                a,
                b,
                n,
                num_threads: pool.current_num_threads(),
                method,
                iteration,
                execution_time_ms,
                result_value,
            }
        })
        .collect();
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_check_passes() {
        let cases = self_check().unwrap();
        assert_eq!(cases.len(), 3);
        assert!((cases[1].exact - 2.0).abs() < 1e-12);
    }

    #[test]
    fn circle_gives_a_quarter_disc() {
        let pool = cli::thread_pool(2).unwrap();
        let area = reduction(&pool, Function::Circle, 0.0, 1.0, 2_000_000);
        assert!((area - PI / 4.0).abs() < 1e-5);
        assert!((Function::Circle.exact(0.0, 1.0) - PI / 4.0).abs() < 1e-12);
    }

    #[test]
    fn circle_outside_its_domain_is_rejected() {
        let pool = cli::thread_pool(1).unwrap();
        let problem = Problem {
            func: Function::Circle,
            a: 0.0,
            b: 2.0,
            n: 10,
        };
        assert!(matches!(
            run_benchmark(&pool, &problem, Method::Sequential, 1),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn non_finite_bounds_are_rejected() {
        let pool = cli::thread_pool(1).unwrap();
        for (a, b) in [(f64::NAN, 1.0), (0.0, f64::INFINITY), (f64::NEG_INFINITY, 0.0)] {
            for func in [Function::X2, Function::Circle] {
                assert!(matches!(func.check_domain(a, b), Err(Error::InvalidArgument(_))));
                let problem = Problem { func, a, b, n: 10 };
                assert!(matches!(
                    run_benchmark(&pool, &problem, Method::Reduction, 1),
                    Err(Error::InvalidArgument(_))
                ));
            }
        }
    }

    #[test]
    fn methods_agree_for_exp() {
        let pool = cli::thread_pool(3).unwrap();
        let s = sequential(Function::Exp, -1.0, 2.0, 100_000);
        let r = reduction(&pool, Function::Exp, -1.0, 2.0, 100_000);
        assert!(verify::agrees(s, r, verify::TOLERANCE));
    }

    #[test]
    fn csv_header_keeps_the_upper_case_n() {
        let pool = cli::thread_pool(1).unwrap();
        let problem = Problem {
            func: Function::X2,
            a: 0.0,
            b: 1.0,
            n: 100,
        };
        let records = run_benchmark(&pool, &problem, Method::Sequential, 1).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("integration.csv");
        common::report::append_csv(&path, &records).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(
            "function,a,b,N,num_threads,method,iteration,execution_time_ms,result_value\nx2,0.0,1.0,100,1,sequential,0,"
        ));
    }
}
