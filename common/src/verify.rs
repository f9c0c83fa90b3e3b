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

use crate::error::{Error, Result};

pub const TOLERANCE: f64 = 1.0e-6;

/// True when `observed` is within `tolerance` of `expected`, either absolutely or
/// relative to the magnitude of `expected`.
pub fn agrees(expected: f64, observed: f64, tolerance: f64) -> bool {
    let diff = (expected - observed).abs();
    diff <= tolerance || diff <= tolerance * expected.abs()
}

pub fn check(label: &str, expected: f64, observed: f64) -> Result<()> {
    if agrees(expected, observed, TOLERANCE) {
        Ok(())
    } else {
        Err(Error::Validation {
            label: label.to_string(),
            expected,
            observed,
            tolerance: TOLERANCE,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_and_relative() {
        assert!(agrees(0.0, 5.0e-7, TOLERANCE));
        assert!(agrees(1.0e9, 1.0e9 + 100.0, TOLERANCE));
        assert!(!agrees(1.0, 1.0 + 1.0e-5, TOLERANCE));
    }

    #[test]
    fn nan_never_agrees() {
        assert!(!agrees(1.0, f64::NAN, TOLERANCE));
    }

    #[test]
    fn check_reports_the_label() {
        let err = check("reduction", 1.0, 2.0).unwrap_err();
        assert!(err.to_string().starts_with("reduction:"));
    }
}
