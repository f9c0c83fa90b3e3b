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

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Lines, Write};
use std::path::Path;

use rand::Rng;

use common::rng;

use crate::error::{PipelineError, Result};

/// Two vectors of equal length and their position in the file.
#[derive(Debug, Clone, PartialEq)]
pub struct Pair {
    pub id: usize,
    pub a: Vec<f64>,
    pub b: Vec<f64>,
}

/// Writes `pairs` vector pairs of length `size`: a `pairs size` header, then
/// one line per vector holding values `k/10` with `k` in `[0, 1000)`.
pub fn generate(path: &Path, pairs: usize, size: usize) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_pairs(&mut out, pairs, size)?;
    out.flush()?;
    log::info!("wrote {} pairs of length {} to {}", pairs, size, path.display());
    Ok(())
}

pub fn write_pairs<W: Write>(out: &mut W, pairs: usize, size: usize) -> io::Result<()> {
    let mut gen = rng::seeded(rng::DEFAULT_SEED);
    writeln!(out, "{} {}", pairs, size)?;
    for _ in 0..2 * pairs {
        for i in 0..size {
            if i > 0 {
                out.write_all(b" ")?;
            }
            write!(out, "{}", gen.gen_range(0..1000) as f64 / 10.0)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Streams pairs out of a vector file, one line per vector.
pub struct PairReader<R> {
    lines: Lines<R>,
    line: usize,
    pairs: usize,
    size: usize,
    next_id: usize,
}

impl PairReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        PairReader::new(BufReader::new(File::open(path)?))
    }
}

impl<R: BufRead> PairReader<R> {
    /// Reads the header; the pairs follow lazily.
    pub fn new(reader: R) -> Result<Self> {
        let mut reader = PairReader {
            lines: reader.lines(),
            line: 0,
            pairs: 0,
            size: 0,
            next_id: 0,
        };
        let header = reader.next_line()?;
        let fields: Vec<&str> = header.split_whitespace().collect();
        match fields[..] {
            [pairs, size] => {
                reader.pairs = reader.parse(pairs)?;
                reader.size = reader.parse(size)?;
            }
            _ => return Err(reader.malformed("expected a 'pairs size' header")),
        }
        Ok(reader)
    }

    pub fn pairs(&self) -> usize {
        self.pairs
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn malformed(&self, msg: impl Into<String>) -> PipelineError {
        PipelineError::Malformed {
            line: self.line,
            msg: msg.into(),
        }
    }

    fn parse<T: std::str::FromStr>(&self, token: &str) -> Result<T> {
        token
            .parse()
            .map_err(|_| self.malformed(format!("cannot parse '{}'", token)))
    }

    fn next_line(&mut self) -> Result<String> {
        self.line += 1;
        match self.lines.next() {
            Some(line) => Ok(line?),
            None => Err(self.malformed("unexpected end of file")),
        }
    }

    fn vector(&mut self) -> Result<Vec<f64>> {
        let line = self.next_line()?;
        let values = line
            .split_whitespace()
            .map(|token| self.parse(token))
            .collect::<Result<Vec<f64>>>()?;
        if values.len() != self.size {
            return Err(self.malformed(format!(
                "expected {} values, found {}",
                self.size,
                values.len()
            )));
        }
        Ok(values)
    }

    fn next_pair(&mut self) -> Result<Pair> {
        let a = self.vector()?;
        let b = self.vector()?;
        let id = self.next_id;
        self.next_id += 1;
        Ok(Pair { id, a, b })
    }
}

impl<R: BufRead> Iterator for PairReader<R> {
    type Item = Result<Pair>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_id == self.pairs {
            return None;
        }
        let pair = self.next_pair();
        if pair.is_err() {
            // stop after the first error
            self.next_id = self.pairs;
        }
        Some(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(text: &str) -> Result<PairReader<&[u8]>> {
        PairReader::new(text.as_bytes())
    }

    #[test]
    fn reads_pairs_in_order() {
        let pairs: Vec<Pair> = reader("2 3\n1 2 3\n4 5 6\n0.5 0 1\n2 2 2\n")
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].a, vec![1.0, 2.0, 3.0]);
        assert_eq!(pairs[1].id, 1);
        assert_eq!(pairs[1].b, vec![2.0, 2.0, 2.0]);
    }

    #[test]
    fn generated_values_are_tenths() {
        let mut buf = Vec::new();
        write_pairs(&mut buf, 3, 50).unwrap();
        let r = PairReader::new(buf.as_slice()).unwrap();
        assert_eq!((r.pairs(), r.size()), (3, 50));
        for pair in r {
            let pair = pair.unwrap();
            for v in pair.a.iter().chain(&pair.b) {
                assert!((0.0..100.0).contains(v));
                assert!(((v * 10.0).round() - v * 10.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn generation_is_seeded() {
        let (mut first, mut second) = (Vec::new(), Vec::new());
        write_pairs(&mut first, 2, 8).unwrap();
        write_pairs(&mut second, 2, 8).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn bad_header() {
        assert!(matches!(reader("3\n"), Err(PipelineError::Malformed { line: 1, .. })));
        assert!(matches!(reader(""), Err(PipelineError::Malformed { .. })));
        assert!(matches!(reader("x 2\n"), Err(PipelineError::Malformed { .. })));
    }

    #[test]
    fn short_vector_and_truncated_file() {
        let mut r = reader("1 3\n1 2\n1 2 3\n").unwrap();
        assert!(matches!(r.next(), Some(Err(PipelineError::Malformed { line: 2, .. }))));
        assert!(r.next().is_none());

        let mut r = reader("2 1\n1\n2\n").unwrap();
        assert!(r.next().unwrap().is_ok());
        assert!(matches!(r.next(), Some(Err(PipelineError::Malformed { line: 4, .. }))));
    }

    #[test]
    fn garbage_value() {
        let mut r = reader("1 2\n1 two\n3 4\n").unwrap();
        assert!(matches!(r.next(), Some(Err(PipelineError::Malformed { .. }))));
    }
}
