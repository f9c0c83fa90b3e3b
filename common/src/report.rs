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

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::Result;

/// Appends `records` to the CSV file at `path`, writing the header row only when
/// the file is new or empty.
pub fn append_csv<R: Serialize>(path: &Path, records: &[R]) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let empty = file.metadata()?.len() == 0;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(empty)
        .from_writer(file);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    log::debug!("appended {} rows to {}", records.len(), path.display());
    Ok(())
}

/// Semicolon separated rows on stdout.
pub fn print_rows<R: Serialize>(records: &[R], header: bool) -> Result<()> {
    let stdout = io::stdout();
    write_rows(stdout.lock(), records, header)
}

pub fn write_rows<W: Write, R: Serialize>(out: W, records: &[R], header: bool) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .has_headers(header)
        .from_writer(out);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// One JSON object per line on stdout.
pub fn print_json<R: Serialize>(records: &[R]) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[derive(Serialize)]
    struct Row {
        size: usize,
        method: &'static str,
        execution_time_ms: f64,
    }

    #[test]
    fn header_is_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let row = Row {
            size: 10,
            method: "reduction",
            execution_time_ms: 1.5,
        };
        append_csv(&path, &[row]).unwrap();
        let row = Row {
            size: 20,
            method: "sequential",
            execution_time_ms: 2.5,
        };
        append_csv(&path, &[row]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "size,method,execution_time_ms");
        assert_eq!(lines[1], "10,reduction,1.5");
        assert_eq!(lines[2], "20,sequential,2.5");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn semicolon_rows() {
        let mut buf = Vec::new();
        let rows = [Row {
            size: 4,
            method: "cannon",
            execution_time_ms: 0.25,
        }];
        write_rows(&mut buf, &rows, true).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "size;method;execution_time_ms\n4;cannon;0.25\n");
    }
}
