// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

//! Loader for the critical-to-target distance matrix artefact
//!
//! `dm.csv` starts with a `rows:cols` header followed by one comma-
//! separated row of `i32` cells per critical block; `-1` marks a target
//! that is unreachable from that block.

use crate::error::{Error, Result};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};
use tracing::debug;

/// Unreachable-pair marker
pub const UNREACHABLE: i32 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Dense row-major critical-to-target hop matrix
pub struct DistanceMatrix {
    rows: u32,
    cols: u32,
    cells: Vec<i32>,
}

impl DistanceMatrix {
    /// Loads and validates a matrix file.
    pub fn from_file<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let mut lines = reader.lines();

        let header = lines.next().ok_or_else(|| Error::MalformedMatrix {
            line: 1,
            reason: "missing dimension header".to_string(),
        })??;
        let (rows, cols) = parse_header(&header)?;

        let mut cells = Vec::with_capacity((rows as usize) * (cols as usize));

        for (row_idx, row) in lines.enumerate() {
            let row = row?;
            if row.trim().is_empty() {
                continue;
            }

            let values: Vec<i32> = row
                .split(',')
                .map(|cell| {
                    cell.trim()
                        .parse::<i32>()
                        .map_err(|parse_err| Error::MalformedMatrix {
                            line: row_idx + 2,
                            reason: parse_err.to_string(),
                        })
                })
                .collect::<Result<_>>()?;

            if values.len() != cols as usize {
                return Err(Error::MalformedMatrix {
                    line: row_idx + 2,
                    reason: format!("expected {} cells, found {}", cols, values.len()),
                });
            }

            cells.extend(values);
        }

        if cells.len() != (rows as usize) * (cols as usize) {
            return Err(Error::MalformedMatrix {
                line: rows as usize + 1,
                reason: format!(
                    "expected {} rows of {} cells, found {} cells",
                    rows,
                    cols,
                    cells.len()
                ),
            });
        }

        debug!("Loaded {}x{} distance matrix", rows, cols);

        Ok(Self { rows, cols, cells })
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// The cell for a critical block row and target column.
    pub fn get(&self, row: u32, col: u32) -> Result<i32> {
        if row >= self.rows || col >= self.cols {
            return Err(Error::MatrixIndex {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(self.cells[(row as usize) * (self.cols as usize) + col as usize])
    }

    /// Whether the target column is reachable from the critical row at all
    pub fn is_reachable(&self, row: u32, col: u32) -> Result<bool> {
        Ok(self.get(row, col)? != UNREACHABLE)
    }
}

fn parse_header(header: &str) -> Result<(u32, u32)> {
    let mut parts = header.trim().split(':');

    let rows = parts
        .next()
        .and_then(|part| part.parse::<u32>().ok())
        .ok_or_else(|| Error::MalformedMatrix {
            line: 1,
            reason: format!("bad header '{}'", header),
        })?;
    let cols = parts
        .next()
        .and_then(|part| part.parse::<u32>().ok())
        .ok_or_else(|| Error::MalformedMatrix {
            line: 1,
            reason: format!("bad header '{}'", header),
        })?;

    Ok((rows, cols))
}
