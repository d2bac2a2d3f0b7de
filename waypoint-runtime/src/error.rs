// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

//! Runtime-side errors

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
/// Errors loading campaign inputs or mapping shared memory
pub enum Error {
    #[error("IO_FAILURE: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed distance matrix at line {line}: {reason}")]
    MalformedMatrix { line: usize, reason: String },
    #[error("matrix cell ({row}, {col}) out of bounds for {rows}x{cols}")]
    MatrixIndex {
        row: u32,
        col: u32,
        rows: u32,
        cols: u32,
    },
    #[error(transparent)]
    Shm(#[from] anyhow::Error),
}
