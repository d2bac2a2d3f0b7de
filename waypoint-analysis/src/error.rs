// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

//! Analysis pipeline errors
//!
//! Everything here is fatal: the pipeline is a batch job and partial results
//! are worthless to the fuzzer. Unreachable targets and blocks that reach no
//! seed are ordinary analysis outcomes, not errors.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
/// Fatal analysis failures
pub enum Error {
    #[error(transparent)]
    Ir(#[from] waypoint_ir::Error),
    #[error("TARGET_UNRESOLVED: no instruction matches {filename}:{line}")]
    /// A target row resolved to nothing; the target list and the module are
    /// out of sync, which would silently skew every distance
    TargetUnresolved { filename: String, line: u32 },
    #[error("IO_FAILURE: cannot read target list: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed target row '{row}': {reason}")]
    MalformedTarget { row: String, reason: String },
}
