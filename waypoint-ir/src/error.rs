// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

//! Errors surfaced while loading or checking a module

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
/// Errors raised by the IR view
pub enum Error {
    #[error("MISSING_DEBUG_INFO: module '{module}' carries no debug records (DWARF version 0)")]
    /// The module was compiled without `-g`; no analysis can resolve source
    /// locations, so the whole pipeline aborts
    MissingDebugInfo { module: String },
    #[error("IO_FAILURE: {0}")]
    Io(#[from] std::io::Error),
    #[error("IO_FAILURE: malformed module file: {0}")]
    Decode(#[from] serde_json::Error),
}
