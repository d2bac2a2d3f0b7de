// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

//! Instrumentation rewriter and artefact writers
//!
//! The rewriter inserts map-update operations into the analyzed module so a
//! running fuzzer can observe distance, target hits, critical-branch
//! outcomes and compared operand values through shared memory. It never
//! changes control flow. The artefact writers emit the text files the
//! fuzzer side joins against, in the same deterministic order the analyses
//! iterated in.

#![deny(clippy::all)]
#![deny(clippy::unwrap_used)]
#![forbid(unsafe_code)]

pub mod artifacts;
pub mod layout;
pub mod rewrite;

pub use rewrite::{instrument_module, InstrumentationSummary};
