// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

//! Command-line front ends for the directed-fuzzing toolchain
//!
//! `waypoint-cbi` runs the full analysis and rewriting pipeline over one
//! module and drops the artefacts into the working directory.
//! `waypoint-inspect` dumps function and basic-block metadata as JSON for
//! target selection and triage tooling.

#![deny(clippy::all)]
#![deny(clippy::unwrap_used)]
#![forbid(unsafe_code)]

pub mod analyzer;
pub mod args;
pub mod inspector;

use tracing::error;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, registry};

/// Installs the compact stdout subscriber both binaries use.
pub fn init_tracing(level: LevelFilter) {
    let reg = registry().with(
        fmt::layer()
            .compact()
            .with_writer(std::io::stdout)
            .with_filter(level),
    );
    reg.try_init()
        .map_err(|init_err| {
            error!("Could not install tracing subscriber: {}", init_err);
            init_err
        })
        .ok();
}
