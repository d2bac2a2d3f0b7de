// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

//! The analysis and rewriting pipeline
//!
//! One batch run: load the module, resolve the targets, analyze, write the
//! artefacts, rewrite, store the instrumented module. Any failure aborts
//! the run and leaves whatever was already written invalid.

use crate::args::AnalyzerArgs;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;
use waypoint_analysis::{analyze, Target};
use waypoint_instrument::{artifacts, instrument_module};
use waypoint_ir::{ids::assign_block_ids, Module};

/// Name of the rewritten-module artefact for a given input path, placed in
/// the working directory: `<stem>.ci.bc`
fn instrumented_module_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "module".to_string());
    PathBuf::from(format!("{}.ci.bc", stem))
}

/// Runs the whole pipeline.
pub fn cli_main(args: AnalyzerArgs) -> Result<()> {
    crate::init_tracing(args.log_level);

    info!("Loading module {}", args.module.display());
    let mut module = Module::from_file(&args.module)
        .with_context(|| format!("loading {}", args.module.display()))?;
    module.ensure_debug_info()?;

    assign_block_ids(&mut module);

    let targets = Target::load(&args.targets)?;

    info!("Calculating target distances");
    let state = analyze(&module, &targets)?;

    info!("Writing artefacts");
    artifacts::write_all(".", &module, &state)?;

    info!("Rewriting module");
    let summary = instrument_module(&mut module, &state);
    info!(
        "{} blocks instrumented, {} targets, {} critical sources",
        summary.distance_probes,
        state.num_targets(),
        state.num_critical()
    );

    let output = instrumented_module_path(&args.module);
    module
        .to_file(&output)
        .with_context(|| format!("IO_FAILURE: writing {}", output.display()))?;
    info!("Instrumented module written to {}", output.display());

    Ok(())
}
