// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

//! Static analyses preparing a module for directed greybox fuzzing
//!
//! Given a module and a list of suspected-vulnerable source locations, the
//! analyses compute how close every basic block is to the target set, which
//! branches diverge away from the targets, and what those branches compare.
//! The result is one [`AnalysisState`] value; the rewriter and the artefact
//! writers consume it read-only.
//!
//! The pipeline is strictly single-threaded and deterministic: all
//! iteration follows module declaration order, and repeated runs over the
//! same inputs produce identical state.

#![deny(clippy::all)]
#![deny(clippy::unwrap_used)]
#![forbid(unsafe_code)]

pub mod condition;
pub mod distance;
pub mod error;
pub mod state;
pub mod target;

pub use condition::{analyze_conditions, Condition, OperandKind};
pub use distance::analyze_distances;
pub use error::{Error, Result};
pub use state::{add_distance, AnalysisState, EdgePartition};
pub use target::{resolve_targets, BbRef, Target, TargetInfos};

use tracing::info;
use waypoint_ir::Module;

/// Runs target resolution and every analysis over a module.
pub fn analyze(module: &Module, targets: &[Target]) -> Result<AnalysisState> {
    module.ensure_debug_info()?;

    info!("Resolving {} targets", targets.len());
    let infos = resolve_targets(module, targets)?;

    info!("Computing distances over {} functions", module.functions.len());
    let mut state = analyze_distances(module, &infos);

    info!("Analyzing branch conditions");
    state.conditions = analyze_conditions(module);

    Ok(state)
}
