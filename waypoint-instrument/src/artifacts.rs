// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

//! Text artefacts the fuzzer side loads at startup
//!
//! Row order matches analysis iteration order exactly (functions in
//! declaration order, blocks in function order), so the fuzzer can join
//! rows positionally against the shared-memory indices. Any I/O failure
//! aborts the pipeline; a partially written artefact set is invalid.

use anyhow::{Context, Result};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};
use tracing::info;
use waypoint_analysis::{AnalysisState, BbRef};
use waypoint_ir::{view, Module};

/// Writes every artefact into `dir`.
pub fn write_all<P>(dir: P, module: &Module, state: &AnalysisState) -> Result<()>
where
    P: AsRef<Path>,
{
    let dir = dir.as_ref();

    write_distance_file(dir.join("distance.txt"), module, state)?;
    write_functions_file(dir.join("functions.txt"), module, state)?;
    write_targets_file(dir.join("targets.txt"), module, state)?;
    write_condition_file(dir.join("condition_info.txt"), module, state)?;
    write_distance_matrix(dir.join("dm.csv"), state)?;

    info!("Artefacts written to {}", dir.display());

    Ok(())
}

fn create<P>(path: P) -> Result<BufWriter<File>>
where
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())
        .with_context(|| format!("IO_FAILURE: cannot create {}", path.as_ref().display()))?;
    Ok(BufWriter::new(file))
}

/// `distance.txt`: the critical-source count, then one row per instrumented
/// block: `bbId <criticalIdx|-1> <distance> <debugLoc>`.
///
/// Non-critical rows carry `-1` rather than being omitted, so consumers see
/// every instrumented block whether or not it branches away from targets.
pub fn write_distance_file<P>(path: P, module: &Module, state: &AnalysisState) -> Result<()>
where
    P: AsRef<Path>,
{
    let mut out = create(&path)?;
    writeln!(out, "{}", state.num_critical()).context("IO_FAILURE: distance.txt")?;

    for (func_idx, function) in module.functions.iter().enumerate() {
        for (block_idx, block) in function.blocks.iter().enumerate() {
            let bb = BbRef {
                func: func_idx,
                block: block_idx,
            };
            let Some(distance) = state.scaled_distance(&bb) else {
                continue;
            };

            let critical_column = state
                .critical_index
                .get(&bb)
                .map(|idx| idx.to_string())
                .unwrap_or_else(|| "-1".to_string());

            writeln!(
                out,
                "{} {} {} {}",
                block.id.unwrap_or_default(),
                critical_column,
                distance,
                view::block_debug_loc(function, block_idx)
            )
            .context("IO_FAILURE: distance.txt")?;
        }
    }

    Ok(())
}

/// `functions.txt`: one row per function with at least one instrumented
/// block: `funcId <debugLoc>`
pub fn write_functions_file<P>(path: P, module: &Module, state: &AnalysisState) -> Result<()>
where
    P: AsRef<Path>,
{
    let mut out = create(&path)?;
    let mut func_id = 0u32;

    for (func_idx, function) in module.functions.iter().enumerate() {
        let instrumented = (0..function.blocks.len()).any(|block_idx| {
            state.block_distance.contains_key(&BbRef {
                func: func_idx,
                block: block_idx,
            })
        });
        if !instrumented {
            continue;
        }

        writeln!(out, "{} {}", func_id, view::function_debug_loc(function))
            .context("IO_FAILURE: functions.txt")?;
        func_id += 1;
    }

    Ok(())
}

/// `targets.txt`: the target count, then one row per target block:
/// `targetIdx <score> <debugLoc>`
pub fn write_targets_file<P>(path: P, module: &Module, state: &AnalysisState) -> Result<()>
where
    P: AsRef<Path>,
{
    let mut out = create(&path)?;
    writeln!(out, "{}", state.num_targets()).context("IO_FAILURE: targets.txt")?;

    for (bb, target_idx) in &state.target_index {
        let score = state.targets.get(bb).map(|target| target.score).unwrap_or(0.0);
        let function = &module.functions[bb.func];

        writeln!(
            out,
            "{} {} {}",
            target_idx,
            score,
            view::block_debug_loc(function, bb.block)
        )
        .context("IO_FAILURE: targets.txt")?;
    }

    Ok(())
}

/// `condition_info.txt`: one row per recorded condition:
/// `condId <criticalId|none> <op1Kind> <op2Kind> <op1Repr> <op2Repr>`
pub fn write_condition_file<P>(path: P, module: &Module, state: &AnalysisState) -> Result<()>
where
    P: AsRef<Path>,
{
    let mut out = create(&path)?;

    for condition in &state.conditions {
        let critical_column = if state.critical_index.contains_key(&condition.bb) {
            module.functions[condition.bb.func].blocks[condition.bb.block]
                .id
                .unwrap_or_default()
                .to_string()
        } else {
            "none".to_string()
        };

        writeln!(
            out,
            "{} {} {} {} {} {}",
            condition.id,
            critical_column,
            condition.op1_kind,
            condition.op2_kind,
            condition.op1_repr,
            condition.op2_repr
        )
        .context("IO_FAILURE: condition_info.txt")?;
    }

    Ok(())
}

/// `dm.csv`: `rows:cols` header, then the critical-to-target hop matrix
/// with `-1` marking unreachable pairs
pub fn write_distance_matrix<P>(path: P, state: &AnalysisState) -> Result<()>
where
    P: AsRef<Path>,
{
    let mut out = create(&path)?;
    writeln!(out, "{}:{}", state.num_critical(), state.num_targets())
        .context("IO_FAILURE: dm.csv")?;

    for (critical_bb, _) in &state.critical_index {
        let row: Vec<String> = state
            .target_index
            .keys()
            .map(|target_bb| {
                state
                    .matrix_distance(critical_bb, target_bb)
                    .map(|distance| distance.to_string())
                    .unwrap_or_else(|| "-1".to_string())
            })
            .collect();

        writeln!(out, "{}", row.join(",")).context("IO_FAILURE: dm.csv")?;
    }

    Ok(())
}
