// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

//! The collected result of all analyses over one module
//!
//! Every pass writes into a single [`AnalysisState`] value owned by the
//! caller; nothing is process-global. The rewriter and the artefact writers
//! only ever read from it.

use crate::{
    condition::Condition,
    target::{BbRef, TargetInfos},
};
use std::collections::BTreeMap;

/// Partition of a tainted block's successors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgePartition {
    /// Successors that leave the tainted region; taking one of these edges
    /// diverges away from every target in the function
    pub critical: Vec<usize>,
    /// Successors that stay inside the tainted region
    pub solved: Vec<usize>,
}

/// Everything the rewriter and the artefact writers need, keyed by module
/// order so emission is deterministic
#[derive(Debug, Clone, Default)]
pub struct AnalysisState {
    /// Resolved target blocks with their scores
    pub targets: TargetInfos,
    /// Harmonic call-graph distance per function index; absent when the
    /// function reaches no target. A value of exactly zero is the "on a
    /// direct path, top priority" sentinel.
    pub function_distance: BTreeMap<usize, f64>,
    /// Harmonic distance per block; absent when no seed is reachable, in
    /// which case the block receives no instrumentation at all
    pub block_distance: BTreeMap<BbRef, f64>,
    /// Critical/solved successor partition per tainted multi-successor block
    pub edges: BTreeMap<BbRef, EdgePartition>,
    /// Minimal hop counts from any block towards each target block; pairs
    /// with no connecting path are simply absent
    pub matrix: BTreeMap<BbRef, BTreeMap<BbRef, u32>>,
    /// Dense index per target block, in module order
    pub target_index: BTreeMap<BbRef, u32>,
    /// Dense index per block with at least one critical successor
    pub critical_index: BTreeMap<BbRef, u32>,
    /// Recorded branch conditions, in condition-id order
    pub conditions: Vec<Condition>,
}

impl AnalysisState {
    pub fn num_targets(&self) -> u32 {
        self.target_index.len() as u32
    }

    pub fn num_critical(&self) -> u32 {
        self.critical_index.len() as u32
    }

    /// The integer distance the rewriter accumulates for a block.
    ///
    /// Scaling truncates `100 * dTb`, except that sub-unit distances clamp
    /// up to 1 so only true target blocks ever report zero.
    pub fn scaled_distance(&self, bb: &BbRef) -> Option<u32> {
        self.block_distance.get(bb).map(|distance| {
            let raw = 100.0 * distance;
            if raw > 0.0 && raw < 1.0 {
                1
            } else {
                raw as u32
            }
        })
    }

    /// Hop count from `from` towards target block `to`; `None` encodes the
    /// unreachable `-1` cell of the exported matrix
    pub fn matrix_distance(&self, from: &BbRef, to: &BbRef) -> Option<u32> {
        self.matrix.get(from).and_then(|row| row.get(to)).copied()
    }
}

/// Records a path of `distance` hops from `from` to the target block `to`,
/// keeping the minimum when several paths contribute to the same pair.
pub fn add_distance(
    matrix: &mut BTreeMap<BbRef, BTreeMap<BbRef, u32>>,
    from: BbRef,
    to: BbRef,
    distance: u32,
) {
    let cell = matrix.entry(from).or_default().entry(to).or_insert(distance);
    if *cell > distance {
        *cell = distance;
    }
}
