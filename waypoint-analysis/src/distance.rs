// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

//! Call-graph and control-flow distances towards the target set
//!
//! Two layers. Over the call graph, one reverse search per target yields the
//! per-target function distances, aggregated per function with the harmonic
//! mean so a function close to any target looks close overall. Inside each
//! function, target blocks and calls into target-reaching functions seed a
//! reverse search over the CFG; cross-function jumps weigh ten intra-
//! procedural hops. The same searches feed the critical-to-target hop
//! matrix and the taint region used for the critical-edge partition.

use crate::{
    state::{add_distance, AnalysisState, EdgePartition},
    target::{BbRef, TargetInfos},
};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, trace};
use waypoint_ir::{loops::LoopInfo, view::Cfg, CallGraph, Module, Op};

/// Weight of one call edge relative to one CFG edge
const CALL_EDGE_WEIGHT: u32 = 10;

/// Per-target function distances and their harmonic aggregate
struct CgDistances {
    /// `dTf`: harmonic distance per function index, with the zero sentinel
    function_distance: BTreeMap<usize, f64>,
    /// For each function, the weighted call-chain distance towards every
    /// target block reachable from it
    target_cg: BTreeMap<usize, BTreeMap<BbRef, u32>>,
}

/// Runs the full distance, taint and criticality analysis.
pub fn analyze_distances(module: &Module, targets: &TargetInfos) -> AnalysisState {
    let callgraph = CallGraph::build(module);
    let cg = call_graph_distances(module, &callgraph, targets);

    let mut state = AnalysisState {
        targets: targets.clone(),
        function_distance: cg.function_distance.clone(),
        ..AnalysisState::default()
    };

    for func_idx in 0..module.functions.len() {
        function_distances(module, func_idx, &cg, targets, &mut state);
    }

    assign_indices(module, &mut state);

    debug!(
        "Distance analysis: {} blocks with distance, {} targets, {} critical sources",
        state.block_distance.len(),
        state.num_targets(),
        state.num_critical()
    );

    state
}

/// One reverse breadth-first search over the call graph per target, then the
/// harmonic aggregation across targets.
fn call_graph_distances(module: &Module, callgraph: &CallGraph, targets: &TargetInfos) -> CgDistances {
    let mut per_target: Vec<(BbRef, BTreeMap<usize, u32>)> = Vec::new();

    for (&target_bb, _) in targets {
        let mut df: BTreeMap<usize, u32> = BTreeMap::new();
        df.insert(target_bb.func, 1);

        let mut worklist = VecDeque::from([target_bb.func]);
        while let Some(current) = worklist.pop_front() {
            let next = df[&current] + 1;
            for &caller in callgraph.callers_of(current) {
                if df.get(&caller).map(|&have| have > next).unwrap_or(true) {
                    df.insert(caller, next);
                    worklist.push_back(caller);
                }
            }
        }

        per_target.push((target_bb, df));
    }

    let mut function_distance = BTreeMap::new();
    let mut target_cg: BTreeMap<usize, BTreeMap<BbRef, u32>> = BTreeMap::new();

    for func_idx in 0..module.functions.len() {
        let mut harmonic_sum = 0.0;
        let mut reaches_any = false;

        for (target_bb, df) in &per_target {
            if let Some(&chain) = df.get(&func_idx) {
                if chain != 0 {
                    harmonic_sum += 1.0 / f64::from(chain);
                    target_cg
                        .entry(func_idx)
                        .or_default()
                        .insert(*target_bb, CALL_EDGE_WEIGHT * chain);
                }
                reaches_any = true;
            }
        }

        if reaches_any {
            let distance = if harmonic_sum != 0.0 {
                1.0 / harmonic_sum
            } else {
                // Reachable, but every chain contributed a zero term: treat
                // as on a direct path with top priority
                0.0
            };
            function_distance.insert(func_idx, distance);
            trace!(
                "dTf({}) = {}",
                module.functions[func_idx].name,
                distance
            );
        }
    }

    CgDistances {
        function_distance,
        target_cg,
    }
}

/// Distances, taint and the critical partition inside one function.
fn function_distances(
    module: &Module,
    func_idx: usize,
    cg: &CgDistances,
    targets: &TargetInfos,
    state: &mut AnalysisState,
) {
    let function = &module.functions[func_idx];
    if function.blocks.is_empty() {
        return;
    }

    let cfg = Cfg::new(function);
    let loops = LoopInfo::analyze(&cfg);

    // Seed blocks: calls into target-reaching functions, then target blocks
    // themselves (which pin the distance to zero)
    let mut seeds: BTreeSet<usize> = BTreeSet::new();
    let mut call_seed: BTreeMap<usize, usize> = BTreeMap::new();

    for (block_idx, block) in function.blocks.iter().enumerate() {
        let bb = BbRef {
            func: func_idx,
            block: block_idx,
        };

        for inst in &block.insts {
            let Op::Call {
                callee: Some(name), ..
            } = &inst.op
            else {
                continue;
            };
            let Some(callee_idx) = module.function_index(name) else {
                continue;
            };
            let Some(&callee_distance) = cg.function_distance.get(&callee_idx) else {
                continue;
            };

            let seeded = f64::from(CALL_EDGE_WEIGHT) * callee_distance;
            if seeds.contains(&block_idx) {
                if state.block_distance.get(&bb).map(|&have| have > seeded).unwrap_or(false) {
                    state.block_distance.insert(bb, seeded);
                    call_seed.insert(block_idx, callee_idx);
                }
            } else {
                seeds.insert(block_idx);
                state.block_distance.insert(bb, seeded);
                call_seed.insert(block_idx, callee_idx);
            }
        }

        if targets.contains_key(&bb) {
            state.block_distance.insert(bb, 0.0);
            seeds.insert(block_idx);
        }
    }

    // Tainted region: blocks that reach a seed over predecessor edges that
    // never jump back to a loop header
    let mut taint: BTreeSet<usize> = BTreeSet::new();
    for &seed in &seeds {
        let mut visited: BTreeSet<usize> = BTreeSet::new();
        let mut worklist = VecDeque::from([seed]);

        while let Some(current) = worklist.pop_front() {
            taint.insert(current);
            for &pred in cfg.preds(current) {
                if !visited.contains(&pred) && !loops.is_back_edge(pred, current) {
                    visited.insert(pred);
                    worklist.push_back(pred);
                }
            }
        }
    }

    // Hop counts towards each seed
    let mut hops: BTreeMap<usize, BTreeMap<usize, u32>> = BTreeMap::new();
    for &seed in &seeds {
        let mut db: BTreeMap<usize, u32> = BTreeMap::new();
        db.insert(seed, 0);

        let mut worklist = VecDeque::from([seed]);
        while let Some(current) = worklist.pop_front() {
            let next = db[&current] + 1;
            for &pred in cfg.preds(current) {
                if db.get(&pred).map(|&have| have > next).unwrap_or(true) {
                    db.insert(pred, next);
                    worklist.push_back(pred);
                }
            }
        }

        hops.insert(seed, db);
    }

    // Harmonic block distances and the hop matrix
    for block_idx in 0..function.blocks.len() {
        let bb = BbRef {
            func: func_idx,
            block: block_idx,
        };

        if seeds.contains(&block_idx) {
            if targets.contains_key(&bb) {
                add_distance(&mut state.matrix, bb, bb, 0);
            }
            if let Some(&callee_idx) = call_seed.get(&block_idx) {
                if let Some(reachable) = cg.target_cg.get(&callee_idx) {
                    for (&target_bb, &chain) in reachable {
                        add_distance(&mut state.matrix, bb, target_bb, chain);
                    }
                }
            }
            continue;
        }

        let mut harmonic_sum = 0.0;
        let mut reached = false;

        for (&seed, db) in &hops {
            let Some(&hop) = db.get(&block_idx) else {
                continue;
            };
            let seed_bb = BbRef {
                func: func_idx,
                block: seed,
            };

            harmonic_sum += 1.0 / (f64::from(hop) + state.block_distance[&seed_bb]);
            reached = true;

            if targets.contains_key(&seed_bb) {
                add_distance(&mut state.matrix, bb, seed_bb, hop);
            }
            if let Some(&callee_idx) = call_seed.get(&seed) {
                if let Some(reachable) = cg.target_cg.get(&callee_idx) {
                    for (&target_bb, &chain) in reachable {
                        add_distance(&mut state.matrix, bb, target_bb, hop + chain);
                    }
                }
            }
        }

        if reached {
            state.block_distance.insert(bb, 1.0 / harmonic_sum);
        }
    }

    // Critical/solved partition over the tainted region
    for block_idx in 0..function.blocks.len() {
        let succs = cfg.succs(block_idx);
        if succs.len() < 2 || !taint.contains(&block_idx) {
            continue;
        }

        let mut partition = EdgePartition::default();
        for &succ in succs {
            let side = if taint.contains(&succ) {
                &mut partition.solved
            } else {
                &mut partition.critical
            };
            if !side.contains(&succ) {
                side.push(succ);
            }
        }

        state.edges.insert(
            BbRef {
                func: func_idx,
                block: block_idx,
            },
            partition,
        );
    }
}

/// Dense target and critical indices, assigned in module iteration order so
/// every artefact row can be joined positionally.
fn assign_indices(module: &Module, state: &mut AnalysisState) {
    let mut next_target = 0;
    let mut next_critical = 0;

    for func_idx in 0..module.functions.len() {
        for block_idx in 0..module.functions[func_idx].blocks.len() {
            let bb = BbRef {
                func: func_idx,
                block: block_idx,
            };

            if !state.block_distance.contains_key(&bb) {
                continue;
            }

            if state.targets.contains_key(&bb) {
                state.target_index.insert(bb, next_target);
                next_target += 1;
            }

            if state
                .edges
                .get(&bb)
                .map(|partition| !partition.critical.is_empty())
                .unwrap_or(false)
            {
                state.critical_index.insert(bb, next_critical);
                next_critical += 1;
            }
        }
    }

    debug_assert_eq!(state.target_index.len(), state.targets.len());
}
