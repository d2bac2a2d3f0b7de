// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

//! The instrumentation rewriter
//!
//! For every block with a computed distance a probe sequence is inserted at
//! the first insertion point: load the shared-area base, add the scaled
//! distance to the accumulator, bump the step counter, and for target
//! blocks raise the per-target hit flag. Critical and solved successors get
//! an entry probe flagging the decision that led into them, and recorded
//! branch conditions get their outcome and operand snapshots stored right
//! before the terminator. Every inserted operation is marked `nosanitize`
//! so external sanitizer instrumentation leaves it alone.

use crate::layout::{
    AREA_PTR, COND_MAP_PTR, CRITICAL_BB_PTR, CRITICAL_HIT, CVAR_MAP_PTR, DISTANCE_BB_PTR,
    DISTANCE_OFFSET, SOLVED_HIT, STEP_OFFSET, TARGET_FLAGS_OFFSET,
};
use std::collections::BTreeMap;
use tracing::{debug, info};
use waypoint_analysis::{AnalysisState, BbRef, Condition};
use waypoint_ir::{CastKind, Global, Inst, Module, Op, Terminator, Value};

/// Probe counts, reported after rewriting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstrumentationSummary {
    /// Blocks that received the distance/step sequence
    pub distance_probes: u32,
    /// Critical-successor entry probes
    pub critical_probes: u32,
    /// Solved-successor entry probes
    pub solved_probes: u32,
    /// Recorded condition operand probes
    pub condition_probes: u32,
}

/// Fresh-name source for probe temporaries
#[derive(Default)]
struct NameSource {
    next: u32,
}

impl NameSource {
    fn fresh(&mut self, hint: &str) -> String {
        let name = format!("wp.{}.{}", hint, self.next);
        self.next += 1;
        name
    }
}

/// Pending insertions for one block: probes at the first insertion point
/// and probes immediately before the terminator
#[derive(Default)]
struct Insertions {
    at_entry: Vec<Inst>,
    before_term: Vec<Inst>,
}

/// Rewrites the module in place, returning probe counts.
pub fn instrument_module(module: &mut Module, state: &AnalysisState) -> InstrumentationSummary {
    declare_map_globals(module);

    let mut summary = InstrumentationSummary::default();
    let mut names = NameSource::default();

    for func_idx in 0..module.functions.len() {
        let mut pending: BTreeMap<usize, Insertions> = BTreeMap::new();

        for block_idx in 0..module.functions[func_idx].blocks.len() {
            let bb = BbRef {
                func: func_idx,
                block: block_idx,
            };

            let Some(distance) = state.scaled_distance(&bb) else {
                continue;
            };

            let entry = &mut pending.entry(block_idx).or_default().at_entry;
            emit_distance_probe(entry, &mut names, distance);
            if distance == 0 {
                let target_idx = state.target_index[&bb];
                emit_target_flag(entry, &mut names, target_idx);
            }
            summary.distance_probes += 1;

            if let Some(partition) = state.edges.get(&bb) {
                let block_id = module.functions[func_idx].blocks[block_idx]
                    .id
                    .unwrap_or_default();

                for &succ in &partition.critical {
                    emit_edge_flag(
                        &mut pending.entry(succ).or_default().at_entry,
                        &mut names,
                        block_id,
                        CRITICAL_HIT,
                    );
                    summary.critical_probes += 1;
                }
                for &succ in &partition.solved {
                    emit_edge_flag(
                        &mut pending.entry(succ).or_default().at_entry,
                        &mut names,
                        block_id,
                        SOLVED_HIT,
                    );
                    summary.solved_probes += 1;
                }
            }
        }

        for condition in state
            .conditions
            .iter()
            .filter(|condition| condition.bb.func == func_idx)
        {
            let block_idx = condition.bb.block;
            let Terminator::Branch { cond, .. } = &module.functions[func_idx].blocks[block_idx].term
            else {
                continue;
            };
            let cond = cond.clone();
            let before = &mut pending.entry(block_idx).or_default().before_term;

            emit_outcome_store(before, &mut names, condition.id, &cond);

            if condition.records_string() {
                emit_string_snapshot(before, &mut names, condition);
                summary.condition_probes += 1;
            } else {
                for side in [0u8, 1u8] {
                    if condition.records_int_side(side) {
                        emit_int_snapshot(before, &mut names, condition, side);
                        summary.condition_probes += 1;
                    }
                }
            }
        }

        let function = &mut module.functions[func_idx];
        for (block_idx, insertions) in pending.into_iter() {
            let block = &mut function.blocks[block_idx];
            let at = block.first_insertion_point();
            block.insts.splice(at..at, insertions.at_entry);
            block.insts.extend(insertions.before_term);
        }

        if !function.blocks.is_empty() {
            debug!("Instrumented function {}", function.name);
        }
    }

    info!(
        "Inserted {} distance, {} critical, {} solved, {} condition probes",
        summary.distance_probes,
        summary.critical_probes,
        summary.solved_probes,
        summary.condition_probes
    );

    summary
}

/// Declares the externally linked map pointers the probes load from.
fn declare_map_globals(module: &mut Module) {
    for name in [
        AREA_PTR,
        CRITICAL_BB_PTR,
        DISTANCE_BB_PTR,
        COND_MAP_PTR,
        CVAR_MAP_PTR,
    ] {
        if !module.globals.iter().any(|global| global.name == name) {
            module.globals.push(Global {
                name: name.to_string(),
                string_init: None,
            });
        }
    }
}

fn const_u64(value: usize) -> Value {
    Value::ConstInt {
        width: 64,
        value: value as i64,
    }
}

fn const_u32(value: u32) -> Value {
    Value::ConstInt {
        width: 32,
        value: i64::from(value),
    }
}

fn const_u8(value: u8) -> Value {
    Value::ConstInt {
        width: 8,
        value: i64::from(value),
    }
}

/// `map[DISTANCE_OFFSET] += distance; map[STEP_OFFSET] += 1`
fn emit_distance_probe(out: &mut Vec<Inst>, names: &mut NameSource, distance: u32) {
    let map = names.fresh("map");
    out.push(Inst::probe(Op::LoadPtr {
        dest: map.clone(),
        global: AREA_PTR.to_string(),
    }));

    emit_u64_increment(out, names, &map, DISTANCE_OFFSET, u64::from(distance));
    emit_u64_increment(out, names, &map, STEP_OFFSET, 1);
}

/// Read-modify-write of the u64 at `map + offset`
fn emit_u64_increment(
    out: &mut Vec<Inst>,
    names: &mut NameSource,
    map: &str,
    offset: usize,
    increment: u64,
) {
    let ptr = names.fresh("ptr");
    let old = names.fresh("old");
    let new = names.fresh("new");

    out.push(Inst::probe(Op::Gep {
        dest: ptr.clone(),
        base: map.to_string(),
        offset: const_u64(offset),
    }));
    out.push(Inst::probe(Op::Load {
        dest: old.clone(),
        width: 64,
        addr: ptr.clone(),
    }));
    out.push(Inst::probe(Op::Add {
        dest: new.clone(),
        lhs: Value::Local {
            name: old,
            width: Some(64),
        },
        rhs: const_u64(increment as usize),
    }));
    out.push(Inst::probe(Op::Store {
        width: 64,
        value: Value::Local {
            name: new,
            width: Some(64),
        },
        addr: ptr,
    }));
}

/// `map[TARGET_FLAGS_OFFSET + target_idx] = 1`
fn emit_target_flag(out: &mut Vec<Inst>, names: &mut NameSource, target_idx: u32) {
    let map = names.fresh("map");
    let ptr = names.fresh("ptr");

    out.push(Inst::probe(Op::LoadPtr {
        dest: map.clone(),
        global: AREA_PTR.to_string(),
    }));
    out.push(Inst::probe(Op::Gep {
        dest: ptr.clone(),
        base: map,
        offset: const_u64(TARGET_FLAGS_OFFSET + target_idx as usize),
    }));
    out.push(Inst::probe(Op::Store {
        width: 8,
        value: const_u8(1),
        addr: ptr,
    }));
}

/// `critical_bb[block_id] = flag`, inserted at the entry of the successor
/// that reveals which way the decision went
fn emit_edge_flag(out: &mut Vec<Inst>, names: &mut NameSource, block_id: u32, flag: u8) {
    let map = names.fresh("cb");
    let ptr = names.fresh("ptr");

    out.push(Inst::probe(Op::LoadPtr {
        dest: map.clone(),
        global: CRITICAL_BB_PTR.to_string(),
    }));
    out.push(Inst::probe(Op::Gep {
        dest: ptr.clone(),
        base: map,
        offset: const_u32(block_id),
    }));
    out.push(Inst::probe(Op::Store {
        width: 8,
        value: const_u8(flag),
        addr: ptr,
    }));
}

/// `cond_map[cond_id] = zext(cond) + 1` (1 = branch false, 2 = branch
/// true); stored once per recorded branch, before the operand snapshots
fn emit_outcome_store(out: &mut Vec<Inst>, names: &mut NameSource, cond_id: u32, cond: &Value) {
    let cond8 = names.fresh("cond8");
    let map = names.fresh("cm");
    let ptr = names.fresh("ptr");
    let outcome = names.fresh("outcome");

    out.push(Inst::probe(Op::Cast {
        dest: cond8.clone(),
        kind: CastKind::Zext,
        width: 8,
        value: cond.clone(),
    }));
    out.push(Inst::probe(Op::LoadPtr {
        dest: map.clone(),
        global: COND_MAP_PTR.to_string(),
    }));
    out.push(Inst::probe(Op::Gep {
        dest: ptr.clone(),
        base: map,
        offset: const_u32(cond_id),
    }));
    out.push(Inst::probe(Op::Add {
        dest: outcome.clone(),
        lhs: Value::Local {
            name: cond8,
            width: Some(8),
        },
        rhs: const_u8(1),
    }));
    out.push(Inst::probe(Op::Store {
        width: 8,
        value: Value::Local {
            name: outcome,
            width: Some(8),
        },
        addr: ptr,
    }));
}

/// A sign-extended snapshot of one integer operand into
/// `cvar_map[2 * cond_id + side]`
fn emit_int_snapshot(out: &mut Vec<Inst>, names: &mut NameSource, condition: &Condition, side: u8) {
    let operand = if side == 0 {
        condition.op1.clone()
    } else {
        condition.op2.clone()
    };

    let map = names.fresh("vm");
    let ptr = names.fresh("ptr");
    let wide = names.fresh("wide");

    out.push(Inst::probe(Op::LoadPtr {
        dest: map.clone(),
        global: CVAR_MAP_PTR.to_string(),
    }));
    out.push(Inst::probe(Op::Gep {
        dest: ptr.clone(),
        base: map,
        offset: const_u32(2 * condition.id + u32::from(side)),
    }));
    out.push(Inst::probe(Op::Cast {
        dest: wide.clone(),
        kind: CastKind::Sext,
        width: 64,
        value: operand,
    }));
    out.push(Inst::probe(Op::Store {
        width: 64,
        value: Value::Local {
            name: wide,
            width: Some(64),
        },
        addr: ptr,
    }));
}

/// The first eight bytes behind the probed string pointer into
/// `cvar_map[2 * cond_id]`
fn emit_string_snapshot(out: &mut Vec<Inst>, names: &mut NameSource, condition: &Condition) {
    let map = names.fresh("vm");
    let ptr = names.fresh("ptr");
    let as_u64_ptr = names.fresh("strp");
    let snapshot = names.fresh("snap");

    out.push(Inst::probe(Op::LoadPtr {
        dest: map.clone(),
        global: CVAR_MAP_PTR.to_string(),
    }));
    out.push(Inst::probe(Op::Gep {
        dest: ptr.clone(),
        base: map,
        offset: const_u32(2 * condition.id),
    }));
    out.push(Inst::probe(Op::Cast {
        dest: as_u64_ptr.clone(),
        kind: CastKind::Ptr,
        width: 64,
        value: condition.op1.clone(),
    }));
    out.push(Inst::probe(Op::Load {
        dest: snapshot.clone(),
        width: 64,
        addr: as_u64_ptr,
    }));
    out.push(Inst::probe(Op::Store {
        width: 64,
        value: Value::Local {
            name: snapshot,
            width: Some(64),
        },
        addr: ptr,
    }));
}
