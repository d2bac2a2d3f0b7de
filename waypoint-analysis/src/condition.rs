// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

//! Branch-condition operand analysis
//!
//! For every two-way branch on a comparison the analyzer captures what is
//! being compared, so the fuzzer can observe how far an input is from
//! flipping the branch. Wide integer comparisons and `strcmp` against short
//! string constants are worth recording; everything else produces more noise
//! than signal in the operand map.

use crate::target::BbRef;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use waypoint_ir::{
    view::{find_def_in_block, Cfg},
    Module, Op, Terminator, Value,
};

/// Minimum integer width worth recording
const MIN_INT_WIDTH: u32 = 32;

/// Longest string constant that fits one operand snapshot
const MAX_STR_CONST_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Classification of one comparison operand
pub enum OperandKind {
    /// Not an integer and not part of a string comparison
    None,
    /// Integer of the given bit width
    Int(u32),
    /// The probed side of a string comparison
    Str,
    /// The constant side of a string comparison
    StrConst,
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperandKind::None => write!(f, "none"),
            OperandKind::Int(width) => write!(f, "int{}", width),
            OperandKind::Str => write!(f, "str"),
            OperandKind::StrConst => write!(f, "str_const"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One recorded branch condition
pub struct Condition {
    /// Condition id, starting at 1 in analysis order
    pub id: u32,
    /// The branching block
    pub bb: BbRef,
    pub op1_kind: OperandKind,
    pub op2_kind: OperandKind,
    /// `"var"`, a decimal constant, or the string constant
    pub op1_repr: String,
    pub op2_repr: String,
    /// The operand values the rewriter snapshots at runtime
    pub op1: Value,
    pub op2: Value,
}

impl Condition {
    /// Whether the given side (0 = left, 1 = right) is an integer variable
    /// the rewriter should record
    pub fn records_int_side(&self, side: u8) -> bool {
        let (kind, repr) = if side == 0 {
            (&self.op1_kind, &self.op1_repr)
        } else {
            (&self.op2_kind, &self.op2_repr)
        };
        matches!(kind, OperandKind::Int(_)) && repr == "var"
    }

    /// Whether this is a string comparison whose probed side the rewriter
    /// snapshots through the pointer
    pub fn records_string(&self) -> bool {
        self.op2_kind == OperandKind::StrConst
    }
}

fn operand_kind(value: &Value) -> OperandKind {
    value
        .int_width()
        .map(OperandKind::Int)
        .unwrap_or(OperandKind::None)
}

fn operand_repr(value: &Value) -> String {
    if !value.is_const() {
        "var".to_string()
    } else if let Some(constant) = value.as_const_int() {
        constant.to_string()
    } else {
        "none".to_string()
    }
}

fn wide_enough(value: &Value) -> bool {
    value
        .int_width()
        .map(|width| width >= MIN_INT_WIDTH)
        .unwrap_or(false)
}

/// Walks every two-way branch in the module and collects the conditions
/// worth recording, assigning ids in analysis order.
pub fn analyze_conditions(module: &Module) -> Vec<Condition> {
    let mut conditions = Vec::new();
    let mut next_id = 1;

    for (func_idx, function) in module.functions.iter().enumerate() {
        if function.blocks.is_empty() {
            continue;
        }
        let cfg = Cfg::new(function);

        for (block_idx, block) in function.blocks.iter().enumerate() {
            if cfg.has_single_successor(block_idx) {
                continue;
            }
            let Terminator::Branch { cond, .. } = &block.term else {
                continue;
            };
            let Some(cond_name) = cond.local_name() else {
                continue;
            };
            let Some(def) = find_def_in_block(function, block_idx, cond_name) else {
                continue;
            };
            let Op::Cmp { lhs, rhs, .. } = &def.op else {
                continue;
            };

            let mut op1_kind = operand_kind(lhs);
            let mut op2_kind = operand_kind(rhs);
            let mut op1_repr = operand_repr(lhs);
            let mut op2_repr = operand_repr(rhs);
            let mut op1 = lhs.clone();
            let mut op2 = rhs.clone();
            let mut record = wide_enough(lhs) || wide_enough(rhs);

            // A comparison of a `strcmp` result observes the string compare
            // itself: snapshot the probed pointer against the constant
            if let Some((probed, constant, literal)) = strcmp_operands(module, function, block_idx, lhs)
            {
                op1_kind = OperandKind::Str;
                op1_repr = "var".to_string();
                op2_kind = OperandKind::StrConst;
                op2_repr = literal.to_string();
                op1 = probed;
                op2 = constant;
                record = literal.len() <= MAX_STR_CONST_LEN;
            }

            if record {
                conditions.push(Condition {
                    id: next_id,
                    bb: BbRef {
                        func: func_idx,
                        block: block_idx,
                    },
                    op1_kind,
                    op2_kind,
                    op1_repr,
                    op2_repr,
                    op1,
                    op2,
                });
                next_id += 1;
            }
        }
    }

    debug!("Recorded {} branch conditions", conditions.len());

    conditions
}

/// Matches the `strcmp(probed, "literal")` pattern behind a comparison
/// operand: the operand must be the result of a direct `strcmp` call in the
/// same block whose second argument is a global with a string initialiser.
fn strcmp_operands<'m>(
    module: &'m Module,
    function: &waypoint_ir::Function,
    block_idx: usize,
    operand: &Value,
) -> Option<(Value, Value, &'m str)> {
    let name = operand.local_name()?;
    let def = find_def_in_block(function, block_idx, name)?;
    let Op::Call {
        callee: Some(callee),
        args,
        ..
    } = &def.op
    else {
        return None;
    };
    if callee != "strcmp" || args.len() != 2 {
        return None;
    }
    let Value::Global { name: global } = &args[1] else {
        return None;
    };
    let literal = module.global_string(global)?;

    Some((args[0].clone(), args[1].clone(), literal))
}
