// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

//! Function and basic-block metadata extraction
//!
//! Downstream tooling (target selection, triage dashboards) joins analysis
//! artefacts back to source locations through this metadata, so the
//! extraction order and the id space must match the analyses exactly: both
//! iterate the module in declaration order over the ids assigned by
//! [`crate::ids::assign_block_ids`].

use crate::{
    callgraph::CallGraph,
    module::{Module, Op, Terminator},
    types::{line_range, BbId, LineRange},
    view,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Inclusive line span of a function or block
pub struct LineSpan {
    pub start: u32,
    pub end: u32,
}

impl From<LineRange> for LineSpan {
    fn from(range: LineRange) -> Self {
        Self {
            start: range.0,
            end: range.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Source location of a block
pub struct BlockLocation {
    pub line: LineSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Source location of a function, with its entry-reachability flag
pub struct FunctionLocation {
    pub filename: String,
    pub line: LineSpan,
    pub reachable_from_main: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Metadata for one basic block
pub struct BlockInfo {
    pub id: BbId,
    pub location: BlockLocation,
    #[serde(rename = "LoC")]
    pub loc: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Metadata for one function definition
pub struct FuncInfo {
    pub name: String,
    pub location: FunctionLocation,
    #[serde(rename = "LoC")]
    pub loc: usize,
    pub basic_blocks: Vec<BlockInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// One source block and its inter-procedural successors
pub struct IcfgEdge {
    pub src: BbId,
    pub dst: Vec<BbId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// The full inspection document
pub struct Inspection {
    pub functions: Vec<FuncInfo>,
    #[serde(rename = "iCFG", default, skip_serializing_if = "Option::is_none")]
    pub icfg: Option<Vec<IcfgEdge>>,
}

/// Extracts per-function metadata for every definition with line info.
///
/// Functions without any recorded line (and declarations) are skipped, as
/// are blocks without line info inside an otherwise covered function.
pub fn func_infos(module: &Module) -> Vec<FuncInfo> {
    let callgraph = CallGraph::build(module);
    let reachable = module
        .function_index("main")
        .map(|main| callgraph.reachable_from(main))
        .unwrap_or_else(|| vec![false; module.functions.len()]);

    let mut infos = Vec::new();

    for (func_idx, function) in module.functions.iter().enumerate() {
        if function.is_declaration {
            continue;
        }

        let mut func_lines = crate::types::Lines::new();
        let mut blocks = Vec::new();

        for (block_idx, block) in function.blocks.iter().enumerate() {
            let lines = view::block_lines(function, block_idx);
            let Some(range) = line_range(&lines) else {
                continue;
            };
            let Some(id) = block.id else {
                continue;
            };

            blocks.push(BlockInfo {
                id,
                location: BlockLocation { line: range.into() },
                loc: lines.len(),
            });
            func_lines.extend(lines);
        }

        let Some(range) = line_range(&func_lines) else {
            continue;
        };

        infos.push(FuncInfo {
            name: function.name.clone(),
            location: FunctionLocation {
                filename: function.filename.clone(),
                line: range.into(),
                reachable_from_main: reachable[func_idx],
            },
            loc: func_lines.len(),
            basic_blocks: blocks,
        });
    }

    infos
}

/// Builds the inter-procedural CFG edge map over block ids: intra-procedural
/// successor edges, call edges into the callee entry block, and return edges
/// from the callee's exit blocks back to the calling block.
pub fn icfg_infos(module: &Module) -> Vec<IcfgEdge> {
    let mut edges: BTreeMap<BbId, BTreeSet<BbId>> = BTreeMap::new();

    for function in &module.functions {
        for (block_idx, block) in function.blocks.iter().enumerate() {
            let Some(src) = block.id else {
                continue;
            };

            for succ in block.term.successors() {
                if let Some(dst) = function.blocks[succ].id {
                    edges.entry(src).or_default().insert(dst);
                }
            }

            for inst in &block.insts {
                let Op::Call {
                    callee: Some(name), ..
                } = &inst.op
                else {
                    continue;
                };
                let Some(callee) = module
                    .functions
                    .iter()
                    .find(|function| &function.name == name)
                else {
                    continue;
                };
                let Some(entry) = callee.blocks.first().and_then(|block| block.id) else {
                    continue;
                };

                edges.entry(src).or_default().insert(entry);

                for callee_block in &callee.blocks {
                    if matches!(callee_block.term, Terminator::Return) {
                        if let Some(exit) = callee_block.id {
                            edges.entry(exit).or_default().insert(src);
                        }
                    }
                }
            }
        }
    }

    edges
        .into_iter()
        .map(|(src, dst)| IcfgEdge {
            src,
            dst: dst.into_iter().collect(),
        })
        .collect()
}
