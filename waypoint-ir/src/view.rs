// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

//! Per-function control-flow adjacency and source-location helpers

use crate::{
    module::{Function, Inst, Op},
    types::{BlockIdx, LineNumber, Lines},
};

/// Predecessor/successor adjacency for one function, derived from the block
/// terminators once and then queried by index
#[derive(Debug, Clone)]
pub struct Cfg {
    preds: Vec<Vec<BlockIdx>>,
    succs: Vec<Vec<BlockIdx>>,
}

impl Cfg {
    pub fn new(function: &Function) -> Self {
        let count = function.blocks.len();
        let mut preds = vec![Vec::new(); count];
        let mut succs = vec![Vec::new(); count];

        for (idx, block) in function.blocks.iter().enumerate() {
            for succ in block.term.successors() {
                succs[idx].push(succ);
                preds[succ].push(idx);
            }
        }

        Self { preds, succs }
    }

    pub fn len(&self) -> usize {
        self.succs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.succs.is_empty()
    }

    pub fn preds(&self, block: BlockIdx) -> &[BlockIdx] {
        &self.preds[block]
    }

    pub fn succs(&self, block: BlockIdx) -> &[BlockIdx] {
        &self.succs[block]
    }

    /// Whether the block transfers control to exactly one place
    pub fn has_single_successor(&self, block: BlockIdx) -> bool {
        self.succs[block].len() == 1
    }
}

/// Finds the instruction defining `name` inside one block.
///
/// Branch conditions reference the comparison computed earlier in the same
/// block; a lookup scoped to the block is all the condition analysis needs.
pub fn find_def_in_block<'f>(function: &'f Function, block: BlockIdx, name: &str) -> Option<&'f Inst> {
    function.blocks[block]
        .insts
        .iter()
        .find(|inst| inst.op.dest() == Some(name))
}

/// Source lines covered by a block, filtered the way the frontend records
/// them: zero lines are meaningless, and lines before the function's first
/// line belong to macro expansions outside the subprogram scope.
pub fn block_lines(function: &Function, block: BlockIdx) -> Lines {
    let first_line = function.line.unwrap_or(0);

    function.blocks[block]
        .insts
        .iter()
        .filter_map(|inst| inst.line)
        .filter(|line| *line > 0 && *line >= first_line)
        .collect()
}

/// The `{ ln: N fl: file }` location string for a block, taken from its
/// first instruction with line info; `{ }` when the block has none
pub fn block_debug_loc(function: &Function, block: BlockIdx) -> String {
    let first_line = function.line.unwrap_or(0);

    function.blocks[block]
        .insts
        .iter()
        .filter_map(|inst| inst.line)
        .find(|line| *line > 0 && *line >= first_line)
        .map(|line| debug_loc(line, &function.filename))
        .unwrap_or_else(|| "{ }".to_string())
}

/// The location string of the function itself
pub fn function_debug_loc(function: &Function) -> String {
    function
        .line
        .map(|line| debug_loc(line, &function.filename))
        .unwrap_or_else(|| "{ }".to_string())
}

fn debug_loc(line: LineNumber, filename: &str) -> String {
    format!("{{ ln: {} fl: {} }}", line, filename)
}

/// The source line a target entry matches an instruction on.
///
/// Stack slots carry the declared variable's line instead of an instruction
/// line, mirroring how the frontend resolves `dbg.declare` records.
pub fn target_line(inst: &Inst) -> Option<LineNumber> {
    match &inst.op {
        Op::Alloca { decl_line, .. } => *decl_line,
        _ => inst.line,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::module::{Block, Terminator, Value};

    fn local(name: &str) -> Value {
        Value::Local {
            name: name.to_string(),
            width: Some(32),
        }
    }

    fn function() -> Function {
        // 0 -> {1, 2}, 1 -> 3, 2 -> 3, 3 -> return
        Function {
            name: "f".to_string(),
            filename: "f.c".to_string(),
            line: Some(10),
            is_declaration: false,
            blocks: vec![
                Block {
                    id: None,
                    insts: vec![Inst::with_line(Op::Other, 10)],
                    term: Terminator::Branch {
                        cond: local("c"),
                        then_dest: 1,
                        else_dest: 2,
                    },
                },
                Block {
                    id: None,
                    insts: vec![Inst::with_line(Op::Other, 11)],
                    term: Terminator::Jump { dest: 3 },
                },
                Block {
                    id: None,
                    insts: vec![Inst::with_line(Op::Other, 12)],
                    term: Terminator::Jump { dest: 3 },
                },
                Block {
                    id: None,
                    insts: vec![],
                    term: Terminator::Return,
                },
            ],
        }
    }

    #[test]
    fn adjacency_matches_terminators() {
        let function = function();
        let cfg = Cfg::new(&function);

        assert_eq!(cfg.succs(0), &[1, 2]);
        assert_eq!(cfg.preds(3), &[1, 2]);
        assert!(!cfg.has_single_successor(0));
        assert!(cfg.has_single_successor(1));
        assert!(!cfg.has_single_successor(3));
    }

    #[test]
    fn debug_loc_uses_first_line_in_scope() {
        let mut function = function();
        assert_eq!(block_debug_loc(&function, 2), "{ ln: 12 fl: f.c }");
        assert_eq!(block_debug_loc(&function, 3), "{ }");

        // A line before the subprogram start is out of scope
        function.blocks[1].insts[0].line = Some(3);
        assert_eq!(block_debug_loc(&function, 1), "{ }");
        assert!(block_lines(&function, 1).is_empty());
    }
}
