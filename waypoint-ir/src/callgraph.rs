// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

//! Static call graph over statically-known call sites

use crate::module::{Module, Op};
use std::collections::BTreeMap;

/// Caller/callee adjacency keyed by function index.
///
/// Only calls whose callee the frontend resolved statically contribute
/// edges; indirect calls are invisible here, which keeps the distance
/// analysis conservative (an indirect path can only make a function look
/// farther away, never closer than it is).
#[derive(Debug, Clone)]
pub struct CallGraph {
    callers: Vec<Vec<usize>>,
    callees: Vec<Vec<usize>>,
}

impl CallGraph {
    pub fn build(module: &Module) -> Self {
        let index: BTreeMap<&str, usize> = module
            .functions
            .iter()
            .enumerate()
            .map(|(idx, function)| (function.name.as_str(), idx))
            .collect();

        let count = module.functions.len();
        let mut callers = vec![Vec::new(); count];
        let mut callees = vec![Vec::new(); count];

        for (caller, function) in module.functions.iter().enumerate() {
            for block in &function.blocks {
                for inst in &block.insts {
                    if let Op::Call {
                        callee: Some(name), ..
                    } = &inst.op
                    {
                        if let Some(&callee) = index.get(name.as_str()) {
                            if !callees[caller].contains(&callee) {
                                callees[caller].push(callee);
                            }
                            if !callers[callee].contains(&caller) {
                                callers[callee].push(caller);
                            }
                        }
                    }
                }
            }
        }

        Self { callers, callees }
    }

    /// Functions with a call site resolving to `function`
    pub fn callers_of(&self, function: usize) -> &[usize] {
        &self.callers[function]
    }

    /// Functions `function` calls
    pub fn callees_of(&self, function: usize) -> &[usize] {
        &self.callees[function]
    }

    /// Forward reachability over call edges, used for the
    /// `reachable_from_main` inspection flag
    pub fn reachable_from(&self, start: usize) -> Vec<bool> {
        let mut reachable = vec![false; self.callees.len()];
        let mut worklist = vec![start];
        reachable[start] = true;

        while let Some(function) = worklist.pop() {
            for &callee in &self.callees[function] {
                if !reachable[callee] {
                    reachable[callee] = true;
                    worklist.push(callee);
                }
            }
        }

        reachable
    }
}
