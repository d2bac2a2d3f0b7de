// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

//! Module-wide basic block id assignment
//!
//! Ids are handed out in a single pass over the module in declaration order,
//! before any analysis runs. They are dense, unique, and stored inside the
//! block so they survive rewriting and a store/load round trip.

use crate::{module::Module, types::BbId};

/// Assigns a dense id to every basic block in the module.
///
/// Returns the number of ids handed out; the highest id is the count minus
/// one. Any pre-existing ids are overwritten, so re-running the pass on an
/// already tagged module is a no-op.
pub fn assign_block_ids(module: &mut Module) -> u32 {
    let mut next: BbId = 0;

    for function in &mut module.functions {
        for block in &mut function.blocks {
            block.id = Some(next);
            next += 1;
        }
    }

    next
}
