// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

//! Shared index and line-number types

use std::collections::BTreeSet;

/// A 1-based source line number as recorded in the debug info
pub type LineNumber = u32;

/// A set of source line numbers, ordered so ranges are cheap to compute
pub type Lines = BTreeSet<LineNumber>;

/// An inclusive `(first, last)` source line range
pub type LineRange = (LineNumber, LineNumber);

/// Module-wide dense basic block id, assigned once before any analysis runs
pub type BbId = u32;

/// Position of a basic block inside its owning function
pub type BlockIdx = usize;

/// Computes the inclusive range spanned by a set of line numbers.
///
/// Returns `None` for an empty set.
pub fn line_range(lines: &Lines) -> Option<LineRange> {
    match (lines.iter().next(), lines.iter().next_back()) {
        (Some(first), Some(last)) => Some((*first, *last)),
        _ => None,
    }
}
