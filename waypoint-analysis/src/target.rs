// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

//! Suspected-vulnerable source locations and their resolution to the IR
//!
//! The target list is a line-oriented CSV produced by the SAST tooling:
//! `tool,filename,line,...,score`. Only the filename, the line and the score
//! in the last field matter here; whatever the producing tool wrote in
//! between is skipped.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};
use tracing::{debug, info};
use waypoint_ir::{view, Module};

/// A source location the fuzzer should reach, scored by the reporting tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub filename: String,
    pub line: u32,
    /// Vulnerability score in `[0, 1]`
    pub score: f64,
}

impl Target {
    /// Parses one CSV row.
    ///
    /// The score is taken from the last field so rows from tools with
    /// different numbers of intermediate columns all parse.
    pub fn from_line(row: &str) -> Result<Self> {
        let fields: Vec<&str> = row.split(',').collect();

        if fields.len() < 4 {
            return Err(Error::MalformedTarget {
                row: row.to_string(),
                reason: "expected at least tool,filename,line,score".to_string(),
            });
        }

        let filename = fields[1].trim().to_string();
        let line = fields[2]
            .trim()
            .parse::<u32>()
            .map_err(|parse_err| Error::MalformedTarget {
                row: row.to_string(),
                reason: format!("line number: {}", parse_err),
            })?;
        let score = fields[fields.len() - 1]
            .trim()
            .parse::<f64>()
            .map_err(|parse_err| Error::MalformedTarget {
                row: row.to_string(),
                reason: format!("score: {}", parse_err),
            })?;

        Ok(Self {
            filename,
            line,
            score,
        })
    }

    /// Loads every row of a target list file, skipping blank lines.
    pub fn load<P>(path: P) -> Result<Vec<Self>>
    where
        P: AsRef<Path>,
    {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let mut targets = Vec::new();

        for row in reader.lines() {
            let row = row?;
            if row.trim().is_empty() {
                continue;
            }
            targets.push(Self::from_line(&row)?);
        }

        info!(
            "Loaded {} targets from {}",
            targets.len(),
            path.as_ref().display()
        );

        Ok(targets)
    }
}

/// A basic block addressed across the whole module
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BbRef {
    pub func: usize,
    pub block: usize,
}

/// Resolved target blocks, keyed in module order
pub type TargetInfos = BTreeMap<BbRef, Target>;

/// Whether a function's source file matches a target filename: equal, or a
/// `/`-bounded suffix of it
fn filename_matches(function_file: &str, target_file: &str) -> bool {
    function_file == target_file || function_file.ends_with(&format!("/{}", target_file))
}

/// Resolves targets to basic blocks.
///
/// Duplicate `(filename, line)` rows collapse into one bucket; each bucket
/// resolves to the first matching non-phi instruction in module order, and
/// its parent block becomes a target block. A bucket with no match at all is
/// fatal. Two buckets landing in the same block keep the first score.
pub fn resolve_targets(module: &Module, targets: &[Target]) -> Result<TargetInfos> {
    let mut buckets: Vec<&Target> = Vec::new();
    for target in targets {
        if !buckets
            .iter()
            .any(|seen| seen.filename == target.filename && seen.line == target.line)
        {
            buckets.push(target);
        }
    }

    let mut infos = TargetInfos::new();

    for target in buckets {
        let mut resolved = None;

        'function: for (func_idx, function) in module.functions.iter().enumerate() {
            if function.is_declaration || !filename_matches(&function.filename, &target.filename) {
                continue;
            }

            for (block_idx, block) in function.blocks.iter().enumerate() {
                for inst in &block.insts {
                    if inst.is_phi() {
                        continue;
                    }
                    if view::target_line(inst) == Some(target.line) {
                        resolved = Some(BbRef {
                            func: func_idx,
                            block: block_idx,
                        });
                        break 'function;
                    }
                }
            }
        }

        let Some(bb) = resolved else {
            return Err(Error::TargetUnresolved {
                filename: target.filename.clone(),
                line: target.line,
            });
        };

        debug!(
            "Target {}:{} resolved to block {:?}",
            target.filename, target.line, bb
        );

        infos.entry(bb).or_insert_with(|| target.clone());
    }

    Ok(infos)
}
