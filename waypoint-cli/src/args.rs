// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

//! Argument definitions for both binaries

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser, Debug)]
/// Analyze target distances and rewrite the module with directed-fuzzing
/// instrumentation.
///
/// Produces `distance.txt`, `functions.txt`, `targets.txt`,
/// `condition_info.txt`, `dm.csv` and the rewritten module in the working
/// directory.
pub struct AnalyzerArgs {
    /// Module to analyze, as exported by the bitcode frontend
    pub module: PathBuf,
    #[arg(short, long)]
    /// Target list: CSV rows of `tool,filename,line,...,score`
    pub targets: PathBuf,
    #[arg(short, long, default_value_t = LevelFilter::INFO)]
    /// Logging level
    pub log_level: LevelFilter,
}

#[derive(Parser, Debug)]
/// Dump function and basic-block metadata of a module as JSON.
pub struct InspectorArgs {
    /// Module to inspect, as exported by the bitcode frontend
    pub module: PathBuf,
    /// Output JSON file
    pub output: PathBuf,
    #[arg(long)]
    /// Include the inter-procedural CFG edges in the output
    pub icfg: bool,
    #[arg(short, long, default_value_t = LevelFilter::WARN)]
    /// Logging level
    pub log_level: LevelFilter,
}
