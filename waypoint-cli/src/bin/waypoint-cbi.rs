// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::Parser;
use waypoint_cli::{analyzer, args::AnalyzerArgs};

pub fn main() -> Result<()> {
    let args = AnalyzerArgs::parse();
    analyzer::cli_main(args)
}
