// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::Parser;
use waypoint_cli::{args::InspectorArgs, inspector};

pub fn main() -> Result<()> {
    let args = InspectorArgs::parse();
    inspector::cli_main(args)
}
