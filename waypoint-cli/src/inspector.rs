// Copyright (C) 2024 Intel Corporation
// SPDX-License-Identifier: Apache-2.0

//! Metadata inspection: module in, JSON out

use crate::args::InspectorArgs;
use anyhow::{Context, Result};
use std::{fs::File, io::BufWriter};
use tracing::info;
use waypoint_ir::{
    ids::assign_block_ids,
    inspect::{func_infos, icfg_infos, Inspection},
    Module,
};

/// Extracts the metadata document and writes it to the output file.
pub fn cli_main(args: InspectorArgs) -> Result<()> {
    crate::init_tracing(args.log_level);

    let mut module = Module::from_file(&args.module)
        .with_context(|| format!("loading {}", args.module.display()))?;
    module.ensure_debug_info()?;

    assign_block_ids(&mut module);

    let inspection = Inspection {
        functions: func_infos(&module),
        icfg: args.icfg.then(|| icfg_infos(&module)),
    };

    let writer = BufWriter::new(
        File::create(&args.output)
            .with_context(|| format!("IO_FAILURE: cannot create {}", args.output.display()))?,
    );
    serde_json::to_writer(writer, &inspection)
        .with_context(|| format!("IO_FAILURE: writing {}", args.output.display()))?;

    info!(
        "Inspection of {} functions written to {}",
        inspection.functions.len(),
        args.output.display()
    );

    Ok(())
}
