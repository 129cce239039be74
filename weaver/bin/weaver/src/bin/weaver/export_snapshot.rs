// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::rc::Rc;

use anyhow::Result;

use weaver::ModuleRegistry;

#[derive(clap::Args, Debug)]
pub struct Args {
    /// Module whose dependency facts to export.
    #[arg(value_name = "MODULE")]
    pub module: String,
}

/// Prints the `<export-snapshot>` fragment for a module, ready to embed in
/// the descriptor published alongside its artifact.
pub fn export_snapshot_main(registry: &Rc<ModuleRegistry>, args: Args) -> Result<()> {
    let module = registry.require(&args.module)?;
    let snapshot = module.capture_snapshot()?;
    println!("{}", snapshot.to_xml());
    Ok(())
}
