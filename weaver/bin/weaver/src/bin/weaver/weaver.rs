// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::env::current_dir;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use weaver::{load_workspace, ModuleRegistry, ResolveConfig, DESCRIPTOR_FILE_NAME};

#[derive(Parser, Debug)]
#[command(name = "weaver")]
#[command(about = "Resolves module dependency graphs for multi-target workspaces", long_about = None)]
pub struct Args {
    /// Path to the workspace root directory.
    /// If unset, it is inferred from the current directory.
    #[arg(short = 'w', long, value_name = "DIR")]
    workspace: Option<PathBuf>,

    /// Local artifact cache directory.
    /// Defaults to `.weaver/cache` under the workspace root.
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Treat repository modules with unfetchable descriptors or sources as
    /// contributing empty data instead of failing.
    #[arg(long, default_value_t = false)]
    allow_missing_snapshots: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Dumps resolved dependency information of modules.
    DumpModule {
        #[command(flatten)]
        args: crate::dump_module::Args,
    },
    /// Lists all modules known to the registry.
    ListModules,
    /// Prints an export snapshot of a module's current dependency facts.
    ExportSnapshot {
        #[command(flatten)]
        args: crate::export_snapshot::Args,
    },
}

fn default_workspace_dir() -> Result<PathBuf> {
    for dir in current_dir()?.ancestors() {
        if dir.join(DESCRIPTOR_FILE_NAME).exists() {
            return Ok(dir.to_owned());
        }
    }
    bail!(
        "Cannot locate a workspace root ({DESCRIPTOR_FILE_NAME}) from the current directory; \
         consider passing --workspace"
    );
}

pub fn weaver_main(args: Args) -> Result<()> {
    let workspace_dir = match args.workspace {
        Some(dir) => dir,
        None => default_workspace_dir()?,
    };
    let cache_dir = args
        .cache_dir
        .unwrap_or_else(|| workspace_dir.join(".weaver/cache"));
    let config = ResolveConfig {
        cache_dir,
        allow_missing_snapshots: args.allow_missing_snapshots,
    };

    let registry = ModuleRegistry::new();
    load_workspace(&registry, &workspace_dir, &config)
        .with_context(|| format!("Failed to load workspace at {}", workspace_dir.display()))?;

    match args.command {
        Commands::DumpModule { args: local_args } => {
            crate::dump_module::dump_module_main(&registry, local_args)?;
        }
        Commands::ListModules => {
            crate::list_modules::list_modules_main(&registry);
        }
        Commands::ExportSnapshot { args: local_args } => {
            crate::export_snapshot::export_snapshot_main(&registry, local_args)?;
        }
    }
    Ok(())
}
