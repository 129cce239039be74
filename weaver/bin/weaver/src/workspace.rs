// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Workspace ingestion: walks the module directory tree, interns every
//! descriptor, wires aggregate children, and pre-loads the repository
//! modules declared by the root.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::descriptor::{ModuleDescriptor, DESCRIPTOR_FILE_NAME};
use crate::fetcher::{ArtifactFetcher, LocalCacheFetcher, RepositoryModuleLoader, ResolveConfig};
use crate::module::{ModuleOrigin, ProjectModule};
use crate::registry::ModuleRegistry;
use crate::{ResolveError, Result};

/// Loads the workspace rooted at `root_dir` using the local artifact cache
/// configured in `config`.
pub fn load_workspace(
    registry: &Rc<ModuleRegistry>,
    root_dir: &Path,
    config: &ResolveConfig,
) -> Result<Rc<ProjectModule>> {
    load_workspace_with_fetcher(
        registry,
        root_dir,
        config,
        Box::new(LocalCacheFetcher::new(&config.cache_dir)),
    )
}

/// Like [`load_workspace`], with a caller-supplied artifact fetcher.
pub fn load_workspace_with_fetcher(
    registry: &Rc<ModuleRegistry>,
    root_dir: &Path,
    config: &ResolveConfig,
    fetcher: Box<dyn ArtifactFetcher>,
) -> Result<Rc<ProjectModule>> {
    let root = load_module_tree(registry, root_dir)?;
    registry.register_root(&root);

    let declarations = root.descriptor().repository_modules.clone();
    if !declarations.is_empty() {
        let loader =
            RepositoryModuleLoader::new(registry.clone(), fetcher, config.allow_missing_snapshots);
        for declaration in &declarations {
            loader.load(declaration)?;
        }
    }

    tracing::info!(
        "loaded workspace {} with {} modules",
        root.name(),
        registry.modules().len()
    );
    Ok(root)
}

/// Recursively loads a module directory. Child directories containing a
/// descriptor become aggregate children, visited in name order.
fn load_module_tree(registry: &Rc<ModuleRegistry>, dir: &Path) -> Result<Rc<ProjectModule>> {
    let descriptor = ModuleDescriptor::parse_file(&dir.join(DESCRIPTOR_FILE_NAME))?;
    let fallback_name = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_owned());
    let module = registry.intern(
        &fallback_name,
        descriptor,
        ModuleOrigin::Workspace {
            dir: dir.to_owned(),
        },
    )?;

    if module.is_aggregate() {
        for child_dir in child_module_dirs(dir)? {
            let child = load_module_tree(registry, &child_dir)?;
            module.attach_child(child);
        }
    }
    Ok(module)
}

fn child_module_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let read_err = |source: std::io::Error| ResolveError::Io {
        op: format!("list workspace directory {}", dir.display()),
        source,
    };

    let mut child_dirs = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if path.is_dir() && path.join(DESCRIPTOR_FILE_NAME).is_file() {
            child_dirs.push(path);
        }
    }
    child_dirs.sort();
    Ok(child_dirs)
}
