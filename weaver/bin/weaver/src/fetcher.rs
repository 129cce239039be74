// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Repository-module loading through the artifact fetcher.
//!
//! Repository modules are only present as cached artifacts; their descriptor
//! (and, when no export snapshot is embedded, their source tree) is obtained
//! through the [`ArtifactFetcher`] seam. Download and unpacking live behind
//! that seam; this crate only resolves paths.

use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::data::ModuleId;
use crate::descriptor::{ModuleDescriptor, RepositoryModuleDecl, DESCRIPTOR_FILE_NAME};
use crate::module::{ModuleOrigin, ProjectModule};
use crate::registry::ModuleRegistry;
use crate::{ResolveError, Result};

/// Artifact classifier of the descriptor file published next to a module.
pub const DESCRIPTOR_CLASSIFIER: &str = "descriptor";

/// Artifact classifier of a module's source tree.
pub const SOURCES_CLASSIFIER: &str = "sources";

/// Caller-supplied configuration for resolution.
#[derive(Clone, Debug)]
pub struct ResolveConfig {
    /// Root of the local artifact cache.
    pub cache_dir: PathBuf,
    /// When set, a repository module whose descriptor or sources cannot be
    /// fetched contributes empty data instead of failing the run.
    pub allow_missing_snapshots: bool,
}

/// Result of one fetch attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FetchResult {
    Found(PathBuf),
    NotFound,
}

/// Obtains artifacts by coordinates. Implemented over the local cache here;
/// remote-downloading implementations plug in through the same trait.
pub trait ArtifactFetcher {
    fn fetch(
        &self,
        group: &str,
        artifact: &str,
        version: &str,
        classifier: Option<&str>,
    ) -> Result<FetchResult>;
}

/// Resolves artifacts inside a local cache directory laid out as
/// `<cache>/<group>/<artifact>/<version>/<artifact>-<version>[-<classifier>]`,
/// where descriptor artifacts are `.xml` files and source artifacts are
/// extracted directories.
pub struct LocalCacheFetcher {
    cache_dir: PathBuf,
}

impl LocalCacheFetcher {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }
}

impl ArtifactFetcher for LocalCacheFetcher {
    fn fetch(
        &self,
        group: &str,
        artifact: &str,
        version: &str,
        classifier: Option<&str>,
    ) -> Result<FetchResult> {
        let dir = self.cache_dir.join(group).join(artifact).join(version);
        let base = match classifier {
            Some(classifier) => format!("{artifact}-{version}-{classifier}"),
            None => format!("{artifact}-{version}"),
        };
        for candidate in [dir.join(format!("{base}.xml")), dir.join(&base)] {
            if candidate.exists() {
                tracing::debug!("artifact cache hit: {}", candidate.display());
                return Ok(FetchResult::Found(candidate));
            }
        }
        Ok(FetchResult::NotFound)
    }
}

/// Interns repository modules declared by the workspace root.
pub struct RepositoryModuleLoader {
    registry: Rc<ModuleRegistry>,
    fetcher: Box<dyn ArtifactFetcher>,
    allow_missing_snapshots: bool,
}

impl RepositoryModuleLoader {
    pub fn new(
        registry: Rc<ModuleRegistry>,
        fetcher: Box<dyn ArtifactFetcher>,
        allow_missing_snapshots: bool,
    ) -> Self {
        Self {
            registry,
            fetcher,
            allow_missing_snapshots,
        }
    }

    /// Loads a repository module: fetches its descriptor, and its sources
    /// only when the descriptor carries no export snapshot. Idempotent by
    /// module name.
    pub fn load(&self, decl: &RepositoryModuleDecl) -> Result<Rc<ProjectModule>> {
        if let Some(existing) = self.registry.find(&decl.name) {
            return Ok(existing);
        }
        let id = &decl.id;

        let mut descriptor = match self.fetch_descriptor(id)? {
            Some(descriptor) => descriptor,
            None => {
                tracing::warn!("no descriptor artifact for {id}; treating as empty");
                ModuleDescriptor::default()
            }
        };
        if descriptor.id.is_none() {
            descriptor.id = Some(id.clone());
        }

        // With a snapshot in hand the sources are never needed.
        let sources = if descriptor.has_export_snapshot() {
            None
        } else {
            self.fetch_sources(id)?
        };

        self.registry.intern(
            &decl.name,
            descriptor,
            ModuleOrigin::Repository { sources },
        )
    }

    fn fetch_descriptor(&self, id: &ModuleId) -> Result<Option<ModuleDescriptor>> {
        let fetched = self
            .fetcher
            .fetch(&id.group, &id.artifact, &id.version, Some(DESCRIPTOR_CLASSIFIER));
        let path = match self.recover(fetched, "descriptor", id)? {
            Some(path) => path,
            None => return Ok(None),
        };
        let file = if path.is_dir() {
            path.join(DESCRIPTOR_FILE_NAME)
        } else {
            path
        };
        ModuleDescriptor::parse_file(&file).map(Some)
    }

    fn fetch_sources(&self, id: &ModuleId) -> Result<Option<PathBuf>> {
        let fetched = self
            .fetcher
            .fetch(&id.group, &id.artifact, &id.version, Some(SOURCES_CLASSIFIER));
        self.recover(fetched, "sources", id)
    }

    /// Applies the `allow_missing_snapshots` policy to a fetch outcome:
    /// failures and misses degrade to `None` when allowed, otherwise a miss
    /// is an I/O error.
    fn recover(
        &self,
        fetched: Result<FetchResult>,
        what: &str,
        id: &ModuleId,
    ) -> Result<Option<PathBuf>> {
        match fetched {
            Ok(FetchResult::Found(path)) => Ok(Some(path)),
            Ok(FetchResult::NotFound) => {
                if self.allow_missing_snapshots {
                    tracing::debug!("{what} artifact for {id} not found; continuing without it");
                    Ok(None)
                } else {
                    Err(ResolveError::Io {
                        op: format!("fetch {what} artifact for {id}"),
                        source: io::Error::new(io::ErrorKind::NotFound, "artifact not found"),
                    })
                }
            }
            Err(err) => {
                if self.allow_missing_snapshots {
                    tracing::warn!("failed to fetch {what} artifact for {id}: {err}");
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }
}
