// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Target-aware module dependency resolution for multi-runtime application
//! workspaces.
//!
//! A workspace is a tree of framework modules, each described by a
//! `weaver.xml` descriptor. For every module this crate computes the
//! complete, target-aware set of direct and transitive dependencies that
//! downstream generators write into build files: explicit declarations are
//! merged with dependencies detected by scanning Java sources and with
//! service-provider discovery, and executable modules additionally get
//! concrete providers chosen for their service points, interface modules
//! replaced by target-compatible implementations, and per-target emulation
//! modules injected.
//!
//! All per-module results are lazy, named derivations ([`Derivation`]):
//! they materialize on first pull and replay from the cache afterwards, so
//! the many consumers of a module's graph (generators, sibling modules)
//! share one computation.

pub mod data;
pub mod derivation;
pub mod descriptor;
pub mod emulation;
pub mod fetcher;
pub mod graph;
pub mod implement;
pub mod module;
pub mod provider;
pub mod registry;
pub mod scanner;
pub mod workspace;

use std::path::PathBuf;

use thiserror::Error;

pub use crate::data::{Dependency, DependencyKind, ModuleId, ResolvedProvider, Target, TargetTag};
pub use crate::derivation::Derivation;
pub use crate::descriptor::{
    DeclaredDependency, ExportSnapshot, ModuleDescriptor, RepositoryModuleDecl,
    DESCRIPTOR_FILE_NAME,
};
pub use crate::fetcher::{
    ArtifactFetcher, FetchResult, LocalCacheFetcher, RepositoryModuleLoader, ResolveConfig,
};
pub use crate::module::{ModuleKind, ModuleOrigin, ProjectModule};
pub use crate::registry::{Diagnostic, ModuleRegistry};
pub use crate::workspace::{load_workspace, load_workspace_with_fetcher};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to parse descriptor {}: {detail}", path.display())]
    DescriptorParse { path: PathBuf, detail: String },

    #[error("unknown module: {0}")]
    UnknownModule(String),

    #[error("package {package} is exported by multiple modules: {}", modules.join(", "))]
    AmbiguousPackage {
        package: String,
        modules: Vec<String>,
    },

    #[error("cyclic derivation: {0}")]
    CyclicDerivation(String),

    #[error("{op} failed")]
    Io {
        op: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ResolveError>;
