// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::cell::RefCell;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use crate::data::{Dependency, ModuleId, ResolvedProvider, Target};
use crate::descriptor::{ExportSnapshot, ModuleDescriptor};
use crate::graph::ModuleGraph;
use crate::scanner::SourceScan;
use crate::Result;

/// Where a module's files come from.
#[derive(Clone, Debug)]
pub enum ModuleOrigin {
    /// Declared in the workspace tree; has a descriptor on disk and possibly
    /// sources.
    Workspace { dir: PathBuf },
    /// Known only as a cached artifact. Source availability is uncertain.
    Repository { sources: Option<PathBuf> },
}

/// What a module is. Kind-specific fields live on the variant payloads.
pub enum ModuleKind {
    /// A parent grouping child modules; never has sources.
    Aggregate {
        children: RefCell<Vec<Rc<ProjectModule>>>,
    },
    /// An abstract contract, replaced by a concrete implementation when
    /// resolving an executable.
    Interface,
    Concrete {
        /// Name of the interface module this module implements, if any.
        implements: Option<String>,
    },
    /// A concrete module flagged as an entry point.
    Executable { target: Target },
}

/// An interned module. One instance exists per name for the lifetime of the
/// process, so identity comparisons are pointer comparisons.
pub struct ProjectModule {
    name: String,
    id: ModuleId,
    origin: ModuleOrigin,
    kind: ModuleKind,
    descriptor: ModuleDescriptor,
    pub(crate) scan: SourceScan,
    pub(crate) graph: ModuleGraph,
}

impl ProjectModule {
    pub(crate) fn assemble(
        name: String,
        id: ModuleId,
        origin: ModuleOrigin,
        kind: ModuleKind,
        descriptor: ModuleDescriptor,
        scan: SourceScan,
        graph: ModuleGraph,
    ) -> Self {
        Self {
            name,
            id,
            origin,
            kind,
            descriptor,
            scan,
            graph,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    pub fn origin(&self) -> &ModuleOrigin {
        &self.origin
    }

    pub fn kind(&self) -> &ModuleKind {
        &self.kind
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ModuleKind::Aggregate { .. } => "aggregate",
            ModuleKind::Interface => "interface",
            ModuleKind::Concrete { .. } => "concrete",
            ModuleKind::Executable { .. } => "executable",
        }
    }

    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self.kind, ModuleKind::Aggregate { .. })
    }

    pub fn is_interface(&self) -> bool {
        matches!(self.kind, ModuleKind::Interface)
    }

    pub fn is_executable(&self) -> bool {
        matches!(self.kind, ModuleKind::Executable { .. })
    }

    pub fn executable_target(&self) -> Option<&Target> {
        match &self.kind {
            ModuleKind::Executable { target } => Some(target),
            _ => None,
        }
    }

    /// Name of the interface module this module implements, if any.
    pub fn implements_module(&self) -> Option<&str> {
        match &self.kind {
            ModuleKind::Concrete { implements } => implements.as_deref(),
            _ => None,
        }
    }

    /// Tags constraining where this module can run. Empty means universal.
    pub fn target_tags(&self) -> &Target {
        &self.descriptor.target_tags
    }

    /// Root directory of scannable sources, when one may exist.
    pub fn source_dir(&self) -> Option<PathBuf> {
        match &self.origin {
            ModuleOrigin::Workspace { dir } => Some(dir.join("src/main/java")),
            ModuleOrigin::Repository { sources } => sources.clone(),
        }
    }

    /// True for modules that re-implement platform APIs for targets lacking
    /// them. Classification is by name marker or membership in the fixed
    /// per-target emulation tables.
    pub fn is_emulation_module(&self) -> bool {
        self.name.contains("-emul-")
            || self.name.ends_with("-emul")
            || crate::emulation::is_known_emulation_module(&self.name)
    }

    /// Child modules of an aggregate; empty for all other kinds.
    pub fn children(&self) -> Vec<Rc<ProjectModule>> {
        match &self.kind {
            ModuleKind::Aggregate { children } => children.borrow().clone(),
            _ => Vec::new(),
        }
    }

    pub(crate) fn attach_child(&self, child: Rc<ProjectModule>) {
        if let ModuleKind::Aggregate { children } = &self.kind {
            children.borrow_mut().push(child);
        }
    }

    /// This module plus all aggregate descendants.
    pub fn subtree(self: &Rc<Self>) -> Vec<Rc<ProjectModule>> {
        let mut modules = vec![self.clone()];
        let mut index = 0;
        while index < modules.len() {
            let current = modules[index].clone();
            index += 1;
            modules.extend(current.children());
        }
        modules
    }

    /// The finalized direct dependency set written into generated build
    /// files.
    pub fn direct_dependencies(&self) -> Result<Rc<[Dependency]>> {
        self.graph.direct_deps.force()
    }

    /// The finalized transitive dependency set.
    pub fn transitive_dependencies(&self) -> Result<Rc<[Dependency]>> {
        self.graph.transitive_deps.force()
    }

    /// Resolved service points of an executable; empty for every other kind.
    pub fn executable_providers(&self) -> Result<Rc<[ResolvedProvider]>> {
        self.graph.providers.force()
    }

    /// Service interfaces this module's descriptor declares providers for.
    pub fn declared_services(&self) -> &[String] {
        &self.descriptor.provided_services
    }

    /// Packages referenced by this module, from the export snapshot when one
    /// is present and from the source scanner otherwise.
    pub fn used_packages(&self) -> Result<Rc<[String]>> {
        self.scan.used_packages.force()
    }

    pub fn used_required_services(&self) -> Result<Rc<[String]>> {
        self.scan.used_required_services.force()
    }

    pub fn used_optional_services(&self) -> Result<Rc<[String]>> {
        self.scan.used_optional_services.force()
    }

    /// Packages declared by this module's own sources.
    pub fn declared_packages(&self) -> Result<Rc<[String]>> {
        self.scan.declared_packages.force()
    }

    /// Projects the module's current dependency facts into an export
    /// snapshot. Resolving from a captured snapshot reproduces the same
    /// dependency sets, so exporting is a fixed point.
    pub fn capture_snapshot(&self) -> Result<ExportSnapshot> {
        Ok(ExportSnapshot {
            used_packages: self.used_packages()?.to_vec(),
            used_required_services: self.used_required_services()?.to_vec(),
            used_optional_services: self.used_optional_services()?.to_vec(),
            detected_source_deps: self
                .graph
                .detected_source_deps
                .force()?
                .iter()
                .map(|dep| dep.destination.name().to_owned())
                .collect(),
        })
    }
}

impl fmt::Debug for ProjectModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectModule")
            .field("name", &self.name)
            .field("kind", &self.kind_name())
            .finish()
    }
}
