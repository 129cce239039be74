// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Process-wide store of interned modules and its secondary indexes.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::data::{ModuleId, Target};
use crate::descriptor::ModuleDescriptor;
use crate::graph::ModuleGraph;
use crate::module::{ModuleKind, ModuleOrigin, ProjectModule};
use crate::scanner::SourceScan;
use crate::{ResolveError, Result};

/// A recoverable resolution finding. Diagnostics are warnings: the affected
/// entry is omitted from outputs, but resolution continues.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Diagnostic {
    /// No provider was found for a required service interface in any scope.
    UnresolvedRequiredService { interface: String, module: String },
    /// An interface module has no concrete implementation compatible with
    /// the executable's target; the interface dependency is kept.
    MissingInterfaceImplementation { interface: String, target: Target },
}

struct PackageEntry {
    module: Rc<ProjectModule>,
    /// True when the module's descriptor declares the package as exported,
    /// as opposed to the package merely appearing in its sources.
    exported: bool,
}

/// Interns modules by name and answers lookups by name, by declared Java
/// package, and by provided service interface.
///
/// The registry is mutated during descriptor ingestion only; iteration over
/// the indexes is name-sorted so that results feeding resolution tie-breaks
/// are deterministic.
pub struct ModuleRegistry {
    modules: RefCell<BTreeMap<String, Rc<ProjectModule>>>,
    package_index: RefCell<BTreeMap<String, PackageEntry>>,
    service_index: RefCell<BTreeMap<String, Vec<Rc<ProjectModule>>>>,
    roots: RefCell<Vec<Rc<ProjectModule>>>,
    diagnostics: RefCell<Vec<Diagnostic>>,
}

impl ModuleRegistry {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            modules: RefCell::new(BTreeMap::new()),
            package_index: RefCell::new(BTreeMap::new()),
            service_index: RefCell::new(BTreeMap::new()),
            roots: RefCell::new(Vec::new()),
            diagnostics: RefCell::new(Vec::new()),
        })
    }

    /// Interns a module, idempotently by name. The descriptor's own `<name>`
    /// wins over `fallback_name` (usually the directory name).
    pub fn intern(
        self: &Rc<Self>,
        fallback_name: &str,
        descriptor: ModuleDescriptor,
        origin: ModuleOrigin,
    ) -> Result<Rc<ProjectModule>> {
        let name = descriptor
            .name
            .clone()
            .unwrap_or_else(|| fallback_name.to_owned());
        if let Some(existing) = self.find(&name) {
            return Ok(existing);
        }

        let kind = if descriptor.is_aggregate() {
            ModuleKind::Aggregate {
                children: RefCell::new(Vec::new()),
            }
        } else if descriptor.is_interface() {
            ModuleKind::Interface
        } else if let Some(target) = &descriptor.executable_target {
            ModuleKind::Executable {
                target: target.clone(),
            }
        } else {
            ModuleKind::Concrete {
                implements: descriptor.implements_module.clone(),
            }
        };

        let id = descriptor.id.clone().unwrap_or_else(|| ModuleId {
            group: String::new(),
            artifact: name.clone(),
            version: String::new(),
        });

        let registry = Rc::downgrade(self);
        let module = Rc::new_cyclic(|weak| {
            ProjectModule::assemble(
                name.clone(),
                id,
                origin,
                kind,
                descriptor,
                SourceScan::new(&name, weak.clone()),
                ModuleGraph::new(&name, registry, weak.clone()),
            )
        });

        self.modules
            .borrow_mut()
            .insert(name.clone(), module.clone());
        self.index_exported_packages(&module)?;
        self.index_provided_services(&module);
        tracing::debug!("interned module {name}");
        Ok(module)
    }

    fn index_exported_packages(&self, module: &Rc<ProjectModule>) -> Result<()> {
        let mut index = self.package_index.borrow_mut();
        for package in &module.descriptor().exported_packages {
            let existing = index
                .get(package)
                .map(|entry| (entry.module.name().to_owned(), entry.exported));
            match existing {
                Some((existing_name, true)) => {
                    if existing_name != module.name() {
                        let mut modules = vec![existing_name, module.name().to_owned()];
                        modules.sort();
                        return Err(ResolveError::AmbiguousPackage {
                            package: package.clone(),
                            modules,
                        });
                    }
                }
                // An explicit export takes the slot over a module that
                // merely contains the package in source form.
                _ => {
                    index.insert(
                        package.clone(),
                        PackageEntry {
                            module: module.clone(),
                            exported: true,
                        },
                    );
                }
            }
        }
        Ok(())
    }

    fn index_provided_services(&self, module: &Rc<ProjectModule>) {
        let mut index = self.service_index.borrow_mut();
        for service in module.declared_services() {
            let providers = index.entry(service.clone()).or_default();
            if !providers.iter().any(|p| p.name() == module.name()) {
                providers.push(module.clone());
            }
        }
    }

    pub fn find(&self, name: &str) -> Option<Rc<ProjectModule>> {
        self.modules.borrow().get(name).cloned()
    }

    /// Like [`find`](Self::find), but a missing module is an error.
    pub fn require(&self, name: &str) -> Result<Rc<ProjectModule>> {
        self.find(name)
            .ok_or_else(|| ResolveError::UnknownModule(name.to_owned()))
    }

    /// Modules declaring a provider for the given service interface, sorted
    /// by module name.
    pub fn find_providing(&self, service: &str) -> Vec<Rc<ProjectModule>> {
        let mut providers = self
            .service_index
            .borrow()
            .get(service)
            .cloned()
            .unwrap_or_default();
        providers.sort_by(|a, b| a.name().cmp(b.name()));
        providers
    }

    /// Finds the module declaring the given Java package.
    ///
    /// Exported packages recorded during ingestion answer immediately.
    /// Otherwise modules are consulted in name order for packages contained
    /// in their sources, and the first hit is cached. An exported claim
    /// interned later still overrides a cached contained claim.
    pub fn find_declaring_package(&self, package: &str) -> Result<Option<Rc<ProjectModule>>> {
        if let Some(entry) = self.package_index.borrow().get(package) {
            return Ok(Some(entry.module.clone()));
        }

        for module in self.modules() {
            if module.is_aggregate() {
                continue;
            }
            if module.declared_packages()?.iter().any(|p| p == package) {
                self.package_index
                    .borrow_mut()
                    .entry(package.to_owned())
                    .or_insert(PackageEntry {
                        module: module.clone(),
                        exported: false,
                    });
                return Ok(Some(module));
            }
        }
        Ok(None)
    }

    /// Attaches a module subtree as a well-known root.
    pub fn register_root(&self, root: &Rc<ProjectModule>) {
        let mut roots = self.roots.borrow_mut();
        if !roots.iter().any(|r| r.name() == root.name()) {
            roots.push(root.clone());
        }
    }

    /// Registered roots, in registration order. The first root is the
    /// workspace root.
    pub fn roots(&self) -> Vec<Rc<ProjectModule>> {
        self.roots.borrow().clone()
    }

    /// Snapshot of all interned modules, sorted by name.
    pub fn modules(&self) -> Vec<Rc<ProjectModule>> {
        self.modules.borrow().values().cloned().collect()
    }

    /// Records a recoverable resolution finding. Duplicates are collapsed.
    pub fn report(&self, diagnostic: Diagnostic) {
        let mut diagnostics = self.diagnostics.borrow_mut();
        if diagnostics.contains(&diagnostic) {
            return;
        }
        match &diagnostic {
            Diagnostic::UnresolvedRequiredService { interface, module } => {
                tracing::warn!("no provider found for required service {interface} (resolving {module})");
            }
            Diagnostic::MissingInterfaceImplementation { interface, target } => {
                tracing::warn!("no implementation of interface module {interface} for target {target}");
            }
        }
        diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow().clone()
    }
}
