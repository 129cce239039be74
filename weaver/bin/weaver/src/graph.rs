// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Per-module dependency graph construction.
//!
//! Each module carries a pipeline of lazy derivations, layered so that every
//! layer is defined only in terms of earlier layers (of this module or of
//! the dependency destinations):
//!
//! 1. `detected_source_deps` - from the scanner or the export snapshot
//! 2. `source_direct_deps` - explicit + detected + undetected
//! 3. `direct_deps_pre_emulation` - plus resource/application/plugin
//! 4. `transitive_pre_emulation` - closure of (3)
//! 5. `emulation_deps` - per-target injections (executables only)
//! 6. `auto_injected_modules` - package-triggered injections (executables)
//! 7. `required_provider_scope` / `optional_provider_scope`
//! 8. `implicit_provider_deps` - chosen service providers
//! 9. `direct_deps_pre_finalize` - (3) + (5) + (8)
//! 10. `transitive_pre_finalize` - closure of (9)
//! 11. `direct_deps` / `transitive_deps` - finalization
//!
//! Nothing here computes eagerly; a derivation materializes the first time
//! a consumer pulls it and is replayed afterwards.

use std::collections::{HashSet, VecDeque};
use std::rc::{Rc, Weak};

use itertools::Itertools;

use crate::data::{Dependency, DependencyKind, ResolvedProvider, Target};
use crate::derivation::Derivation;
use crate::descriptor::{package_pattern_matches, DeclaredDependency};
use crate::module::ProjectModule;
use crate::registry::ModuleRegistry;
use crate::{emulation, implement, provider, Result};

/// The layered derivations of one module. Created dormant at module
/// construction; immutable once materialized.
pub(crate) struct ModuleGraph {
    pub(crate) detected_source_deps: Derivation<Dependency>,
    pub(crate) source_direct_deps: Derivation<Dependency>,
    pub(crate) direct_deps_pre_emulation: Derivation<Dependency>,
    pub(crate) transitive_pre_emulation: Derivation<Dependency>,
    pub(crate) emulation_deps: Derivation<Dependency>,
    pub(crate) auto_injected_modules: Derivation<Rc<ProjectModule>>,
    pub(crate) required_provider_scope: Derivation<Rc<ProjectModule>>,
    pub(crate) optional_provider_scope: Derivation<Rc<ProjectModule>>,
    pub(crate) providers: Derivation<ResolvedProvider>,
    pub(crate) implicit_provider_deps: Derivation<Dependency>,
    pub(crate) direct_deps_pre_finalize: Derivation<Dependency>,
    pub(crate) transitive_pre_finalize: Derivation<Dependency>,
    pub(crate) direct_deps: Derivation<Dependency>,
    pub(crate) transitive_deps: Derivation<Dependency>,
}

fn layer<T, F>(
    name: String,
    registry: &Weak<ModuleRegistry>,
    module: &Weak<ProjectModule>,
    f: F,
) -> Derivation<T>
where
    T: Clone + 'static,
    F: Fn(&Rc<ModuleRegistry>, &Rc<ProjectModule>) -> Result<Vec<T>> + 'static,
{
    let registry = registry.clone();
    let module = module.clone();
    Derivation::new(name, move || {
        let registry = registry.upgrade().expect("registry outlives derivations");
        let module = module.upgrade().expect("module outlives its derivations");
        f(&registry, &module)
    })
}

impl ModuleGraph {
    pub(crate) fn new(
        name: &str,
        registry: Weak<ModuleRegistry>,
        module: Weak<ProjectModule>,
    ) -> Self {
        Self {
            detected_source_deps: layer(
                format!("{name}.detected_source_deps"),
                &registry,
                &module,
                detected_source_deps,
            ),
            source_direct_deps: layer(
                format!("{name}.source_direct_deps"),
                &registry,
                &module,
                source_direct_deps,
            ),
            direct_deps_pre_emulation: layer(
                format!("{name}.direct_deps_pre_emulation"),
                &registry,
                &module,
                direct_deps_pre_emulation,
            ),
            transitive_pre_emulation: layer(
                format!("{name}.transitive_pre_emulation"),
                &registry,
                &module,
                |_, module| {
                    let seed = module.graph.direct_deps_pre_emulation.force()?;
                    closure_of(&seed, |dest| dest.graph.direct_deps_pre_emulation.force())
                },
            ),
            emulation_deps: layer(
                format!("{name}.emulation_deps"),
                &registry,
                &module,
                |registry, module| emulation::emulation_dependencies(registry, module),
            ),
            auto_injected_modules: layer(
                format!("{name}.auto_injected_modules"),
                &registry,
                &module,
                auto_injected_modules,
            ),
            required_provider_scope: layer(
                format!("{name}.required_provider_scope"),
                &registry,
                &module,
                |registry, module| provider::required_provider_scope(registry, module),
            ),
            optional_provider_scope: layer(
                format!("{name}.optional_provider_scope"),
                &registry,
                &module,
                |_, module| provider::optional_provider_scope(module),
            ),
            providers: layer(
                format!("{name}.providers"),
                &registry,
                &module,
                |registry, module| provider::resolve_providers(registry, module, module),
            ),
            implicit_provider_deps: layer(
                format!("{name}.implicit_provider_deps"),
                &registry,
                &module,
                implicit_provider_deps,
            ),
            direct_deps_pre_finalize: layer(
                format!("{name}.direct_deps_pre_finalize"),
                &registry,
                &module,
                direct_deps_pre_finalize,
            ),
            transitive_pre_finalize: layer(
                format!("{name}.transitive_pre_finalize"),
                &registry,
                &module,
                |_, module| {
                    let seed = module.graph.direct_deps_pre_finalize.force()?;
                    closure_of(&seed, |dest| dest.graph.direct_deps_pre_finalize.force())
                },
            ),
            direct_deps: layer(
                format!("{name}.direct_deps"),
                &registry,
                &module,
                final_direct_deps,
            ),
            transitive_deps: layer(
                format!("{name}.transitive_deps"),
                &registry,
                &module,
                final_transitive_deps,
            ),
        }
    }
}

/// Converts descriptor dependency entries of one kind, resolving destination
/// names through the registry.
fn declared_deps(
    registry: &Rc<ModuleRegistry>,
    module: &Rc<ProjectModule>,
    entries: &[DeclaredDependency],
    kind: DependencyKind,
) -> Result<Vec<Dependency>> {
    entries
        .iter()
        .map(|entry| {
            let destination = registry.require(&entry.module)?;
            Ok(Dependency {
                source: module.clone(),
                destination,
                kind,
                optional: entry.optional,
                scope: entry.scope.clone(),
                classifier: entry.classifier.clone(),
                executable_target: entry.executable_target.clone(),
            })
        })
        .collect()
}

fn detected_source_deps(
    registry: &Rc<ModuleRegistry>,
    module: &Rc<ProjectModule>,
) -> Result<Vec<Dependency>> {
    if !module.descriptor().auto_detect {
        return Ok(Vec::new());
    }

    // A snapshot that recorded detected dependencies is authoritative and
    // spares us both the scanner and the package index.
    if let Some(snapshot) = &module.descriptor().export_snapshot {
        if !snapshot.detected_source_deps.is_empty() {
            return snapshot
                .detected_source_deps
                .iter()
                .map(|name| {
                    Ok(Dependency::new(
                        module.clone(),
                        registry.require(name)?,
                        DependencyKind::DetectedSource,
                    ))
                })
                .collect();
        }
    }

    let mut deps = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for package in module.used_packages()?.iter() {
        let Some(destination) = registry.find_declaring_package(package)? else {
            continue;
        };
        if Rc::ptr_eq(&destination, module) {
            continue;
        }
        if seen.insert(destination.name().to_owned()) {
            deps.push(Dependency::new(
                module.clone(),
                destination,
                DependencyKind::DetectedSource,
            ));
        }
    }
    Ok(deps)
}

fn source_direct_deps(
    registry: &Rc<ModuleRegistry>,
    module: &Rc<ProjectModule>,
) -> Result<Vec<Dependency>> {
    let descriptor = module.descriptor();
    let mut deps = declared_deps(
        registry,
        module,
        &descriptor.explicit_source_deps,
        DependencyKind::ExplicitSource,
    )?;
    deps.extend(module.graph.detected_source_deps.force()?.iter().cloned());
    deps.extend(declared_deps(
        registry,
        module,
        &descriptor.undetected_source_deps,
        DependencyKind::UndetectedSource,
    )?);
    Ok(deps)
}

fn direct_deps_pre_emulation(
    registry: &Rc<ModuleRegistry>,
    module: &Rc<ProjectModule>,
) -> Result<Vec<Dependency>> {
    let descriptor = module.descriptor();
    let mut deps = module.graph.source_direct_deps.force()?.to_vec();
    deps.extend(declared_deps(
        registry,
        module,
        &descriptor.resource_deps,
        DependencyKind::Resource,
    )?);
    deps.extend(declared_deps(
        registry,
        module,
        &descriptor.application_deps,
        DependencyKind::Application,
    )?);
    deps.extend(declared_deps(
        registry,
        module,
        &descriptor.plugin_deps,
        DependencyKind::Plugin,
    )?);
    Ok(deps.into_iter().unique().collect())
}

/// Transitive closure: repeatedly substitutes each destination's own direct
/// layer, breadth-first, with a visited set keyed on
/// `(source, destination, kind)` so mutually-referencing descriptors
/// terminate. Output order is insertion order.
fn closure_of(
    seed: &Rc<[Dependency]>,
    direct_layer: impl Fn(&Rc<ProjectModule>) -> Result<Rc<[Dependency]>>,
) -> Result<Vec<Dependency>> {
    let mut queue: VecDeque<Dependency> = seed.iter().cloned().collect();
    let mut visited: HashSet<(String, String, DependencyKind)> = HashSet::new();
    let mut closure = Vec::new();

    while let Some(dep) = queue.pop_front() {
        if !visited.insert(dep.closure_key()) {
            continue;
        }
        let destination = dep.destination.clone();
        closure.push(dep);
        queue.extend(direct_layer(&destination)?.iter().cloned());
    }
    Ok(closure)
}

fn auto_injected_modules(
    registry: &Rc<ModuleRegistry>,
    module: &Rc<ProjectModule>,
) -> Result<Vec<Rc<ProjectModule>>> {
    if !module.is_executable() {
        return Ok(Vec::new());
    }

    let mut used: Vec<String> = module.used_packages()?.to_vec();
    for dep in module.graph.transitive_pre_emulation.force()?.iter() {
        for package in dep.destination.used_packages()?.iter() {
            if !used.contains(package) {
                used.push(package.clone());
            }
        }
    }

    let mut injected = Vec::new();
    for candidate in registry.modules() {
        if Rc::ptr_eq(&candidate, module) {
            continue;
        }
        let conditions = &candidate.descriptor().auto_injection_conditions;
        if conditions.is_empty() {
            continue;
        }
        let triggered = conditions.iter().any(|pattern| {
            used.iter()
                .any(|package| package_pattern_matches(pattern, package))
        });
        if triggered {
            injected.push(candidate);
        }
    }
    Ok(injected)
}

fn implicit_provider_deps(
    _registry: &Rc<ModuleRegistry>,
    module: &Rc<ProjectModule>,
) -> Result<Vec<Dependency>> {
    if !module.is_executable() {
        return Ok(Vec::new());
    }
    let mut deps = Vec::new();
    for resolved in module.graph.providers.force()?.iter() {
        for provider in &resolved.providers {
            deps.push(Dependency::new(
                module.clone(),
                provider.clone(),
                DependencyKind::ImplicitProvider,
            ));
        }
    }
    Ok(deps.into_iter().unique().collect())
}

fn direct_deps_pre_finalize(
    _registry: &Rc<ModuleRegistry>,
    module: &Rc<ProjectModule>,
) -> Result<Vec<Dependency>> {
    let mut deps = module.graph.direct_deps_pre_emulation.force()?.to_vec();
    deps.extend(module.graph.emulation_deps.force()?.iter().cloned());
    deps.extend(module.graph.implicit_provider_deps.force()?.iter().cloned());
    Ok(deps.into_iter().unique().collect())
}

/// Finalization identity: later duplicates of a `(destination, kind)` pair
/// are dropped, keeping the first occurrence in pull order.
fn dedup_finalized(deps: Vec<Dependency>) -> Vec<Dependency> {
    deps.into_iter()
        .unique_by(|dep| dep.finalize_key())
        .collect()
}

fn final_direct_deps(
    registry: &Rc<ModuleRegistry>,
    module: &Rc<ProjectModule>,
) -> Result<Vec<Dependency>> {
    let pre = module.graph.direct_deps_pre_finalize.force()?;

    let Some(target) = module.executable_target() else {
        // Non-executables never see target-restricted dependencies.
        return Ok(pre
            .iter()
            .filter(|dep| dep.executable_target.is_none())
            .cloned()
            .collect());
    };

    let mut deps = Vec::new();
    for dep in pre.iter() {
        match &dep.executable_target {
            Some(restriction) if restriction.grade(target) < 0 => {}
            _ => deps.push(dep.clone()),
        }
    }

    // Target-restricted dependencies anywhere in the transitive graph
    // relocate into the executable's direct set.
    for dep in module.graph.transitive_pre_finalize.force()?.iter() {
        if let Some(restriction) = &dep.executable_target {
            if restriction.grade(target) >= 0 {
                deps.push(dep.clone());
            }
        }
    }

    let deps = replace_interfaces_direct(registry, module, target, deps)?;
    Ok(dedup_finalized(deps))
}

fn final_transitive_deps(
    registry: &Rc<ModuleRegistry>,
    module: &Rc<ProjectModule>,
) -> Result<Vec<Dependency>> {
    let pre = module.graph.transitive_pre_finalize.force()?;

    let Some(target) = module.executable_target() else {
        return Ok(pre
            .iter()
            .filter(|dep| dep.executable_target.is_none())
            .cloned()
            .collect());
    };

    // Matching target-restricted dependencies moved into the direct set;
    // incompatible ones are dropped. Either way none stay transitive.
    let kept: Vec<Dependency> = pre
        .iter()
        .filter(|dep| dep.executable_target.is_none())
        .cloned()
        .collect();

    let deps = replace_interfaces_transitive(registry, module, target, kept)?;
    Ok(dedup_finalized(deps))
}

fn replace_interfaces_direct(
    registry: &Rc<ModuleRegistry>,
    module: &Rc<ProjectModule>,
    target: &Target,
    deps: Vec<Dependency>,
) -> Result<Vec<Dependency>> {
    let mut out = Vec::new();
    for dep in deps {
        if !dep.destination.is_interface() {
            out.push(dep);
            continue;
        }
        match implement::best_implementation(registry, module, dep.destination.name(), target)? {
            Some(concrete) => out.push(Dependency::new(
                module.clone(),
                concrete,
                DependencyKind::ImplicitProvider,
            )),
            None => out.push(dep),
        }
    }
    Ok(out)
}

/// Rewrites interface destinations in the transitive set. Each replacement
/// folds in the concrete implementation's own closure and the providers
/// found by a single collection pass over it; interface modules discovered
/// while folding are resolved by the same rule.
fn replace_interfaces_transitive(
    registry: &Rc<ModuleRegistry>,
    module: &Rc<ProjectModule>,
    target: &Target,
    deps: Vec<Dependency>,
) -> Result<Vec<Dependency>> {
    let mut out = Vec::new();
    let mut queue: VecDeque<Dependency> = deps.into_iter().collect();
    let mut replaced_interfaces: HashSet<String> = HashSet::new();
    let mut folded_concretes: HashSet<String> = HashSet::new();

    while let Some(dep) = queue.pop_front() {
        if !dep.destination.is_interface() {
            out.push(dep);
            continue;
        }
        let interface = dep.destination.name().to_owned();
        if !replaced_interfaces.insert(interface.clone()) {
            continue;
        }
        let Some(concrete) = implement::best_implementation(registry, module, &interface, target)?
        else {
            out.push(dep);
            continue;
        };
        out.push(Dependency::new(
            module.clone(),
            concrete.clone(),
            DependencyKind::ImplicitProvider,
        ));
        if !folded_concretes.insert(concrete.name().to_owned()) {
            continue;
        }
        for folded in concrete.graph.transitive_pre_finalize.force()?.iter() {
            queue.push_back(Dependency::new(
                module.clone(),
                folded.destination.clone(),
                DependencyKind::ImplicitProvider,
            ));
        }
        for resolved in provider::resolve_providers(registry, module, &concrete)? {
            for provider in resolved.providers {
                queue.push_back(Dependency::new(
                    module.clone(),
                    provider,
                    DependencyKind::ImplicitProvider,
                ));
            }
        }
    }
    Ok(out)
}
