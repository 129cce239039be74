// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Service-provider resolution for executables.
//!
//! Starting from the collecting module, a worklist of modules is drained
//! for required and optional service points; required points get exactly
//! one provider (best target grade, then name), optional points accumulate
//! every compatible provider. Each chosen provider joins the worklist
//! together with its own transitive project modules, and the loop runs to a
//! fixed point when collecting for the executable itself, or a single pass
//! when collecting for a nested implementation module.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::rc::Rc;

use itertools::Itertools;

use crate::data::{ResolvedProvider, Target};
use crate::module::ProjectModule;
use crate::registry::{Diagnostic, ModuleRegistry};
use crate::Result;

/// Destinations of a module's pre-provider transitive closure, first
/// occurrence wins.
pub(crate) fn closure_modules(module: &Rc<ProjectModule>) -> Result<Vec<Rc<ProjectModule>>> {
    let mut modules: Vec<Rc<ProjectModule>> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for dep in module.graph.transitive_pre_emulation.force()?.iter() {
        if seen.insert(dep.destination.name().to_owned()) {
            modules.push(dep.destination.clone());
        }
    }
    Ok(modules)
}

/// Search scope for required service points: the executable itself, its
/// project modules, and the well-known roots (the workspace root subtree,
/// plus registered roots matched by the descriptor's search prefixes), all
/// filtered to target-compatible modules.
pub(crate) fn required_provider_scope(
    registry: &Rc<ModuleRegistry>,
    module: &Rc<ProjectModule>,
) -> Result<Vec<Rc<ProjectModule>>> {
    let Some(target) = module.executable_target() else {
        return Ok(Vec::new());
    };

    let mut scope = vec![module.clone()];
    scope.extend(closure_modules(module)?);

    let prefixes = &module.descriptor().provider_search_prefixes;
    for (index, root) in registry.roots().iter().enumerate() {
        let well_known = index == 0
            || prefixes
                .iter()
                .any(|prefix| root.name().starts_with(prefix.as_str()));
        if !well_known {
            continue;
        }
        let mut subtree = root.subtree();
        subtree.sort_by(|a, b| a.name().cmp(b.name()));
        scope.extend(subtree);
    }

    let mut seen: HashSet<String> = HashSet::new();
    Ok(scope
        .into_iter()
        .filter(|candidate| seen.insert(candidate.name().to_owned()))
        .filter(|candidate| candidate.target_tags().grade(target) >= 0)
        .collect())
}

/// Search scope for optional service points: the executable's project
/// modules plus its auto-injected modules.
pub(crate) fn optional_provider_scope(
    module: &Rc<ProjectModule>,
) -> Result<Vec<Rc<ProjectModule>>> {
    if !module.is_executable() {
        return Ok(Vec::new());
    }

    let mut scope = closure_modules(module)?;
    scope.extend(module.graph.auto_injected_modules.force()?.iter().cloned());

    let mut seen: HashSet<String> = HashSet::new();
    Ok(scope
        .into_iter()
        .filter(|candidate| seen.insert(candidate.name().to_owned()))
        .collect())
}

/// Providers of `service` among the given modules, compatible with the
/// target, ranked by grade descending then name ascending.
fn find_providers_among(
    registry: &Rc<ModuleRegistry>,
    service: &str,
    among: &[Rc<ProjectModule>],
    target: &Target,
) -> Vec<Rc<ProjectModule>> {
    let among_names: HashSet<&str> = among.iter().map(|m| m.name()).collect();
    registry
        .find_providing(service)
        .into_iter()
        .filter(|provider| among_names.contains(provider.name()))
        .filter(|provider| provider.target_tags().grade(target) >= 0)
        .sorted_by_key(|provider| {
            (
                std::cmp::Reverse(provider.target_tags().grade(target)),
                provider.name().to_owned(),
            )
        })
        .collect()
}

/// Resolves provider modules for every service point reachable from
/// `collecting`, in the context of `executable`'s target.
///
/// Returns one row per resolved interface, sorted by interface name, with
/// provider lists sorted deterministically. Unresolved required interfaces
/// are reported as diagnostics and omitted.
pub(crate) fn resolve_providers(
    registry: &Rc<ModuleRegistry>,
    executable: &Rc<ProjectModule>,
    collecting: &Rc<ProjectModule>,
) -> Result<Vec<ResolvedProvider>> {
    let Some(target) = executable.executable_target() else {
        return Ok(Vec::new());
    };
    let single_pass = !Rc::ptr_eq(executable, collecting);

    let required_scope = executable.graph.required_provider_scope.force()?;
    let optional_scope = executable.graph.optional_provider_scope.force()?;

    let mut walking: Vec<Rc<ProjectModule>> = Vec::new();
    let mut walking_names: BTreeSet<String> = BTreeSet::new();
    let enqueue = |walking: &mut Vec<Rc<ProjectModule>>,
                       walking_names: &mut BTreeSet<String>,
                       module: Rc<ProjectModule>| {
        if walking_names.insert(module.name().to_owned()) {
            walking.push(module);
            true
        } else {
            false
        }
    };
    enqueue(&mut walking, &mut walking_names, collecting.clone());
    for module in closure_modules(collecting)? {
        enqueue(&mut walking, &mut walking_names, module);
    }

    let mut required: BTreeSet<String> = BTreeSet::new();
    let mut optional: BTreeSet<String> = BTreeSet::new();
    let mut resolved: BTreeMap<String, Vec<Rc<ProjectModule>>> = BTreeMap::new();
    let mut drained = 0;

    loop {
        while drained < walking.len() {
            let module = walking[drained].clone();
            drained += 1;
            required.extend(module.used_required_services()?.iter().cloned());
            optional.extend(module.used_optional_services()?.iter().cloned());
        }

        let mut grew = false;

        for service in required.iter().cloned().collect_vec() {
            if resolved.contains_key(&service) {
                continue;
            }
            let mut candidates = find_providers_among(registry, &service, &walking, target);
            if candidates.is_empty() {
                candidates = find_providers_among(registry, &service, &required_scope, target);
            }
            let Some(pick) = candidates.into_iter().next() else {
                continue;
            };
            let pick_closure = closure_modules(&pick)?;
            resolved.insert(service, vec![pick.clone()]);
            for module in std::iter::once(pick).chain(pick_closure) {
                grew |= enqueue(&mut walking, &mut walking_names, module);
            }
        }

        for service in optional.iter().cloned().collect_vec() {
            if required.contains(&service) {
                // A point used both ways resolves as required.
                continue;
            }
            let among: Vec<Rc<ProjectModule>> = walking
                .iter()
                .chain(optional_scope.iter())
                .cloned()
                .collect();
            let candidates = find_providers_among(registry, &service, &among, target)
                .into_iter()
                .sorted_by_key(|provider| provider.name().to_owned())
                .collect_vec();
            if candidates.is_empty() {
                continue;
            }
            let newly: Vec<Rc<ProjectModule>> = {
                let providers = resolved.entry(service).or_default();
                let mut newly = Vec::new();
                for candidate in candidates {
                    if !providers.iter().any(|p| p.name() == candidate.name()) {
                        providers.push(candidate.clone());
                        newly.push(candidate);
                    }
                }
                newly
            };
            if !single_pass {
                for module in newly {
                    grew |= enqueue(&mut walking, &mut walking_names, module);
                }
            }
        }

        if single_pass || !grew {
            break;
        }
    }

    for service in &required {
        if !resolved.contains_key(service) {
            registry.report(Diagnostic::UnresolvedRequiredService {
                interface: service.clone(),
                module: collecting.name().to_owned(),
            });
        }
    }

    Ok(resolved
        .into_iter()
        .map(|(interface, providers)| ResolvedProvider {
            optional: !required.contains(&interface),
            interface,
            providers,
        })
        .collect())
}
