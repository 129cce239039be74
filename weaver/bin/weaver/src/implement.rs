// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Interface-to-implementation resolution.
//!
//! When an executable's graph reaches an interface module, the dependency
//! must be rewritten to the best concrete implementation for the
//! executable's target before generators see it.

use std::cmp::Reverse;
use std::rc::Rc;

use crate::data::Target;
use crate::module::ProjectModule;
use crate::registry::{Diagnostic, ModuleRegistry};
use crate::Result;

/// Finds the concrete module implementing `interface_name` that grades best
/// against the executable's target, searching the required-provider scope.
/// Grade ties break to the smallest module name.
///
/// Returns `None` (after reporting a diagnostic) when no compatible
/// implementation exists; the caller keeps the interface dependency.
pub(crate) fn best_implementation(
    registry: &Rc<ModuleRegistry>,
    executable: &Rc<ProjectModule>,
    interface_name: &str,
    target: &Target,
) -> Result<Option<Rc<ProjectModule>>> {
    let scope = executable.graph.required_provider_scope.force()?;
    let best = scope
        .iter()
        .filter(|candidate| candidate.implements_module() == Some(interface_name))
        .filter(|candidate| candidate.target_tags().grade(target) >= 0)
        .min_by_key(|candidate| {
            (
                Reverse(candidate.target_tags().grade(target)),
                candidate.name().to_owned(),
            )
        })
        .cloned();

    if best.is_none() {
        registry.report(Diagnostic::MissingInterfaceImplementation {
            interface: interface_name.to_owned(),
            target: target.clone(),
        });
    }
    Ok(best)
}
