// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Per-target emulation module selection.
//!
//! Each executable target may need extra modules that re-implement standard
//! APIs the target lacks. The browser-transpiled target always gets the UI
//! toolkit, base-runtime and time emulations; a JVM target packaged for a
//! desktop or mobile form factor gets the OpenJFX kit and desktop bootstrap
//! (plus media emulation when the graph actually uses it); a plain JVM
//! target only keeps whatever emulation modules its own closure already
//! pulled in.

use std::rc::Rc;

use crate::data::{Dependency, DependencyKind, TargetTag};
use crate::module::ProjectModule;
use crate::registry::ModuleRegistry;
use crate::Result;

/// Modules injected into every browser-transpiled executable.
pub const WEB_EMULATION_MODULES: [&str; 3] = ["kit-web", "javabase-emul-web", "time-web"];

/// UI toolkit used by JVM executables packaged for desktop or mobile.
pub const DESKTOP_KIT_MODULE: &str = "kit-openjfx";

/// Bootstrap module for JVM desktop packaging.
pub const DESKTOP_BOOT_MODULE: &str = "boot-jre-desktop";

/// Media playback emulation for the JVM, injected only when used.
pub const MEDIA_EMULATION_MODULE: &str = "media-emul-jre";

pub(crate) fn is_known_emulation_module(name: &str) -> bool {
    WEB_EMULATION_MODULES.contains(&name)
        || name == DESKTOP_KIT_MODULE
        || name == DESKTOP_BOOT_MODULE
        || name == MEDIA_EMULATION_MODULE
}

/// Computes the emulation dependencies of a module. Non-empty only for
/// executables.
pub(crate) fn emulation_dependencies(
    registry: &Rc<ModuleRegistry>,
    module: &Rc<ProjectModule>,
) -> Result<Vec<Dependency>> {
    let Some(target) = module.executable_target() else {
        return Ok(Vec::new());
    };

    if target.contains(TargetTag::Web) {
        return WEB_EMULATION_MODULES
            .iter()
            .map(|name| emulation_dep(registry, module, name))
            .collect();
    }

    if target.contains(TargetTag::Jre) {
        if target.contains(TargetTag::Desktop) || target.contains(TargetTag::Mobile) {
            let mut deps = vec![
                emulation_dep(registry, module, DESKTOP_KIT_MODULE)?,
                emulation_dep(registry, module, DESKTOP_BOOT_MODULE)?,
            ];
            if closure_uses_media(registry, module)? {
                deps.push(emulation_dep(registry, module, MEDIA_EMULATION_MODULE)?);
            }
            return Ok(deps);
        }

        // Plain JVM: no injection, but re-emit the emulation modules the
        // graph already reaches so generators can special-case them.
        let mut deps = Vec::new();
        let mut seen = Vec::new();
        for dep in module.graph.transitive_pre_emulation.force()?.iter() {
            let destination = &dep.destination;
            if destination.is_emulation_module() && !seen.contains(&destination.name().to_owned()) {
                seen.push(destination.name().to_owned());
                deps.push(Dependency::new(
                    module.clone(),
                    destination.clone(),
                    DependencyKind::Emulation,
                ));
            }
        }
        return Ok(deps);
    }

    Ok(Vec::new())
}

fn emulation_dep(
    registry: &Rc<ModuleRegistry>,
    module: &Rc<ProjectModule>,
    name: &str,
) -> Result<Dependency> {
    Ok(Dependency::new(
        module.clone(),
        registry.require(name)?,
        DependencyKind::Emulation,
    ))
}

/// True when any package used by the executable or its pre-emulation closure
/// is declared by the media emulation module.
fn closure_uses_media(
    registry: &Rc<ModuleRegistry>,
    module: &Rc<ProjectModule>,
) -> Result<bool> {
    let Some(media) = registry.find(MEDIA_EMULATION_MODULE) else {
        return Ok(false);
    };

    let mut packages: Vec<String> = module.used_packages()?.to_vec();
    for dep in module.graph.transitive_pre_emulation.force()?.iter() {
        packages.extend(dep.destination.used_packages()?.iter().cloned());
    }
    for package in packages {
        if let Some(declaring) = registry.find_declaring_package(&package)? {
            if Rc::ptr_eq(&declaring, &media) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}
