// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::rc::Rc;

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use weaver::{Dependency, ModuleRegistry, ResolvedProvider};

#[derive(clap::Args, Debug)]
pub struct Args {
    /// Module names to dump.
    #[arg(required = true, value_name = "MODULE")]
    pub modules: Vec<String>,

    /// Emit machine-readable JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct DependencyDump {
    module: String,
    kind: String,
    optional: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    classifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    executable_target: Option<String>,
}

#[derive(Serialize)]
struct ProviderDump {
    interface: String,
    optional: bool,
    providers: Vec<String>,
}

#[derive(Serialize)]
struct ModuleDump {
    name: String,
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    direct_dependencies: Vec<DependencyDump>,
    transitive_dependencies: Vec<DependencyDump>,
    providers: Vec<ProviderDump>,
    declared_services: Vec<String>,
}

fn dependency_dump(dep: &Dependency) -> DependencyDump {
    DependencyDump {
        module: dep.destination.name().to_owned(),
        kind: dep.kind.to_string(),
        optional: dep.optional,
        scope: dep.scope.clone(),
        classifier: dep.classifier.clone(),
        executable_target: dep.executable_target.as_ref().map(|t| t.to_string()),
    }
}

fn provider_dump(resolved: &ResolvedProvider) -> ProviderDump {
    ProviderDump {
        interface: resolved.interface.clone(),
        optional: resolved.optional,
        providers: resolved
            .providers
            .iter()
            .map(|p| p.name().to_owned())
            .collect(),
    }
}

fn print_deps(label: &str, deps: &[Dependency]) {
    println!("{label}:");
    for dep in deps {
        let mut line = format!("  {} ({})", dep.destination.name().bold(), dep.kind);
        if dep.optional {
            line.push_str(" optional");
        }
        if let Some(scope) = &dep.scope {
            line.push_str(&format!(" scope={scope}"));
        }
        if let Some(target) = &dep.executable_target {
            line.push_str(&format!(" executable-target={target}"));
        }
        println!("{line}");
    }
}

pub fn dump_module_main(registry: &Rc<ModuleRegistry>, args: Args) -> Result<()> {
    for name in &args.modules {
        let module = registry.require(name)?;
        let direct = module.direct_dependencies()?;
        let transitive = module.transitive_dependencies()?;
        let providers = module.executable_providers()?;

        if args.json {
            let dump = ModuleDump {
                name: module.name().to_owned(),
                kind: module.kind_name().to_owned(),
                target: module.executable_target().map(|t| t.to_string()),
                direct_dependencies: direct.iter().map(dependency_dump).collect(),
                transitive_dependencies: transitive.iter().map(dependency_dump).collect(),
                providers: providers.iter().map(provider_dump).collect(),
                declared_services: module.declared_services().to_vec(),
            };
            println!("{}", serde_json::to_string_pretty(&dump)?);
            continue;
        }

        println!("=======\t{}", module.name());
        println!("Kind:\t\t{}", module.kind_name());
        if let Some(target) = module.executable_target() {
            println!("Target:\t\t{target}");
        } else if !module.target_tags().is_empty() {
            println!("Tags:\t\t{}", module.target_tags());
        }
        print_deps("Direct", &direct);
        print_deps("Transitive", &transitive);
        if !providers.is_empty() {
            println!("Providers:");
            for resolved in providers.iter() {
                let names = resolved
                    .providers
                    .iter()
                    .map(|p| p.name().to_owned())
                    .collect::<Vec<_>>()
                    .join(", ");
                let flavor = if resolved.optional { "optional" } else { "required" };
                println!("  {} ({flavor}): {}", resolved.interface, names.green());
            }
        }
    }
    Ok(())
}
