// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! End-to-end resolution scenarios over on-disk fixture workspaces.

use std::rc::Rc;

use pretty_assertions::assert_eq;
use testutil::FixtureWorkspace;
use weaver::{
    load_workspace, Dependency, DependencyKind, Diagnostic, ModuleRegistry, ProjectModule,
    ResolveConfig,
};

fn resolve(ws: &FixtureWorkspace) -> Rc<ModuleRegistry> {
    let registry = ModuleRegistry::new();
    let config = ResolveConfig {
        cache_dir: ws.root().join("cache"),
        allow_missing_snapshots: false,
    };
    load_workspace(&registry, ws.root(), &config).unwrap();
    registry
}

fn dep_pairs(deps: &[Dependency]) -> Vec<(String, DependencyKind)> {
    deps.iter()
        .map(|d| (d.destination.name().to_owned(), d.kind))
        .collect()
}

fn dep_names(deps: &[Dependency]) -> Vec<String> {
    deps.iter()
        .map(|d| d.destination.name().to_owned())
        .collect()
}

fn provider_rows(module: &ProjectModule) -> Vec<(String, Vec<String>, bool)> {
    module
        .executable_providers()
        .unwrap()
        .iter()
        .map(|row| {
            (
                row.interface.clone(),
                row.providers.iter().map(|p| p.name().to_owned()).collect(),
                row.optional,
            )
        })
        .collect()
}

/// Every browser-transpiled executable needs the fixed emulation modules.
fn add_web_platform(ws: &FixtureWorkspace) {
    for name in ["kit-web", "javabase-emul-web", "time-web"] {
        ws.add_module(name, "<module/>").unwrap();
    }
}

#[test]
fn browser_executable_gets_detected_and_emulation_deps() {
    let ws = FixtureWorkspace::new().unwrap();
    ws.add_module("", "<module><name>root</name><aggregate/></module>")
        .unwrap();
    add_web_platform(&ws);
    ws.add_module(
        "ui",
        "<module><exported-packages><package>com.ex.ui</package></exported-packages></module>",
    )
    .unwrap();
    ws.add_module("app-web", r#"<module><executable target="web"/></module>"#)
        .unwrap();
    ws.add_source(
        "app-web",
        "com/ex/app/Main.java",
        "package com.ex.app;\n\nimport com.ex.ui.Widget;\n\npublic class Main {}\n",
    )
    .unwrap();

    let registry = resolve(&ws);
    let app = registry.require("app-web").unwrap();
    let direct = dep_pairs(&app.direct_dependencies().unwrap());

    assert_eq!(
        direct,
        vec![
            ("ui".to_owned(), DependencyKind::DetectedSource),
            ("kit-web".to_owned(), DependencyKind::Emulation),
            ("javabase-emul-web".to_owned(), DependencyKind::Emulation),
            ("time-web".to_owned(), DependencyKind::Emulation),
        ]
    );
}

#[test]
fn interface_modules_are_replaced_for_executables() {
    let ws = FixtureWorkspace::new().unwrap();
    ws.add_module("", "<module><name>root</name><aggregate/></module>")
        .unwrap();
    add_web_platform(&ws);
    ws.add_module("css-api", "<module><interface/></module>")
        .unwrap();
    ws.add_module(
        "css-api-web",
        "<module><target-tags>web</target-tags>\
         <implements-module>css-api</implements-module></module>",
    )
    .unwrap();
    ws.add_module(
        "css-api-desktop",
        "<module><target-tags>desktop</target-tags>\
         <implements-module>css-api</implements-module></module>",
    )
    .unwrap();
    ws.add_module(
        "app-web",
        r#"<module><executable target="web"/>
           <dependencies><source>css-api</source></dependencies></module>"#,
    )
    .unwrap();

    let registry = resolve(&ws);
    let app = registry.require("app-web").unwrap();
    let direct = app.direct_dependencies().unwrap();
    let transitive = app.transitive_dependencies().unwrap();

    assert!(dep_pairs(&direct)
        .contains(&("css-api-web".to_owned(), DependencyKind::ImplicitProvider)));
    for dep in direct.iter().chain(transitive.iter()) {
        assert_ne!(
            dep.destination.name(),
            "css-api",
            "interface module survived finalization: {dep:?}"
        );
    }
}

#[test]
fn missing_interface_implementation_keeps_dependency_and_warns() {
    let ws = FixtureWorkspace::new().unwrap();
    ws.add_module("", "<module><name>root</name><aggregate/></module>")
        .unwrap();
    add_web_platform(&ws);
    ws.add_module("css-api", "<module><interface/></module>")
        .unwrap();
    ws.add_module(
        "app-web",
        r#"<module><executable target="web"/>
           <dependencies><source>css-api</source></dependencies></module>"#,
    )
    .unwrap();

    let registry = resolve(&ws);
    let app = registry.require("app-web").unwrap();
    let direct = app.direct_dependencies().unwrap();

    assert!(dep_pairs(&direct).contains(&("css-api".to_owned(), DependencyKind::ExplicitSource)));
    assert!(registry.diagnostics().iter().any(|d| matches!(
        d,
        Diagnostic::MissingInterfaceImplementation { interface, .. } if interface == "css-api"
    )));
}

#[test]
fn required_service_resolves_to_best_graded_provider() {
    let ws = FixtureWorkspace::new().unwrap();
    ws.add_module("", "<module><name>root</name><aggregate/></module>")
        .unwrap();
    add_web_platform(&ws);
    ws.add_module(
        "store-mem",
        "<module><target-tags>web,desktop</target-tags>\
         <provides><java-service>com.ex.spi.Store</java-service></provides></module>",
    )
    .unwrap();
    ws.add_module(
        "store-idb",
        "<module><target-tags>web</target-tags>\
         <provides><java-service>com.ex.spi.Store</java-service></provides></module>",
    )
    .unwrap();
    ws.add_module("app-web", r#"<module><executable target="web"/></module>"#)
        .unwrap();
    ws.add_source(
        "app-web",
        "com/ex/app/Boot.java",
        "package com.ex.app;\n\nimport com.ex.spi.Store;\n\n\
         public class Boot {\n    Store store = Services.load(Store.class);\n}\n",
    )
    .unwrap();

    let registry = resolve(&ws);
    let app = registry.require("app-web").unwrap();

    assert_eq!(
        provider_rows(&app),
        vec![(
            "com.ex.spi.Store".to_owned(),
            vec!["store-idb".to_owned()],
            false,
        )]
    );
    let direct = dep_pairs(&app.direct_dependencies().unwrap());
    assert!(direct.contains(&("store-idb".to_owned(), DependencyKind::ImplicitProvider)));
    assert!(!dep_names(&app.direct_dependencies().unwrap()).contains(&"store-mem".to_owned()));
}

#[test]
fn optional_service_lists_all_providers_sorted() {
    let ws = FixtureWorkspace::new().unwrap();
    ws.add_module("", "<module><name>root</name><aggregate/></module>")
        .unwrap();
    add_web_platform(&ws);
    for name in ["log-remote", "log-console"] {
        ws.add_module(
            name,
            "<module><provides><java-service>com.ex.spi.Logger</java-service></provides>\
             <auto-injection-conditions><uses-package>com.ex.spi.*</uses-package>\
             </auto-injection-conditions></module>",
        )
        .unwrap();
    }
    ws.add_module("app-web", r#"<module><executable target="web"/></module>"#)
        .unwrap();
    ws.add_source(
        "app-web",
        "com/ex/app/Boot.java",
        "package com.ex.app;\n\nimport com.ex.spi.Logger;\n\n\
         public class Boot {\n    Object log = Services.loadOptional(Logger.class);\n}\n",
    )
    .unwrap();

    let registry = resolve(&ws);
    let app = registry.require("app-web").unwrap();

    assert_eq!(
        provider_rows(&app),
        vec![(
            "com.ex.spi.Logger".to_owned(),
            vec!["log-console".to_owned(), "log-remote".to_owned()],
            true,
        )]
    );
}

#[test]
fn unresolved_required_service_warns_and_is_omitted() {
    let ws = FixtureWorkspace::new().unwrap();
    ws.add_module("", "<module><name>root</name><aggregate/></module>")
        .unwrap();
    add_web_platform(&ws);
    ws.add_module("app-web", r#"<module><executable target="web"/></module>"#)
        .unwrap();
    ws.add_source(
        "app-web",
        "com/ex/app/Boot.java",
        "package com.ex.app;\n\nimport com.ex.spi.Store;\n\n\
         public class Boot {\n    Store store = Services.load(Store.class);\n}\n",
    )
    .unwrap();

    let registry = resolve(&ws);
    let app = registry.require("app-web").unwrap();

    assert!(provider_rows(&app).is_empty());
    assert!(registry.diagnostics().iter().any(|d| matches!(
        d,
        Diagnostic::UnresolvedRequiredService { interface, .. } if interface == "com.ex.spi.Store"
    )));
}

#[test]
fn repository_module_resolves_from_snapshot_without_sources() {
    let ws = FixtureWorkspace::new().unwrap();
    ws.add_module(
        "",
        r#"<module><name>root</name><aggregate/>
           <repository-modules>
               <module name="repo-lib">com.ex:repo-lib:1.0.0</module>
           </repository-modules></module>"#,
    )
    .unwrap();
    ws.add_module(
        "util",
        "<module><exported-packages><package>com.ex.util</package></exported-packages></module>",
    )
    .unwrap();
    // Only the descriptor artifact is cached. Resolution runs in strict
    // mode, so any attempt to fetch the sources would fail the test.
    ws.add_file(
        "cache/com.ex/repo-lib/1.0.0/repo-lib-1.0.0-descriptor.xml",
        "<module><export-snapshot><used-packages><package>com.ex.util</package>\
         </used-packages></export-snapshot></module>",
    )
    .unwrap();

    let registry = resolve(&ws);
    let repo_lib = registry.require("repo-lib").unwrap();

    assert_eq!(
        dep_pairs(&repo_lib.direct_dependencies().unwrap()),
        vec![("util".to_owned(), DependencyKind::DetectedSource)]
    );
}

#[test]
fn executable_target_deps_relocate_into_direct() {
    let ws = FixtureWorkspace::new().unwrap();
    ws.add_module("", "<module><name>root</name><aggregate/></module>")
        .unwrap();
    add_web_platform(&ws);
    ws.add_module("logging-jre", "<module/>").unwrap();
    ws.add_module(
        "common",
        r#"<module><dependencies>
           <source executable-target="jre">logging-jre</source>
           </dependencies></module>"#,
    )
    .unwrap();
    ws.add_module(
        "app-jre",
        r#"<module><executable target="jre"/>
           <dependencies><source>common</source></dependencies></module>"#,
    )
    .unwrap();
    ws.add_module(
        "app-web",
        r#"<module><executable target="web"/>
           <dependencies><source>common</source></dependencies></module>"#,
    )
    .unwrap();

    let registry = resolve(&ws);

    let app_jre = registry.require("app-jre").unwrap();
    assert!(dep_names(&app_jre.direct_dependencies().unwrap()).contains(&"logging-jre".to_owned()));
    assert!(
        !dep_names(&app_jre.transitive_dependencies().unwrap()).contains(&"logging-jre".to_owned())
    );

    let app_web = registry.require("app-web").unwrap();
    assert!(!dep_names(&app_web.direct_dependencies().unwrap()).contains(&"logging-jre".to_owned()));
    assert!(
        !dep_names(&app_web.transitive_dependencies().unwrap()).contains(&"logging-jre".to_owned())
    );
}

#[test]
fn desktop_jvm_executable_gets_kit_and_boot_emulation() {
    let ws = FixtureWorkspace::new().unwrap();
    ws.add_module("", "<module><name>root</name><aggregate/></module>")
        .unwrap();
    ws.add_module("kit-openjfx", "<module/>").unwrap();
    ws.add_module("boot-jre-desktop", "<module/>").unwrap();
    ws.add_module(
        "app-desktop",
        r#"<module><executable target="jre,desktop"/></module>"#,
    )
    .unwrap();

    let registry = resolve(&ws);
    let app = registry.require("app-desktop").unwrap();
    let direct = dep_pairs(&app.direct_dependencies().unwrap());

    assert!(direct.contains(&("kit-openjfx".to_owned(), DependencyKind::Emulation)));
    assert!(direct.contains(&("boot-jre-desktop".to_owned(), DependencyKind::Emulation)));
    assert!(!dep_names(&app.direct_dependencies().unwrap()).contains(&"media-emul-jre".to_owned()));
}

#[test]
fn desktop_jvm_media_emulation_injected_when_used() {
    let ws = FixtureWorkspace::new().unwrap();
    ws.add_module("", "<module><name>root</name><aggregate/></module>")
        .unwrap();
    ws.add_module("kit-openjfx", "<module/>").unwrap();
    ws.add_module("boot-jre-desktop", "<module/>").unwrap();
    ws.add_module(
        "media-emul-jre",
        "<module><exported-packages><package>com.ex.media</package></exported-packages></module>",
    )
    .unwrap();
    ws.add_module(
        "app-desktop",
        r#"<module><executable target="jre,desktop"/></module>"#,
    )
    .unwrap();
    ws.add_source(
        "app-desktop",
        "com/ex/app/Player.java",
        "package com.ex.app;\n\nimport com.ex.media.Clip;\n\npublic class Player {}\n",
    )
    .unwrap();

    let registry = resolve(&ws);
    let app = registry.require("app-desktop").unwrap();
    let direct = dep_pairs(&app.direct_dependencies().unwrap());

    assert!(direct.contains(&("media-emul-jre".to_owned(), DependencyKind::Emulation)));
}

#[test]
fn non_executables_see_no_providers_and_keep_direct_in_transitive() {
    let ws = FixtureWorkspace::new().unwrap();
    ws.add_module("", "<module><name>root</name><aggregate/></module>")
        .unwrap();
    ws.add_module("base", "<module/>").unwrap();
    ws.add_module(
        "mid",
        "<module><dependencies><source>base</source></dependencies></module>",
    )
    .unwrap();
    ws.add_module(
        "lib",
        "<module><dependencies><source>mid</source></dependencies></module>",
    )
    .unwrap();

    let registry = resolve(&ws);
    let lib = registry.require("lib").unwrap();

    assert!(lib.executable_providers().unwrap().is_empty());

    let direct = lib.direct_dependencies().unwrap();
    let transitive = lib.transitive_dependencies().unwrap();
    for dep in direct.iter() {
        assert!(transitive.iter().any(|t| t == dep));
    }
    assert_eq!(dep_names(&transitive), vec!["mid", "base"]);
}

#[test]
fn resolution_is_deterministic_across_runs() {
    let build = || {
        let ws = FixtureWorkspace::new().unwrap();
        ws.add_module("", "<module><name>root</name><aggregate/></module>")
            .unwrap();
        add_web_platform(&ws);
        ws.add_module(
            "ui",
            "<module><exported-packages><package>com.ex.ui</package></exported-packages></module>",
        )
        .unwrap();
        for name in ["store-mem", "store-idb"] {
            ws.add_module(
                name,
                "<module><target-tags>web</target-tags>\
                 <provides><java-service>com.ex.spi.Store</java-service></provides></module>",
            )
            .unwrap();
        }
        ws.add_module("app-web", r#"<module><executable target="web"/></module>"#)
            .unwrap();
        ws.add_source(
            "app-web",
            "com/ex/app/Main.java",
            "package com.ex.app;\n\nimport com.ex.ui.Widget;\nimport com.ex.spi.Store;\n\n\
             public class Main {\n    Store store = Services.load(Store.class);\n}\n",
        )
        .unwrap();

        let registry = resolve(&ws);
        let app = registry.require("app-web").unwrap();
        (
            dep_pairs(&app.direct_dependencies().unwrap()),
            dep_pairs(&app.transitive_dependencies().unwrap()),
            provider_rows(&app),
        )
    };

    assert_eq!(build(), build());
}

#[test]
fn captured_snapshot_reproduces_source_based_resolution() {
    // Resolve a module from its sources, capture a snapshot, then resolve a
    // twin workspace where the descriptor embeds the snapshot and the
    // sources are gone. Both runs must agree.
    let lib_sources = "package com.ex.lib;\n\nimport com.ex.ui.Widget;\n\npublic class Lib {}\n";
    let ui_descriptor =
        "<module><exported-packages><package>com.ex.ui</package></exported-packages></module>";

    let from_sources = {
        let ws = FixtureWorkspace::new().unwrap();
        ws.add_module("", "<module><name>root</name><aggregate/></module>")
            .unwrap();
        ws.add_module("ui", ui_descriptor).unwrap();
        ws.add_module("lib", "<module/>").unwrap();
        ws.add_source("lib", "com/ex/lib/Lib.java", lib_sources).unwrap();

        let registry = resolve(&ws);
        let lib = registry.require("lib").unwrap();
        let snapshot = lib.capture_snapshot().unwrap();
        (dep_pairs(&lib.direct_dependencies().unwrap()), snapshot)
    };

    let (source_deps, snapshot) = from_sources;
    let snapshot_deps = {
        let ws = FixtureWorkspace::new().unwrap();
        ws.add_module("", "<module><name>root</name><aggregate/></module>")
            .unwrap();
        ws.add_module("ui", ui_descriptor).unwrap();
        ws.add_module("lib", &format!("<module>\n{}\n</module>", snapshot.to_xml()))
            .unwrap();

        let registry = resolve(&ws);
        let lib = registry.require("lib").unwrap();
        dep_pairs(&lib.direct_dependencies().unwrap())
    };

    assert_eq!(snapshot_deps, source_deps);
}
