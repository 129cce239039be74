// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Parsed view of a module's `weaver.xml` descriptor.

use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;

use crate::data::{ModuleId, Target};
use crate::{ResolveError, Result};

/// File name of the framework's module descriptor.
pub const DESCRIPTOR_FILE_NAME: &str = "weaver.xml";

/// One dependency entry declared in a descriptor.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DeclaredDependency {
    pub module: String,
    pub optional: bool,
    pub scope: Option<String>,
    pub classifier: Option<String>,
    pub executable_target: Option<Target>,
}

/// Precomputed dependency facts embedded in a descriptor so that a module
/// can be resolved without access to its sources. Authoritative when present.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExportSnapshot {
    pub used_packages: Vec<String>,
    pub used_required_services: Vec<String>,
    pub used_optional_services: Vec<String>,
    /// Names of modules detected by source analysis at export time.
    pub detected_source_deps: Vec<String>,
}

impl ExportSnapshot {
    /// Renders the snapshot as a descriptor fragment, suitable for embedding
    /// into a `weaver.xml` file. Empty sections are omitted.
    pub fn to_xml(&self) -> String {
        fn section(out: &mut String, tag: &str, entries: &[(&str, &Vec<String>)]) {
            if entries.iter().all(|(_, values)| values.is_empty()) {
                return;
            }
            let _ = writeln!(out, "    <{tag}>");
            for (child, values) in entries {
                for value in values.iter() {
                    let _ = writeln!(out, "        <{child}>{value}</{child}>");
                }
            }
            let _ = writeln!(out, "    </{tag}>");
        }

        let mut out = String::from("<export-snapshot>\n");
        section(
            &mut out,
            "used-packages",
            &[("package", &self.used_packages)],
        );
        section(
            &mut out,
            "used-services",
            &[
                ("required", &self.used_required_services),
                ("optional", &self.used_optional_services),
            ],
        );
        section(
            &mut out,
            "detected-source-dependencies",
            &[("source", &self.detected_source_deps)],
        );
        out.push_str("</export-snapshot>");
        out
    }
}

/// A repository module declared by the workspace root, identified by its
/// artifact coordinates.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RepositoryModuleDecl {
    pub name: String,
    pub id: ModuleId,
}

/// Everything the resolver reads from a `weaver.xml` descriptor.
#[derive(Clone, Debug)]
pub struct ModuleDescriptor {
    pub name: Option<String>,
    pub id: Option<ModuleId>,
    pub aggregate: bool,
    pub interface: bool,
    /// Set when the module is an executable entry point; carries its target.
    pub executable_target: Option<Target>,
    pub target_tags: Target,
    /// Declares this module as the implementation of an interface module.
    pub implements_module: Option<String>,
    /// When false, the source scanner's detected dependencies are skipped.
    pub auto_detect: bool,
    pub exported_packages: Vec<String>,
    pub explicit_source_deps: Vec<DeclaredDependency>,
    pub undetected_source_deps: Vec<DeclaredDependency>,
    pub resource_deps: Vec<DeclaredDependency>,
    pub application_deps: Vec<DeclaredDependency>,
    pub plugin_deps: Vec<DeclaredDependency>,
    /// Package patterns that pull this module into executables whose
    /// transitive closure uses a matching package.
    pub auto_injection_conditions: Vec<String>,
    pub provided_services: Vec<String>,
    /// Name prefixes of registered roots to include in the required-provider
    /// search scope.
    pub provider_search_prefixes: Vec<String>,
    pub export_snapshot: Option<ExportSnapshot>,
    /// Repository modules to pre-load via the artifact fetcher. Only
    /// meaningful on the workspace root descriptor.
    pub repository_modules: Vec<RepositoryModuleDecl>,
}

impl Default for ModuleDescriptor {
    fn default() -> Self {
        Self {
            name: None,
            id: None,
            aggregate: false,
            interface: false,
            executable_target: None,
            target_tags: Target::new(),
            implements_module: None,
            auto_detect: true,
            exported_packages: Vec::new(),
            explicit_source_deps: Vec::new(),
            undetected_source_deps: Vec::new(),
            resource_deps: Vec::new(),
            application_deps: Vec::new(),
            plugin_deps: Vec::new(),
            auto_injection_conditions: Vec::new(),
            provided_services: Vec::new(),
            provider_search_prefixes: Vec::new(),
            export_snapshot: None,
            repository_modules: Vec::new(),
        }
    }
}

impl ModuleDescriptor {
    pub fn parse_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ResolveError::Io {
            op: format!("read descriptor {}", path.display()),
            source,
        })?;
        Self::parse_str(&text, path)
    }

    /// Parses descriptor XML. `path` is used in error messages only.
    pub fn parse_str(text: &str, path: &Path) -> Result<Self> {
        Parser { path }.parse(text)
    }

    pub fn is_aggregate(&self) -> bool {
        self.aggregate
    }

    pub fn is_interface(&self) -> bool {
        self.interface
    }

    pub fn is_executable(&self) -> bool {
        self.executable_target.is_some()
    }

    pub fn has_export_snapshot(&self) -> bool {
        self.export_snapshot.is_some()
    }
}

/// Returns true when an auto-injection package pattern matches a package
/// name. A pattern is either an exact package or a `prefix.*` wildcard that
/// covers the prefix package and everything below it.
pub(crate) fn package_pattern_matches(pattern: &str, package: &str) -> bool {
    match pattern.strip_suffix(".*") {
        Some(prefix) => {
            package == prefix
                || (package.len() > prefix.len()
                    && package.starts_with(prefix)
                    && package.as_bytes()[prefix.len()] == b'.')
        }
        None => package == pattern,
    }
}

struct Parser<'p> {
    path: &'p Path,
}

impl Parser<'_> {
    fn parse(&self, text: &str) -> Result<ModuleDescriptor> {
        let doc = roxmltree::Document::parse(text)
            .map_err(|err| self.error(err.to_string()))?;
        let root = doc.root_element();
        if !root.has_tag_name("module") {
            return Err(self.error(format!(
                "expected <module> root element, found <{}>",
                root.tag_name().name()
            )));
        }

        let mut descriptor = ModuleDescriptor {
            name: child_text(&root, "name"),
            aggregate: child_element(&root, "aggregate").is_some(),
            interface: child_element(&root, "interface").is_some(),
            implements_module: child_text(&root, "implements-module"),
            ..Default::default()
        };

        if let Some(coordinates) = child_text(&root, "artifact") {
            descriptor.id = Some(ModuleId::parse(&coordinates).map_err(|e| self.error(e))?);
        }

        if let Some(executable) = child_element(&root, "executable") {
            let target = executable.attribute("target").unwrap_or_default();
            descriptor.executable_target = Some(self.parse_target(target)?);
        }

        if let Some(tags) = child_text(&root, "target-tags") {
            descriptor.target_tags = self.parse_target(&tags)?;
        }

        if let Some(value) = child_text(&root, "auto-detect-source-dependencies") {
            descriptor.auto_detect = value.trim() != "false";
        }

        if let Some(packages) = child_element(&root, "exported-packages") {
            descriptor.exported_packages = child_texts(&packages, "package");
        }

        if let Some(dependencies) = child_element(&root, "dependencies") {
            for node in dependencies.children().filter(|n| n.is_element()) {
                let entry = self.parse_dependency(&node)?;
                match node.tag_name().name() {
                    "source" => descriptor.explicit_source_deps.push(entry),
                    "undetected-source" => descriptor.undetected_source_deps.push(entry),
                    "resource" => descriptor.resource_deps.push(entry),
                    "application" => descriptor.application_deps.push(entry),
                    "plugin" => descriptor.plugin_deps.push(entry),
                    _ => {
                        // Ignore unsupported entries.
                    }
                }
            }
        }

        if let Some(conditions) = child_element(&root, "auto-injection-conditions") {
            descriptor.auto_injection_conditions = child_texts(&conditions, "uses-package");
        }

        if let Some(provides) = child_element(&root, "provides") {
            descriptor.provided_services = child_texts(&provides, "java-service");
        }

        if let Some(prefixes) = child_element(&root, "provider-search-prefixes") {
            descriptor.provider_search_prefixes = child_texts(&prefixes, "prefix");
        }

        if let Some(snapshot) = child_element(&root, "export-snapshot") {
            descriptor.export_snapshot = Some(self.parse_snapshot(&snapshot));
        }

        if let Some(modules) = child_element(&root, "repository-modules") {
            for node in modules
                .children()
                .filter(|n| n.is_element() && n.has_tag_name("module"))
            {
                let coordinates = node.text().map(str::trim).unwrap_or_default();
                let id = ModuleId::parse(coordinates).map_err(|e| self.error(e))?;
                let name = node
                    .attribute("name")
                    .map(str::to_owned)
                    .unwrap_or_else(|| id.artifact.clone());
                descriptor
                    .repository_modules
                    .push(RepositoryModuleDecl { name, id });
            }
        }

        Ok(descriptor)
    }

    fn parse_dependency(&self, node: &roxmltree::Node) -> Result<DeclaredDependency> {
        let module = node.text().map(str::trim).unwrap_or_default();
        if module.is_empty() {
            return Err(self.error(format!(
                "dependency entry <{}> is missing a module name",
                node.tag_name().name()
            )));
        }
        let executable_target = match node.attribute("executable-target") {
            Some(target) => Some(self.parse_target(target)?),
            None => None,
        };
        Ok(DeclaredDependency {
            module: module.to_owned(),
            optional: node.attribute("optional") == Some("true"),
            scope: node.attribute("scope").map(str::to_owned),
            classifier: node.attribute("classifier").map(str::to_owned),
            executable_target,
        })
    }

    fn parse_snapshot(&self, node: &roxmltree::Node) -> ExportSnapshot {
        let mut snapshot = ExportSnapshot::default();
        if let Some(packages) = child_element(node, "used-packages") {
            snapshot.used_packages = child_texts(&packages, "package");
        }
        if let Some(services) = child_element(node, "used-services") {
            snapshot.used_required_services = child_texts(&services, "required");
            snapshot.used_optional_services = child_texts(&services, "optional");
        }
        if let Some(deps) = child_element(node, "detected-source-dependencies") {
            snapshot.detected_source_deps = child_texts(&deps, "source");
        }
        snapshot
    }

    fn parse_target(&self, value: &str) -> Result<Target> {
        Target::from_str(value).map_err(|e| self.error(e))
    }

    fn error(&self, detail: String) -> ResolveError {
        ResolveError::DescriptorParse {
            path: self.path.to_owned(),
            detail,
        }
    }
}

fn child_element<'a, 'i>(
    node: &roxmltree::Node<'a, 'i>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'i>> {
    node.children()
        .find(|n| n.is_element() && n.has_tag_name(name))
}

fn child_text(node: &roxmltree::Node, name: &str) -> Option<String> {
    child_element(node, name)
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn child_texts(node: &roxmltree::Node, name: &str) -> Vec<String> {
    node.children()
        .filter(|n| n.is_element() && n.has_tag_name(name))
        .filter_map(|n| n.text())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}
