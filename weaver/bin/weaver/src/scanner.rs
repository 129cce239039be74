// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Purely syntactic scan of a module's Java sources.
//!
//! The scanner never compiles anything: regular expressions extract the
//! declared package, imported packages, fully-qualified references, and the
//! service-lookup idioms (`Services.load(X.class)` for required points,
//! `Services.loadOptional(X.class)` for optional ones). Modules without an
//! available source directory scan to empty sequences; their dependency
//! facts come from the descriptor's export snapshot instead.

use std::path::{Path, PathBuf};
use std::rc::Weak;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::derivation::Derivation;
use crate::module::ProjectModule;
use crate::{ResolveError, Result};

static PACKAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*package\s+([A-Za-z_][A-Za-z0-9_.]*)\s*;").unwrap());

static IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*import\s+(static\s+)?([A-Za-z_][A-Za-z0-9_.]*?)\s*(\.\*)?\s*;").unwrap()
});

/// Conservative match for inline fully-qualified type references, e.g.
/// `com.ex.ui.Widget` used without an import.
static QUALIFIED_REF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([a-z][a-z0-9_]*(?:\.[a-z][a-z0-9_]*)+)\.[A-Z][A-Za-z0-9_]*").unwrap()
});

static REQUIRED_SERVICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Services\s*\.\s*load\s*\(\s*([A-Za-z_][A-Za-z0-9_.]*)\s*\.\s*class").unwrap()
});

static OPTIONAL_SERVICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Services\s*\.\s*loadOptional\s*\(\s*([A-Za-z_][A-Za-z0-9_.]*)\s*\.\s*class")
        .unwrap()
});

static TYPE_DECL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^\s*(?:public\s+|final\s+|abstract\s+|sealed\s+)*(?:class|interface|enum|record)\s+([A-Za-z_][A-Za-z0-9_]*)",
    )
    .unwrap()
});

/// Facts extracted from a single Java source file.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct JavaSourceUnit {
    pub path: PathBuf,
    /// Declared package, empty for the default package.
    pub package: String,
    /// Name of the primary type declared by the file, if any.
    pub type_name: Option<String>,
    /// Packages referenced through imports or fully-qualified names, in
    /// order of first appearance.
    pub used_packages: Vec<String>,
    /// Fully-qualified interfaces looked up through the required idiom.
    pub required_services: Vec<String>,
    /// Fully-qualified interfaces looked up through the optional idiom.
    pub optional_services: Vec<String>,
}

/// Reduces an import path to the package it refers to.
///
/// The package is everything before the first capitalized segment; a
/// wildcard import already names a package. `import util.helpers` (no
/// capitalized segment) is treated as a single trailing type name.
fn import_package(path: &str, wildcard: bool) -> String {
    let segments: Vec<&str> = path.split('.').collect();
    if wildcard {
        return segments.join(".");
    }
    let boundary = segments
        .iter()
        .position(|s| s.starts_with(|c: char| c.is_ascii_uppercase()))
        .unwrap_or(segments.len().saturating_sub(1));
    segments[..boundary].join(".")
}

/// Resolves a type reference from a service-lookup idiom to a
/// fully-qualified name using the file's imports and declared package.
fn resolve_type(raw: &str, package: &str, imports: &[String]) -> String {
    let first = raw.split('.').next().unwrap_or(raw);
    if first.starts_with(|c: char| c.is_ascii_lowercase()) {
        // Already fully qualified.
        return raw.to_owned();
    }
    for import in imports {
        if import.rsplit('.').next() == Some(first) {
            if raw == first {
                return import.clone();
            }
            return format!("{}.{}", import, &raw[first.len() + 1..]);
        }
    }
    if package.is_empty() {
        raw.to_owned()
    } else {
        format!("{package}.{raw}")
    }
}

/// Parses one Java source file. Purely syntactic.
pub fn parse_java_source(path: &Path, text: &str) -> JavaSourceUnit {
    let package = PACKAGE_RE
        .captures(text)
        .map(|c| c[1].to_owned())
        .unwrap_or_default();

    let mut imports_fq = Vec::new();
    let mut used_packages = Vec::new();
    for captures in IMPORT_RE.captures_iter(text) {
        let import_path = &captures[2];
        let wildcard = captures.get(3).is_some();
        if !wildcard {
            imports_fq.push(import_path.to_owned());
        }
        let pkg = import_package(import_path, wildcard);
        if !pkg.is_empty() && !used_packages.contains(&pkg) {
            used_packages.push(pkg);
        }
    }
    for captures in QUALIFIED_REF_RE.captures_iter(text) {
        let pkg = captures[1].to_owned();
        if !used_packages.contains(&pkg) {
            used_packages.push(pkg);
        }
    }

    let mut required_services = Vec::new();
    for captures in REQUIRED_SERVICE_RE.captures_iter(text) {
        let service = resolve_type(&captures[1], &package, &imports_fq);
        if !required_services.contains(&service) {
            required_services.push(service);
        }
    }
    let mut optional_services = Vec::new();
    for captures in OPTIONAL_SERVICE_RE.captures_iter(text) {
        let service = resolve_type(&captures[1], &package, &imports_fq);
        if !optional_services.contains(&service) {
            optional_services.push(service);
        }
    }

    JavaSourceUnit {
        path: path.to_owned(),
        package,
        type_name: TYPE_DECL_RE.captures(text).map(|c| c[1].to_owned()),
        used_packages,
        required_services,
        optional_services,
    }
}

/// Enumerates a module's scannable source files in deterministic order.
///
/// Descriptor files are not Java sources and fall out naturally; the filter
/// additionally skips target-specific super-source overlays (any path with a
/// `super` directory component) and `module-info.java`.
fn list_source_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    let walk = walkdir::WalkDir::new(dir)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()));
    for entry in walk {
        let entry = entry.map_err(|err| ResolveError::Io {
            op: format!("walk sources under {}", dir.display()),
            source: err.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        if path.extension().map(|e| e != "java").unwrap_or(true) {
            continue;
        }
        if path.file_name().map(|n| n == "module-info.java").unwrap_or(false) {
            continue;
        }
        let overlay = path
            .strip_prefix(dir)
            .unwrap_or(&path)
            .components()
            .any(|c| c.as_os_str() == "super");
        if overlay {
            continue;
        }
        files.push(path);
    }
    Ok(files)
}

/// Lazy per-module view over the scanner's outputs.
///
/// `units` materializes the parsed source files once; the remaining
/// derivations are projections of it, except that the `used_*` views prefer
/// the descriptor's export snapshot when one is present.
pub(crate) struct SourceScan {
    pub(crate) units: Derivation<JavaSourceUnit>,
    pub(crate) declared_packages: Derivation<String>,
    pub(crate) used_packages: Derivation<String>,
    pub(crate) used_required_services: Derivation<String>,
    pub(crate) used_optional_services: Derivation<String>,
}

impl SourceScan {
    pub(crate) fn new(name: &str, module: Weak<ProjectModule>) -> Self {
        let units = {
            let module = module.clone();
            Derivation::new(format!("{name}.source_units"), move || {
                let module = module.upgrade().expect("module outlives its derivations");
                // Aggregates never reach the scanner.
                if module.is_aggregate() {
                    return Ok(Vec::new());
                }
                let Some(dir) = module.source_dir() else {
                    return Ok(Vec::new());
                };
                let mut units = Vec::new();
                for path in list_source_files(&dir)? {
                    let text =
                        std::fs::read_to_string(&path).map_err(|source| ResolveError::Io {
                            op: format!("read source file {}", path.display()),
                            source,
                        })?;
                    units.push(parse_java_source(&path, &text));
                }
                Ok(units)
            })
        };

        let declared_packages = {
            let module = module.clone();
            Derivation::new(format!("{name}.declared_packages"), move || {
                let module = module.upgrade().expect("module outlives its derivations");
                let mut packages: Vec<String> = Vec::new();
                for unit in module.scan.units.force()?.iter() {
                    if !unit.package.is_empty() && !packages.contains(&unit.package) {
                        packages.push(unit.package.clone());
                    }
                }
                Ok(packages)
            })
        };

        let used_packages = Self::snapshot_or_scan(
            format!("{name}.used_packages"),
            module.clone(),
            |snapshot| snapshot.used_packages.clone(),
            |unit| unit.used_packages.clone(),
        );
        let used_required_services = Self::snapshot_or_scan(
            format!("{name}.used_required_services"),
            module.clone(),
            |snapshot| snapshot.used_required_services.clone(),
            |unit| unit.required_services.clone(),
        );
        let used_optional_services = Self::snapshot_or_scan(
            format!("{name}.used_optional_services"),
            module,
            |snapshot| snapshot.used_optional_services.clone(),
            |unit| unit.optional_services.clone(),
        );

        Self {
            units,
            declared_packages,
            used_packages,
            used_required_services,
            used_optional_services,
        }
    }

    fn snapshot_or_scan(
        name: String,
        module: Weak<ProjectModule>,
        from_snapshot: impl Fn(&crate::descriptor::ExportSnapshot) -> Vec<String> + 'static,
        from_unit: impl Fn(&JavaSourceUnit) -> Vec<String> + 'static,
    ) -> Derivation<String> {
        Derivation::new(name, move || {
            let module = module.upgrade().expect("module outlives its derivations");
            let raw = match &module.descriptor().export_snapshot {
                Some(snapshot) => from_snapshot(snapshot),
                None => {
                    let mut values = Vec::new();
                    for unit in module.scan.units.force()?.iter() {
                        values.extend(from_unit(unit));
                    }
                    values
                }
            };
            let mut distinct = Vec::new();
            for value in raw {
                if !distinct.contains(&value) {
                    distinct.push(value);
                }
            }
            Ok(distinct)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn parses_packages_imports_and_types() {
        let unit = parse_java_source(
            Path::new("Main.java"),
            r#"
            package com.ex.app;

            import com.ex.ui.Widget;
            import static com.ex.util.Preconditions.checkState;
            import com.ex.collections.*;

            public class Main {
                private final com.ex.time.Clock clock = null;
            }
            "#,
        );

        assert_eq!(unit.package, "com.ex.app");
        assert_eq!(unit.type_name.as_deref(), Some("Main"));
        assert_eq!(
            unit.used_packages,
            vec!["com.ex.ui", "com.ex.util", "com.ex.collections", "com.ex.time"]
        );
    }

    #[test]
    fn extracts_service_lookups() {
        let unit = parse_java_source(
            Path::new("Boot.java"),
            r#"
            package com.ex.app;

            import com.ex.spi.Store;

            class Boot {
                void init() {
                    Store store = Services.load(Store.class);
                    var logger = Services.loadOptional(com.ex.spi.Logger.class);
                }
            }
            "#,
        );

        assert_eq!(unit.required_services, vec!["com.ex.spi.Store"]);
        assert_eq!(unit.optional_services, vec!["com.ex.spi.Logger"]);
    }

    #[test]
    fn resolves_unimported_service_to_own_package() {
        let unit = parse_java_source(
            Path::new("Local.java"),
            "package com.ex.app;\nclass Local { Object o = Services.load(Registry.class); }",
        );
        assert_eq!(unit.required_services, vec!["com.ex.app.Registry"]);
    }

    #[test]
    fn lists_sources_deterministically_and_skips_overlays() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let root = dir.path();
        for rel in [
            "com/ex/b/Second.java",
            "com/ex/a/First.java",
            "super/com/ex/a/First.java",
            "com/ex/module-info.java",
            "com/ex/readme.txt",
        ] {
            let path = root.join(rel);
            std::fs::create_dir_all(path.parent().unwrap())?;
            std::fs::write(&path, "package com.ex;")?;
        }

        let files = list_source_files(root).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["com/ex/a/First.java", "com/ex/b/Second.java"]);
        Ok(())
    }

    #[test]
    fn missing_directory_scans_empty() {
        assert_eq!(
            list_source_files(Path::new("/nonexistent/src")).unwrap(),
            Vec::<PathBuf>::new()
        );
    }
}
