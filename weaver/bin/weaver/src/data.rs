// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::collections::BTreeSet;
use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::str::FromStr;

use strum_macros::{Display as StrumDisplay, EnumIter, EnumString};

use crate::module::ProjectModule;

/// Maven-style coordinates identifying a module artifact.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ModuleId {
    pub group: String,
    pub artifact: String,
    pub version: String,
}

impl ModuleId {
    pub fn new(group: &str, artifact: &str, version: &str) -> Self {
        Self {
            group: group.to_owned(),
            artifact: artifact.to_owned(),
            version: version.to_owned(),
        }
    }

    /// Parses `group:artifact:version` coordinates.
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        match parts.as_slice() {
            [group, artifact, version] if !artifact.is_empty() => {
                Ok(Self::new(group, artifact, version))
            }
            _ => Err(format!("invalid module coordinates: {s:?}")),
        }
    }
}

impl Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)
    }
}

/// A single tag of the closed target vocabulary.
#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, StrumDisplay, EnumIter, EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum TargetTag {
    // Platform family.
    Web,
    Jre,
    Native,
    // Runtime variant.
    Gwt,
    Graal,
    // Form factor.
    Desktop,
    Mobile,
}

/// Tags within one family are mutually exclusive; tags of different families
/// compose freely.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum TagFamily {
    Platform,
    Runtime,
    FormFactor,
}

impl TargetTag {
    fn family(self) -> TagFamily {
        match self {
            TargetTag::Web | TargetTag::Jre | TargetTag::Native => TagFamily::Platform,
            TargetTag::Gwt | TargetTag::Graal => TagFamily::Runtime,
            TargetTag::Desktop | TargetTag::Mobile => TagFamily::FormFactor,
        }
    }
}

/// A set of target tags. The empty set is universal: it is compatible with
/// every requested target, but grades lower than any exact match.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Target(BTreeSet<TargetTag>);

impl Target {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tags(tags: impl IntoIterator<Item = TargetTag>) -> Self {
        Self(tags.into_iter().collect())
    }

    pub fn contains(&self, tag: TargetTag) -> bool {
        self.0.contains(&tag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn tags(&self) -> impl Iterator<Item = TargetTag> + '_ {
        self.0.iter().copied()
    }

    /// Grades this tag set as a candidate against a requested target.
    ///
    /// Returns -1 when a candidate tag contradicts the requested target
    /// (same family, different tag). Otherwise returns a non-negative score
    /// that grows with exact tag matches and shrinks with tags the request
    /// does not ask for, so the tightest-fitting candidate grades highest.
    pub fn grade(&self, required: &Target) -> i32 {
        let mut matches = 0;
        let mut extras = 0;
        for tag in self.tags() {
            if required.contains(tag) {
                matches += 1;
            } else if required.tags().any(|r| r.family() == tag.family()) {
                return -1;
            } else {
                extras += 1;
            }
        }
        1 + 2 * matches - extras
    }
}

impl FromStr for Target {
    type Err = String;

    /// Parses a comma-separated tag list, e.g. `"jre,desktop"`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut tags = BTreeSet::new();
        for token in s.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let tag = TargetTag::from_str(token)
                .map_err(|_| format!("unknown target tag: {token:?}"))?;
            tags.insert(tag);
        }
        Ok(Self(tags))
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for tag in self.tags() {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{tag}")?;
            first = false;
        }
        Ok(())
    }
}

/// How a dependency edge came to exist.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, StrumDisplay, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum DependencyKind {
    /// Declared in the descriptor's `<source>` list.
    ExplicitSource,
    /// Inferred from packages used by the module's sources.
    DetectedSource,
    /// Declared to cover gaps the source scanner cannot see.
    UndetectedSource,
    Resource,
    Application,
    Plugin,
    /// Injected per executable target to emulate missing platform APIs.
    Emulation,
    /// Pulled in by service-provider or interface-implementation resolution.
    ImplicitProvider,
}

/// One edge of a module dependency graph.
///
/// Equality and hashing ignore module identity internals and compare the
/// edge's attributes, so `distinct` over a derivation is stable across
/// processes.
#[derive(Clone)]
pub struct Dependency {
    pub source: Rc<ProjectModule>,
    pub destination: Rc<ProjectModule>,
    pub kind: DependencyKind,
    pub optional: bool,
    pub scope: Option<String>,
    pub classifier: Option<String>,
    /// When set, restricts the dependency to executables whose target is
    /// compatible with this tag set.
    pub executable_target: Option<Target>,
}

impl Dependency {
    pub fn new(
        source: Rc<ProjectModule>,
        destination: Rc<ProjectModule>,
        kind: DependencyKind,
    ) -> Self {
        Self {
            source,
            destination,
            kind,
            optional: false,
            scope: None,
            classifier: None,
            executable_target: None,
        }
    }

    #[allow(clippy::type_complexity)]
    fn key(
        &self,
    ) -> (
        &str,
        &str,
        DependencyKind,
        bool,
        &Option<String>,
        &Option<String>,
        &Option<Target>,
    ) {
        (
            self.source.name(),
            self.destination.name(),
            self.kind,
            self.optional,
            &self.scope,
            &self.classifier,
            &self.executable_target,
        )
    }

    /// Visited-set key for transitive closures, chosen so that mutually
    /// referencing descriptors terminate.
    pub fn closure_key(&self) -> (String, String, DependencyKind) {
        (
            self.source.name().to_owned(),
            self.destination.name().to_owned(),
            self.kind,
        )
    }

    /// Deduplication key used by executable finalization.
    pub fn finalize_key(&self) -> (String, DependencyKind) {
        (self.destination.name().to_owned(), self.kind)
    }
}

impl PartialEq for Dependency {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Dependency {}

impl Hash for Dependency {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -[{}]-> {}",
            self.source.name(),
            self.kind,
            self.destination.name()
        )?;
        if let Some(target) = &self.executable_target {
            write!(f, " (executable-target: {target})")?;
        }
        Ok(())
    }
}

/// A resolved service point of an executable: the interface and the provider
/// modules chosen for it, sorted by module name.
#[derive(Clone, Debug)]
pub struct ResolvedProvider {
    pub interface: String,
    pub providers: Vec<Rc<ProjectModule>>,
    /// True when the interface is only ever used through the optional lookup
    /// idiom.
    pub optional: bool,
}

impl PartialEq for ResolvedProvider {
    fn eq(&self, other: &Self) -> bool {
        self.interface == other.interface
            && self.optional == other.optional
            && self.providers.len() == other.providers.len()
            && self
                .providers
                .iter()
                .zip(other.providers.iter())
                .all(|(a, b)| a.name() == b.name())
    }
}

impl Eq for ResolvedProvider {}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use strum::IntoEnumIterator;

    fn target(s: &str) -> Target {
        s.parse().unwrap()
    }

    #[test]
    fn parse_module_id() {
        let id = ModuleId::parse("com.ex:ui:1.0.0").unwrap();
        assert_eq!(id.group, "com.ex");
        assert_eq!(id.artifact, "ui");
        assert_eq!(id.version, "1.0.0");
        assert!(ModuleId::parse("com.ex:ui").is_err());
        assert!(ModuleId::parse("").is_err());
    }

    #[test]
    fn parse_target_tags() {
        let t = target("jre, desktop");
        assert!(t.contains(TargetTag::Jre));
        assert!(t.contains(TargetTag::Desktop));
        assert_eq!(t.to_string(), "jre,desktop");
        assert!("jre,floppy".parse::<Target>().is_err());
    }

    #[test]
    fn grade_prefers_tight_matches() {
        // An exact single-tag match beats a match dragging along an extra
        // form-factor tag.
        assert_eq!(target("web").grade(&target("web")), 3);
        assert_eq!(target("web,desktop").grade(&target("web")), 2);
    }

    #[test]
    fn grade_rejects_platform_conflicts() {
        assert_eq!(target("jre").grade(&target("web")), -1);
        assert_eq!(target("web").grade(&target("jre,desktop")), -1);
    }

    #[test]
    fn grade_of_untagged_candidate_is_universal() {
        assert_eq!(Target::new().grade(&target("web")), 1);
        assert_eq!(Target::new().grade(&Target::new()), 1);
    }

    #[test]
    fn grade_ignores_unrelated_families() {
        // A form-factor tag does not conflict with a platform-only request.
        assert_eq!(target("desktop").grade(&target("web")), 0);
        assert_eq!(target("jre,desktop").grade(&target("jre,desktop")), 5);
    }

    proptest! {
        /// A candidate is incompatible exactly when one of its tags shares a
        /// family with a differing requested tag.
        #[test]
        fn grade_sign_matches_family_conflicts(
            candidate in proptest::sample::subsequence(TargetTag::iter().collect::<Vec<_>>(), 0..=7),
            required in proptest::sample::subsequence(TargetTag::iter().collect::<Vec<_>>(), 0..=7),
        ) {
            let c = Target::from_tags(candidate.iter().copied());
            let r = Target::from_tags(required.iter().copied());
            let conflict = c.tags().any(|ct| {
                !r.contains(ct) && r.tags().any(|rt| rt.family() == ct.family())
            });
            prop_assert_eq!(c.grade(&r) < 0, conflict);
        }
    }
}
