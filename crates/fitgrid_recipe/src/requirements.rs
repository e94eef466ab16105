use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use indexmap::{IndexMap, map::Entry};
use itertools::Itertools;
use miette::Diagnostic;
use rattler_conda_types::{
    InvalidPackageNameError, PackageName, ParseStrictness, Version,
    VersionSpec, version_spec::ParseVersionSpecError,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// The phase of a build in which a requirement has to be present.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum DependencyPhase {
    /// Tools that run on the build machine, e.g. compilers.
    Build,
    /// Packages the package is built against, e.g. the interpreter.
    Host,
    /// Packages that have to be installed next to the package.
    Run,
}

#[derive(Debug, Error, Diagnostic)]
pub enum ParseRequirementError {
    #[error("a requirement cannot be empty")]
    Empty,
    #[error(transparent)]
    InvalidName(#[from] InvalidPackageNameError),
    #[error("invalid version constraint in '{requirement}'")]
    InvalidConstraint {
        requirement: String,
        #[source]
        source: ParseVersionSpecError,
    },
}

/// A version constraint that remembers the text it was declared with, so it
/// can be echoed back exactly as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConstraint {
    spec: VersionSpec,
    source: String,
}

impl VersionConstraint {
    pub fn matches(&self, version: &Version) -> bool {
        self.spec.matches(version)
    }
}

impl FromStr for VersionConstraint {
    type Err = ParseVersionSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let source = s.trim();
        Ok(Self {
            spec: VersionSpec::from_str(source, ParseStrictness::Strict)?,
            source: source.to_string(),
        })
    }
}

impl Display for VersionConstraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

/// A package name with an optional version constraint, written as
/// `<name> [constraint]`, e.g. `pandas >=1.0,!=1.0.1`.
///
/// A missing constraint means any version is acceptable.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageRequirement {
    pub name: PackageName,
    pub constraint: Option<VersionConstraint>,
}

impl PackageRequirement {
    /// Returns true if `version` satisfies the constraint of this requirement.
    ///
    /// This only evaluates the declared constraint, it does not resolve
    /// anything.
    pub fn accepts(&self, version: &Version) -> bool {
        self.constraint
            .as_ref()
            .is_none_or(|constraint| constraint.matches(version))
    }
}

impl FromStr for PackageRequirement {
    type Err = ParseRequirementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, constraint) = match s.split_once(char::is_whitespace) {
            Some((name, constraint)) => (name, Some(constraint.trim())),
            None => (s, None),
        };
        if name.is_empty() {
            return Err(ParseRequirementError::Empty);
        }

        let name = PackageName::from_str(name)?;
        let constraint = constraint
            .filter(|constraint| !constraint.is_empty())
            .map(|constraint| {
                VersionConstraint::from_str(constraint).map_err(|source| {
                    ParseRequirementError::InvalidConstraint {
                        requirement: s.to_string(),
                        source,
                    }
                })
            })
            .transpose()?;

        Ok(Self { name, constraint })
    }
}

impl Display for PackageRequirement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.constraint {
            Some(constraint) => write!(f, "{} {}", self.name.as_source(), constraint),
            None => write!(f, "{}", self.name.as_source()),
        }
    }
}

impl Serialize for PackageRequirement {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PackageRequirement {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        PackageRequirement::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Error, Diagnostic)]
#[error("'{name}' is declared more than once in the {phase} requirements")]
pub struct DuplicateRequirementError {
    pub name: String,
    pub phase: DependencyPhase,
}

/// The requirement lists as they are written in the recipe manifest.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeclaredRequirements {
    #[serde(default)]
    build: Vec<PackageRequirement>,
    #[serde(default)]
    host: Vec<PackageRequirement>,
    #[serde(default)]
    run: Vec<PackageRequirement>,
}

impl TryFrom<DeclaredRequirements> for DependencySet {
    type Error = DuplicateRequirementError;

    fn try_from(value: DeclaredRequirements) -> Result<Self, Self::Error> {
        Self::from_declared(value.build, value.host, value.run)
    }
}

/// The declared requirements of a package, per phase, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "DeclaredRequirements")]
pub struct DependencySet {
    build: IndexMap<PackageName, PackageRequirement>,
    host: IndexMap<PackageName, PackageRequirement>,
    run: IndexMap<PackageName, PackageRequirement>,
}

impl DependencySet {
    /// Builds the set from the declared lists. Names must be unique within a
    /// phase, the same name may appear in several phases.
    pub fn from_declared(
        build: impl IntoIterator<Item = PackageRequirement>,
        host: impl IntoIterator<Item = PackageRequirement>,
        run: impl IntoIterator<Item = PackageRequirement>,
    ) -> Result<Self, DuplicateRequirementError> {
        Ok(Self {
            build: Self::collect_phase(DependencyPhase::Build, build)?,
            host: Self::collect_phase(DependencyPhase::Host, host)?,
            run: Self::collect_phase(DependencyPhase::Run, run)?,
        })
    }

    fn collect_phase(
        phase: DependencyPhase,
        requirements: impl IntoIterator<Item = PackageRequirement>,
    ) -> Result<IndexMap<PackageName, PackageRequirement>, DuplicateRequirementError> {
        let mut map = IndexMap::new();
        for requirement in requirements {
            match map.entry(requirement.name.clone()) {
                Entry::Occupied(entry) => {
                    return Err(DuplicateRequirementError {
                        name: entry.key().as_source().to_string(),
                        phase,
                    });
                }
                Entry::Vacant(entry) => {
                    entry.insert(requirement);
                }
            }
        }
        Ok(map)
    }

    /// The requirements of a single phase.
    pub fn phase(&self, phase: DependencyPhase) -> &IndexMap<PackageName, PackageRequirement> {
        match phase {
            DependencyPhase::Build => &self.build,
            DependencyPhase::Host => &self.host,
            DependencyPhase::Run => &self.run,
        }
    }

    /// Returns the declared `(name, constraint)` pairs of `phase` in
    /// declaration order. There is no transitive expansion.
    pub fn resolve_dependencies(
        &self,
        phase: DependencyPhase,
    ) -> Vec<(PackageName, Option<VersionConstraint>)> {
        self.phase(phase)
            .values()
            .map(|requirement| (requirement.name.clone(), requirement.constraint.clone()))
            .collect()
    }

    /// Looks up a requirement by its name.
    pub fn get(&self, phase: DependencyPhase, name: &str) -> Option<&PackageRequirement> {
        let name = PackageName::from_str(name).ok()?;
        self.phase(phase).get(&name)
    }
}

impl Display for DependencySet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ build: [{}], host: [{}], run: [{}] }}",
            self.build.values().format(", "),
            self.host.values().format(", "),
            self.run.values().format(", "),
        )
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use strum::IntoEnumIterator;

    use super::*;

    fn requirements(specs: &[&str]) -> Vec<PackageRequirement> {
        specs.iter().map(|spec| spec.parse().unwrap()).collect()
    }

    #[test]
    fn test_parse_requirement_without_constraint() {
        let requirement: PackageRequirement = "numpy".parse().unwrap();
        assert_eq!(requirement.name.as_normalized(), "numpy");
        assert_eq!(requirement.constraint, None);
        assert_eq!(requirement.to_string(), "numpy");
    }

    #[test]
    fn test_parse_requirement_with_constraint() {
        let requirement: PackageRequirement = "  pandas >=1.0,!=1.0.1 ".parse().unwrap();
        assert_eq!(requirement.name.as_normalized(), "pandas");
        assert_eq!(requirement.to_string(), "pandas >=1.0,!=1.0.1");
    }

    #[rstest]
    #[case("1.0", true)]
    #[case("1.0.1", false)]
    #[case("1.1.5", true)]
    #[case("0.25.3", false)]
    fn test_exclusion_constraint(#[case] version: &str, #[case] accepted: bool) {
        let requirement: PackageRequirement = "pandas >=1.0,!=1.0.1".parse().unwrap();
        let version: Version = version.parse().unwrap();
        assert_eq!(requirement.accepts(&version), accepted);
    }

    #[test]
    fn test_constraint_is_kept_as_written() {
        let requirement: PackageRequirement = "pyarrow >=0.012".parse().unwrap();
        assert_eq!(requirement.to_string(), "pyarrow >=0.012");
        let constraint = requirement.constraint.as_ref().unwrap();
        assert_eq!(constraint.to_string(), ">=0.012");
        assert!(requirement.accepts(&"0.12".parse().unwrap()));
        assert!(!requirement.accepts(&"0.11".parse().unwrap()));
    }

    #[test]
    fn test_unconstrained_accepts_everything() {
        let requirement: PackageRequirement = "tqdm".parse().unwrap();
        assert!(requirement.accepts(&"0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "".parse::<PackageRequirement>(),
            Err(ParseRequirementError::Empty)
        ));
        assert!(matches!(
            "pandas >=>1".parse::<PackageRequirement>(),
            Err(ParseRequirementError::InvalidConstraint { .. })
        ));
        assert!(matches!(
            "pan?das".parse::<PackageRequirement>(),
            Err(ParseRequirementError::InvalidName(_))
        ));
    }

    #[test]
    fn test_resolve_dependencies_keeps_declaration_order() {
        let set = DependencySet::from_declared(
            requirements(&["gcc_linux-64 !=9.3.0"]),
            requirements(&["python", "setuptools"]),
            requirements(&["python", "scipy", "numpy", "pandas >=1.0,!=1.0.1"]),
        )
        .unwrap();

        let run = set.resolve_dependencies(DependencyPhase::Run);
        let names = run
            .iter()
            .map(|(name, _)| name.as_normalized())
            .collect::<Vec<_>>();
        assert_eq!(names, ["python", "scipy", "numpy", "pandas"]);
        assert_eq!(run, set.resolve_dependencies(DependencyPhase::Run));
        assert_eq!(
            run[3].1.as_ref().map(ToString::to_string).as_deref(),
            Some(">=1.0,!=1.0.1")
        );
        assert!(set.get(DependencyPhase::Host, "setuptools").is_some());
        assert!(set.get(DependencyPhase::Run, "setuptools").is_none());
    }

    #[test]
    fn test_duplicate_in_phase_is_rejected() {
        let err = DependencySet::from_declared(
            vec![],
            vec![],
            requirements(&["numpy", "numpy >=1.17"]),
        )
        .unwrap_err();
        assert_eq!(err.phase, DependencyPhase::Run);
        assert_eq!(
            err.to_string(),
            "'numpy' is declared more than once in the run requirements"
        );
    }

    #[test]
    fn test_deserialize_rejects_duplicates() {
        let err = toml::from_str::<DependencySet>(
            r#"
host = ["python", "setuptools", "python"]
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("'python' is declared more than once"));

        let set = toml::from_str::<DependencySet>(r#"run = ["python", "numpy"]"#).unwrap();
        assert!(set.phase(DependencyPhase::Build).is_empty());
        assert_eq!(set.phase(DependencyPhase::Run).len(), 2);
    }

    #[test]
    fn test_phase_names() {
        let names = DependencyPhase::iter()
            .map(|phase| phase.to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, ["build", "host", "run"]);
        assert_eq!("host".parse::<DependencyPhase>().unwrap(), DependencyPhase::Host);
        assert!("test".parse::<DependencyPhase>().is_err());
    }
}
