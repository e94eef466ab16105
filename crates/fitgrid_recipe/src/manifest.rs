//! The static recipe configuration.
//!
//! Everything about a package that does not change between builds lives in a
//! small TOML file: the package name, the requirement lists per phase, the
//! modules to import after installation and the about section. The
//! configuration for fitgrid is embedded, see [`RecipeManifest::fitgrid`].

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use rattler_conda_types::PackageName;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    build_string::ProvenanceVariables, consts::DEFAULT_RECIPE_MANIFEST,
    import_check::ImportCheck, requirements::DependencySet,
};

#[derive(Debug, Error, Diagnostic)]
pub enum ManifestError {
    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse the recipe manifest")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RecipeManifest {
    pub package: PackageSection,
    #[serde(default)]
    pub provenance: ProvenanceVariables,
    #[serde(default)]
    pub requirements: DependencySet,
    #[serde(default)]
    pub test: ImportCheck,
    #[serde(default)]
    pub about: AboutSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PackageSection {
    pub name: PackageName,
    /// Location of the sources relative to the recipe.
    #[serde(default)]
    pub source_path: Option<String>,
    /// The command that installs the package into the host prefix.
    #[serde(default)]
    pub script: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AboutSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

impl AboutSection {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl RecipeManifest {
    /// The recipe configuration of fitgrid.
    pub fn fitgrid() -> Result<Self, ManifestError> {
        Self::from_toml_str(DEFAULT_RECIPE_MANIFEST)
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ManifestError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ManifestError> {
        let source = fs_err::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("loaded recipe manifest from {}", path.display());
        Self::from_toml_str(&source)
    }
}

#[cfg(test)]
mod tests {
    use rattler_conda_types::Version;

    use super::*;
    use crate::requirements::DependencyPhase;

    #[test]
    fn test_embedded_manifest() {
        let manifest = RecipeManifest::fitgrid().unwrap();
        assert_eq!(manifest.package.name.as_normalized(), "fitgrid");
        assert_eq!(manifest.provenance, ProvenanceVariables::default());
        assert_eq!(manifest.test.modules(), ["fitgrid", "pymer4"]);

        let build = manifest
            .requirements
            .resolve_dependencies(DependencyPhase::Build);
        assert_eq!(build.len(), 1);
        assert!(
            build[0]
                .1
                .as_ref()
                .is_some_and(|constraint| constraint.to_string().starts_with("!="))
        );

        let host = manifest
            .requirements
            .resolve_dependencies(DependencyPhase::Host)
            .into_iter()
            .map(|(name, _)| name.as_normalized().to_string())
            .collect::<Vec<_>>();
        assert_eq!(host, ["python", "setuptools"]);
    }

    #[test]
    fn test_embedded_run_requirements() {
        let manifest = RecipeManifest::fitgrid().unwrap();
        let run = manifest
            .requirements
            .resolve_dependencies(DependencyPhase::Run);
        assert_eq!(run[0].0.as_normalized(), "python");

        // The import check covers a declared run requirement.
        assert!(
            manifest
                .requirements
                .get(DependencyPhase::Run, "pymer4")
                .is_some()
        );

        let pandas = manifest
            .requirements
            .get(DependencyPhase::Run, "pandas")
            .unwrap();
        assert_eq!(pandas.to_string(), "pandas >=1.0,!=1.0.1");
        assert!(pandas.accepts(&"1.0".parse::<Version>().unwrap()));
        assert!(!pandas.accepts(&"1.0.1".parse::<Version>().unwrap()));
    }

    #[test]
    fn test_minimal_manifest() {
        let manifest = RecipeManifest::from_toml_str(
            r#"
[package]
name = "fitgrid"
"#,
        )
        .unwrap();
        assert!(manifest.about.is_empty());
        assert!(manifest.test.is_empty());
        assert!(
            manifest
                .requirements
                .phase(DependencyPhase::Run)
                .is_empty()
        );
    }

    #[test]
    fn test_unknown_section_is_rejected() {
        let err = RecipeManifest::from_toml_str(
            r#"
[package]
name = "fitgrid"

[outputs]
name = "fitgrid-extra"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ManifestError::Parse(_)));
    }

    #[test]
    fn test_duplicate_requirement_is_rejected() {
        let err = RecipeManifest::from_toml_str(
            r#"
[package]
name = "fitgrid"

[requirements]
run = ["numpy", "scipy", "numpy"]
"#,
        )
        .unwrap_err();
        match err {
            ManifestError::Parse(source) => {
                assert!(source.to_string().contains("'numpy' is declared more than once"))
            }
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_from_missing_path() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("fitgrid-recipe.toml");
        assert!(matches!(
            RecipeManifest::from_path(&path),
            Err(ManifestError::Io { .. })
        ));
    }
}
