use std::{
    convert::Infallible,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};

use miette::Diagnostic;
use once_cell::{sync::Lazy, unsync::OnceCell};
use pyproject_toml::PyProjectToml;
use rattler_conda_types::{ParseVersionError, VersionWithSource};
use serde::Deserialize;
use regex::Regex;
use thiserror::Error;

use crate::consts::{MODULE_INIT_FILE, PYPROJECT_MANIFEST};

/// Matches `__version__ = "1.2.3"` (optionally annotated) at the start of a line.
static VERSION_ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^__version__\s*(?::\s*str\s*)?=\s*['"]([^'"]+)['"]"#)
        .expect("the version regex is valid")
});

/// A source of project metadata. Every method returns `None` when the source
/// does not know the value.
pub trait MetadataProvider {
    type Error: Diagnostic + 'static;

    /// Returns the version of the package or `None` if the provider does not
    /// provide a version. The version keeps the text it was declared with.
    fn version(&mut self) -> Result<Option<VersionWithSource>, Self::Error> {
        Ok(None)
    }

    fn summary(&mut self) -> Result<Option<String>, Self::Error> {
        Ok(None)
    }
    fn homepage(&mut self) -> Result<Option<String>, Self::Error> {
        Ok(None)
    }
    fn license(&mut self) -> Result<Option<String>, Self::Error> {
        Ok(None)
    }
}

impl<M: MetadataProvider + ?Sized> MetadataProvider for Box<M> {
    type Error = M::Error;

    fn version(&mut self) -> Result<Option<VersionWithSource>, Self::Error> {
        (**self).version()
    }
    fn summary(&mut self) -> Result<Option<String>, Self::Error> {
        (**self).summary()
    }
    fn homepage(&mut self) -> Result<Option<String>, Self::Error> {
        (**self).homepage()
    }
    fn license(&mut self) -> Result<Option<String>, Self::Error> {
        (**self).license()
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum MetadataError {
    #[error("failed to parse pyproject.toml, {0}")]
    PyProjectToml(#[from] toml::de::Error),
    #[error("failed to parse version '{version}', {source}")]
    ParseVersion {
        version: String,
        #[source]
        source: ParseVersionError,
    },
    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Returned when the version of the project cannot be determined. This is
/// fatal for a build, there is no sensible default for a version.
#[derive(Debug, Error, Diagnostic)]
pub enum MetadataUnavailable<E: Diagnostic + 'static> {
    #[error("the project metadata could not be loaded")]
    Load(
        #[diagnostic_source]
        #[source]
        E,
    ),
    #[error("the project metadata does not define a version")]
    #[diagnostic(help("set `version` in the [project] table or assign `__version__` in the package"))]
    NoVersionDefined,
}

/// Queries `provider` for the version of the project.
pub fn resolve_version<M: MetadataProvider + ?Sized>(
    provider: &mut M,
) -> Result<VersionWithSource, MetadataUnavailable<M::Error>> {
    let version = provider
        .version()
        .map_err(MetadataUnavailable::Load)?
        .ok_or(MetadataUnavailable::NoVersionDefined)?;
    tracing::debug!("resolved project version {version}");
    Ok(version)
}

fn parse_version(version: &str) -> Result<VersionWithSource, MetadataError> {
    VersionWithSource::from_str(version).map_err(|source| MetadataError::ParseVersion {
        version: version.to_string(),
        source,
    })
}

fn read_file(path: PathBuf) -> Result<String, MetadataError> {
    fs_err::read_to_string(&path).map_err(|source| MetadataError::Io { path, source })
}

/// The `[project].version` exactly as it is written in pyproject.toml.
/// [`PyProjectToml`] only keeps the normalized PEP 440 form.
#[derive(Debug, Default, Deserialize)]
struct DeclaredVersion {
    project: Option<DeclaredProjectVersion>,
}

#[derive(Debug, Default, Deserialize)]
struct DeclaredProjectVersion {
    version: Option<String>,
}

struct LoadedPyproject {
    manifest: PyProjectToml,
    declared_version: Option<String>,
}

/// An implementation of [`MetadataProvider`] that reads metadata from a
/// pyproject.toml file.
pub struct PyprojectMetadataProvider {
    manifest_root: PathBuf,
    pyproject_manifest: OnceCell<LoadedPyproject>,
}

impl PyprojectMetadataProvider {
    /// Constructs a new `PyprojectMetadataProvider` for the directory that
    /// contains the `pyproject.toml` file.
    pub fn new(manifest_root: impl Into<PathBuf>) -> Self {
        Self {
            manifest_root: manifest_root.into(),
            pyproject_manifest: OnceCell::default(),
        }
    }

    /// Ensures that the manifest is loaded and returns the project metadata.
    fn ensure_manifest_project(&self) -> Result<Option<&pyproject_toml::Project>, MetadataError> {
        Ok(self.ensure_manifest()?.manifest.project.as_ref())
    }

    /// Ensures that the manifest is loaded
    fn ensure_manifest(&self) -> Result<&LoadedPyproject, MetadataError> {
        self.pyproject_manifest.get_or_try_init(move || {
            let content = read_file(self.manifest_root.join(PYPROJECT_MANIFEST))?;
            let manifest: PyProjectToml = toml::from_str(&content)?;
            let declared: DeclaredVersion = toml::from_str(&content)?;
            Ok(LoadedPyproject {
                manifest,
                declared_version: declared.project.and_then(|project| project.version),
            })
        })
    }

    /// Returns true if the `[project]` table lists `version` as dynamic.
    pub fn has_dynamic_version(&self) -> Result<bool, MetadataError> {
        Ok(self
            .ensure_manifest_project()?
            .and_then(|proj| proj.dynamic.as_ref())
            .is_some_and(|dynamic| dynamic.iter().any(|field| field == "version")))
    }
}

impl MetadataProvider for PyprojectMetadataProvider {
    type Error = MetadataError;

    /// The `[project].version` string parsed as a conda version.
    fn version(&mut self) -> Result<Option<VersionWithSource>, Self::Error> {
        match &self.ensure_manifest()?.declared_version {
            Some(version) => parse_version(version).map(Some),
            None => Ok(None),
        }
    }

    fn summary(&mut self) -> Result<Option<String>, Self::Error> {
        Ok(self
            .ensure_manifest_project()?
            .and_then(|proj| proj.description.clone()))
    }

    fn homepage(&mut self) -> Result<Option<String>, Self::Error> {
        Ok(self
            .ensure_manifest_project()?
            .and_then(|proj| proj.urls.as_ref())
            .and_then(|urls| urls.get("Homepage").cloned()))
    }

    fn license(&mut self) -> Result<Option<String>, Self::Error> {
        Ok(self
            .ensure_manifest_project()?
            .and_then(|proj| match proj.license.as_ref() {
                Some(pyproject_toml::License::Spdx(spdx)) => Some(spdx.clone()),
                Some(pyproject_toml::License::Text { text }) => Some(text.clone()),
                _ => None,
            }))
    }
}

/// Reads the version from a `__version__` assignment in the `__init__.py` of
/// the package, the way setup.py based projects usually declare it.
pub struct ModuleVersionProvider {
    manifest_root: PathBuf,
    package_name: String,
}

impl ModuleVersionProvider {
    pub fn new(manifest_root: impl Into<PathBuf>, package_name: impl Into<String>) -> Self {
        Self {
            manifest_root: manifest_root.into(),
            package_name: package_name.into(),
        }
    }

    /// The `__init__.py` of the package, either in a flat or a `src` layout.
    pub fn module_path(&self) -> PathBuf {
        let flat = self
            .manifest_root
            .join(&self.package_name)
            .join(MODULE_INIT_FILE);
        if flat.is_file() {
            return flat;
        }
        let src = self
            .manifest_root
            .join("src")
            .join(&self.package_name)
            .join(MODULE_INIT_FILE);
        if src.is_file() { src } else { flat }
    }
}

impl MetadataProvider for ModuleVersionProvider {
    type Error = MetadataError;

    fn version(&mut self) -> Result<Option<VersionWithSource>, Self::Error> {
        let path = self.module_path();
        let source = read_file(path)?;
        let Some(captures) = VERSION_ASSIGNMENT.captures(&source) else {
            return Ok(None);
        };
        parse_version(&captures[1]).map(Some)
    }
}

/// Prefers pyproject.toml and falls back to the package module when
/// pyproject.toml is missing or does not carry a static version.
pub struct AutoMetadataProvider {
    pyproject: PyprojectMetadataProvider,
    module: ModuleVersionProvider,
}

impl AutoMetadataProvider {
    pub fn new(manifest_root: impl AsRef<Path>, package_name: impl Into<String>) -> Self {
        let manifest_root = manifest_root.as_ref();
        Self {
            pyproject: PyprojectMetadataProvider::new(manifest_root),
            module: ModuleVersionProvider::new(manifest_root, package_name),
        }
    }

    /// Runs `query` against pyproject.toml, treating a missing file as "not
    /// known" instead of an error.
    fn from_pyproject<T>(
        &mut self,
        query: impl FnOnce(&mut PyprojectMetadataProvider) -> Result<Option<T>, MetadataError>,
    ) -> Result<Option<T>, MetadataError> {
        match query(&mut self.pyproject) {
            Err(MetadataError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                Ok(None)
            }
            other => other,
        }
    }
}

impl MetadataProvider for AutoMetadataProvider {
    type Error = MetadataError;

    fn version(&mut self) -> Result<Option<VersionWithSource>, Self::Error> {
        if let Some(version) = self.from_pyproject(|p| p.version())? {
            return Ok(Some(version));
        }
        let dynamic = self
            .from_pyproject(|p| p.has_dynamic_version().map(Some))?
            .unwrap_or(false);
        let module_path = self.module.module_path();
        if dynamic {
            tracing::debug!(
                "the version is dynamic in {PYPROJECT_MANIFEST}, reading {}",
                module_path.display()
            );
        } else {
            tracing::debug!(
                "no version in {PYPROJECT_MANIFEST}, reading {}",
                module_path.display()
            );
        }
        self.module.version()
    }

    fn summary(&mut self) -> Result<Option<String>, Self::Error> {
        self.from_pyproject(|p| p.summary())
    }

    fn homepage(&mut self) -> Result<Option<String>, Self::Error> {
        self.from_pyproject(|p| p.homepage())
    }

    fn license(&mut self) -> Result<Option<String>, Self::Error> {
        self.from_pyproject(|p| p.license())
    }
}

/// A provider with fixed values.
#[derive(Debug, Default, Clone)]
pub struct StaticMetadataProvider {
    pub version: Option<VersionWithSource>,
}

impl StaticMetadataProvider {
    pub fn with_version(version: VersionWithSource) -> Self {
        Self {
            version: Some(version),
        }
    }
}

impl MetadataProvider for StaticMetadataProvider {
    type Error = Infallible;

    fn version(&mut self) -> Result<Option<VersionWithSource>, Self::Error> {
        Ok(self.version.clone())
    }
}
