use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

use crate::{
    descriptor::BuildDescriptor,
    manifest::{AboutSection, RecipeManifest},
    metadata::MetadataProvider,
    requirements::{DependencyPhase, PackageRequirement},
};

#[derive(Debug, Error, Diagnostic)]
pub enum RenderError<MetadataProviderError: Diagnostic + 'static> {
    #[error("An error occurred while querying the {0}")]
    MetadataProviderError(
        String,
        #[diagnostic_source]
        #[source]
        MetadataProviderError,
    ),
}

/// A fully resolved recipe for one build. Nothing in it is templated, every
/// value has already been substituted.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedRecipe {
    pub package: Package,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    pub build: Build,
    pub requirements: Requirements,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tests: Vec<Test>,
    #[serde(skip_serializing_if = "AboutSection::is_empty")]
    pub about: AboutSection,
}

#[derive(Debug, Clone, Serialize)]
pub struct Package {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Source {
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Build {
    pub string: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Requirements {
    pub build: Vec<PackageRequirement>,
    pub host: Vec<PackageRequirement>,
    pub run: Vec<PackageRequirement>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Test {
    pub python: PythonTest,
}

#[derive(Debug, Clone, Serialize)]
pub struct PythonTest {
    pub imports: Vec<String>,
}

impl RenderedRecipe {
    /// Renders the recipe of `descriptor`. The about section of the manifest
    /// wins, fields it leaves empty are taken from `metadata`.
    pub fn render<M: MetadataProvider + ?Sized>(
        manifest: &RecipeManifest,
        descriptor: &BuildDescriptor,
        metadata: &mut M,
    ) -> Result<Self, RenderError<M::Error>> {
        let phase = |phase: DependencyPhase| {
            manifest
                .requirements
                .phase(phase)
                .values()
                .cloned()
                .collect::<Vec<_>>()
        };

        macro_rules! derive_value {
            ($ident:ident) => {
                match &manifest.about.$ident {
                    Some(v) => Some(v.clone()),
                    None => metadata.$ident().map_err(|e| {
                        RenderError::MetadataProviderError(String::from(stringify!($ident)), e)
                    })?,
                }
            };
        }

        let about = AboutSection {
            homepage: derive_value!(homepage),
            license: derive_value!(license),
            summary: derive_value!(summary),
            repository: manifest.about.repository.clone(),
        };

        let tests = if manifest.test.is_empty() {
            Vec::new()
        } else {
            vec![Test {
                python: PythonTest {
                    imports: manifest.test.modules().to_vec(),
                },
            }]
        };

        Ok(Self {
            package: Package {
                name: descriptor.package_name().as_normalized().to_string(),
                version: descriptor.version().to_string(),
            },
            source: manifest
                .package
                .source_path
                .clone()
                .map(|path| Source { path }),
            build: Build {
                string: descriptor.build_string(),
                script: manifest.package.script.clone(),
            },
            requirements: Requirements {
                build: phase(DependencyPhase::Build),
                host: phase(DependencyPhase::Host),
                run: phase(DependencyPhase::Run),
            },
            tests,
            about,
        })
    }

    /// Converts the recipe to YAML string
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
