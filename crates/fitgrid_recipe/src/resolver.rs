use rattler_conda_types::{PackageName, VersionWithSource};

use crate::{
    build_string::BuildProvenance,
    descriptor::BuildDescriptor,
    environment::EnvironmentSource,
    import_check::ImportCheck,
    manifest::RecipeManifest,
    metadata::{MetadataProvider, MetadataUnavailable, resolve_version},
    recipe::{RenderError, RenderedRecipe},
    requirements::{DependencyPhase, VersionConstraint},
};

/// Combines the static recipe manifest with a metadata source and an
/// environment into the identity and requirements of one build.
///
/// Both sources are passed in, nothing is read from the process directly.
pub struct BuildDescriptorResolver<M, E> {
    manifest: RecipeManifest,
    metadata: M,
    env: E,
}

impl<M: MetadataProvider, E: EnvironmentSource> BuildDescriptorResolver<M, E> {
    pub fn new(manifest: RecipeManifest, metadata: M, env: E) -> Self {
        Self {
            manifest,
            metadata,
            env,
        }
    }

    /// The version of the project according to the metadata source.
    pub fn resolve_version(
        &mut self,
    ) -> Result<VersionWithSource, MetadataUnavailable<M::Error>> {
        resolve_version(&mut self.metadata)
    }

    /// The build string for the current environment. Never fails, unset
    /// variables are replaced by their sentinels.
    pub fn resolve_build_string(&self) -> String {
        BuildProvenance::from_env(&self.env, &self.manifest.provenance).build_string()
    }

    /// The declared requirements of `phase`, in declaration order.
    pub fn resolve_dependencies(
        &self,
        phase: DependencyPhase,
    ) -> Vec<(PackageName, Option<VersionConstraint>)> {
        self.manifest.requirements.resolve_dependencies(phase)
    }

    /// The modules that have to be importable after installation.
    pub fn import_check(&self) -> &ImportCheck {
        &self.manifest.test
    }

    pub fn resolve(&mut self) -> Result<BuildDescriptor, MetadataUnavailable<M::Error>> {
        let descriptor = BuildDescriptor::resolve(
            self.manifest.package.name.clone(),
            &mut self.metadata,
            &self.env,
            &self.manifest.provenance,
        )?;
        tracing::debug!("resolved {descriptor}");
        Ok(descriptor)
    }

    /// Renders the recipe of `descriptor` using the metadata source of this
    /// resolver for the about fields the manifest leaves out.
    pub fn render(
        &mut self,
        descriptor: &BuildDescriptor,
    ) -> Result<RenderedRecipe, RenderError<M::Error>> {
        RenderedRecipe::render(&self.manifest, descriptor, &mut self.metadata)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::metadata::StaticMetadataProvider;

    fn resolver(
        version: Option<&str>,
        env: &[(&str, &str)],
    ) -> BuildDescriptorResolver<StaticMetadataProvider, HashMap<String, String>> {
        let metadata = StaticMetadataProvider {
            version: version.map(|v| v.parse().unwrap()),
        };
        let env = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BuildDescriptorResolver::new(RecipeManifest::fitgrid().unwrap(), metadata, env)
    }

    #[test]
    fn test_resolve_build() {
        let mut resolver = resolver(
            Some("0.5.1"),
            &[
                ("PYVER", "39"),
                ("GIT_ABBREV_COMMIT", "a1b2c3"),
                ("PKG_BUILDNUM", "0"),
            ],
        );
        assert_eq!(resolver.resolve_build_string(), "py39a1b2c3_0");
        assert_eq!(resolver.resolve_version().unwrap().to_string(), "0.5.1");
        assert_eq!(
            resolver.resolve().unwrap().identity(),
            "fitgrid-0.5.1-py39a1b2c3_0"
        );
        assert_eq!(resolver.import_check().modules(), ["fitgrid", "pymer4"]);
    }

    #[test]
    fn test_build_string_does_not_need_metadata() {
        let resolver = resolver(None, &[]);
        assert_eq!(
            resolver.resolve_build_string(),
            "pyXXno_git_abbrev_commit_no_pkg_buildnum"
        );
    }

    #[test]
    fn test_unavailable_metadata() {
        let mut resolver = resolver(None, &[("PYVER", "39")]);
        assert!(matches!(
            resolver.resolve(),
            Err(MetadataUnavailable::NoVersionDefined)
        ));
    }

    #[test]
    fn test_run_dependencies() {
        let resolver = resolver(None, &[]);
        let run = resolver.resolve_dependencies(DependencyPhase::Run);
        let (_, pandas) = run
            .iter()
            .find(|(name, _)| name.as_normalized() == "pandas")
            .expect("pandas is a run requirement");
        let pandas = pandas.as_ref().expect("pandas is constrained");
        assert!(pandas.matches(&"1.0".parse().unwrap()));
        assert!(!pandas.matches(&"1.0.1".parse().unwrap()));
        assert_eq!(run, resolver.resolve_dependencies(DependencyPhase::Run));
    }

    #[test]
    fn test_render() {
        let mut resolver = resolver(Some("0.5.1"), &[("PKG_BUILDNUM", "3")]);
        let descriptor = resolver.resolve().unwrap();
        let recipe = resolver.render(&descriptor).unwrap();
        assert_eq!(recipe.build.string, "pyXXno_git_abbrev_commit_3");
        assert_eq!(recipe.requirements.build.len(), 1);
    }
}
