use std::fmt::{Display, Formatter};

use rattler_conda_types::{PackageName, VersionWithSource, package::CondaArchiveType};

use crate::{
    build_string::{BuildProvenance, ProvenanceVariables},
    environment::EnvironmentSource,
    metadata::{MetadataProvider, MetadataUnavailable, resolve_version},
};

/// The identity of one package artifact: name, version and build string.
///
/// A descriptor is created once per build and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDescriptor {
    package_name: PackageName,
    version: VersionWithSource,
    provenance: BuildProvenance,
}

impl BuildDescriptor {
    pub fn new(
        package_name: PackageName,
        version: VersionWithSource,
        provenance: BuildProvenance,
    ) -> Self {
        Self {
            package_name,
            version,
            provenance,
        }
    }

    /// Resolves a descriptor from its sources. The version is resolved first,
    /// if that fails no descriptor is produced.
    pub fn resolve<M: MetadataProvider + ?Sized>(
        package_name: PackageName,
        metadata: &mut M,
        env: &impl EnvironmentSource,
        variables: &ProvenanceVariables,
    ) -> Result<Self, MetadataUnavailable<M::Error>> {
        let version = resolve_version(metadata)?;
        let provenance = BuildProvenance::from_env(env, variables);
        Ok(Self::new(package_name, version, provenance))
    }

    pub fn package_name(&self) -> &PackageName {
        &self.package_name
    }

    /// The version as the project declares it.
    pub fn version(&self) -> &VersionWithSource {
        &self.version
    }

    pub fn provenance(&self) -> &BuildProvenance {
        &self.provenance
    }

    pub fn build_string(&self) -> String {
        self.provenance.build_string()
    }

    /// `<name>-<version>-<build string>`, the stem of the artifact file name.
    pub fn identity(&self) -> String {
        self.to_string()
    }

    /// The file name of the artifact for the given archive format.
    pub fn file_name(&self, archive_type: CondaArchiveType) -> String {
        format!("{}{}", self.identity(), archive_type.extension())
    }
}

impl Display for BuildDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.package_name.as_normalized(),
            self.version,
            self.provenance
        )
    }
}
