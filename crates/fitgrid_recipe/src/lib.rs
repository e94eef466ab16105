pub mod build_string;
pub mod consts;
pub mod descriptor;
pub mod environment;
pub mod import_check;
pub mod manifest;
pub mod metadata;
pub mod recipe;
pub mod requirements;
pub mod resolver;

pub use build_string::{BuildProvenance, ProvenanceVariables, resolve_build_string};
pub use descriptor::BuildDescriptor;
pub use environment::{EnvironmentSource, ProcessEnvironment};
pub use metadata::{MetadataProvider, MetadataUnavailable, resolve_version};
pub use requirements::{DependencyPhase, DependencySet, PackageRequirement};
pub use resolver::BuildDescriptorResolver;
