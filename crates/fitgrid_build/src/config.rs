use std::path::{Path, PathBuf};

use clap::ValueEnum;
use fitgrid_recipe::{
    MetadataProvider,
    metadata::{
        AutoMetadataProvider, MetadataError, ModuleVersionProvider, PyprojectMetadataProvider,
    },
};

/// Where the version of the project comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum MetadataSourceKind {
    /// `pyproject.toml`, falling back to the package module.
    #[default]
    Auto,
    /// The `[project]` table of `pyproject.toml`.
    Pyproject,
    /// The `__version__` assignment in the `__init__.py` of the package.
    Module,
}

impl MetadataSourceKind {
    pub fn provider(
        self,
        manifest_root: &Path,
        package_name: &str,
    ) -> Box<dyn MetadataProvider<Error = MetadataError>> {
        match self {
            MetadataSourceKind::Auto => {
                Box::new(AutoMetadataProvider::new(manifest_root, package_name))
            }
            MetadataSourceKind::Pyproject => {
                Box::new(PyprojectMetadataProvider::new(manifest_root))
            }
            MetadataSourceKind::Module => {
                Box::new(ModuleVersionProvider::new(manifest_root, package_name))
            }
        }
    }
}

/// The project directory, `manifest_path` can be either the directory itself
/// or a file inside of it.
pub fn manifest_root(manifest_path: &Path) -> miette::Result<PathBuf> {
    if manifest_path.is_file() {
        manifest_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            miette::miette!(
                "Manifest path {} is a file but has no parent directory.",
                manifest_path.display()
            )
        })
    } else {
        Ok(manifest_path.to_path_buf())
    }
}
