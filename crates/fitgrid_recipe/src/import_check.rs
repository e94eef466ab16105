use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// The modules an installed package must be able to import before it is
/// accepted. Running the check is up to an external test runner, a failing
/// import fails the build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ImportCheck {
    #[serde(default)]
    imports: Vec<String>,
}

impl ImportCheck {
    pub fn new(imports: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            imports: imports.into_iter().map(Into::into).collect(),
        }
    }

    /// The module names to import, in declaration order.
    pub fn modules(&self) -> &[String] {
        &self.imports
    }

    pub fn is_empty(&self) -> bool {
        self.imports.is_empty()
    }

    /// A python snippet that imports every module, e.g.
    /// `import fitgrid; import pymer4`.
    pub fn script(&self) -> String {
        self.imports
            .iter()
            .map(|module| format!("import {module}"))
            .join("; ")
    }
}
