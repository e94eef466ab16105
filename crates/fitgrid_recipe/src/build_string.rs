//! Derives the build string of a package from the provenance variables of the
//! build environment.
//!
//! The build string has the form `py<python tag><commit abbrev>_<build number>`.
//! Every variable that is not set is replaced by a fixed sentinel, so this
//! never fails. Local builds outside of CI simply end up with a build string
//! like `pyXXno_git_abbrev_commit_no_pkg_buildnum`.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{
    consts::{
        BUILD_NUMBER_SENTINEL, BUILD_NUMBER_VARIABLE, COMMIT_ABBREV_SENTINEL,
        COMMIT_ABBREV_VARIABLE, PYTHON_TAG_SENTINEL, PYTHON_TAG_VARIABLE,
    },
    environment::EnvironmentSource,
};

/// The names of the variables that carry the build provenance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProvenanceVariables {
    /// Variable holding the python version tag, e.g. `39`.
    #[serde(default = "default_python_tag_variable")]
    pub python_tag: String,
    /// Variable holding the abbreviated commit hash of the sources.
    #[serde(default = "default_commit_abbrev_variable")]
    pub commit_abbrev: String,
    /// Variable holding the build number.
    #[serde(default = "default_build_number_variable")]
    pub build_number: String,
}

fn default_python_tag_variable() -> String {
    PYTHON_TAG_VARIABLE.to_string()
}

fn default_commit_abbrev_variable() -> String {
    COMMIT_ABBREV_VARIABLE.to_string()
}

fn default_build_number_variable() -> String {
    BUILD_NUMBER_VARIABLE.to_string()
}

impl Default for ProvenanceVariables {
    fn default() -> Self {
        Self {
            python_tag: default_python_tag_variable(),
            commit_abbrev: default_commit_abbrev_variable(),
            build_number: default_build_number_variable(),
        }
    }
}

/// The provenance of a single build. Values are kept verbatim, nothing is
/// parsed or validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildProvenance {
    pub python_tag: String,
    pub commit_abbrev: String,
    pub build_number: String,
}

impl Default for BuildProvenance {
    /// Provenance of a build where none of the variables are set.
    fn default() -> Self {
        Self {
            python_tag: PYTHON_TAG_SENTINEL.to_string(),
            commit_abbrev: COMMIT_ABBREV_SENTINEL.to_string(),
            build_number: BUILD_NUMBER_SENTINEL.to_string(),
        }
    }
}

impl BuildProvenance {
    /// Reads the provenance from `env`, substituting the sentinel for every
    /// variable that is not set.
    pub fn from_env(env: &impl EnvironmentSource, variables: &ProvenanceVariables) -> Self {
        Self {
            python_tag: lookup(env, &variables.python_tag, PYTHON_TAG_SENTINEL),
            commit_abbrev: lookup(env, &variables.commit_abbrev, COMMIT_ABBREV_SENTINEL),
            build_number: lookup(env, &variables.build_number, BUILD_NUMBER_SENTINEL),
        }
    }

    /// Composes the build string.
    pub fn build_string(&self) -> String {
        self.to_string()
    }
}

impl Display for BuildProvenance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "py{}{}_{}",
            self.python_tag, self.commit_abbrev, self.build_number
        )
    }
}

fn lookup(env: &impl EnvironmentSource, name: &str, sentinel: &str) -> String {
    match env.var(name) {
        Some(value) => {
            tracing::trace!("using `{name}={value}` for the build string");
            value
        }
        None => {
            tracing::trace!("`{name}` is not set, using `{sentinel}`");
            sentinel.to_string()
        }
    }
}

/// Resolves the build string from `env` using the default variable names.
pub fn resolve_build_string(env: &impl EnvironmentSource) -> String {
    BuildProvenance::from_env(env, &ProvenanceVariables::default()).build_string()
}
