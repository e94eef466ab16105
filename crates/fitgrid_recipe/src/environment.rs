use std::{
    collections::{BTreeMap, HashMap},
    env::VarError,
};

use indexmap::IndexMap;

/// A source of named variables, usually the environment of the build process.
///
/// Resolution code only ever sees this trait so that it can be driven from a
/// snapshot in tests instead of the real process environment.
pub trait EnvironmentSource {
    /// Returns the value of the variable `name`, or `None` if it is not set.
    ///
    /// A variable that is set to an empty string is still present.
    fn var(&self, name: &str) -> Option<String>;
}

/// Reads variables from the environment of the current process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnvironment;

impl EnvironmentSource for ProcessEnvironment {
    /// A value that is not valid unicode is still present. It is converted
    /// lossily, invalid sequences become `U+FFFD`.
    fn var(&self, name: &str) -> Option<String> {
        match std::env::var(name) {
            Ok(value) => Some(value),
            Err(VarError::NotPresent) => None,
            Err(VarError::NotUnicode(value)) => {
                let value = value.to_string_lossy().into_owned();
                tracing::warn!("`{name}` is not valid unicode, using `{value}`");
                Some(value)
            }
        }
    }
}

impl<T: EnvironmentSource + ?Sized> EnvironmentSource for &T {
    fn var(&self, name: &str) -> Option<String> {
        (**self).var(name)
    }
}

impl EnvironmentSource for IndexMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl EnvironmentSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl EnvironmentSource for BTreeMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}
