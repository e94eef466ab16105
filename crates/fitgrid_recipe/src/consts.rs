/// The name of the package this recipe produces.
pub const PACKAGE_NAME: &str = "fitgrid";

/// The file that holds the recipe configuration next to a project.
pub const RECIPE_MANIFEST: &str = "fitgrid-recipe.toml";
pub const PYPROJECT_MANIFEST: &str = "pyproject.toml";
pub const MODULE_INIT_FILE: &str = "__init__.py";

pub const PYTHON_TAG_VARIABLE: &str = "PYVER";
pub const COMMIT_ABBREV_VARIABLE: &str = "GIT_ABBREV_COMMIT";
pub const BUILD_NUMBER_VARIABLE: &str = "PKG_BUILDNUM";

// Substituted when the matching variable is not set. These are plain
// placeholders, a real value that equals one of them cannot be told apart.
pub const PYTHON_TAG_SENTINEL: &str = "XX";
pub const COMMIT_ABBREV_SENTINEL: &str = "no_git_abbrev_commit";
pub const BUILD_NUMBER_SENTINEL: &str = "no_pkg_buildnum";

/// The recipe configuration for fitgrid itself.
pub const DEFAULT_RECIPE_MANIFEST: &str = include_str!("../fitgrid-recipe.toml");
