use std::{
    io::{self, Write},
    path::PathBuf,
};

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use fitgrid_recipe::{
    BuildDescriptorResolver, DependencyPhase, ProcessEnvironment, consts::RECIPE_MANIFEST,
    manifest::RecipeManifest,
};
use itertools::Itertools;
use miette::IntoDiagnostic;
use rattler_conda_types::package::CondaArchiveType;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{MetadataSourceKind, manifest_root};

/// Resolves the identity and requirements of a fitgrid conda build.
#[derive(Parser, Debug)]
#[command(name = "fitgrid-build", version)]
pub struct App {
    /// The subcommand to run.
    #[clap(subcommand)]
    command: Commands,

    /// The project directory, or a file inside of it.
    #[clap(long, global = true, env = "FITGRID_MANIFEST_PATH", default_value = ".")]
    manifest_path: PathBuf,

    /// The recipe manifest to use instead of the built-in one. Defaults to
    /// `fitgrid-recipe.toml` in the project directory when that file exists.
    #[clap(long, global = true, env = "FITGRID_RECIPE")]
    recipe: Option<PathBuf>,

    /// Where the project version is read from.
    #[clap(long, global = true, value_enum, default_value_t = MetadataSourceKind::Auto)]
    metadata_source: MetadataSourceKind,

    /// Enable verbose logging.
    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the version of the project.
    Version,
    /// Print the build string derived from the environment.
    BuildString,
    /// Print `<name>-<version>-<build string>`.
    Identity {
        /// Print the file name of the artifact for this archive format instead.
        #[clap(long, value_enum)]
        archive: Option<Archive>,
    },
    /// Print the declared requirements of a phase.
    Dependencies {
        /// One of `build`, `host` or `run`.
        phase: DependencyPhase,
    },
    /// Print the modules that must be importable after installation.
    Imports {
        /// Print a python snippet that performs the imports instead.
        #[clap(long)]
        script: bool,
    },
    /// Print the rendered recipe as YAML.
    Render,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Archive {
    Conda,
    TarBz2,
}

impl From<Archive> for CondaArchiveType {
    fn from(value: Archive) -> Self {
        match value {
            Archive::Conda => CondaArchiveType::Conda,
            Archive::TarBz2 => CondaArchiveType::TarBz2,
        }
    }
}

fn setup_logging(verbose: &Verbosity<WarnLevel>) -> miette::Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(verbose.tracing_level_filter().into())
        .from_env()
        .into_diagnostic()?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
    Ok(())
}

fn load_manifest(app: &App) -> miette::Result<RecipeManifest> {
    if let Some(recipe) = &app.recipe {
        return Ok(RecipeManifest::from_path(recipe)?);
    }
    let local = manifest_root(&app.manifest_path)?.join(RECIPE_MANIFEST);
    if local.is_file() {
        return Ok(RecipeManifest::from_path(&local)?);
    }
    tracing::debug!("using the built-in recipe manifest");
    Ok(RecipeManifest::fitgrid()?)
}

/// Runs the command of `app` and returns what should be printed.
pub fn execute(app: &App) -> miette::Result<String> {
    let manifest = load_manifest(app)?;
    let root = manifest_root(&app.manifest_path)?;
    let metadata = app
        .metadata_source
        .provider(&root, manifest.package.name.as_normalized());
    let mut resolver = BuildDescriptorResolver::new(manifest, metadata, ProcessEnvironment);

    let output = match &app.command {
        Commands::Version => resolver.resolve_version()?.to_string(),
        Commands::BuildString => resolver.resolve_build_string(),
        Commands::Identity { archive } => {
            let descriptor = resolver.resolve()?;
            match archive {
                Some(archive) => descriptor.file_name((*archive).into()),
                None => descriptor.identity(),
            }
        }
        Commands::Dependencies { phase } => resolver
            .resolve_dependencies(*phase)
            .into_iter()
            .map(|(name, constraint)| match constraint {
                Some(constraint) => format!("{} {constraint}", name.as_source()),
                None => name.as_source().to_string(),
            })
            .join("\n"),
        Commands::Imports { script } => {
            let check = resolver.import_check();
            if *script {
                check.script()
            } else {
                check.modules().join("\n")
            }
        }
        Commands::Render => {
            let descriptor = resolver.resolve()?;
            resolver
                .render(&descriptor)?
                .to_yaml()
                .into_diagnostic()?
        }
    };
    Ok(output)
}

/// Writes `output` followed by a single newline. Values are written as they
/// are, trailing whitespace included.
fn write_output(writer: &mut impl Write, output: &str) -> io::Result<()> {
    if output.is_empty() {
        return Ok(());
    }
    writer.write_all(output.as_bytes())?;
    if !output.ends_with('\n') {
        writer.write_all(b"\n")?;
    }
    writer.flush()
}

/// The entry point of the `fitgrid-build` binary.
pub fn main() -> miette::Result<()> {
    let app = App::parse();
    setup_logging(&app.verbose)?;
    let output = execute(&app)?;
    write_output(&mut io::stdout().lock(), &output).into_diagnostic()
}
