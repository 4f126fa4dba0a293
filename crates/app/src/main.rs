use std::path::{Path, PathBuf};
use std::process::ExitCode;

use autor1_core::{
    AutoR1Error, Generator, GeneratorConfig, ProjectStore, TemplateCatalog, TracingSink,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

const PROJECT_EXTENSION: &str = "dbpr";

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Generate {
            paths,
            templates,
            config,
            output_dir,
            suffix,
        } => run_generate(&paths, &templates, config.as_deref(), output_dir.as_deref(), &suffix),
        Commands::Clean {
            path,
            output,
            config,
        } => run_clean(&path, output.as_deref(), config.as_deref()).map(|()| true),
        Commands::Inspect { path, config } => run_inspect(&path, config.as_deref()).map(|()| true),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            tracing::error!(%err, "command failed");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> autor1_core::Result<GeneratorConfig> {
    match path {
        Some(path) => GeneratorConfig::from_json_file(path),
        None => Ok(GeneratorConfig::default()),
    }
}

/// Returns `Ok(false)` when at least one project failed.
fn run_generate(
    paths: &[PathBuf],
    templates: &Path,
    config: Option<&Path>,
    output_dir: Option<&Path>,
    suffix: &str,
) -> autor1_core::Result<bool> {
    let config = load_config(config)?;
    let catalog = TemplateCatalog::load(templates)?;
    let generator = Generator::new(&catalog, &config);

    let projects = expand_projects(paths, suffix)?;
    if projects.is_empty() {
        tracing::warn!("no project files found");
    }

    let mut all_ok = true;
    for project in projects {
        let output = output_path(&project, output_dir, suffix);
        match generate_one(&generator, &project, &output) {
            Ok(()) => tracing::info!(input = %project.display(), output = %output.display(), "generated project"),
            Err(err) if err.is_not_initialised() => {
                eprintln!(
                    "{}: views have not been generated. Please run initial setup in R1 first.",
                    project.display()
                );
                all_ok = false;
            }
            Err(err) => {
                tracing::error!(input = %project.display(), %err, "generation failed");
                all_ok = false;
            }
        }
    }
    Ok(all_ok)
}

fn generate_one(generator: &Generator<'_>, input: &Path, output: &Path) -> autor1_core::Result<()> {
    let store = ProjectStore::open(input)?;
    let report = generator.regenerate(&store, &mut TracingSink)?;
    tracing::debug!(?report, "generation report");
    store.save_as(output)?;
    store.close()
}

fn run_clean(path: &Path, output: Option<&Path>, config: Option<&Path>) -> autor1_core::Result<()> {
    let config = load_config(config)?;
    let catalog = TemplateCatalog::new();
    let store = ProjectStore::open(path)?;
    let report = Generator::new(&catalog, &config).clean(&store, None, &mut TracingSink)?;
    if report.is_empty() {
        tracing::info!(path = %path.display(), "nothing to clean");
    }
    store.save_as(output.unwrap_or(path))?;
    store.close()
}

fn run_inspect(path: &Path, config: Option<&Path>) -> autor1_core::Result<()> {
    let config = load_config(config)?;
    let store = ProjectStore::open(path)?;
    let topology = autor1_core::discover(&store, &config.topology)?;
    let json = serde_json::to_string_pretty(&topology).map_err(AutoR1Error::Config)?;
    println!("{json}");
    Ok(())
}

/// Files are taken as given; directories contribute their project files,
/// minus any earlier output carrying `suffix`.
fn expand_projects(paths: &[PathBuf], suffix: &str) -> autor1_core::Result<Vec<PathBuf>> {
    let mut projects = Vec::new();
    for path in paths {
        if !path.is_dir() {
            projects.push(path.clone());
            continue;
        }
        let mut found = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let candidate = entry?.path();
            let is_project = candidate
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(PROJECT_EXTENSION));
            let is_output = candidate
                .file_stem()
                .and_then(|stem| stem.to_str())
                .is_some_and(|stem| stem.ends_with(suffix));
            if is_project && !is_output {
                found.push(candidate);
            }
        }
        found.sort();
        projects.extend(found);
    }
    Ok(projects)
}

fn output_path(input: &Path, output_dir: Option<&Path>, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = format!("{stem}{suffix}.{PROJECT_EXTENSION}");
    match output_dir.or_else(|| input.parent()) {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Generates meter and master views for R1 projects", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate groups and views for one or more projects.
    Generate {
        /// Project files, or directories holding project files.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Template file with the control sections to stamp.
        #[arg(short, long)]
        templates: PathBuf,
        /// Optional JSON configuration overriding titles and layout.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Directory for the generated copies. Defaults to each input's directory.
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Appended to the file stem of every generated copy.
        #[arg(long, default_value = "_AUTO")]
        suffix: String,
    },
    /// Remove everything a previous run generated.
    Clean {
        path: PathBuf,
        /// Where to write the cleaned project. Defaults to overwriting `path`.
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the discovered speaker topology as JSON.
    Inspect {
        path: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}
