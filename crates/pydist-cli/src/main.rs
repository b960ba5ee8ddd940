#![deny(clippy::all, warnings)]

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use pep508_rs::Requirement;
use serde_json::json;

use pydist_core::{
    default_translator, register_finders, resolve_cache_root, DirectoryCrawler, Interpreter,
    Obtainer, Translate,
};

#[derive(Parser)]
#[command(
    name = "pydist",
    version,
    about = "Resolve Python package requirements into installable artifacts"
)]
struct Cli {
    /// Emit machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve one requirement to a ready distribution.
    Resolve {
        /// Requirement to resolve, e.g. `psutil==0.6.1`.
        requirement: String,
        /// Directories whose files are candidate archives.
        #[arg(long = "find-links", required = true)]
        find_links: Vec<PathBuf>,
        /// Install cache root; defaults to the platform cache directory or
        /// `PYDIST_CACHE_PATH`.
        #[arg(long)]
        cache: Option<PathBuf>,
        /// Fetch timeout in seconds.
        #[arg(long)]
        timeout: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();
    match &cli.command {
        Command::Resolve {
            requirement,
            find_links,
            cache,
            timeout,
        } => resolve(&cli, requirement, find_links, cache.as_deref(), *timeout),
    }
}

fn init_tracing() {
    let filter = std::env::var("PYDIST_LOG").unwrap_or_else(|_| "warn".to_string());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn resolve(
    cli: &Cli,
    spec: &str,
    find_links: &[PathBuf],
    cache: Option<&Path>,
    timeout: Option<u64>,
) -> Result<()> {
    let requirement =
        Requirement::from_str(spec).map_err(|err| anyhow!("invalid requirement {spec}: {err}"))?;
    register_finders();

    let cache_root = match cache {
        Some(path) => {
            std::fs::create_dir_all(path)?;
            path.to_path_buf()
        }
        None => resolve_cache_root()?.path,
    };
    let interpreter = Interpreter::discover()?;
    let obtainer = Obtainer::new(DirectoryCrawler::with_roots(find_links.to_vec()));
    let translator = default_translator(
        &cache_root,
        interpreter,
        timeout.map(Duration::from_secs),
    );

    for package in obtainer.iter(&requirement)? {
        let Some(dist) = translator.translate(&package) else {
            continue; // recoverable decline; try the next candidate
        };
        if cli.json {
            let payload = json!({
                "name": dist.name,
                "version": dist.version.to_string(),
                "location": dist.location,
                "files": dist.files,
            });
            println!("{}", serde_json::to_string_pretty(&payload)?);
        } else {
            println!("{} {} {}", dist.name, dist.version, dist.location.display());
        }
        return Ok(());
    }
    bail!("no candidate for {spec} could be translated")
}
