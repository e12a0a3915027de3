// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! strata CLI - load a module graph in a sandbox and print its exports

use anyhow::Context;
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use strata_loader::{
    LoaderConfig, LoaderError, ModuleLoader, ModuleLoadingErrorKind, ResolveResult, VERSION,
};
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser)]
#[command(
    name = "strata",
    about = "Import-map aware module loader and linker",
    version = VERSION,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Import map file (overrides configuration)
    #[arg(long, global = true)]
    import_map: Option<PathBuf>,

    /// Base URL for the import map and the entry module
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Load a module and print its namespace as JSON
    Run {
        /// Entry module: a file path or a specifier
        entry: String,

        /// Inject a global, as NAME=JSON
        #[arg(short, long = "global", value_name = "NAME=JSON")]
        globals: Vec<String>,

        /// Print the full import chain on failure
        #[arg(long)]
        explain: bool,
    },
    /// Resolve a specifier without loading it
    Resolve {
        /// Module specifier
        specifier: String,

        /// Importing module URL (defaults to the base URL)
        #[arg(long)]
        referrer: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let project_dir = std::env::current_dir().context("cannot determine working directory")?;
    let mut config = LoaderConfig::load(&project_dir)?;

    if let Some(path) = &cli.import_map {
        config.import_map = Some(project_dir.join(path));
    }
    if let Some(base_url) = &cli.base_url {
        config.base_url = Some(base_url.clone());
    }

    init_logging(&config, cli.verbose);

    let loader = ModuleLoader::from_config(&config, &project_dir)?;
    let base_url = config.base_url(&project_dir)?;

    match cli.command {
        Command::Run {
            entry,
            globals,
            explain,
        } => {
            for global in &globals {
                let (name, value) = global
                    .split_once('=')
                    .with_context(|| format!("invalid global '{}', expected NAME=JSON", global))?;
                config.set(&format!("global.{}", name), value);
            }

            let specifier = entry_specifier(&entry, &project_dir)?;
            match loader
                .load(&specifier, &base_url, config.sandbox_config())
                .await
            {
                Ok(namespace) => {
                    println!("{}", serde_json::to_string_pretty(&namespace.to_json())?);
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => Ok(report(&e, explain)),
            }
        }
        Command::Resolve {
            specifier,
            referrer,
        } => {
            let referrer = match referrer {
                Some(r) => Url::parse(&r).with_context(|| format!("invalid referrer '{}'", r))?,
                None => base_url,
            };
            match loader.resolve(&specifier, &referrer)? {
                ResolveResult::Host(name) => println!("{} {}", name, "(host module)".dimmed()),
                ResolveResult::Module(url) => println!("{}", url),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_logging(config: &LoaderConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("strata=debug,strata_loader=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "strata={level},strata_loader={level}",
                level = config.log_level
            ))
        })
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Existing files become `file:` URLs; anything else is used as written.
fn entry_specifier(entry: &str, project_dir: &Path) -> anyhow::Result<String> {
    let path = project_dir.join(entry);
    if path.is_file() {
        let url = Url::from_file_path(&path)
            .map_err(|_| anyhow::anyhow!("cannot convert '{}' to a URL", path.display()))?;
        return Ok(url.into());
    }
    Ok(entry.to_string())
}

fn report(err: &LoaderError, explain: bool) -> ExitCode {
    eprintln!("{}: {}", "Error".red().bold(), err);

    if explain {
        eprintln!();
        eprintln!("{}", err.detail());
    } else if err.as_module_loading().is_some() {
        eprintln!("Use {} to show the import chain", "--explain".cyan());
    }

    match err.as_module_loading().map(|e| e.kind()) {
        Some(ModuleLoadingErrorKind::CircularDependency) => ExitCode::from(2),
        Some(ModuleLoadingErrorKind::FileRead) => ExitCode::from(3),
        None => ExitCode::FAILURE,
    }
}
