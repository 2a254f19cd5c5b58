//! gobuild CLI
//!
//! Entry point for the `gobuild` command-line tool.

use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand};
use gobuild::{CliOverrides, Service, ServiceConfig, ServiceError};
use gobuild_worker::BuilderError;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gobuild")]
#[command(about = "Build Go projects to WebAssembly with a local artifact cache", version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Working directory for sources and artifacts (overrides storage.root)
    #[arg(long, global = true)]
    work_dir: Option<PathBuf>,

    /// The `go` executable to use (overrides build.go_binary)
    #[arg(long, global = true)]
    go: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the Go project in a directory
    Build {
        /// Project directory containing .go files and optionally go.mod
        dir: PathBuf,

        /// Copy the resulting artifact here
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,

        /// Print the build result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run one cleanup cycle over the artifact store and toolchain caches
    Clean,

    /// Run periodic cleanup until interrupted
    Gc {
        /// Seconds between cycles (overrides cleanup.interval_seconds)
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let overrides = CliOverrides {
        work_dir: cli.work_dir,
        go_binary: cli.go,
        interval_seconds: match &cli.command {
            Commands::Gc { interval } => *interval,
            _ => None,
        },
    };
    let config = ServiceConfig::load(cli.config.as_deref(), &overrides)
        .context("failed to load configuration")?;

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let service = Service::new(config, &cancel).await?;

    match cli.command {
        Commands::Build { dir, out, json } => run_build(&service, &dir, out, json, &cancel).await,
        Commands::Clean => run_clean(&service, &cancel).await,
        Commands::Gc { .. } => {
            service.dispatcher().start(cancel).await;
            Ok(())
        }
    }
}

async fn run_build(
    service: &Service,
    dir: &Path,
    out: Option<PathBuf>,
    json: bool,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let result = match service.build_dir(dir, cancel).await {
        Ok(result) => result,
        Err(ServiceError::Build(BuilderError::Build(err))) => {
            eprintln!("{}", err);
            process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(out) = &out {
        let size = service.export_artifact(&result.artifact_id, out).await?;
        tracing::info!(path = %out.display(), size, "artifact written");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Artifact: {}", result.file_name);
        println!("  Test binary: {}", result.is_test);
        if result.is_test {
            println!("  Benchmarks: {}", result.has_benchmark);
            println!("  Fuzz tests: {}", result.has_fuzz);
        }
    }
    Ok(())
}

async fn run_clean(service: &Service, cancel: &CancellationToken) -> anyhow::Result<()> {
    let report = service.dispatcher().run_cycle(cancel).await;
    if report.failures.is_empty() {
        println!("Cleanup finished in {:.1}s", report.elapsed.as_secs_f64());
        return Ok(());
    }

    for failure in &report.failures {
        eprintln!("{}: {}", failure.cleaner, failure.error);
    }
    anyhow::bail!("{} cleaner(s) failed", report.failures.len())
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for interrupt");
            return;
        }
        tracing::info!("interrupt received, shutting down");
        cancel.cancel();
    });
}
