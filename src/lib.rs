// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod report;
pub mod sink;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::{load_and_validate, ConfigFile};
use crate::dag::{graph_from_config, TaskGraph};
use crate::engine::{cancel, CancelSignal, Scheduler};
use crate::exec::{InputResolver, TaskRunner, TransformRegistry};
use crate::fs::{FileSystem, RealFileSystem};
use crate::sink::DirectorySink;
use crate::types::BuildMode;
use crate::watch::{build_profiles_from_config, SchedulerDispatch, WatchSettings};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - task graph construction
/// - sink / runner / scheduler
/// - (watch only) the file watcher
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<ExitCode> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let root = config_root_dir(&config_path);
    let registry = TransformRegistry::with_builtins();

    match args.command {
        Command::Build { release, dry_run } => {
            let mode = if release {
                BuildMode::Release
            } else {
                BuildMode::Dev
            };
            let graph = graph_from_config(&cfg, mode, &registry)?;

            if dry_run {
                print_dry_run(&graph, mode)?;
                return Ok(ExitCode::SUCCESS);
            }

            let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
            let scheduler = scheduler_for(&cfg, &root, fs);
            let signal = cancel_on_ctrl_c();

            let session = scheduler.clean_and_run_all(&graph, &signal).await?;

            let mut stdout = std::io::stdout().lock();
            report::print_summary(&session, &mut stdout)?;

            Ok(if session.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Watch => {
            let graph = Arc::new(graph_from_config(&cfg, BuildMode::Dev, &registry)?);
            let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
            let scheduler = scheduler_for(&cfg, &root, Arc::clone(&fs));
            let signal = cancel_on_ctrl_c();

            // One full pass first; watch mode never cleans.
            let session = scheduler.run_all(&graph, &signal).await?;
            report::log_session(&session);
            if signal.is_cancelled() {
                return Ok(ExitCode::SUCCESS);
            }

            let profiles = build_profiles_from_config(&cfg, BuildMode::Dev)?;
            let settings = WatchSettings {
                debounce: cfg.config_section().debounce(),
                ignore: vec![output_root_relative(&cfg, &root)],
            };
            let target = Arc::new(SchedulerDispatch::new(scheduler, Arc::clone(&graph)));
            let handle = watch::watch(&root, profiles, settings, fs, target)?;

            info!("watching for changes; press Ctrl-C to stop");
            wait_for_cancel(signal).await;
            info!("shutting down watcher");
            handle.stop_and_wait().await;

            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Wire sink, input resolver, runner and scheduler for a project root.
pub fn scheduler_for(cfg: &ConfigFile, root: &Path, fs: Arc<dyn FileSystem>) -> Scheduler {
    let output_root = root.join(cfg.config_section().output_root_path());
    let sink = Arc::new(DirectorySink::new(Arc::clone(&fs), output_root));
    let resolver = InputResolver::new(fs, root);
    Scheduler::new(TaskRunner::new(sink, resolver))
        .with_concurrency(cfg.config_section().concurrency_limit())
}

/// Figure out the project root.
///
/// - If the config path has a non-empty parent (e.g. "site/Assetdag.toml"),
///   use that directory.
/// - If it's a bare filename like "Assetdag.toml" (parent = ""), fall back to
///   the current working directory.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Output root relative to the project root, for the watcher's ignore list.
fn output_root_relative(cfg: &ConfigFile, root: &Path) -> PathBuf {
    let out = cfg.config_section().output_root_path();
    match out.strip_prefix(root) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => out,
    }
}

/// Cancel signal fired by the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancelSignal {
    let (handle, signal) = cancel::pair();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {e}");
            return;
        }
        handle.cancel();
    });
    signal
}

async fn wait_for_cancel(mut signal: CancelSignal) {
    signal.cancelled().await;
}

/// Print the batches and per-task wiring without running anything.
fn print_dry_run(graph: &TaskGraph, mode: BuildMode) -> Result<()> {
    let batches = graph.topological_order()?;
    println!("assetdag dry-run ({mode:?}, {} tasks)", graph.len());

    for (i, batch) in batches.iter().enumerate() {
        println!("batch {}:", i + 1);
        for id in batch {
            let Some(task) = graph.get(id) else {
                continue;
            };
            println!("  - {id} [{}] -> {}", task.transform.name(), task.output.path().display());
            if !task.deps.is_empty() {
                println!("      after: {:?}", task.deps);
            }
            println!("      inputs: {:?}", task.inputs);
            if !task.exclude.is_empty() {
                println!("      exclude: {:?}", task.exclude);
            }
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
