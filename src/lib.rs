// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod ingest;
pub mod logging;
pub mod strategy;
pub mod task;
pub mod types;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{load_or_default, ConfigFile};
use crate::engine::{EngineOptions, Registry};
use crate::exec::ProcessStageExecutor;
use crate::fs::{FileSystem, RealFileSystem};
use crate::strategy::StrategyKind;
use crate::task::{Task, TaskId, TaskLayout, TaskSnapshot};
use crate::types::{Stage, TaskStatus};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - media placement for every input directory
/// - registry / queue / worker
/// - status polling until all admitted tasks are terminal
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_or_default(args.config.as_deref())?;
    let strategy = args.strategy.unwrap_or(cfg.config.default_strategy);

    if args.dry_run {
        print_dry_run(&cfg, strategy);
        return Ok(());
    }

    if args.inputs.is_empty() {
        bail!("no input directories given (see --help)");
    }

    let layout = TaskLayout::new(cfg.tasks_dir());
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let executor = ProcessStageExecutor::new(layout.clone(), cfg.tools.clone(), Arc::clone(&fs));

    // Every input is placed before the worker exists: a bad input aborts the
    // run with nothing started.
    let tasks = place_inputs(&layout, &fs, strategy, &args.inputs).await?;

    let (registry, worker) = engine::start(EngineOptions::from_config(&cfg), executor);
    info!(
        tasks_dir = ?layout.tasks_dir(),
        queue_length = registry.capacity(),
        %strategy,
        "nerfpipe started"
    );

    let mut admitted = Vec::new();
    for (input, task) in args.inputs.iter().zip(tasks) {
        match registry.try_add(task.clone()) {
            Ok(()) => admitted.push(task.id()),
            Err(e) => warn!(task = %task.id(), input = ?input, error = %e, "task not admitted"),
        }
    }

    let interrupted = tokio::select! {
        _ = wait_until_terminal(&registry, &admitted, Duration::from_millis(args.poll_ms)) => false,
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!(error = %e, "failed to listen for Ctrl+C");
            }
            true
        }
    };

    if interrupted {
        info!("interrupted; waiting for the current task to finish");
    }
    worker.stop().await?;

    let snapshots: Vec<TaskSnapshot> = admitted
        .iter()
        .filter_map(|id| registry.get(id))
        .map(|t| t.snapshot())
        .collect();
    print_summary(&snapshots, args.json)?;

    let failed = snapshots
        .iter()
        .filter(|s| s.status == TaskStatus::Failed)
        .count();
    if failed > 0 {
        bail!("{failed} of {} task(s) failed", snapshots.len());
    }
    Ok(())
}

/// Create one task per input and copy its images into place.
async fn place_inputs(
    layout: &TaskLayout,
    fs: &Arc<dyn FileSystem>,
    strategy: StrategyKind,
    inputs: &[PathBuf],
) -> Result<Vec<Task>> {
    let layout = layout.clone();
    let fs = Arc::clone(fs);
    let inputs = inputs.to_vec();

    tokio::task::spawn_blocking(move || {
        inputs
            .iter()
            .map(|input| {
                let task = Task::new(strategy);
                let paths = layout.paths_for(task.id());
                let placed = ingest::place_images(fs.as_ref(), input, &paths.images_dir)
                    .with_context(|| format!("preparing task for {:?}", input))?;
                info!(task = %task.id(), input = ?input, images = placed, "images placed");
                Ok(task)
            })
            .collect::<Result<Vec<_>>>()
    })
    .await?
}

/// Poll the registry, logging every status change, until all `ids` are
/// terminal.
async fn wait_until_terminal(registry: &Registry, ids: &[TaskId], every: Duration) {
    let mut last_seen: HashMap<TaskId, TaskStatus> = HashMap::new();

    loop {
        let mut pending = 0usize;
        for id in ids {
            let Some(task) = registry.get(id) else {
                continue;
            };
            let status = task.status();
            if last_seen.insert(*id, status) != Some(status) {
                info!(task = %id, %status, "status changed");
            }
            if !status.is_terminal() {
                pending += 1;
            }
        }

        if pending == 0 {
            return;
        }
        debug!(pending, queued = registry.queued_len(), "waiting for tasks");
        tokio::time::sleep(every).await;
    }
}

fn print_summary(snapshots: &[TaskSnapshot], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(snapshots)?);
        return Ok(());
    }

    for s in snapshots {
        match &s.error {
            Some(err) => println!("{}  {:<13} {}  {}", s.id, s.status, s.strategy, err),
            None => println!("{}  {:<13} {}", s.id, s.status, s.strategy),
        }
    }
    Ok(())
}

/// Simple dry-run output: print config, timeouts and stage commands.
fn print_dry_run(cfg: &ConfigFile, strategy: StrategyKind) {
    let layout = TaskLayout::new(cfg.tasks_dir());
    let example = layout.paths_for(TaskId::generate());
    let timeouts = strategy.timeouts();

    println!("nerfpipe dry-run");
    println!("  config.tasks_dir = {:?}", layout.tasks_dir());
    println!("  config.queue_length = {}", cfg.config.queue_length);
    println!("  config.admission = {:?}", cfg.config.admission);
    println!("  config.kill_grace = {:?}", cfg.kill_grace());
    println!();
    println!("strategy {strategy}:");

    // The render config only exists after training, so pretend it does.
    let fs = fs::mock::MockFileSystem::new();
    fs.add_dir(&example.dataset_dir);
    fs.add_file(example.model_dir.join("config.yml"), "");

    for stage in Stage::ALL {
        println!("  - {stage} (timeout {:?})", timeouts.for_stage(stage));
        match strategy
            .profile()
            .build_command(stage, &example, &cfg.tools, &fs)
        {
            Ok(cmd) => {
                println!("      cmd: {cmd}");
                if let Some(cwd) = &cmd.cwd {
                    println!("      cwd: {:?}", cwd);
                }
            }
            Err(e) => println!("      cmd: <unavailable: {e}>"),
        }
    }

    debug!("dry-run complete (no execution)");
}
