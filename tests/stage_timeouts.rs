// tests/stage_timeouts.rs
//
// Deadlines are tens of minutes long, so these run on a paused Tokio clock
// that jumps forward whenever the runtime is idle.

use std::time::Duration;

use tokio::time::Instant;

use nerfpipe::engine::{self, EngineOptions};
use nerfpipe::strategy::StrategyKind;
use nerfpipe::task::Task;
use nerfpipe::types::{Stage, TaskStatus};
use nerfpipe_test_utils::fake_executor::{ScriptedExecutor, StageBehaviour};
use nerfpipe_test_utils::{init_tracing, wait_for_terminal};

const POLL: Duration = Duration::from_secs(10);
const WITHIN: Duration = Duration::from_secs(3 * 60 * 60);

fn minutes(n: u64) -> Duration {
    Duration::from_secs(60 * n)
}

async fn run_hanging(strategy: StrategyKind, stage: Stage) -> (Task, ScriptedExecutor, Duration) {
    let exec = ScriptedExecutor::new().on_stage(stage, StageBehaviour::Hang);
    let (registry, worker) = engine::start(EngineOptions::default(), exec.clone());

    let task = Task::new(strategy);
    let started = Instant::now();
    assert!(registry.add(task.clone()));

    let snap = wait_for_terminal(&registry, task.id(), POLL, WITHIN).await;
    let elapsed = started.elapsed();
    assert_eq!(snap.status, TaskStatus::Failed);

    worker.stop().await.unwrap();
    (task, exec, elapsed)
}

#[tokio::test(start_paused = true)]
async fn preprocess_timeout_is_reported_and_cancelled() {
    init_tracing();
    let (task, exec, elapsed) = run_hanging(StrategyKind::Nerfacto, Stage::Preprocess).await;

    assert_eq!(task.error(), Some("Timeout on preprocessing"));
    assert_eq!(exec.cancelled(), vec![(task.id(), Stage::Preprocess)]);
    assert!(elapsed >= minutes(20), "{elapsed:?}");
    assert!(elapsed < minutes(21), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn train_timeout_depends_on_strategy() {
    init_tracing();
    for (strategy, budget) in [
        (StrategyKind::Nerfacto, minutes(25)),
        (StrategyKind::InstantNgp, minutes(10)),
        (StrategyKind::VanillaNerf, minutes(45)),
    ] {
        let (task, exec, elapsed) = run_hanging(strategy, Stage::Train).await;

        assert_eq!(task.error(), Some("Timeout on training"), "{strategy}");
        assert_eq!(exec.cancelled(), vec![(task.id(), Stage::Train)]);
        assert!(elapsed >= budget, "{strategy}: {elapsed:?}");
        assert!(elapsed < budget + minutes(1), "{strategy}: {elapsed:?}");

        // Rendering never starts after a failed training.
        assert!(exec.calls_for(task.id()).iter().all(|c| c.stage != Stage::Render));
    }
}

#[tokio::test(start_paused = true)]
async fn render_timeout_is_reported() {
    init_tracing();
    let (task, _exec, elapsed) = run_hanging(StrategyKind::InstantNgp, Stage::Render).await;

    assert_eq!(task.error(), Some("Timeout on rendering"));
    assert!(elapsed >= minutes(5));
}

#[tokio::test(start_paused = true)]
async fn stage_ignoring_cancellation_is_aborted_after_grace() {
    init_tracing();
    let exec = ScriptedExecutor::new().on_stage(Stage::Train, StageBehaviour::HangIgnoringCancel);
    let options = EngineOptions {
        kill_grace: Duration::from_secs(30),
        ..EngineOptions::default()
    };
    let (registry, worker) = engine::start(options, exec);

    let slow = Task::new(StrategyKind::InstantNgp);
    let next = Task::new(StrategyKind::InstantNgp);
    let started = Instant::now();
    registry.add(slow.clone());
    registry.add(next.clone());

    let snap = wait_for_terminal(&registry, slow.id(), POLL, WITHIN).await;
    assert_eq!(snap.error.as_deref(), Some("Timeout on training"));
    assert!(started.elapsed() >= minutes(10) + Duration::from_secs(30));

    // The worker is free again for the next task, which hangs the same way.
    let snap = wait_for_terminal(&registry, next.id(), POLL, WITHIN).await;
    assert_eq!(snap.error.as_deref(), Some("Timeout on training"));

    worker.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stage_finishing_within_budget_is_not_interrupted() {
    init_tracing();
    let exec = ScriptedExecutor::new()
        .on_stage(Stage::Preprocess, StageBehaviour::Sleep(minutes(19)))
        .on_stage(Stage::Train, StageBehaviour::Sleep(minutes(24)))
        .on_stage(Stage::Render, StageBehaviour::Sleep(minutes(4)));
    let (registry, worker) = engine::start(EngineOptions::default(), exec.clone());

    let task = Task::new(StrategyKind::Nerfacto);
    registry.add(task.clone());

    let snap = wait_for_terminal(&registry, task.id(), POLL, WITHIN).await;
    assert_eq!(snap.status, TaskStatus::Done);
    assert!(exec.cancelled().is_empty());

    worker.stop().await.unwrap();
}
