// tests/registry_admission.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use nerfpipe::engine::{self, EngineOptions, Registry};
use nerfpipe::errors::AdmissionError;
use nerfpipe::strategy::StrategyKind;
use nerfpipe::task::{Task, TaskId};
use nerfpipe::types::{AdmissionPolicy, Stage, TaskStatus};
use nerfpipe_test_utils::fake_executor::{ScriptedExecutor, StageBehaviour};
use nerfpipe_test_utils::{init_tracing, wait_for_terminal, wait_until};

const POLL: Duration = Duration::from_millis(5);
const WITHIN: Duration = Duration::from_secs(5);

#[test]
fn admitted_tasks_come_out_in_arrival_order() {
    init_tracing();
    let (registry, mut rx) = Registry::new(3, AdmissionPolicy::KeepRegistered);

    let tasks: Vec<Task> = (0..3).map(|_| Task::new(StrategyKind::Nerfacto)).collect();
    for t in &tasks {
        assert!(registry.add(t.clone()));
    }
    assert_eq!(registry.queued_len(), 3);

    for expected in &tasks {
        let got = rx.try_recv().expect("queued task");
        assert_eq!(got.id(), expected.id());
    }
    assert!(rx.try_recv().is_none());
}

#[test]
fn full_queue_keeps_task_registered_but_unqueued() {
    init_tracing();
    let (registry, mut rx) = Registry::new(1, AdmissionPolicy::KeepRegistered);

    let first = Task::new(StrategyKind::Nerfacto);
    let second = Task::new(StrategyKind::InstantNgp);
    assert!(registry.add(first.clone()));
    assert!(!registry.add(second.clone()));

    let visible = registry.get(&second.id()).expect("still registered");
    assert_eq!(visible.status(), TaskStatus::Queued);
    assert_eq!(visible.error(), None);
    assert_eq!(registry.list().len(), 2);

    // Only the first one ever reaches the worker.
    assert_eq!(rx.try_recv().map(|t| t.id()), Some(first.id()));
    assert!(rx.try_recv().is_none());
}

#[test]
fn reject_policy_leaves_no_trace_of_refused_task() {
    let (registry, _rx) = Registry::new(1, AdmissionPolicy::Reject);

    assert!(registry.add(Task::new(StrategyKind::Nerfacto)));
    let refused = Task::new(StrategyKind::Nerfacto);
    let err = registry.try_add(refused.clone()).unwrap_err();

    assert_eq!(err, AdmissionError::QueueFull { capacity: 1 });
    assert_eq!(
        err.to_string(),
        "Too many tasks queued (1 waiting). Try again later"
    );
    assert!(registry.get(&refused.id()).is_none());
    assert_eq!(registry.list().len(), 1);
}

#[test]
fn freed_slot_accepts_new_task() {
    let (registry, mut rx) = Registry::new(1, AdmissionPolicy::KeepRegistered);

    assert!(registry.add(Task::new(StrategyKind::Nerfacto)));
    assert!(!registry.add(Task::new(StrategyKind::Nerfacto)));

    // The worker picks one up, freeing the slot.
    rx.try_recv().expect("queued task");
    assert_eq!(registry.queued_len(), 0);

    let later = Task::new(StrategyKind::VanillaNerf);
    assert!(registry.add(later.clone()));
    assert_eq!(rx.try_recv().map(|t| t.id()), Some(later.id()));
}

#[tokio::test]
async fn task_that_already_ran_is_refused() {
    init_tracing();
    let (worked, worker) = engine::start(EngineOptions::default(), ScriptedExecutor::new());
    let task = Task::new(StrategyKind::Nerfacto);
    assert!(worked.add(task.clone()));
    let snap = wait_for_terminal(&worked, task.id(), POLL, WITHIN).await;
    assert_eq!(snap.status, TaskStatus::Done);
    worker.stop().await.unwrap();

    let (registry, _rx) = Registry::new(4, AdmissionPolicy::KeepRegistered);
    match registry.try_add(task.clone()) {
        Err(AdmissionError::NotQueued { id, status }) => {
            assert_eq!(id, task.id());
            assert_eq!(status, TaskStatus::Done);
        }
        other => panic!("expected NotQueued, got {other:?}"),
    }
    assert!(registry.get(&task.id()).is_none());
    assert_eq!(registry.queued_len(), 0);
}

#[test]
fn unknown_id_is_absent() {
    let (registry, _rx) = Registry::new(2, AdmissionPolicy::KeepRegistered);
    registry.add(Task::new(StrategyKind::Nerfacto));

    assert!(registry.get(&TaskId::generate()).is_none());
}

#[test]
fn closed_queue_refuses_admission() {
    let (registry, mut rx) = Registry::new(2, AdmissionPolicy::Reject);
    rx.close();

    assert!(!registry.is_accepting());
    let task = Task::new(StrategyKind::Nerfacto);
    assert_eq!(registry.try_add(task.clone()), Err(AdmissionError::Closed));
    assert!(registry.get(&task.id()).is_none());
}

#[tokio::test]
async fn registry_clones_share_state() {
    init_tracing();
    let (registry, worker) = engine::start(EngineOptions::default(), ScriptedExecutor::new());
    let other = registry.clone();

    let task = Task::new(StrategyKind::Nerfacto);
    assert!(other.add(task.clone()));

    let seen = registry.get(&task.id()).unwrap();
    let snap = wait_for_terminal(&other, task.id(), POLL, WITHIN).await;
    assert_eq!(snap.status, TaskStatus::Done);
    assert_eq!(seen.status(), TaskStatus::Done);
    assert_eq!(registry.list().len(), 1);

    worker.stop().await.unwrap();
}

#[tokio::test]
async fn bound_of_ten_with_a_live_worker() {
    init_tracing();
    let gate = Arc::new(Notify::new());
    let running = Task::new(StrategyKind::Nerfacto);
    let exec = ScriptedExecutor::new().on_task_stage(
        running.id(),
        Stage::Preprocess,
        StageBehaviour::Gate(Arc::clone(&gate)),
    );
    let (registry, worker) = engine::start(EngineOptions::default(), exec.clone());
    assert_eq!(registry.capacity(), 10);

    assert!(registry.add(running.clone()));
    wait_until("first task running", || {
        running.status() == TaskStatus::Preprocessing
    })
    .await;

    // The running task does not hold a slot: ten more fit behind it.
    let waiting: Vec<Task> = (0..10).map(|_| Task::new(StrategyKind::Nerfacto)).collect();
    for t in &waiting {
        assert!(registry.add(t.clone()));
    }
    assert_eq!(registry.queued_len(), 10);

    let eleventh = Task::new(StrategyKind::Nerfacto);
    assert!(!registry.add(eleventh.clone()));
    assert_eq!(
        registry.get(&eleventh.id()).map(|t| t.status()),
        Some(TaskStatus::Queued)
    );

    gate.notify_one();
    let snap = wait_for_terminal(&registry, running.id(), POLL, WITHIN).await;
    assert_eq!(snap.status, TaskStatus::Done);
    wait_until("a slot freed", || registry.queued_len() < 10).await;

    assert!(registry.add(eleventh.clone()));
    let snap = wait_for_terminal(&registry, eleventh.id(), POLL, WITHIN).await;
    assert_eq!(snap.status, TaskStatus::Done);
    for t in &waiting {
        let snap = wait_for_terminal(&registry, t.id(), POLL, WITHIN).await;
        assert_eq!(snap.status, TaskStatus::Done);
    }

    let mut expected = vec![running.id()];
    expected.extend(waiting.iter().map(|t| t.id()));
    expected.push(eleventh.id());
    assert_eq!(exec.started_order(), expected);

    worker.stop().await.unwrap();
}
