pub mod builders;
pub mod fake_executor;

use std::sync::Once;
use std::time::Duration;

use nerfpipe::engine::Registry;
use nerfpipe::task::{TaskId, TaskSnapshot};
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Poll the registry every `poll` until task `id` is terminal.
///
/// Panics if that takes longer than `within` (Tokio time, so this also works
/// with a paused clock).
pub async fn wait_for_terminal(
    registry: &Registry,
    id: TaskId,
    poll: Duration,
    within: Duration,
) -> TaskSnapshot {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        let task = registry.get(&id).expect("task is registered");
        if task.is_terminal() {
            return task.snapshot();
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("task {id} still {} after {:?}", task.status(), within);
        }
        tokio::time::sleep(poll).await;
    }
}

/// Poll `cond` every 5ms for up to 5 seconds.
pub async fn wait_until<F>(what: &str, mut cond: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition never held: {what}");
}

/// Whether process `pid` is still running.
///
/// A zombie has exited even though `kill -0` still finds it, so `/proc` is
/// consulted first where it exists.
pub fn process_alive(pid: &str) -> bool {
    if let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        let state = stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next());
        return !matches!(state, Some("Z") | Some("X"));
    }
    std::process::Command::new("kill")
        .args(["-0", pid])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Block for up to 2 seconds of wall-clock time until `pid` is gone.
///
/// Orphaned processes are reaped by init rather than by the test, and a
/// paused Tokio clock cannot be used to wait for that.
pub fn wait_process_gone(pid: &str) -> bool {
    for _ in 0..200 {
        if !process_alive(pid) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}
