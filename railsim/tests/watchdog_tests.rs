//! Integration tests for `MultiWorkerController`'s async driving surface and
//! its [`Watchdog`] implementation (spec.md §5, §14; SPEC_FULL.md §16).
//!
//! Grounded on the reference watchdog test suite's shape (spawn, health,
//! restart, shutdown as the four load-bearing behaviors to cover), rebuilt
//! against the in-process tokio-task supervisor instead of the reference's
//! SHM-segment/P2P-heartbeat primitives, which have no counterpart here.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use railsim::controller::MultiWorkerController;
use railsim_common::config::{FabConfig, SimulatorConfig};
use railsim_common::vehicle::{LockGrantStrategy, TransferMode};
use railsim_common::watchdog::{HealthStatus, ManagedModule, Watchdog, WatchdogError};

fn write_map(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    write!(
        f,
        r#"
[[nodes]]
name = "A"
x = 0.0
y = 0.0

[[nodes]]
name = "B"
x = 10.0
y = 0.0

[[edges]]
name = "E1"
from = "A"
to = "B"
rail_type = "LINEAR"
distance = 10.0
axis = "X"
rendering_points = [[0.0, 0.0, 0.0], [10.0, 0.0, 0.0]]

auto_vehicle_count = 2
"#
    )
    .unwrap();
    path
}

fn fab_config(dir: &tempfile::TempDir, fab_id: &str) -> FabConfig {
    FabConfig {
        fab_id: fab_id.to_string(),
        map_path: write_map(dir, &format!("{fab_id}.toml")),
        max_vehicles: 8,
        lock_grant_strategy: LockGrantStrategy::Fifo,
        transfer_mode: TransferMode::Random,
        render_offset_x: 0.0,
        render_offset_y: 0.0,
        linear_max_speed: 2.0,
        curve_max_speed: 1.0,
        lock_wait_distance_straight: 1.0,
        lock_wait_distance_curve: 1.5,
    }
}

fn two_fab_config(dir: &tempfile::TempDir, worker_count: usize) -> SimulatorConfig {
    SimulatorConfig {
        shared: None,
        worker_count,
        target_fps: 60.0,
        max_delta: 0.1,
        fabs: vec![fab_config(dir, "fab_0"), fab_config(dir, "fab_1")],
        sensor_presets: vec![],
    }
}

#[tokio::test]
async fn initialize_binds_a_render_buffer_and_starts_every_worker() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = MultiWorkerController::new(two_fab_config(&dir, 2));

    controller.initialize().await.unwrap();
    controller.start().await.unwrap();
    assert_eq!(controller.worker_count(), 2);

    // Let a couple of ticks run, then request a clean shutdown.
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        running_clone.store(false, Ordering::SeqCst);
    });
    controller.run_until_shutdown(running).await;
}

#[tokio::test]
async fn remove_fab_on_unowned_id_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = MultiWorkerController::new(two_fab_config(&dir, 2));
    controller.initialize().await.unwrap();
    controller.remove_fab("ghost_fab").await.unwrap();
}

#[test]
fn spawn_module_rejects_an_out_of_range_worker_index() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = MultiWorkerController::new(two_fab_config(&dir, 2));
    let result = controller.spawn_module(ManagedModule(9), dir.path());
    assert!(matches!(result, Err(WatchdogError::SpawnFailed { .. })));
}

#[test]
fn health_check_on_an_unspawned_worker_is_unknown() {
    let dir = tempfile::tempdir().unwrap();
    let controller = MultiWorkerController::new(two_fab_config(&dir, 2));
    assert_eq!(controller.health_check(ManagedModule(0)), HealthStatus::Unknown);
}

#[tokio::test(flavor = "multi_thread")]
async fn spawn_module_then_health_check_reports_healthy() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = MultiWorkerController::new(two_fab_config(&dir, 2));
    controller.spawn_module(ManagedModule(0), dir.path()).unwrap();

    // Give the spawned task a moment to process INIT and report back,
    // refreshing its last-seen heartbeat.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let result = tokio::task::spawn_blocking(move || controller.health_check(ManagedModule(0)))
        .await
        .unwrap();
    assert!(matches!(result, HealthStatus::Healthy | HealthStatus::Unknown));
}

#[test]
fn shutdown_all_on_a_controller_with_no_spawned_workers_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = MultiWorkerController::new(two_fab_config(&dir, 2));
    assert!(controller.shutdown_all().is_ok());
}
