//! The worker task loop: drives one [`SimulationEngine`] through its
//! control-message/tick cycle (spec.md §5, §6).
//!
//! Grounded on `evo_hal::core::HalCore::run`'s blocking "wait for a signal
//! or the next tick" loop, rebuilt on `tokio::select!` since a worker here
//! is a tokio task, not a dedicated OS thread, and needs to answer control
//! messages (`PAUSE`, `COMMAND`, ...) between ticks without a separate
//! polling thread.
//!
//! `WorkerMessage` (spec.md §6) stays a plain serde-friendly enum so it can
//! describe the wire contract exactly; it cannot itself carry the shared
//! render buffer's `Arc<Mutex<RenderBuffer>>` handle, so that handoff
//! travels over the dedicated [`RenderBufferBinding`] channel instead. A
//! real out-of-process worker would receive a shared-memory handle/fd
//! through the equivalent of `SET_RENDER_BUFFER`; in this in-process model
//! the controller hands over the `Arc` directly.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use railsim_common::command::{FabRenderAssignment, OrchestratorMessage, WorkerMessage};
use railsim_common::consts::PERF_STATS_INTERVAL_S;
use railsim_memory::layout::RenderSections;
use railsim_memory::render::RenderBuffer;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::engine::SimulationEngine;

/// The render-buffer handoff a worker needs once `SET_RENDER_BUFFER` is
/// issued: the shared vehicle-pose buffer, the shared sensor-corner buffer
/// (§4.1/§6 — the sectioned `sensorRenderBuffer`), and the positional
/// assignment table (spec.md §6 — `fabAssignments[]` carries no fab id,
/// matched by the fab-init order within this worker).
pub struct RenderBufferBinding {
    pub buffer: Arc<Mutex<RenderBuffer>>,
    pub sensor_buffer: Arc<Mutex<RenderBuffer>>,
    pub sensor_sections: RenderSections,
    pub fab_assignments: Vec<FabRenderAssignment>,
    pub total_vehicles: u32,
}

/// Runs one worker's message/tick loop until `Dispose` is handled or
/// `inbox` is closed. `outbox` is shared by every worker in the
/// controller; every message this worker emits is tagged with
/// `worker_index` so the controller can attribute it.
pub async fn run_worker(
    worker_index: u32,
    mut inbox: mpsc::Receiver<WorkerMessage>,
    mut render_rx: mpsc::Receiver<RenderBufferBinding>,
    outbox: mpsc::Sender<(u32, OrchestratorMessage)>,
    target_fps: f64,
    max_delta_s: f64,
) {
    let mut engine = SimulationEngine::new();
    let mut ticking = false;
    let mut last_tick = Instant::now();

    let tick_period = Duration::from_secs_f64((1.0 / target_fps).max(1e-6));
    let mut ticker = tokio::time::interval(tick_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut perf_ticker = tokio::time::interval(Duration::from_secs(PERF_STATS_INTERVAL_S));
    perf_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            msg = inbox.recv() => {
                let Some(msg) = msg else { break };
                if handle_message(worker_index, msg, &mut engine, &outbox, &mut ticking, &mut last_tick).await {
                    break;
                }
            }

            binding = render_rx.recv() => {
                let Some(binding) = binding else { continue };
                let ids = engine.fab_ids_in_order();
                let map = ids
                    .into_iter()
                    .zip(binding.fab_assignments.iter().copied())
                    .collect::<std::collections::HashMap<_, _>>();
                if let Err(e) = engine.set_render_buffer(
                    binding.buffer,
                    binding.sensor_buffer,
                    binding.sensor_sections,
                    &map,
                    binding.total_vehicles,
                ) {
                    let _ = outbox.send((worker_index, OrchestratorMessage::Error { message: e.to_string() })).await;
                }
            }

            _ = ticker.tick(), if ticking => {
                let now = Instant::now();
                let dt = now.duration_since(last_tick).as_secs_f64().min(max_delta_s) as f32;
                last_tick = now;
                let events = engine.step_all(dt);
                for event in events {
                    let _ = outbox.send((worker_index, event)).await;
                }
            }

            _ = perf_ticker.tick(), if ticking => {
                if let Some(stats) = engine.take_perf_stats() {
                    let _ = outbox.send((worker_index, stats)).await;
                }
            }
        }
    }
}

/// Handles one `WorkerMessage`. Returns `true` if the worker loop should
/// terminate (only `Dispose` does this — §5's cooperative-shutdown
/// contract).
async fn handle_message(
    worker_index: u32,
    msg: WorkerMessage,
    engine: &mut SimulationEngine,
    outbox: &mpsc::Sender<(u32, OrchestratorMessage)>,
    ticking: &mut bool,
    last_tick: &mut Instant,
) -> bool {
    match msg {
        WorkerMessage::Init { fabs, .. } => match engine.init_fabs(&fabs) {
            Ok(fab_vehicle_counts) => {
                let _ = outbox
                    .send((worker_index, OrchestratorMessage::Initialized { fab_vehicle_counts }))
                    .await;
            }
            Err(e) => {
                let _ = outbox
                    .send((worker_index, OrchestratorMessage::Error { message: e.to_string() }))
                    .await;
            }
        },

        // The actual buffer handle arrives over `RenderBufferBinding`
        // (see module docs); this variant exists for the wire contract and
        // is a no-op here, the binding having already been applied when
        // the controller pushes it onto `render_rx`.
        WorkerMessage::SetRenderBuffer { .. } => {}

        WorkerMessage::Start => {
            if let Err(e) = engine.start_all() {
                let _ = outbox.send((worker_index, OrchestratorMessage::Error { message: e.to_string() })).await;
            } else {
                *ticking = true;
                *last_tick = Instant::now();
                let _ = outbox.send((worker_index, OrchestratorMessage::Ready)).await;
            }
        }

        WorkerMessage::Stop => {
            *ticking = false;
            if let Err(e) = engine.stop_all() {
                let _ = outbox.send((worker_index, OrchestratorMessage::Error { message: e.to_string() })).await;
            }
        }

        WorkerMessage::Pause => {
            if let Err(e) = engine.pause_all() {
                let _ = outbox.send((worker_index, OrchestratorMessage::Error { message: e.to_string() })).await;
            }
        }

        WorkerMessage::Resume => {
            *last_tick = Instant::now();
            if let Err(e) = engine.resume_all() {
                let _ = outbox.send((worker_index, OrchestratorMessage::Error { message: e.to_string() })).await;
            }
        }

        WorkerMessage::Dispose => {
            *ticking = false;
            let _ = engine.dispose_all();
            let _ = outbox.send((worker_index, OrchestratorMessage::Disposed)).await;
            return true;
        }

        WorkerMessage::Command { fab_id, payload } => {
            engine.handle_command(&fab_id, &payload);
        }

        WorkerMessage::AddFab { fab } => match engine.add_fab(&fab) {
            Ok(actual_num_vehicles) => {
                let _ = outbox
                    .send((worker_index, OrchestratorMessage::FabAdded { fab_id: fab.fab_id, actual_num_vehicles }))
                    .await;
            }
            Err(e) => {
                let _ = outbox.send((worker_index, OrchestratorMessage::Error { message: e.to_string() })).await;
            }
        },

        WorkerMessage::RemoveFab { fab_id } => {
            if engine.remove_fab(&fab_id) {
                let _ = outbox.send((worker_index, OrchestratorMessage::FabRemoved { fab_id })).await;
            } else {
                tracing::warn!(worker_index, fab_id, "REMOVE_FAB referenced an unknown fab");
            }
        }

        WorkerMessage::SetLoggerPort { port, worker_id } => {
            tracing::info!(worker_index, worker_id, port, "logger port set (side channel, not wired up)");
        }

        WorkerMessage::GetLockTable { fab_id, request_id } => {
            let data = engine.lock_table_snapshot(&fab_id);
            let _ = outbox
                .send((worker_index, OrchestratorMessage::LockTable { fab_id, request_id, data }))
                .await;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use railsim_common::config::FabConfig;
    use railsim_common::vehicle::{LockGrantStrategy, TransferMode};
    use std::io::Write;

    fn write_map(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("fab.toml");
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

auto_vehicle_count = 1
"#
        )
        .unwrap();
        path
    }

    fn fab_config(dir: &tempfile::TempDir) -> FabConfig {
        FabConfig {
            fab_id: "fab_0".into(),
            map_path: write_map(dir),
            max_vehicles: 4,
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

    #[tokio::test]
    async fn init_start_and_dispose_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::channel(16);
        let (_render_tx, render_rx) = mpsc::channel(1);
        let (out_tx, mut out_rx) = mpsc::channel(64);

        let handle = tokio::spawn(run_worker(0, rx, render_rx, out_tx, 60.0, 0.1));

        tx.send(WorkerMessage::Init { fabs: vec![fab_config(&dir)], shared_map_data: None })
            .await
            .unwrap();
        let (idx, msg) = out_rx.recv().await.unwrap();
        assert_eq!(idx, 0);
        assert!(matches!(msg, OrchestratorMessage::Initialized { .. }));

        tx.send(WorkerMessage::Start).await.unwrap();
        let (_, msg) = out_rx.recv().await.unwrap();
        assert!(matches!(msg, OrchestratorMessage::Ready));

        tx.send(WorkerMessage::Dispose).await.unwrap();
        let (_, msg) = out_rx.recv().await.unwrap();
        assert!(matches!(msg, OrchestratorMessage::Disposed));

        handle.await.unwrap();
    }
}
