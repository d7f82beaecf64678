//! `MultiWorkerController`: the `railsim` binary's supervisor over worker
//! tasks (spec.md §5, §14; SPEC_FULL.md §16).
//!
//! Grounded on the reference `EvoSupervisor`'s tokio orchestration loop
//! (periodic heartbeat, module-status aggregation, graceful shutdown
//! sequence) and `evo_common::watchdog`'s supervisor contract, re-scoped
//! from OS-process supervision to in-process tokio-task supervision: fabs
//! are partitioned across worker *tasks*, not separate binaries, so there
//! is no shared-memory segment discovery step — workers and the controller
//! already share the same address space, and the render buffer handoff is
//! a plain `Arc<Mutex<..>>` clone rather than a named segment attach.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use railsim_common::command::{DispatchCommand, FabRenderAssignment, OrchestratorMessage, WorkerMessage};
use railsim_common::config::{FabConfig, SimulatorConfig};
use railsim_common::consts::DISPOSE_TIMEOUT_MS;
use railsim_common::error::EngineError;
use railsim_common::watchdog::{HealthStatus, ManagedModule, Watchdog, WatchdogError};
use railsim_memory::layout::{FabSpec, MemoryLayoutManager, RenderSections, RenderSlice};
use railsim_memory::render::RenderBuffer;
use railsim_worker::task::{run_worker, RenderBufferBinding};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const WORKER_CHANNEL_CAPACITY: usize = 256;
const OUTBOX_CAPACITY: usize = 1024;
const RENDER_BINDING_CAPACITY: usize = 4;
const STALE_AFTER_TICKS: u32 = 5;
const MAX_RESTART_ATTEMPTS: u32 = 3;

struct WorkerHandle {
    tx: mpsc::Sender<WorkerMessage>,
    render_tx: mpsc::Sender<RenderBufferBinding>,
    join: JoinHandle<()>,
    fab_ids: Vec<String>,
    restarts: u32,
}

/// Owns every worker task's channel handles, the fab→worker layout, and the
/// one shared render buffer, and exposes both an async driving surface
/// (`initialize`/`start`/`run_until_shutdown`) and the synchronous
/// [`Watchdog`] contract used for ad hoc spawn/health/restart operations.
pub struct MultiWorkerController {
    config: SimulatorConfig,
    layout: MemoryLayoutManager,
    workers: Vec<Option<WorkerHandle>>,
    outbox_tx: mpsc::Sender<(u32, OrchestratorMessage)>,
    outbox_rx: mpsc::Receiver<(u32, OrchestratorMessage)>,
    render_buffer: Option<Arc<Mutex<RenderBuffer>>>,
    sensor_render_buffer: Option<Arc<Mutex<RenderBuffer>>>,
    last_seen: HashMap<u32, Instant>,
}

impl MultiWorkerController {
    pub fn new(config: SimulatorConfig) -> Self {
        let worker_count = config.worker_count.max(1) as u32;
        let specs: Vec<FabSpec> = config
            .fabs
            .iter()
            .map(|f| FabSpec {
                fab_id: f.fab_id.clone(),
                max_vehicles: f.max_vehicles,
            })
            .collect();
        let layout = MemoryLayoutManager::new(&specs, worker_count, false);
        let (outbox_tx, outbox_rx) = mpsc::channel(OUTBOX_CAPACITY);

        Self {
            config,
            layout,
            workers: (0..worker_count).map(|_| None).collect(),
            outbox_tx,
            outbox_rx,
            render_buffer: None,
            sensor_render_buffer: None,
            last_seen: HashMap::new(),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    fn fabs_for_worker(&self, worker_index: u32) -> Vec<FabConfig> {
        let Some(assignment) = self
            .layout
            .worker_assignments()
            .iter()
            .find(|w| w.worker_index == worker_index)
        else {
            return Vec::new();
        };
        assignment
            .fab_ids
            .iter()
            .filter_map(|id| self.config.fabs.iter().find(|f| &f.fab_id == id).cloned())
            .collect()
    }

    fn resolve_fab_configs(&self, worker_index: u32, config_dir: &Path) -> Vec<FabConfig> {
        self.fabs_for_worker(worker_index)
            .into_iter()
            .map(|mut fab| {
                if fab.map_path.is_relative() {
                    fab.map_path = config_dir.join(&fab.map_path);
                }
                fab
            })
            .collect()
    }

    fn spawn_worker_task(&mut self, worker_index: u32) {
        let (tx, rx) = mpsc::channel(WORKER_CHANNEL_CAPACITY);
        let (render_tx, render_rx) = mpsc::channel(RENDER_BINDING_CAPACITY);
        let outbox = self.outbox_tx.clone();
        let target_fps = self.config.target_fps;
        let max_delta = self.config.max_delta;
        let join = tokio::spawn(run_worker(worker_index, rx, render_rx, outbox, target_fps, max_delta));
        let fab_ids = self.fabs_for_worker(worker_index).into_iter().map(|f| f.fab_id).collect();
        self.workers[worker_index as usize] = Some(WorkerHandle {
            tx,
            render_tx,
            join,
            fab_ids,
            restarts: 0,
        });
    }

    /// Spawns every configured worker, sends `INIT` with its assigned fabs,
    /// waits for each to report `INITIALIZED`, computes the shared render
    /// layout from the actual per-fab vehicle counts, and binds each
    /// worker's slice of it (spec.md §4.1, §5).
    pub async fn initialize(&mut self) -> Result<(), EngineError> {
        let worker_count = self.workers.len() as u32;
        for idx in 0..worker_count {
            self.spawn_worker_task(idx);
        }

        let mut pending = 0usize;
        for idx in 0..worker_count {
            let fabs = self.fabs_for_worker(idx);
            if fabs.is_empty() {
                continue;
            }
            let worker = self.workers[idx as usize]
                .as_ref()
                .expect("worker just spawned");
            worker
                .tx
                .send(WorkerMessage::Init { fabs, shared_map_data: None })
                .await
                .map_err(|_| EngineError::FatalInit("worker channel closed during init".into()))?;
            pending += 1;
        }

        let mut fab_vehicle_counts: Vec<(String, u32)> = Vec::new();
        while pending > 0 {
            let (worker_index, msg) = self
                .outbox_rx
                .recv()
                .await
                .ok_or_else(|| EngineError::FatalInit("worker channel closed during init".into()))?;
            self.last_seen.insert(worker_index, Instant::now());
            match msg {
                OrchestratorMessage::Initialized { fab_vehicle_counts: counts } => {
                    fab_vehicle_counts.extend(counts);
                    pending -= 1;
                }
                OrchestratorMessage::Error { message } => {
                    return Err(EngineError::FatalInit(format!(
                        "worker {worker_index} failed to initialize: {message}"
                    )));
                }
                _ => {}
            }
        }

        // Preserve the fab order from `SimulatorConfig` rather than whatever
        // order workers happened to reply in.
        fab_vehicle_counts.sort_by_key(|(id, _)| {
            self.config.fabs.iter().position(|f| &f.fab_id == id).unwrap_or(usize::MAX)
        });

        let render_layout = MemoryLayoutManager::compute_render_layout(&fab_vehicle_counts);
        let total_vehicles = render_layout.total_vehicles;
        let buffer = Arc::new(Mutex::new(
            RenderBuffer::new(total_vehicles as usize * 4).map_err(|e| EngineError::FatalInit(e.to_string()))?,
        ));
        self.render_buffer = Some(Arc::clone(&buffer));

        let sensor_sections: RenderSections = render_layout.sections;
        let sensor_buffer = Arc::new(Mutex::new(
            RenderBuffer::new(sensor_sections.total_floats(total_vehicles))
                .map_err(|e| EngineError::FatalInit(e.to_string()))?,
        ));
        self.sensor_render_buffer = Some(Arc::clone(&sensor_buffer));

        let slice_by_fab: HashMap<String, RenderSlice> = render_layout.fab_slices.into_iter().collect();
        for idx in 0..worker_count {
            let worker = self.workers[idx as usize].as_ref().expect("worker just spawned");
            if worker.fab_ids.is_empty() {
                continue;
            }
            let assignments: Vec<FabRenderAssignment> = worker
                .fab_ids
                .iter()
                .map(|id| {
                    let slice = slice_by_fab.get(id).copied().unwrap_or(RenderSlice {
                        vehicle_start_index: 0,
                        vehicle_count: 0,
                    });
                    FabRenderAssignment {
                        vehicle_start_index: slice.vehicle_start_index,
                        vehicle_count: slice.vehicle_count,
                    }
                })
                .collect();
            worker
                .render_tx
                .send(RenderBufferBinding {
                    buffer: Arc::clone(&buffer),
                    sensor_buffer: Arc::clone(&sensor_buffer),
                    sensor_sections,
                    fab_assignments: assignments,
                    total_vehicles,
                })
                .await
                .map_err(|_| EngineError::FatalInit("worker channel closed binding render buffer".into()))?;
        }

        Ok(())
    }

    async fn broadcast(&self, msg: WorkerMessage) -> Result<(), EngineError> {
        for worker in self.workers.iter().flatten() {
            if worker.fab_ids.is_empty() {
                continue;
            }
            worker
                .tx
                .send(msg.clone())
                .await
                .map_err(|_| EngineError::FatalInit("worker channel closed".into()))?;
        }
        Ok(())
    }

    pub async fn start(&mut self) -> Result<(), EngineError> {
        self.broadcast(WorkerMessage::Start).await
    }

    pub async fn stop(&mut self) -> Result<(), EngineError> {
        self.broadcast(WorkerMessage::Stop).await
    }

    pub async fn pause(&mut self) -> Result<(), EngineError> {
        self.broadcast(WorkerMessage::Pause).await
    }

    pub async fn resume(&mut self) -> Result<(), EngineError> {
        self.broadcast(WorkerMessage::Resume).await
    }

    /// Routes `ADD_FAB` to the named worker. The caller picks the worker
    /// (unlike the fixed initial layout, runtime additions have no
    /// pre-computed region/placement of their own).
    pub async fn add_fab(&mut self, worker_index: u32, fab: FabConfig) -> Result<(), EngineError> {
        let Some(worker) = self.workers.get_mut(worker_index as usize).and_then(|w| w.as_mut()) else {
            return Err(EngineError::FatalInit(format!("worker {worker_index} is not running")));
        };
        worker.fab_ids.push(fab.fab_id.clone());
        worker
            .tx
            .send(WorkerMessage::AddFab { fab })
            .await
            .map_err(|_| EngineError::FatalInit("worker channel closed".into()))
    }

    pub async fn remove_fab(&mut self, fab_id: &str) -> Result<(), EngineError> {
        let Some(worker) = self
            .workers
            .iter_mut()
            .flatten()
            .find(|w| w.fab_ids.iter().any(|id| id == fab_id))
        else {
            tracing::warn!(fab_id, "REMOVE_FAB referenced a fab not owned by any worker");
            return Ok(());
        };
        worker.fab_ids.retain(|id| id != fab_id);
        worker
            .tx
            .send(WorkerMessage::RemoveFab { fab_id: fab_id.to_string() })
            .await
            .map_err(|_| EngineError::FatalInit("worker channel closed".into()))
    }

    pub async fn dispatch_command(&self, fab_id: &str, cmd: DispatchCommand) -> Result<(), EngineError> {
        let Some(worker) = self.workers.iter().flatten().find(|w| w.fab_ids.iter().any(|id| id == fab_id)) else {
            tracing::warn!(fab_id, "COMMAND referenced a fab not owned by any worker");
            return Ok(());
        };
        worker
            .tx
            .send(WorkerMessage::Command { fab_id: fab_id.to_string(), payload: cmd })
            .await
            .map_err(|_| EngineError::FatalInit("worker channel closed".into()))
    }

    /// Drains worker status messages, logging `PERF_STATS`/`UNUSUAL_MOVE`/
    /// `ERROR` as they arrive, until `running` is cleared (e.g. by a ctrl-c
    /// handler), then disposes every worker.
    pub async fn run_until_shutdown(&mut self, running: Arc<AtomicBool>) {
        while running.load(Ordering::Acquire) {
            match tokio::time::timeout(Duration::from_millis(200), self.outbox_rx.recv()).await {
                Ok(Some((worker_index, msg))) => {
                    self.last_seen.insert(worker_index, Instant::now());
                    self.log_message(worker_index, msg);
                }
                Ok(None) => break,
                Err(_) => continue,
            }
        }

        if let Err(e) = self.dispose_all_async().await {
            tracing::error!(error = %e, "error during shutdown");
        }
    }

    fn log_message(&self, worker_index: u32, msg: OrchestratorMessage) {
        match msg {
            OrchestratorMessage::PerfStats { stats, fab_vehicle_counts } => {
                tracing::info!(
                    worker_index,
                    avg_step_ms = stats.avg_step_ms,
                    p95 = stats.p95,
                    p99 = stats.p99,
                    fabs = fab_vehicle_counts.len(),
                    "perf stats"
                );
            }
            OrchestratorMessage::UnusualMove { vehicle_index, fab_id, prev_edge, next_edge, position, .. } => {
                tracing::warn!(
                    worker_index,
                    vehicle_index,
                    fab_id,
                    prev_edge = %prev_edge.name,
                    next_edge = %next_edge.name,
                    x = position.x,
                    y = position.y,
                    "unusual move"
                );
            }
            OrchestratorMessage::Error { message } => {
                tracing::error!(worker_index, message, "worker reported an error");
            }
            OrchestratorMessage::FabAdded { fab_id, actual_num_vehicles } => {
                tracing::info!(worker_index, fab_id, actual_num_vehicles, "fab added");
            }
            OrchestratorMessage::FabRemoved { fab_id } => {
                tracing::info!(worker_index, fab_id, "fab removed");
            }
            OrchestratorMessage::LockTable { fab_id, request_id, .. } => {
                tracing::debug!(worker_index, fab_id, request_id, "lock table snapshot received");
            }
            OrchestratorMessage::Ready | OrchestratorMessage::Initialized { .. } | OrchestratorMessage::Disposed => {}
        }
    }

    async fn dispose_all_async(&mut self) -> Result<(), EngineError> {
        self.broadcast(WorkerMessage::Dispose).await?;

        let deadline = Instant::now() + Duration::from_millis(DISPOSE_TIMEOUT_MS);
        let mut pending = self.workers.iter().flatten().filter(|w| !w.fab_ids.is_empty()).count();
        while pending > 0 {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                break;
            };
            match tokio::time::timeout(remaining, self.outbox_rx.recv()).await {
                Ok(Some((_, OrchestratorMessage::Disposed))) => pending -= 1,
                Ok(Some(_)) => {}
                _ => break,
            }
        }

        for worker in self.workers.iter_mut().flatten() {
            worker.join.abort();
        }
        Ok(())
    }
}

impl Watchdog for MultiWorkerController {
    /// Spawns the worker task at `module.0` and, if it has fabs assigned in
    /// the pre-computed layout, sends `INIT` for them with map paths
    /// resolved against `config_dir`.
    fn spawn_module(&mut self, module: ManagedModule, config_dir: &Path) -> Result<u32, WatchdogError> {
        let worker_index = module.0;
        if worker_index as usize >= self.workers.len() {
            return Err(WatchdogError::SpawnFailed {
                module,
                reason: "worker index out of configured range".into(),
            });
        }
        self.spawn_worker_task(worker_index);

        let fabs = self.resolve_fab_configs(worker_index, config_dir);
        if !fabs.is_empty() {
            let worker = self.workers[worker_index as usize].as_ref().expect("just spawned");
            worker
                .tx
                .try_send(WorkerMessage::Init { fabs, shared_map_data: None })
                .map_err(|e| WatchdogError::SpawnFailed { module, reason: e.to_string() })?;
        }
        self.last_seen.insert(worker_index, Instant::now());
        Ok(worker_index)
    }

    /// Combines task liveness with tick-heartbeat staleness: any message
    /// this worker has sent (a tick's `UNUSUAL_MOVE`s, `PERF_STATS`, or a
    /// control reply) refreshes its `last_seen` timestamp.
    fn health_check(&self, module: ManagedModule) -> HealthStatus {
        let Some(Some(worker)) = self.workers.get(module.0 as usize) else {
            return HealthStatus::Unknown;
        };
        if worker.join.is_finished() {
            return HealthStatus::Dead { exit_code: None };
        }
        match self.last_seen.get(&module.0) {
            None => HealthStatus::Unknown,
            Some(seen) => {
                let age = seen.elapsed();
                let stale_after =
                    Duration::from_secs_f64((1.0 / self.config.target_fps) * STALE_AFTER_TICKS as f64)
                        .max(Duration::from_secs(1));
                if age > stale_after {
                    HealthStatus::Stale { age_secs: age.as_secs() }
                } else {
                    HealthStatus::Healthy
                }
            }
        }
    }

    /// Aborts the existing task (if any), re-spawns it with the same fab
    /// assignment from the layout, and re-sends `INIT`.
    fn restart_module(&mut self, module: ManagedModule) -> Result<u32, WatchdogError> {
        let worker_index = module.0;
        let restarts = self.workers.get(worker_index as usize).and_then(|w| w.as_ref()).map(|w| w.restarts).unwrap_or(0);
        if restarts >= MAX_RESTART_ATTEMPTS {
            return Err(WatchdogError::RestartsExhausted { module, max: MAX_RESTART_ATTEMPTS });
        }
        if let Some(worker) = self.workers.get(worker_index as usize).and_then(|w| w.as_ref()) {
            worker.join.abort();
        }

        self.spawn_worker_task(worker_index);
        if let Some(worker) = self.workers[worker_index as usize].as_mut() {
            worker.restarts = restarts + 1;
        }

        let fabs = self.fabs_for_worker(worker_index);
        if !fabs.is_empty() {
            let worker = self.workers[worker_index as usize].as_ref().expect("just spawned");
            worker
                .tx
                .try_send(WorkerMessage::Init { fabs, shared_map_data: None })
                .map_err(|e| WatchdogError::Other(e.to_string()))?;
        }
        self.last_seen.insert(worker_index, Instant::now());
        Ok(worker_index)
    }

    /// Sends `DISPOSE` to every worker and polls (non-blocking, bounded by
    /// [`DISPOSE_TIMEOUT_MS`]) for each to acknowledge before force-aborting
    /// whatever hasn't, per spec.md §5's dispose-timeout contract.
    fn shutdown_all(&mut self) -> Result<(), WatchdogError> {
        for worker in self.workers.iter().flatten() {
            if worker.fab_ids.is_empty() {
                continue;
            }
            let _ = worker.tx.try_send(WorkerMessage::Dispose);
        }

        let deadline = Instant::now() + Duration::from_millis(DISPOSE_TIMEOUT_MS);
        let mut pending = self.workers.iter().flatten().filter(|w| !w.fab_ids.is_empty()).count();
        while pending > 0 && Instant::now() < deadline {
            match self.outbox_rx.try_recv() {
                Ok((_, OrchestratorMessage::Disposed)) => pending -= 1,
                Ok(_) => {}
                Err(mpsc::error::TryRecvError::Empty) => std::thread::sleep(Duration::from_millis(10)),
                Err(mpsc::error::TryRecvError::Disconnected) => break,
            }
        }

        for worker in self.workers.iter_mut().flatten() {
            worker.join.abort();
        }
        Ok(())
    }
}
