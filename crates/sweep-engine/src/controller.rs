//! SweepController - state machine for sweep execution.
//!
//! The controller applies sweep points to a device attribute, runs the step
//! macro on the door after each point, and waits for the door to settle
//! before moving on. It emits documents and exposes a queryable state
//! instead of mutating any shared UI state.
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐   start()   ┌─────────┐
//! │ Idle │────────────▶│ Running │
//! └──────┘             └────┬────┘
//!    ▲                      │ stop()
//!    │  completed/failed    ▼
//!    │                 ┌──────────┐
//!    └◀────────────────│ Aborting │
//!                      └──────────┘
//! ```
//!
//! The run itself carries its own status: `Pending -> Running ->
//! {Done, Aborted, Failed}`.
//!
//! # Usage
//!
//! ```rust,ignore
//! let controller = Arc::new(SweepController::new(registry, SweepSettings::default()));
//!
//! // Subscribe to documents
//! let mut docs = controller.subscribe();
//!
//! // Run a sweep (executes to completion)
//! let run_uid = controller.start(entry).await?;
//!
//! while let Ok(doc) = docs.recv().await {
//!     match doc {
//!         Document::Point(p) => println!("applied {}", p.value),
//!         Document::Stop(_) => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, error, info, instrument};

use sweep_core::capabilities::{DoorState, MacroDoor};
use sweep_core::document::{new_uid, Document, PointDoc, StartDoc, StopDoc};
use sweep_core::error::{SweepError, SweepResult};
use sweep_hardware::registry::DeviceRegistry;

use crate::entry::SweepEntry;

/// Engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No sweep running, ready to accept a new entry
    Idle,
    /// Executing a sweep
    Running,
    /// Stop requested, winding down the in-flight step
    Aborting,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Idle => write!(f, "idle"),
            EngineState::Running => write!(f, "running"),
            EngineState::Aborting => write!(f, "aborting"),
        }
    }
}

/// Lifecycle status of a single sweep run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Accepted, not yet applying points
    Pending,
    /// Applying points
    Running,
    /// All points applied
    Done,
    /// Stopped by request; the device keeps the last applied value
    Aborted,
    /// Ended early on a device or settle error
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "pending"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Done => write!(f, "done"),
            RunStatus::Aborted => write!(f, "aborted"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// How a settle wait ended, short of an error
enum SettleOutcome {
    /// Log output present and the door back to On
    Settled,
    /// A stop request arrived mid-wait
    Interrupted,
}

/// Controller settings, loadable from the `[controller]` catalog section.
#[derive(Debug, Clone, Deserialize)]
pub struct SweepSettings {
    /// Device id of the macro door
    #[serde(default = "default_door_id")]
    pub door: String,

    /// Settle poll interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum time to wait for the door to settle after one step
    #[serde(default = "default_settle_timeout_ms")]
    pub settle_timeout_ms: u64,

    /// Macro submitted to the door after each applied point
    /// (name followed by arguments)
    #[serde(default = "default_step_macro")]
    pub step_macro: Vec<String>,
}

fn default_door_id() -> String {
    "door".to_string()
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_settle_timeout_ms() -> u64 {
    30_000
}

fn default_step_macro() -> Vec<String> {
    vec!["ct".to_string(), "0.1".to_string()]
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            door: default_door_id(),
            poll_interval_ms: default_poll_interval_ms(),
            settle_timeout_ms: default_settle_timeout_ms(),
            step_macro: default_step_macro(),
        }
    }
}

/// Context for one sweep run, queryable while and after it executes
#[derive(Debug, Clone)]
pub struct SweepRun {
    /// Unique run identifier
    pub run_uid: String,
    /// The entry being swept
    pub entry: SweepEntry,
    /// Last value applied to the device, if any
    pub current_value: Option<f64>,
    /// Lifecycle status
    pub status: RunStatus,
}

/// The SweepController orchestrates sweep execution
pub struct SweepController {
    /// Current engine state
    state: RwLock<EngineState>,

    /// Device registry for hardware lookups
    registry: Arc<DeviceRegistry>,

    /// Controller settings
    settings: SweepSettings,

    /// Document broadcast channel
    doc_sender: broadcast::Sender<Document>,

    /// Abort request flag, checked between steps and between settle polls
    abort_requested: RwLock<bool>,

    /// Most recent run (kept after completion for status queries)
    run: Mutex<Option<SweepRun>>,
}

impl SweepController {
    /// Create a new controller over the given registry.
    pub fn new(registry: Arc<DeviceRegistry>, settings: SweepSettings) -> Self {
        let (doc_sender, _) = broadcast::channel(1024);

        Self {
            state: RwLock::new(EngineState::Idle),
            registry,
            settings,
            doc_sender,
            abort_requested: RwLock::new(false),
            run: Mutex::new(None),
        }
    }

    /// Subscribe to the document stream
    pub fn subscribe(&self) -> broadcast::Receiver<Document> {
        self.doc_sender.subscribe()
    }

    /// Get current engine state
    pub async fn state(&self) -> EngineState {
        *self.state.read().await
    }

    /// Get the most recent run (current if one is executing)
    pub async fn current_run(&self) -> Option<SweepRun> {
        self.run.lock().await.clone()
    }

    /// Get the run uid of the most recent run
    pub async fn current_run_uid(&self) -> Option<String> {
        self.run.lock().await.as_ref().map(|r| r.run_uid.clone())
    }

    /// Execute a sweep to completion.
    ///
    /// Validates the entry and resolves the device and door before anything
    /// is written; validation problems, unknown devices and a busy engine
    /// are returned as errors with the device untouched. Once points start
    /// being applied, device faults end the run with `RunStatus::Failed`
    /// (reported in the Stop document), and the run uid is still returned.
    ///
    /// On abort there is no rollback: the device keeps the last applied
    /// value, which the Stop document records.
    #[instrument(skip(self, entry), fields(device = %entry.device, attribute = %entry.attribute), err)]
    pub async fn start(&self, entry: SweepEntry) -> SweepResult<String> {
        if !entry.enabled {
            return Err(SweepError::EntryDisabled(entry.device.clone()));
        }
        entry.validate()?;

        let device = self
            .registry
            .get_attribute_access(&entry.device)
            .ok_or_else(|| SweepError::UnknownDevice(entry.device.clone()))?;
        let door = self
            .registry
            .get_door(&self.settings.door)
            .ok_or_else(|| SweepError::UnknownDevice(self.settings.door.clone()))?;

        {
            let mut state = self.state.write().await;
            if *state != EngineState::Idle {
                return Err(SweepError::Busy);
            }
            // Reset under the same guard, so a stop() that observes Running
            // cannot have its abort flag erased by this prologue
            *self.abort_requested.write().await = false;
            *state = EngineState::Running;
        }

        let run_uid = new_uid();
        info!(run_uid = %run_uid, "Sweep started");

        {
            let mut run = self.run.lock().await;
            *run = Some(SweepRun {
                run_uid: run_uid.clone(),
                entry: entry.clone(),
                current_value: None,
                status: RunStatus::Pending,
            });
        }

        let mut start_doc = StartDoc::new(
            &entry.device,
            &entry.attribute,
            entry.start,
            entry.end,
            entry.step,
            entry.num_points(),
        );
        start_doc.uid = run_uid.clone();
        self.emit_document(Document::Start(start_doc)).await;

        self.set_run_status(RunStatus::Running).await;

        // Apply points
        let mut num_points = 0u32;
        let mut last_value = None;
        let mut exit_status = "success";
        let mut exit_reason = String::new();

        for value in entry.points() {
            // Check for abort between steps
            if *self.abort_requested.read().await {
                exit_status = "abort";
                exit_reason = "Stop requested".to_string();
                break;
            }

            // Stale output from the previous step must not satisfy the
            // settle condition
            door.clear_log_buffer().await;

            if let Err(e) = device.set_attribute(&entry.attribute, value).await {
                error!(error = %e, value = %value, "Failed to apply sweep value");
                exit_status = "fail";
                exit_reason = e.to_string();
                break;
            }
            last_value = Some(value);
            self.set_run_value(value).await;

            if let Err(e) = door.run_macro(&self.settings.step_macro).await {
                error!(error = %e, "Step macro rejected");
                exit_status = "fail";
                exit_reason = e.to_string();
                break;
            }

            match self.wait_settled(door.as_ref()).await {
                Ok(SettleOutcome::Settled) => {}
                // The value was applied but its settle never completed;
                // claiming a Point for it would overstate the run
                Ok(SettleOutcome::Interrupted) => {
                    exit_status = "abort";
                    exit_reason = "Stop requested".to_string();
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Door did not settle");
                    exit_status = "fail";
                    exit_reason = e.to_string();
                    break;
                }
            }

            self.emit_document(Document::Point(PointDoc::new(&run_uid, num_points, value)))
                .await;
            num_points += 1;
        }

        // An abort may have arrived during the final settle
        if exit_status == "success" && *self.abort_requested.read().await {
            exit_status = "abort";
            exit_reason = "Stop requested".to_string();
        }

        let (stop_doc, status) = match exit_status {
            "success" => (
                StopDoc::success(&run_uid, num_points, last_value),
                RunStatus::Done,
            ),
            "abort" => (
                StopDoc::abort(&run_uid, &exit_reason, num_points, last_value),
                RunStatus::Aborted,
            ),
            _ => (
                StopDoc::fail(&run_uid, &exit_reason, num_points, last_value),
                RunStatus::Failed,
            ),
        };
        self.set_run_status(status).await;
        self.emit_document(Document::Stop(stop_doc)).await;

        // Same guard discipline as stop(): state and abort flag change
        // together, so a concurrent stop() sees either Running or Idle,
        // never a half-finished epilogue
        {
            let mut state = self.state.write().await;
            *self.abort_requested.write().await = false;
            *state = EngineState::Idle;
        }

        info!(
            run_uid = %run_uid,
            exit_status = %exit_status,
            num_points = %num_points,
            "Sweep complete"
        );

        Ok(run_uid)
    }

    /// Request a stop.
    ///
    /// Sets the abort flag; the controller applies no further values, and a
    /// settle wait in progress is interrupted at its next poll (the step's
    /// applied value and submitted macro are not rolled back). Returns
    /// `SweepError::NotRunning` when no sweep is active.
    #[instrument(skip(self), err)]
    pub async fn stop(&self) -> SweepResult<()> {
        // One write guard across check and transition, so a run finishing
        // concurrently (epilogue writes Idle) cannot interleave and leave
        // the engine stuck in Aborting with no run to abort
        let mut state = self.state.write().await;
        match *state {
            EngineState::Running => {
                info!("Stop requested");
                *self.abort_requested.write().await = true;
                *state = EngineState::Aborting;
                Ok(())
            }
            // Already stopping - request is a no-op
            EngineState::Aborting => Ok(()),
            EngineState::Idle => Err(SweepError::NotRunning),
        }
    }

    /// Wait for the door to settle after a step.
    ///
    /// Polls at the configured interval until the door log buffer is
    /// non-empty AND the door state is back to [`DoorState::On`]. A stop
    /// request interrupts the wait between polls
    /// ([`SettleOutcome::Interrupted`]); the caller then ends the run as
    /// aborted without emitting a Point for the unsettled step. Expiry of
    /// the settle deadline is `SweepError::SettleTimeout`.
    async fn wait_settled(&self, door: &dyn MacroDoor) -> SweepResult<SettleOutcome> {
        let poll = Duration::from_millis(self.settings.poll_interval_ms.max(1));
        let deadline = Instant::now() + Duration::from_millis(self.settings.settle_timeout_ms);

        loop {
            if *self.abort_requested.read().await {
                debug!("Settle wait interrupted by stop request");
                return Ok(SettleOutcome::Interrupted);
            }

            if !door.log_buffer().await.is_empty() && door.state().await == DoorState::On {
                return Ok(SettleOutcome::Settled);
            }

            if Instant::now() >= deadline {
                return Err(SweepError::SettleTimeout {
                    door: self.settings.door.clone(),
                    timeout_ms: self.settings.settle_timeout_ms,
                });
            }

            sleep(poll).await;
        }
    }

    /// Emit a document to all subscribers
    async fn emit_document(&self, doc: Document) {
        debug!(uid = %doc.uid(), "Emitting document");

        // Ignore send errors (no subscribers)
        let _ = self.doc_sender.send(doc);
    }

    async fn set_run_status(&self, status: RunStatus) {
        if let Some(run) = self.run.lock().await.as_mut() {
            run.status = status;
        }
    }

    async fn set_run_value(&self, value: f64) {
        if let Some(run) = self.run.lock().await.as_mut() {
            run.current_value = Some(value);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sweep_hardware::registry::{DeviceConfig, DriverType};

    fn registry(macro_duration_ms: u64) -> Arc<DeviceRegistry> {
        let registry = DeviceRegistry::new();
        registry
            .register(DeviceConfig {
                id: "motor_1".to_string(),
                name: "Dummy Motor 1".to_string(),
                driver: DriverType::MockMotor {
                    initial_position: 0.0,
                },
            })
            .unwrap();
        registry
            .register(DeviceConfig {
                id: "door".to_string(),
                name: "Macro Door".to_string(),
                driver: DriverType::MockDoor { macro_duration_ms },
            })
            .unwrap();
        Arc::new(registry)
    }

    fn fast_settings() -> SweepSettings {
        SweepSettings {
            poll_interval_ms: 2,
            settle_timeout_ms: 1_000,
            ..SweepSettings::default()
        }
    }

    fn entry(start: f64, end: f64, step: f64) -> SweepEntry {
        SweepEntry::new("motor_1", "Position", start, end, step)
    }

    async fn collect_run_docs(
        rx: &mut broadcast::Receiver<Document>,
    ) -> (Vec<PointDoc>, StopDoc) {
        let mut points = Vec::new();
        loop {
            match rx.recv().await.unwrap() {
                Document::Point(p) => points.push(p),
                Document::Stop(stop) => return (points, stop),
                Document::Start(_) => {}
            }
        }
    }

    #[tokio::test]
    async fn test_sweep_applies_expected_points() {
        let registry = registry(5);
        let controller = SweepController::new(registry.clone(), fast_settings());
        let mut rx = controller.subscribe();

        let run_uid = controller.start(entry(0.0, 1.0, 0.2)).await.unwrap();
        let (points, stop) = collect_run_docs(&mut rx).await;

        let expected = [0.0, 0.2, 0.4, 0.6, 0.8];
        assert_eq!(points.len(), expected.len());
        for (point, want) in points.iter().zip(expected.iter()) {
            assert_eq!(point.run_uid, run_uid);
            assert!((point.value - want).abs() < 1e-9);
        }
        // Ascending, never revisiting a value
        for pair in points.windows(2) {
            assert!(pair[1].value > pair[0].value);
        }

        assert_eq!(stop.exit_status, "success");
        assert_eq!(stop.num_points, 5);
        assert!((stop.last_value.unwrap() - 0.8).abs() < 1e-9);

        // Device holds the last applied value, not the end bound
        let motor = registry.get_attribute_access("motor_1").unwrap();
        assert!((motor.get_attribute("Position").await.unwrap() - 0.8).abs() < 1e-9);

        let run = controller.current_run().await.unwrap();
        assert_eq!(run.status, RunStatus::Done);
        assert_eq!(controller.state().await, EngineState::Idle);
    }

    #[tokio::test]
    async fn test_wrong_sign_step_fails_before_device_call() {
        let registry = registry(5);
        let controller = SweepController::new(registry.clone(), fast_settings());

        let err = controller.start(entry(0.5, 1.5, -0.2)).await.unwrap_err();
        assert!(matches!(err, SweepError::InvalidRange(_)));

        // No value was ever applied: still at the initial position, not 0.5
        let motor = registry.get_attribute_access("motor_1").unwrap();
        assert_eq!(motor.get_attribute("Position").await.unwrap(), 0.0);
        assert!(controller.current_run().await.is_none());
    }

    #[tokio::test]
    async fn test_zero_step_rejected() {
        let controller = SweepController::new(registry(5), fast_settings());
        let err = controller.start(entry(0.0, 1.0, 0.0)).await.unwrap_err();
        assert!(matches!(err, SweepError::InvalidRange(_)));
    }

    #[tokio::test]
    async fn test_disabled_entry_refused() {
        let controller = SweepController::new(registry(5), fast_settings());

        let mut disabled = entry(0.0, 1.0, 0.2);
        disabled.enabled = false;

        let err = controller.start(disabled).await.unwrap_err();
        assert!(matches!(err, SweepError::EntryDisabled(_)));
    }

    #[tokio::test]
    async fn test_unknown_device_rejected() {
        let controller = SweepController::new(registry(5), fast_settings());
        let err = controller
            .start(SweepEntry::new("ghost", "Position", 0.0, 1.0, 0.2))
            .await
            .unwrap_err();
        assert!(matches!(err, SweepError::UnknownDevice(_)));
    }

    #[tokio::test]
    async fn test_unknown_attribute_fails_run() {
        let controller = SweepController::new(registry(5), fast_settings());
        let mut rx = controller.subscribe();

        // start() still returns the run uid; the failure lands in the run
        // status and the Stop document
        let run_uid = controller
            .start(SweepEntry::new("motor_1", "Bogus", 0.0, 1.0, 0.2))
            .await
            .unwrap();

        let (points, stop) = collect_run_docs(&mut rx).await;
        assert!(points.is_empty());
        assert_eq!(stop.run_uid, run_uid);
        assert_eq!(stop.exit_status, "fail");
        assert!(stop.reason.contains("Bogus"));

        let run = controller.current_run().await.unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(controller.state().await, EngineState::Idle);
    }

    #[tokio::test]
    async fn test_stop_prevents_further_points() {
        let registry = registry(30);
        let controller = Arc::new(SweepController::new(registry.clone(), fast_settings()));
        let mut rx = controller.subscribe();

        let task_controller = controller.clone();
        let task =
            tokio::spawn(async move { task_controller.start(entry(0.0, 1.0, 0.2)).await });

        // Wait until at least one point has been applied
        loop {
            match rx.recv().await.unwrap() {
                Document::Point(_) => break,
                _ => continue,
            }
        }

        controller.stop().await.unwrap();
        let run_uid = task.await.unwrap().unwrap();

        // Drain remaining documents to the Stop doc
        let (more_points, stop) = collect_run_docs(&mut rx).await;

        assert_eq!(stop.run_uid, run_uid);
        assert_eq!(stop.exit_status, "abort");
        let total_points = 1 + more_points.len() as u32;
        assert!(
            total_points < 5,
            "stop did not shorten the sweep ({} points)",
            total_points
        );
        assert_eq!(stop.num_points, total_points);

        // No rollback: the device keeps the last applied value
        let motor = registry.get_attribute_access("motor_1").unwrap();
        let position = motor.get_attribute("Position").await.unwrap();
        assert!((position - stop.last_value.unwrap()).abs() < 1e-9);

        let run = controller.current_run().await.unwrap();
        assert_eq!(run.status, RunStatus::Aborted);
        assert_eq!(controller.state().await, EngineState::Idle);
    }

    #[tokio::test]
    async fn test_settle_timeout_fails_run() {
        // Macros take far longer than the settle deadline
        let registry = registry(500);
        let settings = SweepSettings {
            poll_interval_ms: 2,
            settle_timeout_ms: 40,
            ..SweepSettings::default()
        };
        let controller = SweepController::new(registry, settings);
        let mut rx = controller.subscribe();

        controller.start(entry(0.0, 1.0, 0.2)).await.unwrap();
        let (points, stop) = collect_run_docs(&mut rx).await;

        assert!(points.is_empty());
        assert_eq!(stop.exit_status, "fail");
        assert!(stop.reason.contains("did not settle"));

        let run = controller.current_run().await.unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        // The first value had already been applied when the timeout hit
        assert_eq!(run.current_value, Some(0.0));
    }

    #[tokio::test]
    async fn test_start_while_running_is_busy() {
        let registry = registry(30);
        let controller = Arc::new(SweepController::new(registry, fast_settings()));
        let mut rx = controller.subscribe();

        let task_controller = controller.clone();
        let task =
            tokio::spawn(async move { task_controller.start(entry(0.0, 1.0, 0.2)).await });

        // Wait for the run to actually start
        loop {
            if let Document::Start(_) = rx.recv().await.unwrap() {
                break;
            }
        }

        let err = controller.start(entry(0.0, 1.0, 0.5)).await.unwrap_err();
        assert!(matches!(err, SweepError::Busy));

        controller.stop().await.unwrap();
        let _ = task.await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_after_completed_run_leaves_engine_usable() {
        let controller = SweepController::new(registry(5), fast_settings());
        let mut rx = controller.subscribe();

        controller.start(entry(0.0, 1.0, 0.5)).await.unwrap();
        let _ = collect_run_docs(&mut rx).await;

        // A late stop must not move the engine out of Idle
        let err = controller.stop().await.unwrap_err();
        assert!(matches!(err, SweepError::NotRunning));
        assert_eq!(controller.state().await, EngineState::Idle);

        // And the next run must still be accepted
        controller.start(entry(0.0, 1.0, 0.5)).await.unwrap();
        let (_, stop) = collect_run_docs(&mut rx).await;
        assert_eq!(stop.exit_status, "success");
    }

    #[tokio::test]
    async fn test_stop_during_settle_emits_no_point() {
        // Macros take 100 ms, so the stop below lands inside the first
        // settle wait
        let registry = registry(100);
        let controller = Arc::new(SweepController::new(registry.clone(), fast_settings()));
        let mut rx = controller.subscribe();

        let task_controller = controller.clone();
        let task =
            tokio::spawn(async move { task_controller.start(entry(0.0, 1.0, 0.2)).await });

        loop {
            if let Document::Start(_) = rx.recv().await.unwrap() {
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        controller.stop().await.unwrap();
        task.await.unwrap().unwrap();

        let (points, stop) = collect_run_docs(&mut rx).await;

        // The first value was applied but never settled, so no Point is
        // claimed for it
        assert!(points.is_empty());
        assert_eq!(stop.exit_status, "abort");
        assert_eq!(stop.num_points, 0);
        assert_eq!(stop.last_value, Some(0.0));

        let motor = registry.get_attribute_access("motor_1").unwrap();
        assert_eq!(motor.get_attribute("Position").await.unwrap(), 0.0);
        assert_eq!(controller.state().await, EngineState::Idle);
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_error() {
        let controller = SweepController::new(registry(5), fast_settings());
        let err = controller.stop().await.unwrap_err();
        assert!(matches!(err, SweepError::NotRunning));
    }

    #[tokio::test]
    async fn test_settings_from_toml_section() {
        let toml_str = r#"
            door = "door_1"
            poll_interval_ms = 25
            settle_timeout_ms = 5000
            step_macro = ["ct", "0.5"]
        "#;
        let settings: SweepSettings = toml::from_str(toml_str).unwrap();
        assert_eq!(settings.door, "door_1");
        assert_eq!(settings.poll_interval_ms, 25);
        assert_eq!(settings.settle_timeout_ms, 5000);
        assert_eq!(settings.step_macro, vec!["ct", "0.5"]);
    }
}
