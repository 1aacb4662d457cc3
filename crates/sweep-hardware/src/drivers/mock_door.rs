//! Mock macro-execution door.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::{sleep, Duration};
use tracing::debug;

use sweep_core::capabilities::{DoorState, MacroDoor};
use sweep_core::error::{SweepError, SweepResult};

/// Simulated macro door reproducing the log-buffer settle protocol.
///
/// `run_macro` accepts the macro immediately and completes it in a spawned
/// task after `macro_duration`: one output line is appended to the log
/// buffer and the state returns to [`DoorState::On`]. Pollers therefore see
/// the same sequence a real door produces - `Running` with an empty buffer,
/// then `On` with output present.
pub struct MockDoor {
    state: Arc<RwLock<DoorState>>,
    log: Arc<RwLock<Vec<String>>>,
    macro_duration: Duration,
}

impl MockDoor {
    /// Create a door whose macros take `macro_duration` to complete.
    pub fn new(macro_duration: Duration) -> Self {
        Self {
            state: Arc::new(RwLock::new(DoorState::On)),
            log: Arc::new(RwLock::new(Vec::new())),
            macro_duration,
        }
    }

    /// Force the door offline. Subsequent macros are rejected.
    pub async fn set_offline(&self) {
        *self.state.write().await = DoorState::Off;
    }
}

#[async_trait]
impl MacroDoor for MockDoor {
    async fn run_macro(&self, args: &[String]) -> SweepResult<()> {
        if args.is_empty() {
            return Err(SweepError::Door("empty macro command".to_string()));
        }

        {
            let mut state = self.state.write().await;
            match *state {
                DoorState::Running => {
                    return Err(SweepError::Door(
                        "a macro is already running".to_string(),
                    ));
                }
                DoorState::Off => {
                    return Err(SweepError::Door("door is offline".to_string()));
                }
                DoorState::On => *state = DoorState::Running,
            }
        }

        let command = args.join(" ");
        debug!(command = %command, "MockDoor: macro accepted");

        let state = self.state.clone();
        let log = self.log.clone();
        let duration = self.macro_duration;
        tokio::spawn(async move {
            sleep(duration).await;
            log.write().await.push(format!("{} done", command));
            let mut state = state.write().await;
            // A forced Off wins over macro completion
            if *state == DoorState::Running {
                *state = DoorState::On;
            }
        });

        Ok(())
    }

    async fn state(&self) -> DoorState {
        *self.state.read().await
    }

    async fn clear_log_buffer(&self) {
        self.log.write().await.clear();
    }

    async fn log_buffer(&self) -> Vec<String> {
        self.log.read().await.clone()
    }
}
