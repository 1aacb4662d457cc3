//! Mock drivers simulating the control-system device proxies.
//!
//! These stand in for the external subsystem during development and tests:
//! attribute-bearing devices enforce range limits, and the mock door
//! reproduces the macro log-buffer settle protocol with tokio timing.

mod common;
mod mock_camera;
mod mock_door;
mod mock_motor;

pub use common::{AttributeBank, AttributeSpec};
pub use mock_camera::MockCamera;
pub use mock_door::MockDoor;
pub use mock_motor::MockMotor;
