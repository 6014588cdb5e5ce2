//! Cascaded flight control law for multirotors.
//!
//! Turns a time-stamped waypoint trajectory and the current vehicle state into
//! a collective thrust and body moment command on every control tick:
//!
//! - [`trajectory`] samples the commanded position, velocity and yaw
//! - [`control`] runs the lateral, altitude, roll/pitch, yaw and body-rate stages
//! - [`rotation`] builds the body-to-world rotation shared by those stages
//! - [`dynamics`] is a rigid-body plant for closed-loop testing
//!
//! Gains and vehicle constants live in [`config`] and are fixed when a
//! [`QuadcopterController`] is built.

pub mod config;
pub mod control;
pub mod dynamics;
pub mod error;
pub mod rotation;
pub mod trajectory;

pub use config::{ControllerConfig, Gains, IntegralMode, VehicleParams, YawWrap};
pub use control::{wrap_angle, ControlOutput, QuadcopterController, VehicleState};
pub use error::ControlError;
pub use rotation::{rotation_matrix, Attitude};
pub use trajectory::{Trajectory, TrajectoryCommand};
