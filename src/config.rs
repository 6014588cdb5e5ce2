//! Controller configuration: gain set, vehicle constants and behavior switches.
//!
//! Everything here is fixed at construction. Values can be built in code or
//! deserialized from YAML; keys that are left out keep their defaults.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::ControlError;

/// Feedback gains for every stage of the cascade.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Gains {
    /// Altitude position P gain (m/s² per m)
    pub kp_z: f64,
    /// Altitude velocity D gain (m/s² per m/s)
    pub kd_z: f64,
    /// Altitude I gain, applied to the accumulated error
    pub ki_z: f64,
    /// North position P gain
    pub kp_x: f64,
    /// North velocity D gain
    pub kd_x: f64,
    /// East position P gain
    pub kp_y: f64,
    /// East velocity D gain
    pub kd_y: f64,
    /// Roll tilt P gain
    pub kp_roll: f64,
    /// Pitch tilt P gain
    pub kp_pitch: f64,
    /// Yaw angle P gain (rad/s per rad)
    pub kp_yaw: f64,
    /// Roll-rate P gain
    pub kp_p: f64,
    /// Pitch-rate P gain
    pub kp_q: f64,
    /// Yaw-rate P gain
    pub kp_r: f64,
}

impl Gains {
    /// Default proportional gains with derivative gains chosen for damping ratio `delta`.
    ///
    /// kd = 2 * delta * sqrt(kp) on the altitude and both lateral axes.
    pub fn with_damping(delta: f64) -> Self {
        let kp_z = 64.0;
        let kp_xy = 2.5;
        Self {
            kp_z,
            kd_z: 2.0 * delta * f64::sqrt(kp_z),
            ki_z: 1.0,
            kp_x: kp_xy,
            kd_x: 2.0 * delta * f64::sqrt(kp_xy),
            kp_y: kp_xy,
            kd_y: 2.0 * delta * f64::sqrt(kp_xy),
            kp_roll: 0.02,
            kp_pitch: 0.02,
            kp_yaw: 2.5,
            kp_p: 0.5,
            kp_q: 0.5,
            kp_r: 0.2,
        }
    }

    /// Body-rate gains as a vector [kp_p, kp_q, kp_r].
    pub fn kp_pqr(&self) -> Vector3<f64> {
        Vector3::new(self.kp_p, self.kp_q, self.kp_r)
    }
}

impl Default for Gains {
    fn default() -> Self {
        Self::with_damping(1.0)
    }
}

/// Physical constants of the vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleParams {
    /// Total mass (kg)
    pub mass: f64,
    /// Gravitational acceleration magnitude (m/s²)
    pub gravity: f64,
    /// Principal moments of inertia [Ixx, Iyy, Izz] (kg⋅m²)
    pub moment_of_inertia: Vector3<f64>,
    /// Maximum total thrust (N)
    pub max_thrust: f64,
    /// Maximum moment per body axis (N⋅m)
    pub max_torque: f64,
    /// Lower clamp on the collective acceleration command (m/s²)
    pub min_collective: f64,
}

impl VehicleParams {
    /// Upper clamp on the collective acceleration command (m/s²).
    pub fn max_collective(&self) -> f64 {
        self.max_thrust / self.mass
    }
}

impl Default for VehicleParams {
    fn default() -> Self {
        Self {
            mass: 0.5,
            gravity: 9.81,
            moment_of_inertia: Vector3::new(0.005, 0.005, 0.01),
            max_thrust: 10.0,
            max_torque: 1.0,
            min_collective: 0.1,
        }
    }
}

/// How the altitude error is accumulated for the integral term.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum IntegralMode {
    /// Raw position error is added once per call. `ki_z` then depends on the
    /// caller's tick rate.
    #[default]
    PerTick,
    /// Error is multiplied by a fixed step `dt` (seconds) before it is added.
    TimeScaled { dt: f64 },
}

/// How the yaw error is wrapped before the yaw gain is applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YawWrap {
    /// Shortest signed angle, in (-π, π].
    #[default]
    ShortestAngle,
    /// Truncated remainder by π (sign follows the error). A half-period wrap:
    /// an error of exactly ±π maps to zero.
    HalfTurnRemainder,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub gains: Gains,
    pub vehicle: VehicleParams,
    pub integral_mode: IntegralMode,
    pub yaw_wrap: YawWrap,
    /// Divisors (R33, thrust) with magnitude below this are rejected.
    pub singularity_epsilon: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            gains: Gains::default(),
            vehicle: VehicleParams::default(),
            integral_mode: IntegralMode::default(),
            yaw_wrap: YawWrap::default(),
            singularity_epsilon: 1e-3,
        }
    }
}

impl ControllerConfig {
    /// Parses a YAML document and validates the result.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ControlError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects physically meaningless constants.
    pub fn validate(&self) -> Result<(), ControlError> {
        let vehicle = &self.vehicle;
        if !(vehicle.mass > 0.0) {
            return Err(ControlError::InvalidConfig(format!(
                "mass must be positive, got {}",
                vehicle.mass
            )));
        }
        if !(vehicle.max_thrust > 0.0) || !(vehicle.max_torque >= 0.0) {
            return Err(ControlError::InvalidConfig(
                "max_thrust must be positive and max_torque non-negative".to_string(),
            ));
        }
        if !(vehicle.min_collective < vehicle.max_collective()) {
            return Err(ControlError::InvalidConfig(format!(
                "min_collective {} must be below max_thrust / mass = {}",
                vehicle.min_collective,
                vehicle.max_collective()
            )));
        }
        if let IntegralMode::TimeScaled { dt } = self.integral_mode {
            if !(dt > 0.0) {
                return Err(ControlError::InvalidConfig(format!(
                    "integral dt must be positive, got {}",
                    dt
                )));
            }
        }
        if !(self.singularity_epsilon > 0.0) {
            return Err(ControlError::InvalidConfig(
                "singularity_epsilon must be positive".to_string(),
            ));
        }
        // The collective feeds the roll/pitch divisor check.
        if !(vehicle.min_collective >= self.singularity_epsilon) {
            return Err(ControlError::InvalidConfig(format!(
                "min_collective {} must not be below singularity_epsilon {}",
                vehicle.min_collective, self.singularity_epsilon
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_gains() {
        let gains = Gains::default();
        assert_eq!(gains.kp_z, 64.0);
        assert_relative_eq!(gains.kd_z, 16.0);
        assert_relative_eq!(gains.kd_x, 2.0 * 2.5_f64.sqrt());
        assert_eq!(gains.kp_pqr(), Vector3::new(0.5, 0.5, 0.2));
    }

    #[test]
    fn test_damping_scales_derivative_gains() {
        let gains = Gains::with_damping(0.5);
        assert_relative_eq!(gains.kd_z, 8.0);
        assert_relative_eq!(gains.kd_y, 2.5_f64.sqrt());
        assert_eq!(gains.kp_y, 2.5);
    }

    #[test]
    fn test_default_vehicle_limits() {
        let vehicle = VehicleParams::default();
        assert_relative_eq!(vehicle.max_collective(), 20.0);
        assert!(ControllerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_yaml_partial_override() {
        let yaml = r#"
gains:
  kp_z: 10.0
vehicle:
  mass: 1.25
integral_mode:
  mode: time_scaled
  dt: 0.02
yaw_wrap: half_turn_remainder
"#;
        let config = ControllerConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.gains.kp_z, 10.0);
        assert_eq!(config.gains.kp_yaw, 2.5);
        assert_eq!(config.vehicle.mass, 1.25);
        assert_eq!(config.vehicle.gravity, 9.81);
        assert_eq!(config.integral_mode, IntegralMode::TimeScaled { dt: 0.02 });
        assert_eq!(config.yaw_wrap, YawWrap::HalfTurnRemainder);
        assert_eq!(config.singularity_epsilon, 1e-3);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = ControllerConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, ControllerConfig::default());
    }

    #[test]
    fn test_yaml_rejects_bad_mass() {
        let err = ControllerConfig::from_yaml_str("vehicle:\n  mass: 0.0\n").unwrap_err();
        assert!(matches!(err, ControlError::InvalidConfig(_)));
    }

    #[test]
    fn test_yaml_syntax_error() {
        let err = ControllerConfig::from_yaml_str("gains: [1, 2").unwrap_err();
        assert!(matches!(err, ControlError::Config(_)));
    }
}
