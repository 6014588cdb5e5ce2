use std::f64::consts::{PI, TAU};

use log::{debug, trace, warn};
use nalgebra::{Vector2, Vector3};

use crate::config::{ControllerConfig, IntegralMode, YawWrap};
use crate::error::ControlError;
use crate::rotation::Attitude;
use crate::trajectory::{Trajectory, TrajectoryCommand};

/// A cascaded controller for multirotor trajectory tracking.
///
/// The cascade turns a waypoint trajectory plus the current vehicle state into
/// a collective thrust and three body moments:
///
/// Trajectory → Lateral Position Controller → Desired Horizontal Acceleration
///                                                     ↓
/// Altitude Controller → Collective Thrust → Roll/Pitch Controller → p, q
///                                                     ↓
/// Yaw Controller → r → Body Rate Controller → Moments → (external mixer)
///
/// Positions and velocities are NED. The altitude stage works in a positive-up
/// frame, so `run_control` negates the down components before handing them over.
///
/// Every stage is a pure function except [`altitude_control`], which owns the
/// integral accumulator. One controller instance serves one vehicle; it is not
/// meant to be shared between threads without external serialization.
///
/// [`altitude_control`]: QuadcopterController::altitude_control
#[derive(Clone, Debug)]
pub struct QuadcopterController {
    config: ControllerConfig,

    /// Accumulated altitude error for integral control
    altitude_error_sum: f64,
}

/// Current vehicle state as reported by the estimator.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VehicleState {
    /// NED position (m)
    pub position: Vector3<f64>,
    /// NED velocity (m/s)
    pub velocity: Vector3<f64>,
    pub attitude: Attitude,
    /// Body rates [p, q, r] (rad/s)
    pub body_rate: Vector3<f64>,
}

impl VehicleState {
    /// True when every component is a finite number.
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
            && self.velocity.iter().all(|v| v.is_finite())
            && self.attitude.to_vector().iter().all(|v| v.is_finite())
            && self.body_rate.iter().all(|v| v.is_finite())
    }
}

/// Result of one control tick, handed to the mixer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlOutput {
    /// Collective thrust (N)
    pub thrust: f64,
    /// Mass-normalized collective thrust (m/s²), as produced by the altitude stage
    pub collective: f64,
    /// Body moments [Mx, My, Mz] (N⋅m), clamped to the torque limit
    pub moment: Vector3<f64>,
    /// Body-rate setpoint [p, q, r] fed to the rate stage (rad/s)
    pub rate_cmd: Vector3<f64>,
    /// Trajectory sample this tick tracked
    pub command: TrajectoryCommand,
}

impl Default for QuadcopterController {
    fn default() -> Self {
        Self {
            config: ControllerConfig::default(),
            altitude_error_sum: 0.0,
        }
    }
}

impl QuadcopterController {
    /// Creates a controller with the given configuration and a zeroed integrator.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::InvalidConfig`] if the vehicle constants are not
    /// physically meaningful.
    pub fn new(config: ControllerConfig) -> Result<Self, ControlError> {
        config.validate()?;
        Ok(Self {
            config,
            altitude_error_sum: 0.0,
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Current value of the altitude integral accumulator.
    pub fn altitude_error_sum(&self) -> f64 {
        self.altitude_error_sum
    }

    /// Clears the altitude integral accumulator. Never done automatically.
    pub fn reset_integral(&mut self) {
        self.altitude_error_sum = 0.0;
    }

    /// Samples the trajectory at `current_time`.
    pub fn trajectory_control(&self, trajectory: &Trajectory, current_time: f64) -> TrajectoryCommand {
        trajectory.sample(current_time)
    }

    /// Calculates desired horizontal accelerations from position and velocity commands.
    ///
    /// This is the outer loop of the cascade. Each axis is an independent PD law
    /// with a feedforward term:
    ///
    /// a = Kp * (pos_cmd - pos) + Kd * (vel_cmd - vel) + accel_ff
    ///
    /// # Arguments
    ///
    /// * `pos_cmd` - Desired [north, east] position in m
    /// * `vel_cmd` - Desired [north, east] velocity in m/s
    /// * `pos` - Current [north, east] position in m
    /// * `vel` - Current [north, east] velocity in m/s
    /// * `accel_ff` - Feedforward [north, east] acceleration in m/s² (zero if unused)
    ///
    /// # Returns
    ///
    /// Desired [north, east] acceleration in m/s²
    pub fn lateral_position_control(
        &self,
        pos_cmd: Vector2<f64>,
        vel_cmd: Vector2<f64>,
        pos: Vector2<f64>,
        vel: Vector2<f64>,
        accel_ff: Vector2<f64>,
    ) -> Vector2<f64> {
        let gains = &self.config.gains;
        let pos_err = pos_cmd - pos;
        let vel_err = vel_cmd - vel;

        Vector2::new(
            gains.kp_x * pos_err[0] + gains.kd_x * vel_err[0] + accel_ff[0],
            gains.kp_y * pos_err[1] + gains.kd_y * vel_err[1] + accel_ff[1],
        )
    }

    /// Calculates the mass-normalized collective thrust from altitude commands.
    ///
    /// PID on altitude with a feedforward term, corrected for tilt by dividing
    /// through the vertical component of the body z axis (R33):
    ///
    /// u = Kp * e + Kd * ė + Ki * Σe + accel_ff
    /// c = clamp((u + g) / R33, min_collective, max_thrust / mass)
    ///
    /// With [`IntegralMode::PerTick`] the raw error is accumulated on every call,
    /// so the meaning of `ki_z` depends on calling at a fixed tick rate.
    ///
    /// # Arguments
    ///
    /// * `altitude_cmd` - Desired altitude (m, positive up)
    /// * `vertical_velocity_cmd` - Desired vertical velocity (m/s, positive up)
    /// * `altitude` - Current altitude (m, positive up)
    /// * `vertical_velocity` - Current vertical velocity (m/s, positive up)
    /// * `attitude` - Current attitude
    /// * `accel_ff` - Vertical feedforward acceleration (m/s², positive up)
    ///
    /// # Returns
    ///
    /// Collective acceleration in m/s², clamped to the vehicle's range. Saturation
    /// is not an error. An inverted vehicle (R33 < 0) saturates at the lower bound.
    ///
    /// # Errors
    ///
    /// [`ControlError::NonFiniteInput`] when any argument is NaN or infinite and
    /// [`ControlError::AttitudeSingularity`] when |R33| is below the configured
    /// epsilon. The integrator is left untouched in both cases.
    pub fn altitude_control(
        &mut self,
        altitude_cmd: f64,
        vertical_velocity_cmd: f64,
        altitude: f64,
        vertical_velocity: f64,
        attitude: &Attitude,
        accel_ff: f64,
    ) -> Result<f64, ControlError> {
        let (collective, error_sum) = self.altitude_step(
            altitude_cmd,
            vertical_velocity_cmd,
            altitude,
            vertical_velocity,
            attitude,
            accel_ff,
        )?;
        self.altitude_error_sum = error_sum;
        Ok(collective)
    }

    /// Computes the clamped collective and the next integrator value without
    /// storing either.
    fn altitude_step(
        &self,
        altitude_cmd: f64,
        vertical_velocity_cmd: f64,
        altitude: f64,
        vertical_velocity: f64,
        attitude: &Attitude,
        accel_ff: f64,
    ) -> Result<(f64, f64), ControlError> {
        let inputs = [
            ("altitude command", altitude_cmd),
            ("vertical velocity command", vertical_velocity_cmd),
            ("altitude", altitude),
            ("vertical velocity", vertical_velocity),
            ("vertical feedforward", accel_ff),
        ];
        if let Some((what, value)) = inputs.iter().find(|(_, v)| !v.is_finite()) {
            warn!("altitude control rejected: {} = {}", what, value);
            return Err(ControlError::NonFiniteInput { what: *what });
        }

        let r33 = attitude.rotation_matrix()[(2, 2)];
        // Written negated so a NaN attitude is rejected too.
        if !(r33.abs() >= self.config.singularity_epsilon) {
            warn!("altitude control rejected: R33 = {}", r33);
            return Err(ControlError::AttitudeSingularity { r33 });
        }

        let gains = &self.config.gains;
        let vehicle = &self.config.vehicle;

        let pos_err = altitude_cmd - altitude;
        let vel_err = vertical_velocity_cmd - vertical_velocity;
        let error_sum = self.altitude_error_sum
            + match self.config.integral_mode {
                IntegralMode::PerTick => pos_err,
                IntegralMode::TimeScaled { dt } => pos_err * dt,
            };

        let p_term = gains.kp_z * pos_err;
        let d_term = gains.kd_z * vel_err;
        let i_term = gains.ki_z * error_sum;
        let u1_bar = p_term + d_term + i_term + accel_ff;

        let collective = (u1_bar + vehicle.gravity) / r33;
        if !collective.is_finite() || !error_sum.is_finite() {
            warn!("altitude control overflowed: collective = {}, error sum = {}", collective, error_sum);
            return Err(ControlError::NonFiniteInput {
                what: "altitude integrator",
            });
        }

        let clamped = collective.clamp(vehicle.min_collective, vehicle.max_collective());
        if clamped != collective {
            debug!("collective {} saturated to {}", collective, clamped);
        }

        Ok((clamped, error_sum))
    }

    /// Calculates roll-rate and pitch-rate commands from a horizontal acceleration.
    ///
    /// The acceleration is normalized by the collective thrust to get the desired
    /// world-frame direction of the body z axis. A P law on the R13/R23 error gives
    /// its desired rate of change, which the attitude kinematics map into body
    /// rates:
    ///
    /// ḃx = Kp_roll * (a_n / c - R13), ḃy = Kp_pitch * (a_e / c - R23)
    /// p = -(R21 ḃx - R11 ḃy) / R33, q = -(R22 ḃx - R12 ḃy) / R33
    ///
    /// # Sign convention
    ///
    /// `thrust_cmd` is positive up while the body z axis points down (NED), so the
    /// kinematic result is negated. For a level vehicle, a positive north
    /// acceleration yields a negative pitch rate (nose down) and a positive east
    /// acceleration a positive roll rate (right side down). The mixer is expected
    /// to follow the same right-handed NED body convention.
    ///
    /// # Arguments
    ///
    /// * `accel_cmd` - Desired [north, east] acceleration in m/s²
    /// * `attitude` - Current attitude
    /// * `thrust_cmd` - Collective acceleration from [`altitude_control`](Self::altitude_control) in m/s²
    ///
    /// # Returns
    ///
    /// Desired [p, q] in rad/s
    ///
    /// # Errors
    ///
    /// [`ControlError::InvalidThrustDivisor`] for |thrust_cmd| below epsilon and
    /// [`ControlError::AttitudeSingularity`] for |R33| below epsilon.
    pub fn roll_pitch_control(
        &self,
        accel_cmd: Vector2<f64>,
        attitude: &Attitude,
        thrust_cmd: f64,
    ) -> Result<Vector2<f64>, ControlError> {
        let epsilon = self.config.singularity_epsilon;
        if !(thrust_cmd.abs() >= epsilon) {
            warn!("roll/pitch control rejected: thrust = {}", thrust_cmd);
            return Err(ControlError::InvalidThrustDivisor { thrust: thrust_cmd });
        }

        let r = attitude.rotation_matrix();
        let r33 = r[(2, 2)];
        if !(r33.abs() >= epsilon) {
            warn!("roll/pitch control rejected: R33 = {}", r33);
            return Err(ControlError::AttitudeSingularity { r33 });
        }

        let gains = &self.config.gains;
        let b_x_dot = gains.kp_roll * (accel_cmd[0] / thrust_cmd - r[(0, 2)]);
        let b_y_dot = gains.kp_pitch * (accel_cmd[1] / thrust_cmd - r[(1, 2)]);

        let p_cmd = (r[(1, 0)] * b_x_dot - r[(0, 0)] * b_y_dot) / r33;
        let q_cmd = (r[(1, 1)] * b_x_dot - r[(0, 1)] * b_y_dot) / r33;

        Ok(Vector2::new(-p_cmd, -q_cmd))
    }

    /// Calculates desired 3-axis moments from body rate commands and measurements.
    ///
    /// The control law is: M = Kp ⊙ (ωcmd - ω), with per-axis gains [Kp_p, Kp_q, Kp_r].
    /// The output is linear in the rate error and is not limited here.
    pub fn body_rate_control(&self, pqr_cmd: Vector3<f64>, pqr: Vector3<f64>) -> Vector3<f64> {
        (pqr_cmd - pqr).component_mul(&self.config.gains.kp_pqr())
    }

    /// Calculates desired yaw rate from yaw angle command and current yaw.
    ///
    /// ω_yaw = Kp_yaw * wrap(yaw_cmd - yaw), with the wrap rule chosen by
    /// [`YawWrap`] in the configuration.
    pub fn yaw_control(&self, yaw_cmd: f64, yaw: f64) -> f64 {
        self.config.gains.kp_yaw * wrap_angle(yaw_cmd - yaw, self.config.yaw_wrap)
    }

    /// Runs one full control tick with no acceleration feedforward.
    ///
    /// See [`run_control_with_feedforward`](Self::run_control_with_feedforward).
    pub fn run_control(
        &mut self,
        trajectory: &Trajectory,
        current_time: f64,
        state: &VehicleState,
    ) -> Result<ControlOutput, ControlError> {
        self.run_control_with_feedforward(trajectory, current_time, state, Vector3::zeros())
    }

    /// Runs one full control tick.
    ///
    /// # Control Sequence
    ///
    /// 1. **Trajectory**: sample position, velocity and yaw commands
    /// 2. **Altitude Control**: collective thrust from the vertical channel
    /// 3. **Position Control**: horizontal acceleration from north/east
    /// 4. **Roll/Pitch Control**: p, q from acceleration and collective thrust
    /// 5. **Yaw Control**: r from the heading error
    /// 6. **Body Rate Control**: moments, clamped to ±max_torque
    ///
    /// # Arguments
    ///
    /// * `trajectory` - Validated waypoint trajectory
    /// * `current_time` - Query time in seconds
    /// * `state` - Estimated vehicle state (NED)
    /// * `accel_ff` - NED acceleration feedforward in m/s²
    ///
    /// # Errors
    ///
    /// [`ControlError::NonFiniteInput`] when the time, state or feedforward
    /// holds a NaN or infinity; any stage error is returned as is. The altitude
    /// integrator is only updated when every stage succeeds.
    pub fn run_control_with_feedforward(
        &mut self,
        trajectory: &Trajectory,
        current_time: f64,
        state: &VehicleState,
        accel_ff: Vector3<f64>,
    ) -> Result<ControlOutput, ControlError> {
        if !current_time.is_finite() {
            warn!("control tick rejected: t = {}", current_time);
            return Err(ControlError::NonFiniteInput { what: "current time" });
        }
        if !state.is_finite() {
            warn!("control tick rejected: non-finite state {:?}", state);
            return Err(ControlError::NonFiniteInput { what: "vehicle state" });
        }
        if !accel_ff.iter().all(|v| v.is_finite()) {
            warn!("control tick rejected: non-finite feedforward {:?}", accel_ff.as_slice());
            return Err(ControlError::NonFiniteInput { what: "acceleration feedforward" });
        }

        let command = self.trajectory_control(trajectory, current_time);

        // The integrator value is held back until the remaining stages succeed.
        let (collective, error_sum) = self.altitude_step(
            -command.position[2],
            -command.velocity[2],
            -state.position[2],
            -state.velocity[2],
            &state.attitude,
            -accel_ff[2],
        )?;

        let accel_cmd = self.lateral_position_control(
            command.position.xy(),
            command.velocity.xy(),
            state.position.xy(),
            state.velocity.xy(),
            accel_ff.xy(),
        );

        let pq_cmd = self.roll_pitch_control(accel_cmd, &state.attitude, collective)?;
        let r_cmd = self.yaw_control(command.yaw, state.attitude.yaw);
        let rate_cmd = Vector3::new(pq_cmd[0], pq_cmd[1], r_cmd);

        let max_torque = self.config.vehicle.max_torque;
        let moment = self
            .body_rate_control(rate_cmd, state.body_rate)
            .map(|m| m.clamp(-max_torque, max_torque));

        self.altitude_error_sum = error_sum;

        let thrust = self.config.vehicle.mass * collective;
        trace!(
            "t={:.3} pos_cmd={:?} thrust={:.4} rate_cmd={:?} moment={:?}",
            current_time,
            command.position.as_slice(),
            thrust,
            rate_cmd.as_slice(),
            moment.as_slice()
        );

        Ok(ControlOutput {
            thrust,
            collective,
            moment,
            rate_cmd,
            command,
        })
    }
}

/// Wraps an angle error according to `mode`.
///
/// `ShortestAngle` maps into (-π, π], so both +π and -π come out as +π.
/// `HalfTurnRemainder` is the truncated remainder by π: the result keeps the
/// sign of the input and ±π both come out as (signed) zero.
pub fn wrap_angle(angle: f64, mode: YawWrap) -> f64 {
    match mode {
        YawWrap::ShortestAngle => {
            let mut wrapped = angle % TAU;
            if wrapped > PI {
                wrapped -= TAU;
            } else if wrapped <= -PI {
                wrapped += TAU;
            }
            wrapped
        }
        YawWrap::HalfTurnRemainder => angle % PI,
    }
}
