use nalgebra::Vector3;
use thiserror::Error;

use crate::config::VehicleParams;
use crate::control::VehicleState;
use crate::rotation::Attitude;

/// Rigid-body state of the simulated vehicle in the NED frame.
///
/// # Fields
///
/// * `position_x`, `position_y`, `position_z` - North, east, down position (meters)
/// * `velocity_x`, `velocity_y`, `velocity_z` - North, east, down velocity (m/s)
/// * `roll`, `pitch`, `yaw` - Euler angles (radians)
/// * `roll_rate`, `pitch_rate`, `yaw_rate` - Body rates p, q, r (rad/s)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct State {
    pub position_x: f64,
    pub position_y: f64,
    pub position_z: f64,
    pub velocity_x: f64,
    pub velocity_y: f64,
    pub velocity_z: f64,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub roll_rate: f64,
    pub pitch_rate: f64,
    pub yaw_rate: f64,
}

impl State {
    /// Flattens the state for the integrator:
    /// [n, e, d, vn, ve, vd, roll, pitch, yaw, p, q, r]
    pub fn to_array(&self) -> [f64; 12] {
        [
            self.position_x,
            self.position_y,
            self.position_z,
            self.velocity_x,
            self.velocity_y,
            self.velocity_z,
            self.roll,
            self.pitch,
            self.yaw,
            self.roll_rate,
            self.pitch_rate,
            self.yaw_rate,
        ]
    }

    pub fn from_array(arr: &[f64; 12]) -> Self {
        State {
            position_x: arr[0],
            position_y: arr[1],
            position_z: arr[2],
            velocity_x: arr[3],
            velocity_y: arr[4],
            velocity_z: arr[5],
            roll: arr[6],
            pitch: arr[7],
            yaw: arr[8],
            roll_rate: arr[9],
            pitch_rate: arr[10],
            yaw_rate: arr[11],
        }
    }
}

impl From<&State> for VehicleState {
    /// Perfect-knowledge estimate of the simulated state.
    fn from(state: &State) -> Self {
        VehicleState {
            position: Vector3::new(state.position_x, state.position_y, state.position_z),
            velocity: Vector3::new(state.velocity_x, state.velocity_y, state.velocity_z),
            attitude: Attitude::new(state.roll, state.pitch, state.yaw),
            body_rate: Vector3::new(state.roll_rate, state.pitch_rate, state.yaw_rate),
        }
    }
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("integration did not reach t = {0}")]
    IntegrationFailed(f64),
}

/// Equations of motion for a multirotor in the NED frame.
///
/// Thrust acts along the body -z axis, gravity along world +z. Moments are
/// held constant over the integration span.
pub struct DroneODE {
    pub params: VehicleParams,
    /// Collective thrust (N)
    pub thrust: f64,
    /// Body moments [Mx, My, Mz] (N⋅m)
    pub moment: Vector3<f64>,
}

impl fast_ode::DifferentialEquation<12> for DroneODE {
    fn ode_dot_y(&self, _t: f64, y: &fast_ode::Coord<12>) -> (fast_ode::Coord<12>, bool) {
        let state = y.0;

        let phi = state[6];
        let theta = state[7];
        let p = state[9];
        let q = state[10];
        let r = state[11];

        let (sin_phi, cos_phi) = phi.sin_cos();
        let cos_theta = theta.cos();
        let tan_theta = theta.tan();

        // Thrust direction in the world frame is -R * e_z.
        let rot = Attitude::new(phi, theta, state[8]).rotation_matrix();
        let thrust_world = rot * Vector3::new(0.0, 0.0, -self.thrust);

        let mut dot_y = [0.0; 12];

        dot_y[0] = state[3];
        dot_y[1] = state[4];
        dot_y[2] = state[5];

        let mass = self.params.mass;
        dot_y[3] = thrust_world[0] / mass;
        dot_y[4] = thrust_world[1] / mass;
        dot_y[5] = thrust_world[2] / mass + self.params.gravity;

        // Euler angle kinematics
        dot_y[6] = p + q * sin_phi * tan_theta + r * cos_phi * tan_theta;
        dot_y[7] = q * cos_phi - r * sin_phi;
        dot_y[8] = if cos_theta.abs() > 1e-6 {
            (q * sin_phi + r * cos_phi) / cos_theta
        } else {
            0.0
        };

        // Euler's rotational equations
        let inertia = self.params.moment_of_inertia;
        let (ixx, iyy, izz) = (inertia[0], inertia[1], inertia[2]);
        dot_y[9] = (self.moment[0] + (iyy - izz) * q * r) / ixx;
        dot_y[10] = (self.moment[1] + (izz - ixx) * r * p) / iyy;
        dot_y[11] = (self.moment[2] + (ixx - iyy) * p * q) / izz;

        (fast_ode::Coord(dot_y), true)
    }
}

/// Integrates the vehicle over `time_span` with constant thrust and moments.
pub fn simulate_drone(
    initial_state: State,
    params: VehicleParams,
    thrust: f64,
    moment: Vector3<f64>,
    time_span: (f64, f64),
    tolerance: f64,
) -> Result<State, SimulationError> {
    let ode = DroneODE {
        params,
        thrust,
        moment,
    };

    let initial_coord = fast_ode::Coord(initial_state.to_array());

    let result = fast_ode::solve_ivp(
        &ode,
        time_span,
        initial_coord,
        |_, _| true,
        tolerance,
        tolerance * 10.0,
    );

    match result {
        fast_ode::IvpResult::FinalTimeReached(final_coord) => Ok(State::from_array(&final_coord.0)),
        _ => Err(SimulationError::IntegrationFailed(time_span.1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> VehicleParams {
        VehicleParams {
            mass: 1.0,
            ..VehicleParams::default()
        }
    }

    #[test]
    fn test_hover_simulation() {
        let initial_state = State {
            position_z: -1.0,
            ..State::default()
        };
        let params = params();

        let final_state = simulate_drone(
            initial_state,
            params,
            params.mass * params.gravity,
            Vector3::zeros(),
            (0.0, 1.0),
            1e-6,
        )
        .unwrap();

        assert!((final_state.position_z + 1.0).abs() < 1e-3);
        assert!(final_state.velocity_z.abs() < 1e-3);
    }

    #[test]
    fn test_free_fall() {
        let initial_state = State {
            position_z: -10.0,
            ..State::default()
        };

        let t = 1.0;
        let final_state =
            simulate_drone(initial_state, params(), 0.0, Vector3::zeros(), (0.0, t), 1e-6).unwrap();

        // Down is positive: z = z0 + 0.5*g*t^2
        let expected_z = -10.0 + 0.5 * 9.81 * t * t;
        let expected_vz = 9.81 * t;

        assert!((final_state.position_z - expected_z).abs() < 0.01);
        assert!((final_state.velocity_z - expected_vz).abs() < 0.01);
    }

    #[test]
    fn test_roll_accelerates_east() {
        let roll: f64 = 0.1;
        let initial_state = State {
            roll,
            ..State::default()
        };
        let params = params();

        let final_state = simulate_drone(
            initial_state,
            params,
            params.mass * params.gravity / roll.cos(),
            Vector3::zeros(),
            (0.0, 1.0),
            1e-6,
        )
        .unwrap();

        assert!((final_state.velocity_y - params.gravity * roll.tan()).abs() < 0.01);
        assert!(final_state.velocity_z.abs() < 0.01);
        assert!(final_state.velocity_x.abs() < 1e-9);
    }

    #[test]
    fn test_roll_moment_spins_up_roll_rate() {
        let params = params();
        let final_state = simulate_drone(
            State::default(),
            params,
            params.mass * params.gravity,
            Vector3::new(0.01, 0.0, 0.0),
            (0.0, 0.1),
            1e-8,
        )
        .unwrap();

        // p_dot = Mx / Ixx = 0.01 / 0.005
        assert!((final_state.roll_rate - 0.2).abs() < 1e-4);
        assert!(final_state.roll > 0.0);
        assert!(final_state.pitch_rate.abs() < 1e-12);
    }
}
