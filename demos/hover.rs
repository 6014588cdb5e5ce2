use nalgebra::Vector3;
use quad_cascade::dynamics::{simulate_drone, State};
use quad_cascade::{ControllerConfig, QuadcopterController, Trajectory, VehicleState};

const CONFIG: &str = r#"
vehicle:
  mass: 0.5
  max_thrust: 10.0
integral_mode:
  mode: time_scaled
  dt: 0.01
"#;

// Climb to 5 m, hold, then drift 2 m north while holding altitude.
fn main() {
    let config = match ControllerConfig::from_yaml_str(CONFIG) {
        Ok(config) => config,
        Err(e) => {
            println!("Bad config: {}", e);
            return;
        }
    };

    let trajectory = match Trajectory::new(
        vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, -5.0),
            Vector3::new(0.0, 0.0, -5.0),
            Vector3::new(2.0, 0.0, -5.0),
        ],
        vec![0.0, 0.0, 0.0, 0.0],
        vec![0.0, 5.0, 8.0, 20.0],
    ) {
        Ok(trajectory) => trajectory,
        Err(e) => {
            println!("Bad trajectory: {}", e);
            return;
        }
    };

    let mut controller = match QuadcopterController::new(config) {
        Ok(controller) => controller,
        Err(e) => {
            println!("Bad controller: {}", e);
            return;
        }
    };

    let simulation_span = 30.0;
    let dt = 0.01;
    let mut uav_state = State::default();
    let mut step = 0usize;

    while (step as f64) * dt < simulation_span {
        let current_time = step as f64 * dt;

        let output = match controller.run_control(
            &trajectory,
            current_time,
            &VehicleState::from(&uav_state),
        ) {
            Ok(output) => output,
            Err(e) => {
                println!("Control tick failed at t={:.2}: {}", current_time, e);
                break;
            }
        };

        match simulate_drone(
            uav_state,
            controller.config().vehicle,
            output.thrust,
            output.moment,
            (0.0, dt),
            1e-6,
        ) {
            Ok(new_state) => uav_state = new_state,
            Err(e) => {
                println!("Simulation failed: {}", e);
                break;
            }
        }

        if step % 50 == 0 {
            println!(
                "{:.2} {:.3} {:.3} {:.3} thrust={:.3}",
                current_time,
                uav_state.position_x,
                uav_state.position_y,
                -uav_state.position_z,
                output.thrust
            );
        }

        step += 1;
    }
}
