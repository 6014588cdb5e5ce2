use nalgebra::Vector3;
use quad_cascade::dynamics::{simulate_drone, State};
use quad_cascade::{ControllerConfig, IntegralMode, QuadcopterController, Trajectory, VehicleState};

const DT: f64 = 0.01;

/// Runs the controller against the plant, calling `observe` after every step.
fn fly<F>(
    controller: &mut QuadcopterController,
    trajectory: &Trajectory,
    initial: State,
    ticks: usize,
    mut observe: F,
) -> State
where
    F: FnMut(f64, &State),
{
    let params = controller.config().vehicle;
    let mut state = initial;
    for k in 0..ticks {
        let t = k as f64 * DT;
        let output = controller
            .run_control(trajectory, t, &VehicleState::from(&state))
            .unwrap();
        state = simulate_drone(state, params, output.thrust, output.moment, (0.0, DT), 1e-6)
            .unwrap();
        observe(t + DT, &state);
    }
    state
}

fn hold_at(position: Vector3<f64>) -> Trajectory {
    Trajectory::new(vec![position], vec![0.0], vec![0.0]).unwrap()
}

#[test]
fn test_hover_holds_position() {
    let mut controller = QuadcopterController::default();
    let trajectory = hold_at(Vector3::new(0.0, 0.0, -5.0));
    let initial = State {
        position_z: -5.0,
        ..State::default()
    };

    let final_state = fly(&mut controller, &trajectory, initial, 300, |_, _| {});

    assert!((final_state.position_z + 5.0).abs() < 1e-6);
    assert!(final_state.velocity_z.abs() < 1e-6);
    assert_eq!(final_state.roll, 0.0);
    assert_eq!(final_state.pitch, 0.0);
}

#[test]
fn test_altitude_step_per_tick_integral() {
    let mut controller = QuadcopterController::default();
    let trajectory = hold_at(Vector3::new(0.0, 0.0, -1.0));

    let final_state = fly(&mut controller, &trajectory, State::default(), 1000, |_, _| {});

    assert!((final_state.position_z + 1.0).abs() < 0.02);
    assert!(final_state.velocity_z.abs() < 0.05);
}

#[test]
fn test_altitude_step_time_scaled_integral() {
    let config = ControllerConfig {
        integral_mode: IntegralMode::TimeScaled { dt: DT },
        ..ControllerConfig::default()
    };
    let mut controller = QuadcopterController::new(config).unwrap();
    let trajectory = hold_at(Vector3::new(0.0, 0.0, -1.0));

    let final_state = fly(&mut controller, &trajectory, State::default(), 1000, |_, _| {});

    assert!((final_state.position_z + 1.0).abs() < 0.02);
    assert!(final_state.velocity_z.abs() < 0.05);
    assert!(controller.altitude_error_sum() < 1.0);
}

#[test]
fn test_climb_tracks_ramp() {
    let trajectory = Trajectory::new(
        vec![Vector3::zeros(), Vector3::new(0.0, 0.0, -2.0)],
        vec![0.0, 0.0],
        vec![0.0, 4.0],
    )
    .unwrap();
    let mut controller = QuadcopterController::default();

    let mut worst = 0.0_f64;
    let final_state = fly(&mut controller, &trajectory, State::default(), 800, |t, state| {
        if (1.0..4.0).contains(&t) {
            let expected_z = -0.5 * t;
            worst = worst.max((state.position_z - expected_z).abs());
        }
    });

    assert!(worst < 0.05, "ramp tracking error {}", worst);
    assert!((final_state.position_z + 2.0).abs() < 0.02);
}

#[test]
fn test_north_offset_pitches_nose_down() {
    let mut controller = QuadcopterController::default();
    let trajectory = hold_at(Vector3::new(1.0, 0.0, 0.0));

    let final_state = fly(&mut controller, &trajectory, State::default(), 50, |_, _| {});

    assert!(final_state.pitch < 0.0);
    assert!(final_state.roll.abs() < 1e-9);
    assert!(final_state.velocity_x > 0.0);
    assert!(final_state.velocity_y.abs() < 1e-9);
}
