//! Waypoint trajectory sampling.
//!
//! A [`Trajectory`] holds time-stamped NED positions and yaws. Sampling it at
//! an arbitrary time produces a piecewise-linear position command with a
//! constant velocity per segment.

use log::{debug, warn};
use nalgebra::Vector3;

use crate::error::ControlError;

/// Commanded position, velocity and yaw for one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrajectoryCommand {
    /// NED position (m)
    pub position: Vector3<f64>,
    /// NED velocity (m/s)
    pub velocity: Vector3<f64>,
    /// Heading (rad)
    pub yaw: f64,
}

/// A validated waypoint sequence.
///
/// Invariant: positions, yaws and times have the same non-zero length and the
/// times are finite and strictly increasing, so every segment has a non-zero span.
#[derive(Clone, Debug)]
pub struct Trajectory {
    positions: Vec<Vector3<f64>>,
    yaws: Vec<f64>,
    times: Vec<f64>,
}

impl Trajectory {
    pub fn new(
        positions: Vec<Vector3<f64>>,
        yaws: Vec<f64>,
        times: Vec<f64>,
    ) -> Result<Self, ControlError> {
        if positions.is_empty() {
            return Err(ControlError::MalformedTrajectory(
                "trajectory has no waypoints".to_string(),
            ));
        }
        if positions.len() != yaws.len() || positions.len() != times.len() {
            return Err(ControlError::MalformedTrajectory(format!(
                "length mismatch: {} positions, {} yaws, {} times",
                positions.len(),
                yaws.len(),
                times.len()
            )));
        }
        if let Some(i) = times.iter().position(|t| !t.is_finite()) {
            return Err(ControlError::MalformedTrajectory(format!(
                "time at index {} is not finite",
                i
            )));
        }
        if let Some(i) = times.windows(2).position(|w| w[1] < w[0]) {
            return Err(ControlError::MalformedTrajectory(format!(
                "times decrease between index {} and {}",
                i,
                i + 1
            )));
        }
        if let Some(i) = times.windows(2).position(|w| w[1] == w[0]) {
            warn!("waypoints {} and {} share t = {}", i, i + 1, times[i]);
            return Err(ControlError::DegenerateSegment {
                index: i + 1,
                time: times[i],
            });
        }

        Ok(Self {
            positions,
            yaws,
            times,
        })
    }

    /// Number of waypoints (always at least one).
    pub fn waypoint_count(&self) -> usize {
        self.times.len()
    }

    pub fn start_time(&self) -> f64 {
        self.times[0]
    }

    pub fn end_time(&self) -> f64 {
        self.times[self.times.len() - 1]
    }

    /// Index of the waypoint whose time is closest to `t`.
    ///
    /// Ties go to the lowest index.
    pub fn nearest_index(&self, t: f64) -> usize {
        let mut best = 0;
        let mut best_dist = (self.times[0] - t).abs();
        for (i, time) in self.times.iter().enumerate().skip(1) {
            let dist = (time - t).abs();
            if dist < best_dist {
                best = i;
                best_dist = dist;
            }
        }
        best
    }

    /// Samples the commanded position, velocity and yaw at time `t`.
    ///
    /// Queries before the first waypoint hold the first waypoint, queries at or
    /// after the last hold the last one; both report zero velocity. Yaw is
    /// not interpolated: it takes the yaw of the segment's starting waypoint.
    pub fn sample(&self, t: f64) -> TrajectoryCommand {
        let nearest = self.nearest_index(t);
        let last = self.waypoint_count() - 1;

        if t < self.times[nearest] {
            if nearest == 0 {
                debug!("t = {} precedes first waypoint at {}", t, self.times[0]);
                return self.hold(0);
            }
            self.interpolate(nearest - 1, nearest, t)
        } else if nearest == last {
            if t > self.times[last] {
                debug!("t = {} is past final waypoint at {}", t, self.times[last]);
            }
            self.hold(last)
        } else {
            self.interpolate(nearest, nearest + 1, t)
        }
    }

    fn hold(&self, index: usize) -> TrajectoryCommand {
        TrajectoryCommand {
            position: self.positions[index],
            velocity: Vector3::zeros(),
            yaw: self.yaws[index],
        }
    }

    fn interpolate(&self, i0: usize, i1: usize, t: f64) -> TrajectoryCommand {
        let time0 = self.times[i0];
        let span = self.times[i1] - time0;

        let delta = self.positions[i1] - self.positions[i0];
        TrajectoryCommand {
            position: self.positions[i0] + delta * ((t - time0) / span),
            velocity: delta / span,
            yaw: self.yaws[i0],
        }
    }
}
