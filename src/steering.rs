use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3, Vec3Swizzles};
use thiserror::Error;

use crate::{layers::LayerMask, nav_mesh::ValidNavigationMesh, path::PointPath};

/// Options controlling how an agent follows its path.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SteeringOptions {
  /// The maximum change in linear velocity per second.
  pub max_linear_acceleration: f32,
  /// The maximum linear speed.
  pub max_linear_speed: f32,
  /// The maximum change in angular velocity (radians per second) per second.
  pub max_angular_acceleration: f32,
  /// The maximum angular speed in radians per second.
  pub max_angular_speed: f32,
  /// The distance under which a waypoint is considered reached.
  pub arrival_tolerance: f32,
  /// The distance (along the path) from the final waypoint within which the
  /// desired speed ramps down.
  pub deceleration_radius: f32,
  /// How far into the future (in seconds) the agent's position is predicted
  /// when deciding which waypoint to head for.
  pub prediction_time: f32,
  /// How far ahead along the path the agent aims. The aim stops at the
  /// waypoint being headed for.
  pub path_offset: f32,
  /// The time over which the agent tries to reach its desired velocity and
  /// orientation.
  pub time_to_target: f32,
  /// Speeds below this are snapped to zero.
  pub zero_linear_speed_threshold: f32,
}

impl Default for SteeringOptions {
  fn default() -> Self {
    Self {
      max_linear_acceleration: 50.0,
      max_linear_speed: 2.0,
      max_angular_acceleration: 100.0,
      max_angular_speed: 15.0,
      arrival_tolerance: 0.1,
      deceleration_radius: 0.5,
      prediction_time: 0.0,
      path_offset: 1.0,
      time_to_target: 0.1,
      zero_linear_speed_threshold: 0.001,
    }
  }
}

/// An error from validating [`SteeringOptions`].
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum SteeringOptionsError {
  #[error("The option `{0}` must be positive, but was {1}.")]
  NotPositive(&'static str, f32),
  #[error("The option `{0}` must not be negative, but was {1}.")]
  Negative(&'static str, f32),
}

impl SteeringOptions {
  /// Checks that all speeds, accelerations, the arrival tolerance and the time
  /// to target are positive, and that the remaining options are not negative.
  pub fn validate(&self) -> Result<(), SteeringOptionsError> {
    for (name, value) in [
      ("max_linear_acceleration", self.max_linear_acceleration),
      ("max_linear_speed", self.max_linear_speed),
      ("max_angular_acceleration", self.max_angular_acceleration),
      ("max_angular_speed", self.max_angular_speed),
      ("arrival_tolerance", self.arrival_tolerance),
      ("time_to_target", self.time_to_target),
    ] {
      if value.is_nan() || value <= 0.0 {
        return Err(SteeringOptionsError::NotPositive(name, value));
      }
    }
    for (name, value) in [
      ("deceleration_radius", self.deceleration_radius),
      ("prediction_time", self.prediction_time),
      ("path_offset", self.path_offset),
      ("zero_linear_speed_threshold", self.zero_linear_speed_threshold),
    ] {
      if value.is_nan() || value < 0.0 {
        return Err(SteeringOptionsError::Negative(name, value));
      }
    }
    Ok(())
  }
}

/// The status of a [`Steerer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SteeringStatus {
  /// There is no path to follow.
  Idle,
  /// The steerer is advancing through its path.
  Following,
  /// The final waypoint was reached. The steerer stays here until it is given
  /// a new path.
  Arrived,
}

/// Why the agent should search for a new path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplanReason {
  /// The agent is on a triangle that is not part of its path's corridor.
  LeftCorridor { triangle: usize },
  /// The agent is not above or below any triangle.
  OffMesh,
}

/// The result of a single steering step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SteeringOutput {
  /// The velocity the agent should move at. This is always horizontal.
  pub linear_velocity: Vec3,
  /// The direction the agent should face, in radians counter-clockwise from
  /// the X axis (seen from above).
  pub orientation: f32,
  /// The rate the orientation is changing, in radians per second.
  pub angular_velocity: f32,
  pub status: SteeringStatus,
  /// Set if the agent has deviated from its path. The steerer keeps following
  /// the path regardless, so acting on this is up to the caller.
  pub replan: Option<ReplanReason>,
}

#[derive(Clone, Debug, PartialEq)]
enum SteeringState {
  Idle,
  Following {
    path: PointPath,
    /// The index of the waypoint being headed for.
    target: usize,
  },
  Arrived {
    path: PointPath,
  },
}

/// Drives an agent along a [`PointPath`].
#[derive(Clone, Debug, PartialEq)]
pub struct Steerer {
  state: SteeringState,
  velocity: Vec3,
  orientation: f32,
  angular_velocity: f32,
}

impl Default for Steerer {
  fn default() -> Self {
    Self::new()
  }
}

impl Steerer {
  /// Creates an idle steerer facing along the X axis.
  pub fn new() -> Self {
    Self {
      state: SteeringState::Idle,
      velocity: Vec3::ZERO,
      orientation: 0.0,
      angular_velocity: 0.0,
    }
  }

  /// Starts following `path` from its first waypoint, discarding any previous
  /// path. An empty path counts as already arrived.
  pub fn set_path(&mut self, path: PointPath) {
    if path.is_empty() {
      tracing::debug!("Assigned an empty path, so the agent has arrived.");
      self.state = SteeringState::Arrived { path };
      return;
    }
    tracing::debug!(waypoints = path.waypoints().len(), "Following new path.");
    self.state = SteeringState::Following { path, target: 0 };
  }

  /// Drops the current path.
  pub fn clear(&mut self) {
    self.state = SteeringState::Idle;
  }

  pub fn status(&self) -> SteeringStatus {
    match self.state {
      SteeringState::Idle => SteeringStatus::Idle,
      SteeringState::Following { .. } => SteeringStatus::Following,
      SteeringState::Arrived { .. } => SteeringStatus::Arrived,
    }
  }

  /// The path being followed (or that was followed to arrival).
  pub fn path(&self) -> Option<&PointPath> {
    match &self.state {
      SteeringState::Idle => None,
      SteeringState::Following { path, .. }
      | SteeringState::Arrived { path } => Some(path),
    }
  }

  /// The index of the waypoint currently headed for.
  pub fn target_waypoint(&self) -> Option<usize> {
    match self.state {
      SteeringState::Following { target, .. } => Some(target),
      _ => None,
    }
  }

  pub fn velocity(&self) -> Vec3 {
    self.velocity
  }

  pub fn orientation(&self) -> f32 {
    self.orientation
  }

  pub fn set_orientation(&mut self, orientation: f32) {
    self.orientation = wrap_angle(orientation);
  }

  pub fn angular_velocity(&self) -> f32 {
    self.angular_velocity
  }

  /// Advances the steerer by `delta_time` seconds for an agent at `position`.
  pub fn step(
    &mut self,
    mesh: &ValidNavigationMesh,
    position: Vec3,
    delta_time: f32,
    options: &SteeringOptions,
  ) -> SteeringOutput {
    let delta_time = delta_time.max(0.0);
    let mut replan = None;

    let desired_velocity = match &mut self.state {
      SteeringState::Idle | SteeringState::Arrived { .. } => Vec2::ZERO,
      SteeringState::Following { path, target } => {
        replan = check_deviation(mesh, path, position);

        let predicted = position + self.velocity * options.prediction_time;
        advance_target(path.waypoints(), target, predicted, options);

        let waypoints = path.waypoints();
        let last = waypoints.len() - 1;
        if *target == last
          && position.xy().distance(waypoints[last].xy())
            <= options.arrival_tolerance
        {
          tracing::debug!(
            position = ?position,
            goal = ?waypoints[last],
            "Agent arrived."
          );
          let path = std::mem::replace(path, PointPath::from_waypoints(vec![]));
          self.state = SteeringState::Arrived { path };
          Vec2::ZERO
        } else {
          seek_velocity(waypoints, *target, position, predicted, options)
        }
      }
    };

    self.update_velocity(desired_velocity, delta_time, options);
    self.update_orientation(delta_time, options);

    SteeringOutput {
      linear_velocity: self.velocity,
      orientation: self.orientation,
      angular_velocity: self.angular_velocity,
      status: self.status(),
      replan,
    }
  }

  fn update_velocity(
    &mut self,
    desired_velocity: Vec2,
    delta_time: f32,
    options: &SteeringOptions,
  ) {
    let current = self.velocity.xy();
    let approach = (delta_time / options.time_to_target).min(1.0);
    let change = ((desired_velocity - current) * approach)
      .clamp_length_max(options.max_linear_acceleration * delta_time);
    let mut velocity =
      (current + change).clamp_length_max(options.max_linear_speed);
    if velocity.length() < options.zero_linear_speed_threshold
      && desired_velocity.length() < options.zero_linear_speed_threshold
    {
      velocity = Vec2::ZERO;
    }
    self.velocity = velocity.extend(0.0);
  }

  fn update_orientation(&mut self, delta_time: f32, options: &SteeringOptions) {
    let velocity = self.velocity.xy();
    let target_orientation =
      if velocity.length() > options.zero_linear_speed_threshold {
        velocity.y.atan2(velocity.x)
      } else {
        self.orientation
      };
    let difference = wrap_angle(target_orientation - self.orientation);

    let max_speed = options.max_angular_speed;
    let max_change = options.max_angular_acceleration * delta_time;
    // Slow enough to stop at the target orientation without exceeding the
    // angular acceleration.
    let stopping_speed =
      (2.0 * options.max_angular_acceleration * difference.abs()).sqrt();
    let desired_angular_velocity = (difference / options.time_to_target)
      .max(-stopping_speed)
      .min(stopping_speed)
      .clamp(-max_speed, max_speed);
    let angular_velocity = (self.angular_velocity
      + (desired_angular_velocity - self.angular_velocity)
        .clamp(-max_change, max_change))
    .clamp(-max_speed, max_speed);

    let rotation = angular_velocity * delta_time;
    if difference != 0.0
      && rotation.signum() == difference.signum()
      && rotation.abs() >= difference.abs()
      && self.angular_velocity.abs() <= max_change
    {
      self.orientation = wrap_angle(target_orientation);
      self.angular_velocity = 0.0;
    } else {
      self.orientation = wrap_angle(self.orientation + rotation);
      self.angular_velocity = angular_velocity;
    }
  }
}

/// Wraps `angle` into [-PI, PI).
fn wrap_angle(angle: f32) -> f32 {
  (angle + PI).rem_euclid(TAU) - PI
}

/// Checks whether an agent at `position` is still on the corridor of `path`.
fn check_deviation(
  mesh: &ValidNavigationMesh,
  path: &PointPath,
  position: Vec3,
) -> Option<ReplanReason> {
  match mesh.find_containing(position, LayerMask::ALL) {
    None => Some(ReplanReason::OffMesh),
    Some(containing)
      if !path.corridor().is_empty()
        && !path.corridor_contains(containing.triangle) =>
    {
      Some(ReplanReason::LeftCorridor { triangle: containing.triangle })
    }
    Some(_) => None,
  }
}

/// Moves `target` past every waypoint that `predicted` has passed. The first
/// waypoint is passed once it is within the arrival tolerance. The final
/// waypoint is never skipped.
fn advance_target(
  waypoints: &[Vec3],
  target: &mut usize,
  predicted: Vec3,
  options: &SteeringOptions,
) {
  let last = waypoints.len() - 1;
  while *target < last {
    let waypoint = waypoints[*target].xy();
    let passed = if *target == 0 {
      predicted.xy().distance(waypoint) <= options.arrival_tolerance
    } else {
      // A corner is passed once the agent crosses the bisector between the
      // incoming and outgoing segments. Corners hug the edge of the mesh, so
      // turning any earlier would cut through unwalkable space.
      let incoming =
        (waypoint - waypoints[*target - 1].xy()).normalize_or_zero();
      let outgoing =
        (waypoints[*target + 1].xy() - waypoint).normalize_or_zero();
      let mut normal = incoming + outgoing;
      if normal.length_squared() < 1e-6 {
        normal = incoming;
      }
      (predicted.xy() - waypoint).dot(normal) >= 0.0
    };
    if !passed {
      break;
    }
    *target += 1;
    tracing::trace!(target = *target, "Advanced to next waypoint.");
  }
}

/// Computes the velocity an agent at `position` wants to move at.
fn seek_velocity(
  waypoints: &[Vec3],
  target: usize,
  position: Vec3,
  predicted: Vec3,
  options: &SteeringOptions,
) -> Vec2 {
  let aim = if options.path_offset > 0.0 {
    aim_along_path(waypoints, target, predicted, options.path_offset)
  } else {
    waypoints[target].xy()
  };

  // Only the final waypoint slows the agent down, so the distance is measured
  // along the rest of the path.
  let remaining_distance = position.xy().distance(waypoints[target].xy())
    + waypoints[target..]
      .windows(2)
      .map(|pair| pair[0].xy().distance(pair[1].xy()))
      .sum::<f32>();
  let mut speed = options.max_linear_speed;
  if remaining_distance < options.deceleration_radius {
    // Stay above the speed that snaps to zero, or the agent would stall short
    // of the arrival tolerance.
    let min_speed = (2.0 * options.zero_linear_speed_threshold)
      .min(options.max_linear_speed);
    speed = (speed * remaining_distance / options.deceleration_radius)
      .max(min_speed);
  }

  (aim - position.xy()).normalize_or_zero() * speed
}

/// Finds the point `offset` further along the segment leading to
/// `waypoints[target]` than the projection of `predicted`. The aim never goes
/// past the waypoint itself.
fn aim_along_path(
  waypoints: &[Vec3],
  target: usize,
  predicted: Vec3,
  offset: f32,
) -> Vec2 {
  let waypoint = waypoints[target].xy();
  let current = if target > 0 {
    project_onto_segment(predicted.xy(), waypoints[target - 1].xy(), waypoint)
  } else {
    predicted.xy()
  };
  let distance = current.distance(waypoint);
  if distance > offset {
    current + (waypoint - current) * (offset / distance)
  } else {
    waypoint
  }
}

fn project_onto_segment(point: Vec2, start: Vec2, end: Vec2) -> Vec2 {
  let segment = end - start;
  let length_squared = segment.length_squared();
  if length_squared == 0.0 {
    return start;
  }
  start
    + segment * ((point - start).dot(segment) / length_squared).clamp(0.0, 1.0)
}

#[cfg(test)]
#[path = "steering_test.rs"]
mod test;
