use slotmap::new_key_type;

use crate::{
  coords::CoordinateSystem,
  layers::LayerMask,
  path::{PointPath, TrianglePath},
  steering::{Steerer, SteeringOptions},
};

new_key_type! {
  /// The ID of an agent.
  pub struct AgentId;
}

/// The state of an agent.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AgentState {
  /// The agent has no target.
  Idle,
  /// The agent has a path and is moving along it towards its target.
  Moving,
  /// The agent has reached the end of its path. It stays here until its
  /// target is changed.
  ReachedTarget,
  /// The agent is not close enough to any triangle of the navigation mesh.
  AgentNotOnNavMesh,
  /// The target is not close enough to any triangle the agent may walk on.
  TargetNotOnNavMesh,
  /// The agent has a target but no path to it could be found.
  NoPath,
}

/// An agent in a [`crate::Navigator`].
pub struct Agent<CS: CoordinateSystem> {
  /// The current position of the agent. The navigator never moves the agent;
  /// users should move it according to [`Self::desired_velocity`].
  pub position: CS::Coordinate,
  /// The layers the agent may walk on.
  pub layers: LayerMask,
  /// Steering options for this agent. If None, the navigator's options are
  /// used.
  pub steering_options: Option<SteeringOptions>,
  /// The position the agent is heading for.
  pub(crate) target: Option<CS::Coordinate>,
  /// Whether a new path must be found on the next update.
  pub(crate) needs_path: bool,
  /// The corridor of the current path.
  pub(crate) triangle_path: Option<TrianglePath>,
  pub(crate) steerer: Steerer,
  pub(crate) state: AgentState,
}

impl<CS: CoordinateSystem> Agent<CS> {
  /// Creates an idle agent at `position` that may walk on `layers`.
  pub fn new(position: CS::Coordinate, layers: LayerMask) -> Self {
    Self {
      position,
      layers,
      steering_options: None,
      target: None,
      needs_path: false,
      triangle_path: None,
      steerer: Steerer::new(),
      state: AgentState::Idle,
    }
  }

  pub fn state(&self) -> AgentState {
    self.state
  }

  pub fn target(&self) -> Option<&CS::Coordinate> {
    self.target.as_ref()
  }

  /// The velocity the agent wants to move at, as of the last update.
  pub fn desired_velocity(&self) -> CS::Coordinate {
    CS::from_landstride(&self.steerer.velocity())
  }

  /// The direction the agent wants to face, in radians counter-clockwise from
  /// the standard X axis when seen from above.
  pub fn orientation(&self) -> f32 {
    self.steerer.orientation()
  }

  pub fn angular_velocity(&self) -> f32 {
    self.steerer.angular_velocity()
  }

  /// The corridor of triangles the agent's path goes through.
  pub fn triangle_path(&self) -> Option<&TrianglePath> {
    self.triangle_path.as_ref()
  }

  /// The smoothed path the agent is following.
  pub fn path(&self) -> Option<&PointPath> {
    self.steerer.path()
  }

  /// The index of the waypoint (in [`Self::path`]) the agent is heading for.
  pub fn target_waypoint(&self) -> Option<usize> {
    self.steerer.target_waypoint()
  }

  /// Forces the agent to find a new path to its target on the next update.
  pub fn request_replan(&mut self) {
    if self.target.is_some() {
      self.needs_path = true;
    }
  }
}

#[cfg(test)]
#[path = "agent_test.rs"]
mod test;
