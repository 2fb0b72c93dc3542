#![doc = include_str!("../README.md")]

mod agent;
mod astar;
mod coords;
mod geometry;
mod layers;
mod nav_mesh;
mod path;
mod pathfinding;
mod query;
mod steering;
mod util;

use std::{marker::PhantomData, sync::Arc};

use slotmap::HopSlotMap;
use thiserror::Error;

pub use glam::Vec3;

pub mod debug;

pub use agent::{Agent, AgentId, AgentState};
pub use astar::PathStats;
pub use coords::{CoordinateSystem, YUp, XYZ};
pub use layers::LayerMask;
pub use nav_mesh::{
  BoundaryEdge, ClosestPoint, Edge, NavigationMesh, SurfaceQueryError,
  Triangle, ValidNavigationMesh, ValidationError, WELD_DISTANCE,
};
pub use path::{PointPath, TrianglePath, FUNNEL_EPSILON};
pub use pathfinding::{FindPathError, SearchLimit};
pub use query::TIE_EPSILON;
pub use steering::{
  ReplanReason, Steerer, SteeringOptions, SteeringOptionsError,
  SteeringOutput, SteeringStatus,
};
pub use util::BoundingBox;

/// Options that apply to all agents of a [`Navigator`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NavigatorOptions {
  /// The steering options of agents that don't override them.
  pub steering: SteeringOptions,
  /// The limit on each path search.
  pub search_limit: SearchLimit,
  /// How far from the navigation mesh an agent or target may be and still be
  /// considered on it.
  pub sample_distance: f32,
}

impl Default for NavigatorOptions {
  fn default() -> Self {
    Self {
      steering: SteeringOptions::default(),
      search_limit: SearchLimit::default(),
      sample_distance: 0.5,
    }
  }
}

/// Which end of a path request failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathEndpoint {
  Start,
  Goal,
}

/// An error from requesting a path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum PathRequestError {
  #[error("No eligible triangle is close enough to the {0:?} point.")]
  NoEligibleTriangle(PathEndpoint),
  #[error("The goal cannot be reached from the start.")]
  Unreachable,
  #[error("The search gave up after exploring {explored_nodes} triangles.")]
  SearchLimitReached { explored_nodes: u32 },
}

/// The result of a path search for an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathingResult {
  /// The agent that searched for a path.
  pub agent: AgentId,
  /// Whether the search found a path.
  pub success: bool,
  /// The number of triangles explored by the search.
  pub explored_nodes: u32,
}

/// A report that an agent has strayed from its path. Agents keep following
/// their path; use [`Agent::request_replan`] to find a new one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplanAdvisory {
  pub agent: AgentId,
  pub reason: ReplanReason,
}

/// A path found by [`Navigator::request_path`].
pub struct NavigationPath<CS: CoordinateSystem> {
  triangle_path: TrianglePath,
  point_path: PointPath,
  marker: PhantomData<CS>,
}

impl<CS: CoordinateSystem> Clone for NavigationPath<CS> {
  fn clone(&self) -> Self {
    Self {
      triangle_path: self.triangle_path.clone(),
      point_path: self.point_path.clone(),
      marker: PhantomData,
    }
  }
}

impl<CS: CoordinateSystem> NavigationPath<CS> {
  pub fn triangle_path(&self) -> &TrianglePath {
    &self.triangle_path
  }

  pub fn point_path(&self) -> &PointPath {
    &self.point_path
  }

  /// The waypoints of the path in the user's coordinate system.
  pub fn waypoints(&self) -> Vec<CS::Coordinate> {
    self.point_path.waypoints().iter().map(CS::from_landstride).collect()
  }

  /// The length of the path.
  pub fn length(&self) -> f32 {
    self.point_path.length()
  }

  /// Splits the path into the corridor and the smoothed path.
  pub fn into_parts(self) -> (TrianglePath, PointPath) {
    (self.triangle_path, self.point_path)
  }
}

/// Finds paths and steers agents across a single navigation mesh.
pub struct Navigator<CS: CoordinateSystem> {
  pub options: NavigatorOptions,
  mesh: Arc<ValidNavigationMesh>,
  agents: HopSlotMap<AgentId, Agent<CS>>,
  pathing_results: Vec<PathingResult>,
  replan_advisories: Vec<ReplanAdvisory>,
}

impl<CS: CoordinateSystem> Navigator<CS> {
  pub fn new(mesh: Arc<ValidNavigationMesh>) -> Self {
    Self {
      options: NavigatorOptions::default(),
      mesh,
      agents: HopSlotMap::with_key(),
      pathing_results: Vec::new(),
      replan_advisories: Vec::new(),
    }
  }

  pub fn mesh(&self) -> &Arc<ValidNavigationMesh> {
    &self.mesh
  }

  pub fn add_agent(&mut self, agent: Agent<CS>) -> AgentId {
    self.agents.insert(agent)
  }

  pub fn remove_agent(&mut self, agent_id: AgentId) {
    self
      .agents
      .remove(agent_id)
      .expect("Agent should be present in the navigator");
  }

  pub fn get_agent(&self, agent_id: AgentId) -> Option<&Agent<CS>> {
    self.agents.get(agent_id)
  }

  pub fn get_agent_mut(&mut self, agent_id: AgentId) -> Option<&mut Agent<CS>> {
    self.agents.get_mut(agent_id)
  }

  pub fn agent_ids(&self) -> impl ExactSizeIterator<Item = AgentId> + '_ {
    self.agents.keys()
  }

  /// Sets the target of `agent_id`. A path to the target is found on the next
  /// update, replacing any path the agent was following. Clearing the target
  /// stops the agent.
  pub fn set_agent_target(
    &mut self,
    agent_id: AgentId,
    target: Option<CS::Coordinate>,
  ) {
    let agent = self
      .agents
      .get_mut(agent_id)
      .expect("Agent should be present in the navigator");
    agent.target = target;
    agent.needs_path = true;
  }

  /// Gets the pathing results from the last [`Self::update`] call.
  pub fn pathing_results(&self) -> &[PathingResult] {
    &self.pathing_results
  }

  /// Gets the agents that strayed from their paths during the last
  /// [`Self::update`] call.
  pub fn replan_advisories(&self) -> &[ReplanAdvisory] {
    &self.replan_advisories
  }

  /// Finds a path from `from` to `to` that only walks on triangles in
  /// `layers`. The start may be on any layer, since an agent may already be
  /// standing somewhere it would not choose to walk.
  pub fn request_path(
    &self,
    from: CS::Coordinate,
    to: CS::Coordinate,
    layers: LayerMask,
  ) -> Result<NavigationPath<CS>, PathRequestError> {
    let (result, _) = plan_path(
      &self.mesh,
      &self.options,
      CS::to_landstride(&from),
      CS::to_landstride(&to),
      layers,
    );
    let (triangle_path, point_path) = result?;
    Ok(NavigationPath { triangle_path, point_path, marker: PhantomData })
  }

  /// Finds paths for agents whose targets changed, then steers every agent
  /// for `delta_time` seconds.
  pub fn update(&mut self, delta_time: f32) {
    self.pathing_results.clear();
    self.replan_advisories.clear();

    for (agent_id, agent) in self.agents.iter_mut() {
      let position = CS::to_landstride(&agent.position);

      if agent.needs_path {
        agent.needs_path = false;
        agent.triangle_path = None;
        match agent.target.as_ref() {
          None => {
            agent.steerer.clear();
            agent.state = AgentState::Idle;
          }
          Some(target) => {
            let (result, stats) = plan_path(
              &self.mesh,
              &self.options,
              position,
              CS::to_landstride(target),
              agent.layers,
            );
            self.pathing_results.push(PathingResult {
              agent: agent_id,
              success: result.is_ok(),
              explored_nodes: stats.explored_nodes,
            });
            match result {
              Ok((triangle_path, point_path)) => {
                agent.triangle_path = Some(triangle_path);
                agent.steerer.set_path(point_path);
                agent.state = AgentState::Moving;
              }
              Err(err) => {
                tracing::debug!(?agent_id, %err, "Agent has no path.");
                agent.steerer.clear();
                agent.state = match err {
                  PathRequestError::NoEligibleTriangle(PathEndpoint::Start) => {
                    AgentState::AgentNotOnNavMesh
                  }
                  PathRequestError::NoEligibleTriangle(PathEndpoint::Goal) => {
                    AgentState::TargetNotOnNavMesh
                  }
                  PathRequestError::Unreachable
                  | PathRequestError::SearchLimitReached { .. } => {
                    AgentState::NoPath
                  }
                };
              }
            }
          }
        }
      }

      let options =
        agent.steering_options.as_ref().unwrap_or(&self.options.steering);
      let output =
        agent.steerer.step(&self.mesh, position, delta_time, options);
      if let Some(reason) = output.replan {
        self.replan_advisories.push(ReplanAdvisory { agent: agent_id, reason });
      }
      agent.state = match (output.status, agent.state) {
        (SteeringStatus::Following, _) => AgentState::Moving,
        (SteeringStatus::Arrived, _) => AgentState::ReachedTarget,
        // Failed searches leave the steerer idle, so keep the reason.
        (SteeringStatus::Idle, state) => state,
      };
    }
  }
}

/// Finds the triangle path and smoothed path from `from` to `to`.
fn plan_path(
  mesh: &ValidNavigationMesh,
  options: &NavigatorOptions,
  from: Vec3,
  to: Vec3,
  layers: LayerMask,
) -> (Result<(TrianglePath, PointPath), PathRequestError>, PathStats) {
  let start = match mesh.closest_point(
    from,
    to - from,
    options.sample_distance,
    LayerMask::ALL,
  ) {
    Ok(start) => start,
    Err(_) => {
      return (
        Err(PathRequestError::NoEligibleTriangle(PathEndpoint::Start)),
        PathStats::default(),
      )
    }
  };
  let goal =
    match mesh.closest_point(to, to - from, options.sample_distance, layers) {
      Ok(goal) => goal,
      Err(_) => {
        return (
          Err(PathRequestError::NoEligibleTriangle(PathEndpoint::Goal)),
          PathStats::default(),
        )
      }
    };

  let (result, stats) = mesh.find_path_with_stats(
    start.triangle,
    goal.triangle,
    layers,
    options.search_limit,
  );
  let triangle_path = match result {
    Ok(triangle_path) => triangle_path,
    Err(FindPathError::OutOfRange(index)) => {
      unreachable!("Sampled triangle {index} should be in range.")
    }
    Err(FindPathError::Unreachable) => {
      return (Err(PathRequestError::Unreachable), stats)
    }
    Err(FindPathError::SearchLimitReached { explored_nodes }) => {
      return (
        Err(PathRequestError::SearchLimitReached { explored_nodes }),
        stats,
      )
    }
  };
  let point_path = triangle_path.smooth(mesh, start.point, goal.point);
  (Ok((triangle_path, point_path)), stats)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod test;
