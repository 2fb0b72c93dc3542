use thiserror::Error;

use crate::{
  astar::{self, AStarProblem, PathStats, SearchFailure},
  layers::LayerMask,
  nav_mesh::ValidNavigationMesh,
  path::TrianglePath,
};

/// A search over the triangle adjacency graph. States are triangle indices and
/// actions are the indices of the edges taken.
struct TriangleGraphProblem<'a> {
  mesh: &'a ValidNavigationMesh,
  start_triangle: usize,
  goal_triangle: usize,
  layers: LayerMask,
}

impl AStarProblem for TriangleGraphProblem<'_> {
  type ActionType = usize;

  type StateType = usize;

  fn initial_state(&self) -> Self::StateType {
    self.start_triangle
  }

  fn successors(
    &self,
    state: &Self::StateType,
  ) -> Vec<(f32, Self::ActionType, Self::StateType)> {
    self.mesh.triangles[*state]
      .connections
      .iter()
      .flatten()
      .map(|&edge_index| (edge_index, &self.mesh.edges[edge_index]))
      .filter(|(_, edge)| {
        self.layers.contains(self.mesh.triangles[edge.to].layer)
      })
      .map(|(edge_index, edge)| (edge.cost, edge_index, edge.to))
      .collect()
  }

  fn heuristic(&self, state: &Self::StateType) -> f32 {
    self.mesh.triangles[*state]
      .centroid
      .distance(self.mesh.triangles[self.goal_triangle].centroid)
  }

  fn is_goal_state(&self, state: &Self::StateType) -> bool {
    *state == self.goal_triangle
  }
}

/// Bounds on how much work a single search may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchLimit {
  /// The maximum number of triangles to explore before giving up. `None`
  /// means the search only stops once the frontier is exhausted.
  pub max_explored_nodes: Option<u32>,
}

/// An error from searching for a triangle path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FindPathError {
  #[error("The triangle index {0} is out of range.")]
  OutOfRange(usize),
  #[error("No path of eligible triangles connects the start and the goal.")]
  Unreachable,
  #[error("The search gave up after exploring {explored_nodes} triangles.")]
  SearchLimitReached { explored_nodes: u32 },
}

impl ValidNavigationMesh {
  /// Finds the cheapest sequence of triangles from `start_triangle` to
  /// `goal_triangle`, only passing through triangles whose layer is in
  /// `layers`. The start triangle itself does not need to be eligible. If the
  /// start and goal are the same triangle, the path is empty.
  pub fn find_path(
    &self,
    start_triangle: usize,
    goal_triangle: usize,
    layers: LayerMask,
  ) -> Result<TrianglePath, FindPathError> {
    self
      .find_path_with_stats(
        start_triangle,
        goal_triangle,
        layers,
        SearchLimit::default(),
      )
      .0
  }

  /// Same as [`Self::find_path`], but gives up once `limit` is exceeded, and
  /// also reports how much work the search did.
  pub fn find_path_with_stats(
    &self,
    start_triangle: usize,
    goal_triangle: usize,
    layers: LayerMask,
    limit: SearchLimit,
  ) -> (Result<TrianglePath, FindPathError>, PathStats) {
    let no_work = PathStats::default();
    let start = match self.triangles.get(start_triangle) {
      None => return (Err(FindPathError::OutOfRange(start_triangle)), no_work),
      Some(start) => start,
    };
    let goal = match self.triangles.get(goal_triangle) {
      None => return (Err(FindPathError::OutOfRange(goal_triangle)), no_work),
      Some(goal) => goal,
    };

    if start.index == goal.index {
      return (Ok(TrianglePath::empty(start.index)), no_work);
    }
    if !layers.contains(goal.layer) || start.region != goal.region {
      return (Err(FindPathError::Unreachable), no_work);
    }

    let problem = TriangleGraphProblem {
      mesh: self,
      start_triangle,
      goal_triangle,
      layers,
    };
    match astar::find_path(&problem, limit.max_explored_nodes) {
      Ok(result) => {
        tracing::trace!(
          start_triangle,
          goal_triangle,
          explored_nodes = result.stats.explored_nodes,
          "Found triangle path."
        );
        let path = TrianglePath::from_edges(self, start_triangle, result.path);
        (Ok(path), result.stats)
      }
      Err(SearchFailure::Exhausted(stats)) => {
        (Err(FindPathError::Unreachable), stats)
      }
      Err(SearchFailure::LimitReached(stats)) => {
        tracing::warn!(
          start_triangle,
          goal_triangle,
          explored_nodes = stats.explored_nodes,
          "Triangle path search hit its limit."
        );
        (
          Err(FindPathError::SearchLimitReached {
            explored_nodes: stats.explored_nodes,
          }),
          stats,
        )
      }
    }
  }
}

#[cfg(test)]
#[path = "pathfinding_test.rs"]
mod test;
