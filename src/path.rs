use std::collections::HashSet;

use glam::Vec3;

use crate::{
  geometry::{
    clamp_to_triangle_xy, segment_crossing_fraction_xy, triangle_area_2,
  },
  nav_mesh::ValidNavigationMesh,
};

/// Tolerance (in units of twice the area) for the funnel's side tests. A point
/// within this tolerance of a funnel side counts as lying on it, which
/// tightens the funnel rather than crossing it.
pub const FUNNEL_EPSILON: f32 = 1e-6;

/// A path through a navigation mesh, as a corridor of adjacent triangles.
#[derive(PartialEq, Clone, Debug)]
pub struct TrianglePath {
  /// The triangles visited, starting with the start triangle and ending with
  /// the goal triangle.
  pub(crate) corridor: Vec<usize>,
  /// The edges crossed. `edges[i]` leads from `corridor[i]` to
  /// `corridor[i + 1]`.
  pub(crate) edges: Vec<usize>,
  /// The sum of the costs of all `edges`.
  pub(crate) cost: f32,
}

impl TrianglePath {
  /// A path that never leaves `triangle`.
  pub(crate) fn empty(triangle: usize) -> Self {
    Self { corridor: vec![triangle], edges: vec![], cost: 0.0 }
  }

  /// Creates the path starting at `start_triangle` and taking `edges` in
  /// order.
  pub(crate) fn from_edges(
    mesh: &ValidNavigationMesh,
    start_triangle: usize,
    edges: Vec<usize>,
  ) -> Self {
    let mut corridor = Vec::with_capacity(edges.len() + 1);
    corridor.push(start_triangle);
    let mut cost = 0.0;
    for &edge_index in edges.iter() {
      let edge = &mesh.edges[edge_index];
      debug_assert_eq!(corridor.last(), Some(&edge.from));
      corridor.push(edge.to);
      cost += edge.cost;
    }
    Self { corridor, edges, cost }
  }

  /// The triangles of the corridor, from start to goal.
  pub fn triangles(&self) -> &[usize] {
    &self.corridor
  }

  pub fn edges(&self) -> &[usize] {
    &self.edges
  }

  pub fn start_triangle(&self) -> usize {
    self.corridor[0]
  }

  pub fn goal_triangle(&self) -> usize {
    self.corridor[self.corridor.len() - 1]
  }

  /// Whether the path stays in a single triangle.
  pub fn is_empty(&self) -> bool {
    self.edges.is_empty()
  }

  /// The total cost of the path (the sum of the distances between the
  /// centroids of consecutive triangles).
  pub fn cost(&self) -> f32 {
    self.cost
  }

  /// The shared edges between consecutive triangles, as (left, right) points
  /// when travelling along the path.
  pub fn portals<'a>(
    &'a self,
    mesh: &'a ValidNavigationMesh,
  ) -> impl ExactSizeIterator<Item = (Vec3, Vec3)> + 'a {
    self.edges.iter().map(|&edge| mesh.edge_points(&mesh.edges[edge]))
  }

  /// Reduces the corridor to the shortest polyline (seen from above) from
  /// `start` to `goal` that stays within it. `start` and `goal` are clamped
  /// into the start and goal triangles first.
  pub fn smooth(
    &self,
    mesh: &ValidNavigationMesh,
    start: Vec3,
    goal: Vec3,
  ) -> PointPath {
    let start_triangle = &mesh.triangles[self.start_triangle()];
    let goal_triangle = &mesh.triangles[self.goal_triangle()];
    let start = clamp_to_triangle_xy(start, start_triangle.as_tuple());
    let goal = clamp_to_triangle_xy(goal, goal_triangle.as_tuple());

    // Portal 0 is the start point, the real portals follow, and the last
    // portal is the goal point.
    let mut portals = Vec::with_capacity(self.edges.len() + 2);
    portals.push((start, start));
    portals.extend(self.portals(mesh));
    portals.push((goal, goal));

    let apex_portals = funnel(&portals);

    let mut waypoints = Vec::with_capacity(apex_portals.len());
    let mut waypoint_triangles = Vec::with_capacity(apex_portals.len());
    for &(portal_index, point) in apex_portals.iter() {
      waypoints.push(point);
      // Portal `i` (for real portals) leads into `corridor[i]`.
      waypoint_triangles
        .push(self.corridor[portal_index.min(self.corridor.len() - 1)]);
    }

    let mut edge_crossings = Vec::with_capacity(self.edges.len());
    for segment in apex_portals.windows(2) {
      let (from_portal, from_point) = segment[0];
      let (to_portal, to_point) = segment[1];
      for portal_index in (from_portal + 1)..to_portal {
        let (left, right) = portals[portal_index];
        let fraction =
          segment_crossing_fraction_xy((from_point, to_point), (left, right));
        edge_crossings.push(left.lerp(right, fraction));
      }
      if to_portal < portals.len() - 1 {
        edge_crossings.push(to_point);
      }
    }
    debug_assert_eq!(edge_crossings.len(), self.edges.len());

    PointPath {
      waypoints,
      waypoint_triangles,
      corridor: self.corridor.clone(),
      corridor_set: self.corridor.iter().copied().collect(),
      edge_crossings,
    }
  }
}

/// Runs the funnel algorithm over `portals` (as (left, right) pairs). The
/// first and last portals must be the (degenerate) start and goal points.
/// Returns the points of the taut path, each with the index of the portal it
/// came from.
fn funnel(portals: &[(Vec3, Vec3)]) -> Vec<(usize, Vec3)> {
  let mut result = vec![(0, portals[0].0)];

  let mut apex = portals[0].0;
  let (mut left, mut right) = (apex, apex);
  let (mut left_index, mut right_index) = (0, 0);

  let mut portal_index = 1;
  while portal_index < portals.len() {
    let (portal_left, portal_right) = portals[portal_index];

    if triangle_area_2(apex, right, portal_right) >= -FUNNEL_EPSILON {
      if apex == right
        || triangle_area_2(apex, left, portal_right) <= FUNNEL_EPSILON
      {
        right = portal_right;
        right_index = portal_index;
      } else {
        // The right side crossed over the left side, so the left point is a
        // corner of the path.
        apex = left;
        let apex_index = left_index;
        push_apex(&mut result, apex_index, apex);
        (left, right) = (apex, apex);
        (left_index, right_index) = (apex_index, apex_index);
        portal_index = apex_index + 1;
        continue;
      }
    }

    if triangle_area_2(apex, left, portal_left) <= FUNNEL_EPSILON {
      if apex == left
        || triangle_area_2(apex, right, portal_left) >= -FUNNEL_EPSILON
      {
        left = portal_left;
        left_index = portal_index;
      } else {
        apex = right;
        let apex_index = right_index;
        push_apex(&mut result, apex_index, apex);
        (left, right) = (apex, apex);
        (left_index, right_index) = (apex_index, apex_index);
        portal_index = apex_index + 1;
        continue;
      }
    }

    portal_index += 1;
  }

  let last_index = portals.len() - 1;
  result.push((last_index, portals[last_index].0));
  result
}

/// Adds a corner to the path, skipping it if it repeats the previous corner.
fn push_apex(
  result: &mut Vec<(usize, Vec3)>,
  portal_index: usize,
  point: Vec3,
) {
  if result.last().is_some_and(|last| last.1 == point) {
    return;
  }
  result.push((portal_index, point));
}

/// A path of points for an agent to travel through.
#[derive(PartialEq, Clone, Debug)]
pub struct PointPath {
  /// The points to travel through, starting at the start point and ending at
  /// the goal point.
  pub(crate) waypoints: Vec<Vec3>,
  /// For each waypoint, the triangle the segment leaving that waypoint starts
  /// in. Empty for paths that were not created from a corridor.
  pub(crate) waypoint_triangles: Vec<usize>,
  /// The triangles of the corridor the path was smoothed through.
  pub(crate) corridor: Vec<usize>,
  pub(crate) corridor_set: HashSet<usize>,
  /// The points where the path crosses each portal of the corridor.
  pub(crate) edge_crossings: Vec<Vec3>,
}

impl PointPath {
  /// Creates a path directly from `waypoints`, without any corridor. Agents
  /// following this path are never considered to have left their corridor.
  pub fn from_waypoints(waypoints: Vec<Vec3>) -> Self {
    Self {
      waypoints,
      waypoint_triangles: vec![],
      corridor: vec![],
      corridor_set: HashSet::new(),
      edge_crossings: vec![],
    }
  }

  pub fn waypoints(&self) -> &[Vec3] {
    &self.waypoints
  }

  pub fn waypoint_triangles(&self) -> &[usize] {
    &self.waypoint_triangles
  }

  pub fn corridor(&self) -> &[usize] {
    &self.corridor
  }

  /// Whether `triangle` is part of the corridor this path was smoothed
  /// through.
  pub fn corridor_contains(&self, triangle: usize) -> bool {
    self.corridor_set.contains(&triangle)
  }

  pub fn edge_crossings(&self) -> &[Vec3] {
    &self.edge_crossings
  }

  pub fn is_empty(&self) -> bool {
    self.waypoints.is_empty()
  }

  /// The length of the polyline through all waypoints.
  pub fn length(&self) -> f32 {
    self.waypoints.windows(2).map(|pair| pair[0].distance(pair[1])).sum()
  }
}

#[cfg(test)]
#[path = "path_test.rs"]
mod test;
