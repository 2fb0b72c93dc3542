use crate::{
  AgentId, CoordinateSystem, LayerMask, Navigator, ValidNavigationMesh,
};

/// The type of debug points.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum PointType {
  /// The position of an agent.
  AgentPosition(AgentId),
  /// The target of an agent.
  TargetPosition(AgentId),
  /// The waypoint an agent is currently heading for.
  Waypoint(AgentId),
}

/// The type of debug lines.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum LineType {
  /// An edge of a triangle that is not connected to any other triangle.
  BoundaryEdge,
  /// An edge shared by two triangles.
  ConnectivityEdge,
  /// Part of an agent's corridor. The corridor connects the centroids of the
  /// triangles of the path, not the points the agent will travel through.
  AgentCorridor(AgentId),
  /// Part of the smoothed path of an agent.
  AgentPath(AgentId),
  /// Line from an agent to its target.
  Target(AgentId),
  /// Line to the waypoint of an agent.
  Waypoint(AgentId),
}

/// The type of debug triangles.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum TriangleType {
  /// A triangle whose layer is in the drawn layer mask.
  Eligible,
  /// A triangle whose layer is not in the drawn layer mask.
  Ineligible,
}

/// Trait to "draw" Navigator state to. Users should implement this to
/// visualize the state of their Navigator.
pub trait DebugDrawer<CS: CoordinateSystem> {
  fn add_point(&mut self, point_type: PointType, point: CS::Coordinate);
  fn add_line(&mut self, line_type: LineType, line: [CS::Coordinate; 2]);
  fn add_triangle(
    &mut self,
    triangle_type: TriangleType,
    triangle: [CS::Coordinate; 3],
  );
}

/// Draws the navigation mesh of `navigator` (with triangles marked by whether
/// they are in `layers`) and all of its agents to `debug_drawer`.
pub fn draw_navigator_debug<CS: CoordinateSystem>(
  navigator: &Navigator<CS>,
  layers: LayerMask,
  debug_drawer: &mut impl DebugDrawer<CS>,
) {
  let mesh = navigator.mesh();
  draw_mesh(mesh, layers, debug_drawer);

  for agent_id in navigator.agent_ids() {
    let agent = navigator
      .get_agent(agent_id)
      .expect("Agent IDs come from the navigator.");
    debug_drawer
      .add_point(PointType::AgentPosition(agent_id), agent.position.clone());
    if let Some(target) = agent.target() {
      debug_drawer.add_line(
        LineType::Target(agent_id),
        [agent.position.clone(), target.clone()],
      );
      debug_drawer
        .add_point(PointType::TargetPosition(agent_id), target.clone());
    }

    if let Some(triangle_path) = agent.triangle_path() {
      let centroids = triangle_path
        .triangles()
        .iter()
        .map(|&triangle| {
          CS::from_landstride(&mesh.triangles[triangle].centroid)
        })
        .collect::<Vec<_>>();
      for pair in centroids.windows(2) {
        debug_drawer.add_line(
          LineType::AgentCorridor(agent_id),
          [pair[0].clone(), pair[1].clone()],
        );
      }
    }

    let Some(path) = agent.path() else {
      continue;
    };
    for pair in path.waypoints().windows(2) {
      debug_drawer.add_line(
        LineType::AgentPath(agent_id),
        [CS::from_landstride(&pair[0]), CS::from_landstride(&pair[1])],
      );
    }
    if let Some(waypoint_index) = agent.target_waypoint() {
      let waypoint = CS::from_landstride(&path.waypoints()[waypoint_index]);
      debug_drawer.add_line(
        LineType::Waypoint(agent_id),
        [agent.position.clone(), waypoint.clone()],
      );
      debug_drawer.add_point(PointType::Waypoint(agent_id), waypoint);
    }
  }
}

/// Draws every triangle of `mesh` and its edges.
fn draw_mesh<CS: CoordinateSystem>(
  mesh: &ValidNavigationMesh,
  layers: LayerMask,
  debug_drawer: &mut impl DebugDrawer<CS>,
) {
  let vertex = |index: usize| CS::from_landstride(&mesh.vertices()[index]);

  for triangle in mesh.triangles() {
    let triangle_type = if layers.contains(triangle.layer()) {
      TriangleType::Eligible
    } else {
      TriangleType::Ineligible
    };
    let [a, b, c] = triangle.vertices();
    debug_drawer.add_triangle(triangle_type, [vertex(a), vertex(b), vertex(c)]);
  }

  for edge in mesh.edges() {
    // Each shared edge is stored once per direction, so only draw one of them.
    if edge.from > edge.to {
      continue;
    }
    debug_drawer.add_line(
      LineType::ConnectivityEdge,
      [vertex(edge.left), vertex(edge.right)],
    );
  }

  for &boundary_edge in mesh.boundary_edges() {
    let (a, b) = mesh.boundary_edge_points(boundary_edge);
    debug_drawer.add_line(
      LineType::BoundaryEdge,
      [CS::from_landstride(&a), CS::from_landstride(&b)],
    );
  }
}

#[cfg(test)]
#[path = "debug_test.rs"]
mod test;
