use std::sync::Arc;

use glam::Vec3;
use googletest::{expect_eq, expect_that, matchers::*, verify_eq, verify_that};

use crate::{
  Agent, AgentId, AgentState, LayerMask, NavigationMesh, Navigator,
  PathEndpoint, PathRequestError, PathingResult, ReplanAdvisory, ReplanReason,
  SearchLimit, ValidNavigationMesh, YUp, XYZ,
};

const DELTA_TIME: f32 = 1.0 / 60.0;

/// Creates a strip of unit squares along the X axis, one for each x in
/// `cells`. Square `i` is made of triangles `2 * i` and `2 * i + 1`.
fn strip_mesh(cells: &[usize]) -> Arc<ValidNavigationMesh> {
  let width = cells.iter().max().map_or(0, |x| x + 1);
  let vertex = |x: usize, y: usize| y * (width + 1) + x;
  let mut vertices = vec![];
  for y in 0..=1 {
    for x in 0..=width {
      vertices.push(Vec3::new(x as f32, y as f32, 0.0));
    }
  }
  let mut triangles = vec![];
  for &x in cells {
    triangles.push([vertex(x, 0), vertex(x + 1, 0), vertex(x + 1, 1)]);
    triangles.push([vertex(x, 0), vertex(x + 1, 1), vertex(x, 1)]);
  }
  let triangle_layers = vec![0; triangles.len()];
  Arc::new(
    NavigationMesh::<XYZ> { vertices, triangles, triangle_layers }
      .validate()
      .expect("Mesh is valid."),
  )
}

/// Creates unit squares at each (x, y) in `cells`. Square `i` is made of
/// triangles `2 * i` (below its diagonal) and `2 * i + 1`.
fn grid_mesh(cells: &[(usize, usize)]) -> Arc<ValidNavigationMesh> {
  let width = cells.iter().map(|&(x, _)| x + 1).max().unwrap_or(0);
  let height = cells.iter().map(|&(_, y)| y + 1).max().unwrap_or(0);
  let vertex = |x: usize, y: usize| y * (width + 1) + x;
  let mut vertices = vec![];
  for y in 0..=height {
    for x in 0..=width {
      vertices.push(Vec3::new(x as f32, y as f32, 0.0));
    }
  }
  let mut triangles = vec![];
  for &(x, y) in cells {
    triangles.push([vertex(x, y), vertex(x + 1, y), vertex(x + 1, y + 1)]);
    triangles.push([vertex(x, y), vertex(x + 1, y + 1), vertex(x, y + 1)]);
  }
  let triangle_layers = vec![0; triangles.len()];
  Arc::new(
    NavigationMesh::<XYZ> { vertices, triangles, triangle_layers }
      .validate()
      .expect("Mesh is valid."),
  )
}

/// A large square floor covering [-10, 20] on both horizontal axes.
fn floor() -> Arc<ValidNavigationMesh> {
  Arc::new(
    NavigationMesh::<XYZ> {
      vertices: vec![
        Vec3::new(-10.0, -10.0, 0.0),
        Vec3::new(20.0, -10.0, 0.0),
        Vec3::new(20.0, 20.0, 0.0),
        Vec3::new(-10.0, 20.0, 0.0),
      ],
      triangles: vec![[0, 1, 2], [0, 2, 3]],
      triangle_layers: vec![0, 0],
    }
    .validate()
    .expect("Mesh is valid."),
  )
}

/// Checks that `actual` and `expected` match up to rounding.
fn assert_points_near(actual: &[Vec3], expected: &[Vec3]) {
  assert_eq!(actual.len(), expected.len(), "{actual:?} != {expected:?}");
  for (a, e) in actual.iter().zip(expected) {
    assert!(a.distance(*e) < 1e-5, "{actual:?} != {expected:?}");
  }
}

fn state_of(navigator: &Navigator<XYZ>, agent_id: AgentId) -> AgentState {
  navigator.get_agent(agent_id).expect("Agent exists.").state()
}

/// Moves every agent by its desired velocity.
fn move_agents(navigator: &mut Navigator<XYZ>) {
  let agent_ids = navigator.agent_ids().collect::<Vec<_>>();
  for agent_id in agent_ids {
    let agent = navigator.get_agent_mut(agent_id).expect("Agent exists.");
    agent.position += agent.desired_velocity() * DELTA_TIME;
  }
}

#[googletest::test]
fn request_path_rounds_corner() {
  // An L shape: squares at (0, 0), (1, 0) and (1, 1).
  let mesh = NavigationMesh::<XYZ> {
    vertices: vec![
      Vec3::new(0.0, 0.0, 0.0),
      Vec3::new(1.0, 0.0, 0.0),
      Vec3::new(2.0, 0.0, 0.0),
      Vec3::new(0.0, 1.0, 0.0),
      Vec3::new(1.0, 1.0, 0.0),
      Vec3::new(2.0, 1.0, 0.0),
      Vec3::new(1.0, 2.0, 0.0),
      Vec3::new(2.0, 2.0, 0.0),
    ],
    triangles: vec![
      [0, 1, 4],
      [0, 4, 3],
      [1, 2, 5],
      [1, 5, 4],
      [4, 5, 7],
      [4, 7, 6],
    ],
    triangle_layers: vec![0; 6],
  }
  .validate()
  .expect("Mesh is valid.");
  let navigator = Navigator::<XYZ>::new(Arc::new(mesh));

  let start = Vec3::new(0.2, 0.8, 0.0);
  let goal = Vec3::new(1.2, 1.8, 0.0);
  let path = navigator
    .request_path(start, goal, LayerMask::ALL)
    .expect("Path is found.");
  assert_eq!(path.triangle_path().triangles(), [1, 0, 3, 4, 5]);
  assert_points_near(
    &path.waypoints(),
    &[start, Vec3::new(1.0, 1.0, 0.0), goal],
  );
  expect_that!(path.length(), approx_eq(2.0 * 0.68f32.sqrt()));
}

#[googletest::test]
fn request_path_reports_failures() {
  let mut navigator = Navigator::<XYZ>::new(strip_mesh(&[0, 2]));
  let start = Vec3::new(0.7, 0.3, 0.0);

  expect_eq!(
    navigator
      .request_path(Vec3::new(10.0, 10.0, 0.0), start, LayerMask::ALL)
      .err(),
    Some(PathRequestError::NoEligibleTriangle(PathEndpoint::Start))
  );
  expect_eq!(
    navigator
      .request_path(start, Vec3::new(0.3, 0.7, 5.0), LayerMask::ALL)
      .err(),
    Some(PathRequestError::NoEligibleTriangle(PathEndpoint::Goal))
  );
  expect_eq!(
    navigator
      .request_path(start, Vec3::new(0.3, 0.7, 0.0), LayerMask::single(1))
      .err(),
    Some(PathRequestError::NoEligibleTriangle(PathEndpoint::Goal))
  );
  expect_eq!(
    navigator
      .request_path(start, Vec3::new(2.7, 0.3, 0.0), LayerMask::ALL)
      .err(),
    Some(PathRequestError::Unreachable)
  );

  navigator = Navigator::<XYZ>::new(strip_mesh(&[0, 1, 2]));
  navigator.options.search_limit = SearchLimit { max_explored_nodes: Some(1) };
  assert!(matches!(
    navigator.request_path(start, Vec3::new(2.7, 0.3, 0.0), LayerMask::ALL),
    Err(PathRequestError::SearchLimitReached { .. })
  ));
}

#[googletest::test]
fn request_path_uses_user_coordinates() {
  // The same floor as `floor`, but with Y up.
  let mesh = NavigationMesh::<YUp> {
    vertices: vec![
      Vec3::new(-10.0, 0.0, 10.0),
      Vec3::new(20.0, 0.0, 10.0),
      Vec3::new(20.0, 0.0, -20.0),
      Vec3::new(-10.0, 0.0, -20.0),
    ],
    triangles: vec![[0, 1, 2], [0, 2, 3]],
    triangle_layers: vec![0, 0],
  }
  .validate()
  .expect("Mesh is valid.");
  let navigator = Navigator::<YUp>::new(Arc::new(mesh));

  let path = navigator
    .request_path(
      Vec3::new(0.0, 0.2, 2.0),
      Vec3::new(5.0, 0.0, 2.0),
      LayerMask::ALL,
    )
    .expect("Path is found.");
  assert_points_near(
    &path.waypoints(),
    &[Vec3::new(0.0, 0.0, 2.0), Vec3::new(5.0, 0.0, 2.0)],
  );
}

#[googletest::test]
fn agent_walks_to_target() {
  let mut navigator = Navigator::<XYZ>::new(floor());
  let agent_id = navigator
    .add_agent(Agent::new(Vec3::new(0.0, -2.0, 0.0), LayerMask::single(0)));
  let target = Vec3::new(5.0, -2.0, 0.0);
  navigator.set_agent_target(agent_id, Some(target));

  navigator.update(DELTA_TIME);
  expect_that!(
    navigator.pathing_results().to_vec(),
    elements_are!(&PathingResult {
      agent: agent_id,
      success: true,
      explored_nodes: 0
    })
  );
  expect_eq!(state_of(&navigator, agent_id), AgentState::Moving);

  for _ in 0..600 {
    move_agents(&mut navigator);
    navigator.update(DELTA_TIME);
    expect_eq!(navigator.pathing_results().len(), 0);
    expect_eq!(navigator.replan_advisories().len(), 0);
    if state_of(&navigator, agent_id) == AgentState::ReachedTarget {
      break;
    }
  }

  let agent = navigator.get_agent(agent_id).expect("Agent exists.");
  expect_eq!(agent.state(), AgentState::ReachedTarget);
  expect_that!(agent.position.distance(target), le(0.1));
  expect_eq!(agent.target(), Some(&target));
}

#[googletest::test]
fn agent_rounds_corners_without_leaving_corridor() {
  // A U shape opening to the left, around the missing square at (0, 1).
  let mut navigator = Navigator::<XYZ>::new(grid_mesh(&[
    (0, 0),
    (1, 0),
    (1, 1),
    (1, 2),
    (0, 2),
  ]));
  let agent_id =
    navigator.add_agent(Agent::new(Vec3::new(0.5, 0.3, 0.0), LayerMask::ALL));
  let target = Vec3::new(0.5, 2.7, 0.0);
  navigator.set_agent_target(agent_id, Some(target));
  navigator.update(DELTA_TIME);
  expect_eq!(navigator.replan_advisories().len(), 0);
  // The path bends around both corners of the missing square.
  let waypoint_count = navigator
    .get_agent(agent_id)
    .and_then(|agent| agent.path())
    .map(|path| path.waypoints().len());
  expect_eq!(waypoint_count, Some(4));

  for _ in 0..600 {
    move_agents(&mut navigator);
    navigator.update(DELTA_TIME);
    expect_eq!(navigator.replan_advisories().len(), 0);
    if state_of(&navigator, agent_id) == AgentState::ReachedTarget {
      break;
    }
  }

  let agent = navigator.get_agent(agent_id).expect("Agent exists.");
  expect_eq!(agent.state(), AgentState::ReachedTarget);
  expect_that!(agent.position.distance(target), le(0.1));
}

#[googletest::test]
fn agent_states_report_planning_failures() {
  let mut navigator = Navigator::<XYZ>::new(strip_mesh(&[0, 2]));
  let stranded =
    navigator.add_agent(Agent::new(Vec3::new(5.0, 5.0, 0.0), LayerMask::ALL));
  let bad_target =
    navigator.add_agent(Agent::new(Vec3::new(0.5, 0.2, 0.0), LayerMask::ALL));
  let unreachable =
    navigator.add_agent(Agent::new(Vec3::new(0.5, 0.2, 0.0), LayerMask::ALL));
  navigator.set_agent_target(stranded, Some(Vec3::new(0.5, 0.2, 0.0)));
  navigator.set_agent_target(bad_target, Some(Vec3::new(5.0, 5.0, 0.0)));
  navigator.set_agent_target(unreachable, Some(Vec3::new(2.5, 0.2, 0.0)));

  navigator.update(DELTA_TIME);

  expect_eq!(state_of(&navigator, stranded), AgentState::AgentNotOnNavMesh);
  expect_eq!(
    state_of(&navigator, bad_target),
    AgentState::TargetNotOnNavMesh
  );
  expect_eq!(state_of(&navigator, unreachable), AgentState::NoPath);
  expect_eq!(navigator.pathing_results().len(), 3);
  assert!(navigator.pathing_results().iter().all(|result| !result.success));
  for agent_id in [stranded, bad_target, unreachable] {
    expect_eq!(
      navigator
        .get_agent(agent_id)
        .expect("Agent exists.")
        .desired_velocity(),
      Vec3::ZERO
    );
  }

  // The failure is kept until the target changes.
  navigator.update(DELTA_TIME);
  expect_eq!(state_of(&navigator, unreachable), AgentState::NoPath);
  expect_eq!(navigator.pathing_results().len(), 0);

  navigator.set_agent_target(unreachable, None);
  navigator.update(DELTA_TIME);
  expect_eq!(state_of(&navigator, unreachable), AgentState::Idle);
}

#[googletest::test]
fn straying_agents_are_advised_to_replan() {
  let mut navigator = Navigator::<XYZ>::new(strip_mesh(&[0, 1, 2]));
  let agent_id =
    navigator.add_agent(Agent::new(Vec3::new(0.5, 0.2, 0.0), LayerMask::ALL));
  navigator.set_agent_target(agent_id, Some(Vec3::new(1.5, 0.2, 0.0)));
  navigator.update(DELTA_TIME);
  expect_eq!(navigator.replan_advisories().len(), 0);

  // Teleport the agent past the end of its corridor.
  navigator.get_agent_mut(agent_id).expect("Agent exists.").position =
    Vec3::new(2.7, 0.3, 0.0);
  navigator.update(DELTA_TIME);
  expect_that!(
    navigator.replan_advisories().to_vec(),
    elements_are!(&ReplanAdvisory {
      agent: agent_id,
      reason: ReplanReason::LeftCorridor { triangle: 4 },
    })
  );
  // Advisories are not acted on.
  expect_eq!(navigator.pathing_results().len(), 0);
  expect_eq!(state_of(&navigator, agent_id), AgentState::Moving);

  navigator.get_agent_mut(agent_id).expect("Agent exists.").request_replan();
  navigator.update(DELTA_TIME);
  expect_eq!(navigator.pathing_results().len(), 1);
  expect_eq!(navigator.replan_advisories().len(), 0);
  let agent = navigator.get_agent(agent_id).expect("Agent exists.");
  assert_eq!(
    agent.triangle_path().expect("Agent has a path.").triangles(),
    [4, 5, 2]
  );
}

#[test]
fn removed_agents_are_no_longer_updated() {
  let mut navigator = Navigator::<XYZ>::new(floor());
  let agent_id =
    navigator.add_agent(Agent::new(Vec3::new(0.0, -2.0, 0.0), LayerMask::ALL));
  navigator.set_agent_target(agent_id, Some(Vec3::new(5.0, -2.0, 0.0)));
  navigator.remove_agent(agent_id);
  navigator.update(DELTA_TIME);
  assert!(navigator.get_agent(agent_id).is_none());
  assert_eq!(navigator.agent_ids().len(), 0);
  assert_eq!(navigator.pathing_results().len(), 0);
}
