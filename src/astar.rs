use std::{
  cmp::{Ordering, Reverse},
  collections::{BinaryHeap, HashMap},
  hash::Hash,
};

/// A generic A* problem.
pub trait AStarProblem {
  /// The action that allows moving between states.
  type ActionType: Clone;
  /// The state that agents try to optimize.
  type StateType: Hash + Eq + Clone;

  /// Creates the initial state for the problem.
  fn initial_state(&self) -> Self::StateType;

  /// Creates all possible states that can be reached by a single action from
  /// `state`. The result stores the "cost" of the action, the action taken, and
  /// the resulting state. The order of successors decides which of several
  /// equally good paths is found.
  fn successors(
    &self,
    state: &Self::StateType,
  ) -> Vec<(f32, Self::ActionType, Self::StateType)>;

  /// Computes an estimate of the cost to reach a goal state from `state`. Must
  /// be non-negative and goal states must have an estimate of 0.
  fn heuristic(&self, state: &Self::StateType) -> f32;

  /// Determines whether `state` is a goal state.
  fn is_goal_state(&self, state: &Self::StateType) -> bool;
}

/// A node which represents a single path (by following the previous nodes).
struct Node<ProblemType: AStarProblem> {
  /// The cost of all actions taken by this path.
  cost: f32,
  /// The state that the path results in.
  state: ProblemType::StateType,
  /// The previous node in the path. This is stored as the index of the node
  /// and the action used to get to this state from the previous state. Only
  /// `None` for the initial state.
  previous_node: Option<(usize, ProblemType::ActionType)>,
}

/// A reference to a node.
struct NodeRef {
  /// The estimated total cost of a path through this node (the cost so far
  /// plus the [`AStarProblem::heuristic`]).
  estimate: f32,
  /// The index of the node. Nodes are indexed in the order they were
  /// discovered.
  index: usize,
}

impl PartialEq for NodeRef {
  fn eq(&self, other: &Self) -> bool {
    self.cmp(other) == Ordering::Equal
  }
}

impl Eq for NodeRef {}

impl PartialOrd for NodeRef {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for NodeRef {
  fn cmp(&self, other: &Self) -> Ordering {
    // Equal estimates fall back to discovery order, so the earlier discovered
    // node is explored first.
    self
      .estimate
      .total_cmp(&other.estimate)
      .then(self.index.cmp(&other.index))
  }
}

/// Determines the list of actions taken by `node_ref`.
fn recover_path_from_node<ProblemType: AStarProblem>(
  node_ref: &NodeRef,
  nodes: Vec<Node<ProblemType>>,
) -> Vec<ProblemType::ActionType> {
  let mut path = Vec::new();
  let mut node_index = node_ref.index;
  loop {
    let node = &nodes[node_index];
    match &node.previous_node {
      None => break,
      Some((next_index, action)) => {
        path.push(action.clone());
        node_index = *next_index;
      }
    }
  }

  path.reverse();
  path
}

/// Stats about the pathfinding process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PathStats {
  /// The number of nodes that were explored. This can exceed the number of
  /// states if there are faster paths than the heuristic "predicts".
  pub explored_nodes: u32,
}

/// The result of pathfinding.
#[derive(Debug)]
pub(crate) struct PathResult<ActionType> {
  /// Stats about the pathfinding process.
  pub(crate) stats: PathStats,
  /// The found path.
  pub(crate) path: Vec<ActionType>,
}

/// Why a search ended without a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SearchFailure {
  /// Every reachable state was explored without reaching a goal state.
  Exhausted(PathStats),
  /// The search explored its maximum number of nodes.
  LimitReached(PathStats),
}

/// Finds a path in `problem` to get from the initial state to a goal state.
/// If `max_explored_nodes` is set, the search gives up once it has explored
/// that many nodes without reaching a goal. Returns an `Err` if no path could
/// be found.
pub(crate) fn find_path<ProblemType: AStarProblem>(
  problem: &ProblemType,
  max_explored_nodes: Option<u32>,
) -> Result<PathResult<ProblemType::ActionType>, SearchFailure> {
  let mut stats = PathStats { explored_nodes: 0 };

  let mut best_estimates = HashMap::new();

  let mut all_nodes = Vec::<Node<ProblemType>>::new();
  let mut open_nodes = BinaryHeap::new();

  fn try_add_node<ProblemType: AStarProblem>(
    problem: &ProblemType,
    node: Node<ProblemType>,
    all_nodes: &mut Vec<Node<ProblemType>>,
    open_nodes: &mut BinaryHeap<Reverse<NodeRef>>,
    best_estimates: &mut HashMap<ProblemType::StateType, f32>,
  ) {
    let estimate = node.cost + problem.heuristic(&node.state);
    let best_estimate =
      best_estimates.entry(node.state.clone()).or_insert(f32::INFINITY);
    if *best_estimate <= estimate {
      return;
    }
    *best_estimate = estimate;
    open_nodes.push(Reverse(NodeRef { estimate, index: all_nodes.len() }));
    all_nodes.push(node);
  }

  let initial_node =
    Node { cost: 0.0, state: problem.initial_state(), previous_node: None };
  try_add_node(
    problem,
    initial_node,
    &mut all_nodes,
    &mut open_nodes,
    &mut best_estimates,
  );

  while let Some(Reverse(current_node_ref)) = open_nodes.pop() {
    let current_node = &all_nodes[current_node_ref.index];
    // If this node is not the best path to the state, skip it. This state must
    // have already been explored ahead of this node.
    if best_estimates
      .get(&current_node.state)
      .is_some_and(|&best| best < current_node_ref.estimate)
    {
      continue;
    }
    if max_explored_nodes.is_some_and(|max| stats.explored_nodes >= max) {
      return Err(SearchFailure::LimitReached(stats));
    }
    stats.explored_nodes += 1;

    if problem.is_goal_state(&current_node.state) {
      return Ok(PathResult {
        stats,
        path: recover_path_from_node(&current_node_ref, all_nodes),
      });
    }

    let current_cost = current_node.cost;
    for (action_cost, action, state) in problem.successors(&current_node.state)
    {
      let new_node = Node {
        cost: current_cost + action_cost,
        state,
        previous_node: Some((current_node_ref.index, action)),
      };

      try_add_node(
        problem,
        new_node,
        &mut all_nodes,
        &mut open_nodes,
        &mut best_estimates,
      );
    }
  }

  Err(SearchFailure::Exhausted(stats))
}

#[cfg(test)]
#[path = "astar_test.rs"]
mod test;
