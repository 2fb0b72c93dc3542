use std::collections::HashMap;

use disjoint::DisjointSet;
use glam::{Vec3, Vec3Swizzles};
use kdtree::{distance::squared_euclidean, KdTree};
use rand::{distributions::WeightedIndex, prelude::Distribution, Rng};
use thiserror::Error;

use crate::{
  coords::CoordinateSystem,
  geometry::{
    closest_point_on_triangle, height_on_triangle, point_in_triangle_xy,
    ray_triangle_intersection, triangle_area_2,
  },
  layers::LayerMask,
  util::{BoundingBox, BoundingBoxHierarchy},
};

/// Vertices closer than this are merged into a single vertex during
/// validation.
pub const WELD_DISTANCE: f32 = 1e-5;

/// Tolerance (in units of twice the area) for deciding whether a point is
/// inside a triangle when seen from above.
pub(crate) const CONTAINMENT_EPSILON: f32 = 1e-5;

/// A navigation mesh before validation. This is the finalized triangulation
/// handed over by asset loading.
pub struct NavigationMesh<CS: CoordinateSystem> {
  /// The vertices that make up the triangles.
  pub vertices: Vec<CS::Coordinate>,
  /// The triangles of the mesh as indices into `vertices`. Triangles must be
  /// counter-clockwise when seen from above (using the right hand rule).
  pub triangles: Vec<[usize; 3]>,
  /// The layer of each triangle. Must be the same length as
  /// [`Self::triangles`], and each layer must be less than
  /// [`LayerMask::MAX_LAYERS`].
  pub triangle_layers: Vec<usize>,
}

impl<CS: CoordinateSystem> Clone for NavigationMesh<CS> {
  fn clone(&self) -> Self {
    Self {
      vertices: self.vertices.clone(),
      triangles: self.triangles.clone(),
      triangle_layers: self.triangle_layers.clone(),
    }
  }
}

/// An error when validating a navigation mesh.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  /// Stores the number of triangles and the number of layers.
  #[error(
    "The triangle layers do not have the same length as the triangles. There are {0} triangles, but {1} layers."
  )]
  LayersHaveWrongLength(usize, usize),
  /// Stores the index of the vertex.
  #[error("The vertex at index {0} is not finite.")]
  NonFiniteVertex(usize),
  /// Stores the index of the triangle.
  #[error("The triangle at index {0} references an out-of-bounds vertex.")]
  InvalidVertexIndexInTriangle(usize),
  /// Stores the index of the triangle and its layer.
  #[error(
    "The triangle at index {0} has layer {1}, which is not less than {max}.",
    max = LayerMask::MAX_LAYERS
  )]
  LayerOutOfRange(usize, usize),
  /// Stores the index of the triangle.
  #[error(
    "The triangle at index {0} is degenerate (repeated vertices or zero area)."
  )]
  DegenerateTriangle(usize),
  /// Stores the index of the triangle.
  #[error("The triangle at index {0} has its vertices in clockwise order.")]
  ClockwiseTriangle(usize),
  /// Stores the indices of the two vertices that make up the edge.
  #[error(
    "The edge made from vertices {0} and {1} is used by more than two triangles."
  )]
  DoublyConnectedEdge(usize, usize),
}

/// An error from querying the navigable surface.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum SurfaceQueryError {
  /// Stores the invalid triangle index.
  #[error("The triangle index {0} is out of range.")]
  OutOfRange(usize),
  #[error("No triangle satisfies the layer mask within the search area.")]
  NoEligibleTriangle,
}

impl<CS: CoordinateSystem> NavigationMesh<CS> {
  /// Ensures required invariants of the navigation mesh, and computes
  /// additional derived data (adjacency, regions, spatial lookup) to produce a
  /// validated navigation mesh. Returns an error if the navigation mesh is
  /// invalid in some way.
  pub fn validate(self) -> Result<ValidNavigationMesh, ValidationError> {
    if self.triangles.len() != self.triangle_layers.len() {
      return Err(ValidationError::LayersHaveWrongLength(
        self.triangles.len(),
        self.triangle_layers.len(),
      ));
    }

    let vertices =
      self.vertices.iter().map(CS::to_landstride).collect::<Vec<_>>();
    if let Some(index) = vertices.iter().position(|vertex| !vertex.is_finite())
    {
      return Err(ValidationError::NonFiniteVertex(index));
    }

    let (weld_map, welded_vertices) = weld_vertices(&vertices);

    let mut region_sets = DisjointSet::with_len(self.triangles.len());

    enum ConnectivityState {
      Boundary { triangle: usize, side: usize },
      Connected {
        triangle_1: usize,
        side_1: usize,
        triangle_2: usize,
        side_2: usize,
      },
    }
    let mut connectivity_set = HashMap::new();
    // Sorted so that the edge arena and boundary list are deterministic.
    let mut edge_keys = Vec::new();

    let mut triangles = Vec::with_capacity(self.triangles.len());
    let mut layer_triangle_counts = Vec::new();

    for (triangle_index, (raw_vertices, &layer)) in
      self.triangles.iter().zip(self.triangle_layers.iter()).enumerate()
    {
      if raw_vertices.iter().any(|&vertex| vertex >= vertices.len()) {
        return Err(ValidationError::InvalidVertexIndexInTriangle(
          triangle_index,
        ));
      }
      if layer >= LayerMask::MAX_LAYERS {
        return Err(ValidationError::LayerOutOfRange(triangle_index, layer));
      }

      let triangle_vertices = raw_vertices.map(|vertex| weld_map[vertex]);
      if triangle_vertices[0] == triangle_vertices[1]
        || triangle_vertices[1] == triangle_vertices[2]
        || triangle_vertices[2] == triangle_vertices[0]
      {
        return Err(ValidationError::DegenerateTriangle(triangle_index));
      }

      let points = triangle_vertices.map(|vertex| vertices[vertex]);
      let area = (points[1] - points[0]).cross(points[2] - points[0]).length()
        * 0.5;
      if area <= 0.0 {
        return Err(ValidationError::DegenerateTriangle(triangle_index));
      }
      // Vertical triangles have no winding when seen from above, so only
      // reject triangles that are clearly clockwise.
      if triangle_area_2(points[0], points[1], points[2]) < 0.0 {
        return Err(ValidationError::ClockwiseTriangle(triangle_index));
      }

      for side in 0..3 {
        let (from, to) =
          (triangle_vertices[side], triangle_vertices[(side + 1) % 3]);
        let key = if from < to { (from, to) } else { (to, from) };
        match connectivity_set.get_mut(&key) {
          None => {
            connectivity_set.insert(
              key,
              ConnectivityState::Boundary { triangle: triangle_index, side },
            );
            edge_keys.push(key);
          }
          Some(state) => match *state {
            ConnectivityState::Boundary { triangle, side: other_side } => {
              *state = ConnectivityState::Connected {
                triangle_1: triangle,
                side_1: other_side,
                triangle_2: triangle_index,
                side_2: side,
              };
              region_sets.join(triangle, triangle_index);
            }
            ConnectivityState::Connected { .. } => {
              return Err(ValidationError::DoublyConnectedEdge(key.0, key.1));
            }
          },
        }
      }

      if layer_triangle_counts.len() <= layer {
        layer_triangle_counts.resize(layer + 1, 0);
      }
      layer_triangle_counts[layer] += 1;

      triangles.push(Triangle {
        index: triangle_index,
        vertices: triangle_vertices,
        points,
        centroid: (points[0] + points[1] + points[2]) / 3.0,
        bounds: points
          .iter()
          .fold(BoundingBox::Empty, |bounds, &point| {
            bounds.expand_to_point(point)
          }),
        area,
        region: 0,
        layer,
        connections: [None; 3],
      });
    }

    let mut region_to_normalized_region = HashMap::new();
    for triangle in triangles.iter_mut() {
      let region = region_sets.root_of(triangle.index);
      let new_normalized_region = region_to_normalized_region.len();
      triangle.region = *region_to_normalized_region
        .entry(region)
        .or_insert(new_normalized_region);
    }

    edge_keys.sort_unstable();
    let mut edges = Vec::new();
    let mut boundary_edges = Vec::new();
    for key in edge_keys {
      match connectivity_set[&key] {
        ConnectivityState::Boundary { triangle, side } => {
          boundary_edges.push(BoundaryEdge { triangle, side });
        }
        ConnectivityState::Connected {
          triangle_1,
          side_1,
          triangle_2,
          side_2,
        } => {
          for (from, side, to) in
            [(triangle_1, side_1, triangle_2), (triangle_2, side_2, triangle_1)]
          {
            let cost =
              triangles[from].centroid.distance(triangles[to].centroid);
            // Crossing a side of a counter-clockwise triangle, the first
            // vertex of the side is on the right.
            triangles[from].connections[side] = Some(edges.len());
            edges.push(Edge {
              from,
              to,
              right: triangles[from].vertices[side],
              left: triangles[from].vertices[(side + 1) % 3],
              cost,
            });
          }
        }
      }
    }

    let mesh_bounds = triangles
      .iter()
      .fold(BoundingBox::Empty, |bounds, triangle| {
        bounds.expand_to_bounds(&triangle.bounds)
      });
    let bvh = if triangles.is_empty() {
      None
    } else {
      let mut values = triangles
        .iter()
        .map(|triangle| (triangle.bounds, Some(triangle.index)))
        .collect::<Vec<_>>();
      Some(BoundingBoxHierarchy::new(&mut values))
    };

    tracing::debug!(
      triangles = triangles.len(),
      connected_edges = edges.len() / 2,
      boundary_edges = boundary_edges.len(),
      welded_vertices,
      regions = region_to_normalized_region.len(),
      "Validated navigation mesh."
    );

    Ok(ValidNavigationMesh {
      mesh_bounds,
      vertices,
      triangles,
      edges,
      boundary_edges,
      layer_triangle_counts,
      bvh,
    })
  }
}

/// Merges vertices within [`WELD_DISTANCE`] of each other. Returns a map from
/// each vertex to the vertex it was merged into (the lowest index among the
/// merged vertices), and the number of vertices that were merged away. All
/// `vertices` must be finite.
fn weld_vertices(vertices: &[Vec3]) -> (Vec<usize>, usize) {
  let mut vertex_tree = KdTree::new(/* dimensions= */ 3);
  for (index, vertex) in vertices.iter().enumerate() {
    vertex_tree
      .add([vertex.x, vertex.y, vertex.z], index)
      .expect("Vertex is finite");
  }

  let mut weld_map = vec![None; vertices.len()];
  let mut welded_vertices = 0;
  for (index, vertex) in vertices.iter().enumerate() {
    if weld_map[index].is_some() {
      continue;
    }
    weld_map[index] = Some(index);
    let nearby = vertex_tree
      .within(
        &[vertex.x, vertex.y, vertex.z],
        WELD_DISTANCE * WELD_DISTANCE,
        &squared_euclidean,
      )
      .expect("Vertex is finite");
    for (_, &other) in nearby {
      if weld_map[other].is_none() {
        weld_map[other] = Some(index);
        welded_vertices += 1;
      }
    }
  }

  (
    weld_map
      .into_iter()
      .enumerate()
      .map(|(index, welded)| welded.unwrap_or(index))
      .collect(),
    welded_vertices,
  )
}

/// A navigation mesh which has been validated and derived data has been
/// computed. This is the navigable surface: it is immutable, so it can be
/// shared (e.g., through an `Arc`) between any number of concurrent readers.
#[derive(Clone, Debug)]
pub struct ValidNavigationMesh {
  /// The bounds of the mesh data itself. This is a tight bounding box around
  /// the triangles of the navigation mesh.
  pub(crate) mesh_bounds: BoundingBox,
  /// The vertices that make up the triangles, in the standard coordinate
  /// system. Welded vertices are kept but no longer referenced.
  pub(crate) vertices: Vec<Vec3>,
  /// The triangles of the mesh.
  pub(crate) triangles: Vec<Triangle>,
  /// The directed connections between triangles. Each shared side produces
  /// two edges, one in each direction.
  pub(crate) edges: Vec<Edge>,
  /// The sides of triangles that are not shared with any other triangle.
  pub(crate) boundary_edges: Vec<BoundaryEdge>,
  /// The number of triangles in each layer.
  pub(crate) layer_triangle_counts: Vec<usize>,
  /// Spatial lookup over the triangles. `None` only for an empty mesh.
  pub(crate) bvh: Option<BoundingBoxHierarchy<usize>>,
}

/// A triangle of a [`ValidNavigationMesh`].
#[derive(PartialEq, Debug, Clone)]
pub struct Triangle {
  pub(crate) index: usize,
  /// Indices into the `vertices` of the corresponding mesh.
  pub(crate) vertices: [usize; 3],
  /// The positions of `vertices`.
  pub(crate) points: [Vec3; 3],
  pub(crate) centroid: Vec3,
  pub(crate) bounds: BoundingBox,
  pub(crate) area: f32,
  /// The connected component (over all layers) this triangle belongs to.
  /// Triangles in different regions can never reach each other.
  pub(crate) region: usize,
  pub(crate) layer: usize,
  /// The edge (as an index into the mesh's edges) leaving through each side.
  /// Side `i` goes from `vertices[i]` to `vertices[(i + 1) % 3]`. `None`
  /// sides are on the boundary of the mesh.
  pub(crate) connections: [Option<usize>; 3],
}

impl Triangle {
  /// The stable index of this triangle in its mesh.
  pub fn index(&self) -> usize {
    self.index
  }

  /// The indices of the vertices of this triangle, counter-clockwise.
  pub fn vertices(&self) -> [usize; 3] {
    self.vertices
  }

  /// The positions of the vertices of this triangle, counter-clockwise.
  pub fn points(&self) -> [Vec3; 3] {
    self.points
  }

  pub fn centroid(&self) -> Vec3 {
    self.centroid
  }

  pub fn area(&self) -> f32 {
    self.area
  }

  pub fn layer(&self) -> usize {
    self.layer
  }

  pub fn region(&self) -> usize {
    self.region
  }

  /// The unit normal of the triangle. Points up for counter-clockwise
  /// triangles.
  pub fn normal(&self) -> Vec3 {
    (self.points[1] - self.points[0])
      .cross(self.points[2] - self.points[0])
      .normalize()
  }

  /// The angle (in radians) between the triangle's normal and `reference`.
  /// With `Vec3::Z` as the reference, this is the steepness of the triangle.
  pub fn slope_angle(&self, reference: Vec3) -> f32 {
    self.normal().angle_between(reference)
  }

  /// Picks a uniformly distributed random point on the triangle.
  pub fn random_point(&self, rng: &mut impl Rng) -> Vec3 {
    let (mut u, mut v) = (rng.gen::<f32>(), rng.gen::<f32>());
    if u + v > 1.0 {
      (u, v) = (1.0 - u, 1.0 - v);
    }
    let [a, b, c] = self.points;
    a + (b - a) * u + (c - a) * v
  }

  pub(crate) fn as_tuple(&self) -> (Vec3, Vec3, Vec3) {
    (self.points[0], self.points[1], self.points[2])
  }
}

/// A directed connection between two adjacent triangles.
#[derive(PartialEq, Debug, Clone)]
pub struct Edge {
  /// The triangle this edge leaves from.
  pub from: usize,
  /// The triangle this edge leads to.
  pub to: usize,
  /// The shared vertex on the left when travelling from `from` to `to`.
  pub left: usize,
  /// The shared vertex on the right when travelling from `from` to `to`.
  pub right: usize,
  /// The cost of travelling this edge (the distance between the centroids).
  pub cost: f32,
}

/// A side of a triangle that is not connected to any other triangle.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub struct BoundaryEdge {
  pub triangle: usize,
  /// The side of the triangle. See [`Triangle::vertices`].
  pub side: usize,
}

/// A point on the navigable surface.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct ClosestPoint {
  /// The index of the triangle the point lies on.
  pub triangle: usize,
  /// The point on the triangle.
  pub point: Vec3,
  /// The distance from the query position to `point`.
  pub distance: f32,
}

impl ValidNavigationMesh {
  /// Returns the bounds of the navigation mesh.
  pub fn bounds(&self) -> BoundingBox {
    self.mesh_bounds
  }

  pub fn triangle_count(&self) -> usize {
    self.triangles.len()
  }

  /// Looks up the triangle at `index`.
  pub fn triangle(&self, index: usize) -> Result<&Triangle, SurfaceQueryError> {
    self.triangles.get(index).ok_or(SurfaceQueryError::OutOfRange(index))
  }

  pub fn triangles(&self) -> impl ExactSizeIterator<Item = &Triangle> + '_ {
    self.triangles.iter()
  }

  pub fn vertices(&self) -> &[Vec3] {
    &self.vertices
  }

  pub fn edges(&self) -> &[Edge] {
    &self.edges
  }

  pub fn boundary_edges(&self) -> &[BoundaryEdge] {
    &self.boundary_edges
  }

  /// The points of a boundary edge, counter-clockwise around the mesh.
  pub fn boundary_edge_points(&self, edge: BoundaryEdge) -> (Vec3, Vec3) {
    let points = self.triangles[edge.triangle].points;
    (points[edge.side], points[(edge.side + 1) % 3])
  }

  /// The number of layers in use, i.e. one more than the highest layer of any
  /// triangle.
  pub fn layer_count(&self) -> usize {
    self.layer_triangle_counts.len()
  }

  pub fn layer_triangle_count(&self, layer: usize) -> usize {
    self.layer_triangle_counts.get(layer).copied().unwrap_or(0)
  }

  /// Whether `mask` selects at least one triangle of this mesh.
  pub fn has_eligible_triangles(&self, mask: LayerMask) -> bool {
    self
      .layer_triangle_counts
      .iter()
      .enumerate()
      .any(|(layer, &count)| count > 0 && mask.contains(layer))
  }

  /// The points of the left and right vertex of `edge`.
  pub(crate) fn edge_points(&self, edge: &Edge) -> (Vec3, Vec3) {
    (self.vertices[edge.left], self.vertices[edge.right])
  }

  /// Enumerates the neighbours of `triangle` whose layer is in `mask`, along
  /// with the edge that leads to them.
  pub fn neighbors(
    &self,
    triangle: usize,
    mask: LayerMask,
  ) -> Result<impl Iterator<Item = (&Triangle, &Edge)> + '_, SurfaceQueryError>
  {
    let triangle = self.triangle(triangle)?;
    Ok(
      triangle
        .connections
        .iter()
        .flatten()
        .map(|&edge_index| {
          let edge = &self.edges[edge_index];
          (&self.triangles[edge.to], edge)
        })
        .filter(move |(neighbor, _)| mask.contains(neighbor.layer)),
    )
  }

  /// Finds the eligible triangle containing `point` when seen from above. If
  /// several triangles contain it (e.g., stacked floors), the one vertically
  /// nearest to `point` wins. The returned point is `point` dropped onto the
  /// triangle's plane.
  pub(crate) fn find_containing(
    &self,
    point: Vec3,
    mask: LayerMask,
  ) -> Option<ClosestPoint> {
    self.containing_candidates(point, mask).min_by(|a, b| {
      a.distance.total_cmp(&b.distance).then(a.triangle.cmp(&b.triangle))
    })
  }

  fn containing_candidates(
    &self,
    point: Vec3,
    mask: LayerMask,
  ) -> impl Iterator<Item = ClosestPoint> + '_ {
    let column = match self.mesh_bounds {
      BoundingBox::Empty => BoundingBox::Empty,
      BoundingBox::Box { min, max } => BoundingBox::new_box(
        point.xy().extend(min.z.min(point.z)),
        point.xy().extend(max.z.max(point.z)),
      ),
    };
    self
      .bvh
      .iter()
      .flat_map(move |bvh| bvh.query_box(column))
      .map(|&index| &self.triangles[index])
      .filter(move |triangle| mask.contains(triangle.layer))
      .filter(move |triangle| {
        point_in_triangle_xy(point, triangle.as_tuple(), CONTAINMENT_EPSILON)
      })
      .filter_map(move |triangle| {
        let height = height_on_triangle(point.xy(), triangle.as_tuple())?;
        Some(ClosestPoint {
          triangle: triangle.index,
          point: point.xy().extend(height),
          distance: (point.z - height).abs(),
        })
      })
  }

  /// Finds the eligible triangle containing `point` (seen from above), or if
  /// none contains it, the eligible triangle nearest to `point`. This is used
  /// to seed searches from off-mesh positions.
  pub fn find_containing_or_nearest(
    &self,
    point: Vec3,
    mask: LayerMask,
  ) -> Result<ClosestPoint, SurfaceQueryError> {
    if !point.is_finite() || !self.has_eligible_triangles(mask) {
      return Err(SurfaceQueryError::NoEligibleTriangle);
    }
    if let Some(containing) = self.find_containing(point, mask) {
      return Ok(containing);
    }

    let bvh = self.bvh.as_ref().ok_or(SurfaceQueryError::NoEligibleTriangle)?;
    let (&triangle, distance_squared) = bvh
      .query_nearest(point, |&index| {
        let triangle = &self.triangles[index];
        mask.contains(triangle.layer).then(|| {
          closest_point_on_triangle(point, triangle.as_tuple())
            .distance_squared(point)
        })
      })
      .ok_or(SurfaceQueryError::NoEligibleTriangle)?;
    Ok(ClosestPoint {
      triangle,
      point: closest_point_on_triangle(
        point,
        self.triangles[triangle].as_tuple(),
      ),
      distance: distance_squared.sqrt(),
    })
  }

  /// Casts a ray straight down from `point` and returns the first eligible
  /// triangle it hits within `max_distance`.
  pub fn triangle_under(
    &self,
    point: Vec3,
    max_distance: f32,
    mask: LayerMask,
  ) -> Option<ClosestPoint> {
    self
      .containing_candidates(point, mask)
      .filter(|candidate| {
        candidate.point.z <= point.z && candidate.distance <= max_distance
      })
      .min_by(|a, b| {
        a.distance.total_cmp(&b.distance).then(a.triangle.cmp(&b.triangle))
      })
  }

  /// Casts a ray from `origin` along `direction` and returns the first
  /// eligible triangle it hits within `max_distance`. The returned distance is
  /// measured along the ray.
  pub fn raycast(
    &self,
    origin: Vec3,
    direction: Vec3,
    max_distance: f32,
    mask: LayerMask,
  ) -> Option<ClosestPoint> {
    let direction = direction.try_normalize()?;
    if !origin.is_finite() || max_distance.is_nan() || max_distance < 0.0 {
      return None;
    }
    // The ray can't hit anything past the far side of the mesh.
    let reach = match self.mesh_bounds {
      BoundingBox::Empty => return None,
      BoundingBox::Box { min, max } => max_distance
        .min(origin.distance((min + max) * 0.5) + (max - min).length()),
    };
    let ray_bounds = BoundingBox::Empty
      .expand_to_point(origin)
      .expand_to_point(origin + direction * reach);

    self
      .bvh
      .as_ref()?
      .query_box(ray_bounds)
      .into_iter()
      .map(|&index| &self.triangles[index])
      .filter(|triangle| mask.contains(triangle.layer))
      .filter_map(|triangle| {
        let distance =
          ray_triangle_intersection(origin, direction, triangle.as_tuple())?;
        (distance <= max_distance).then(|| ClosestPoint {
          triangle: triangle.index,
          point: origin + direction * distance,
          distance,
        })
      })
      .min_by(|a, b| {
        a.distance.total_cmp(&b.distance).then(a.triangle.cmp(&b.triangle))
      })
  }

  /// Picks a random eligible triangle. Larger triangles are proportionally
  /// more likely to be picked.
  pub fn random_triangle(
    &self,
    mask: LayerMask,
    rng: &mut impl Rng,
  ) -> Result<&Triangle, SurfaceQueryError> {
    let eligible = self
      .triangles
      .iter()
      .filter(|triangle| mask.contains(triangle.layer))
      .collect::<Vec<_>>();
    let distribution =
      WeightedIndex::new(eligible.iter().map(|triangle| triangle.area))
        .map_err(|_| SurfaceQueryError::NoEligibleTriangle)?;
    Ok(eligible[distribution.sample(rng)])
  }
}

#[cfg(test)]
#[path = "nav_mesh_test.rs"]
mod test;
