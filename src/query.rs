use glam::Vec3;

use crate::{
  geometry::closest_point_on_triangle,
  layers::LayerMask,
  nav_mesh::{ClosestPoint, SurfaceQueryError, ValidNavigationMesh},
  util::BoundingBox,
};

/// Candidates whose distances differ by at most this much are considered
/// equally close, and are ordered by how far along the query direction they
/// lie.
pub const TIE_EPSILON: f32 = 1e-4;

impl ValidNavigationMesh {
  /// Finds the point on an eligible triangle nearest to `position`, no further
  /// than `radius` away. Among (nearly) equally close candidates, the one
  /// furthest along `direction` wins, and then the one with the lowest
  /// triangle index.
  pub fn closest_point(
    &self,
    position: Vec3,
    direction: Vec3,
    radius: f32,
    layers: LayerMask,
  ) -> Result<ClosestPoint, SurfaceQueryError> {
    if radius.is_nan() || radius < 0.0 || !position.is_finite() {
      return Err(SurfaceQueryError::NoEligibleTriangle);
    }
    let query_box = BoundingBox::new_box(
      position - Vec3::splat(radius),
      position + Vec3::splat(radius),
    );
    let bvh = match &self.bvh {
      Some(bvh) if self.bounds().intersects_bounds(&query_box) => bvh,
      _ => return Err(SurfaceQueryError::NoEligibleTriangle),
    };

    let mut candidates = bvh
      .query_box(query_box)
      .into_iter()
      .map(|&index| &self.triangles[index])
      .filter(|triangle| layers.contains(triangle.layer))
      .map(|triangle| {
        let point = closest_point_on_triangle(position, triangle.as_tuple());
        ClosestPoint {
          triangle: triangle.index,
          point,
          distance: point.distance(position),
        }
      })
      .filter(|candidate| candidate.distance <= radius)
      .collect::<Vec<_>>();
    candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));

    let nearest_distance = candidates
      .first()
      .ok_or(SurfaceQueryError::NoEligibleTriangle)?
      .distance;
    let alignment =
      |candidate: &ClosestPoint| (candidate.point - position).dot(direction);
    let closest = candidates
      .iter()
      .take_while(|candidate| {
        candidate.distance - nearest_distance <= TIE_EPSILON
      })
      .max_by(|a, b| {
        alignment(a)
          .total_cmp(&alignment(b))
          .then(b.triangle.cmp(&a.triangle))
      })
      .copied()
      .expect("There is at least one candidate.");
    tracing::trace!(
      triangle = closest.triangle,
      distance = closest.distance,
      "Found closest point."
    );
    Ok(closest)
  }
}

#[cfg(test)]
#[path = "query_test.rs"]
mod test;
