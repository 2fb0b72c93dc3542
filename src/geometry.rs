use glam::{Vec2, Vec3, Vec3Swizzles};

/// Twice the signed area of the triangle (`point_0`, `point_1`, `point_2`)
/// projected onto the XY plane. Positive if the points are counter-clockwise.
pub(crate) fn triangle_area_2(
  point_0: Vec3,
  point_1: Vec3,
  point_2: Vec3,
) -> f32 {
  (point_1.xy() - point_0.xy()).perp_dot(point_2.xy() - point_0.xy())
}

/// Projects `point` onto `segment`. Returns the projected point and the
/// fraction along the segment where the projection lies.
pub(crate) fn project_point_to_line_segment(
  point: Vec3,
  segment: (Vec3, Vec3),
) -> (Vec3, f32) {
  let segment_delta = segment.1 - segment.0;
  let length_squared = segment_delta.length_squared();
  if length_squared == 0.0 {
    return (segment.0, 0.0);
  }
  let fraction =
    ((point - segment.0).dot(segment_delta) / length_squared).clamp(0.0, 1.0);
  (segment.0 + segment_delta * fraction, fraction)
}

/// Finds the point in `triangle` nearest to `point` in 3D. Based on the
/// Voronoi-region walk from "Real-Time Collision Detection" (Ericson, 5.1.5).
pub(crate) fn closest_point_on_triangle(
  point: Vec3,
  triangle: (Vec3, Vec3, Vec3),
) -> Vec3 {
  let (a, b, c) = triangle;
  let ab = b - a;
  let ac = c - a;

  let ap = point - a;
  let d1 = ab.dot(ap);
  let d2 = ac.dot(ap);
  if d1 <= 0.0 && d2 <= 0.0 {
    return a;
  }

  let bp = point - b;
  let d3 = ab.dot(bp);
  let d4 = ac.dot(bp);
  if d3 >= 0.0 && d4 <= d3 {
    return b;
  }

  let vc = d1 * d4 - d3 * d2;
  if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
    return a + ab * (d1 / (d1 - d3));
  }

  let cp = point - c;
  let d5 = ab.dot(cp);
  let d6 = ac.dot(cp);
  if d6 >= 0.0 && d5 <= d6 {
    return c;
  }

  let vb = d5 * d2 - d1 * d6;
  if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
    return a + ac * (d2 / (d2 - d6));
  }

  let va = d3 * d6 - d5 * d4;
  if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
    return b + (c - b) * ((d4 - d3) / ((d4 - d3) + (d5 - d6)));
  }

  let denominator = 1.0 / (va + vb + vc);
  let v = vb * denominator;
  let w = vc * denominator;
  a + ab * v + ac * w
}

/// Determines whether `point` lies inside `triangle` when both are projected
/// onto the XY plane. `triangle` must be counter-clockwise. Points within
/// `epsilon` (in units of twice the area) of an edge count as inside.
pub(crate) fn point_in_triangle_xy(
  point: Vec3,
  triangle: (Vec3, Vec3, Vec3),
  epsilon: f32,
) -> bool {
  triangle_area_2(triangle.0, triangle.1, point) >= -epsilon
    && triangle_area_2(triangle.1, triangle.2, point) >= -epsilon
    && triangle_area_2(triangle.2, triangle.0, point) >= -epsilon
}

/// Computes the height of the plane of `triangle` at the XY coordinates of
/// `point`. Returns `None` if the triangle is vertical (it has no area when
/// projected onto the XY plane).
pub(crate) fn height_on_triangle(
  point: Vec2,
  triangle: (Vec3, Vec3, Vec3),
) -> Option<f32> {
  let v0 = triangle.1.xy() - triangle.0.xy();
  let v1 = triangle.2.xy() - triangle.0.xy();
  let denominator = v0.perp_dot(v1);
  if denominator == 0.0 {
    return None;
  }
  let v2 = point - triangle.0.xy();
  let v = v2.perp_dot(v1) / denominator;
  let w = v0.perp_dot(v2) / denominator;
  let u = 1.0 - v - w;
  Some(triangle.0.z * u + triangle.1.z * v + triangle.2.z * w)
}

/// Clamps `point` into `triangle` as seen from above. Points already inside
/// are returned unchanged. Otherwise, the nearest point (in XY) on the
/// triangle's boundary is returned.
pub(crate) fn clamp_to_triangle_xy(
  point: Vec3,
  triangle: (Vec3, Vec3, Vec3),
) -> Vec3 {
  if point_in_triangle_xy(point, triangle, 0.0) {
    return point;
  }

  [
    (triangle.0, triangle.1),
    (triangle.1, triangle.2),
    (triangle.2, triangle.0),
  ]
  .into_iter()
  .map(|edge| {
    let flat_edge = (edge.0.with_z(0.0), edge.1.with_z(0.0));
    let (_, fraction) =
      project_point_to_line_segment(point.with_z(0.0), flat_edge);
    let projected = edge.0.lerp(edge.1, fraction);
    (projected, projected.xy().distance_squared(point.xy()))
  })
  .min_by(|a, b| a.1.total_cmp(&b.1))
  .map(|(projected, _)| projected)
  .unwrap_or(point)
}

/// Finds where the line through `segment` crosses the line through `edge` in
/// the XY plane. Returns the fraction along `edge`, clamped to the edge.
/// Parallel lines resolve to the end of `edge` nearest the segment's end.
pub(crate) fn segment_crossing_fraction_xy(
  segment: (Vec3, Vec3),
  edge: (Vec3, Vec3),
) -> f32 {
  let segment_delta = segment.1.xy() - segment.0.xy();
  let edge_delta = edge.1.xy() - edge.0.xy();
  let denominator = segment_delta.perp_dot(edge_delta);
  if denominator.abs() <= f32::EPSILON {
    let (_, fraction) = project_point_to_line_segment(segment.1, edge);
    return fraction;
  }
  ((edge.0.xy() - segment.0.xy()).perp_dot(segment_delta) / denominator)
    .clamp(0.0, 1.0)
}

/// Finds where the ray from `origin` along `direction` hits `triangle`, as a
/// multiple of `direction`. Both faces are hit. Rays parallel to the triangle
/// miss. Based on the Moller-Trumbore intersection test.
pub(crate) fn ray_triangle_intersection(
  origin: Vec3,
  direction: Vec3,
  triangle: (Vec3, Vec3, Vec3),
) -> Option<f32> {
  let edge_1 = triangle.1 - triangle.0;
  let edge_2 = triangle.2 - triangle.0;
  let p = direction.cross(edge_2);
  let determinant = edge_1.dot(p);
  if determinant.abs() <= f32::EPSILON {
    return None;
  }
  let inverse = determinant.recip();

  let offset = origin - triangle.0;
  let u = offset.dot(p) * inverse;
  if !(0.0..=1.0).contains(&u) {
    return None;
  }
  let q = offset.cross(edge_1);
  let v = direction.dot(q) * inverse;
  if v < 0.0 || u + v > 1.0 {
    return None;
  }
  let distance = edge_2.dot(q) * inverse;
  (distance >= 0.0).then_some(distance)
}

#[cfg(test)]
#[path = "geometry_test.rs"]
mod test;
