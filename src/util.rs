use std::{cmp::Reverse, collections::BinaryHeap, mem::swap};

use glam::Vec3;
use ord_subset::OrdVar;

/// A bounding box.
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum BoundingBox {
  /// The bounding box has no points in it.
  Empty,
  /// The bounding box has some points in it.
  Box {
    /// The minimum bounds of the bounding box.
    min: Vec3,
    /// The maximum bounds of the bounding box. Must be component-wise greather
    /// than or equal to `min`.
    max: Vec3,
  },
}

impl BoundingBox {
  /// Creates a box already with some data in it. `min` and `max` must already
  /// be valid - this is unchecked.
  pub fn new_box(min: Vec3, max: Vec3) -> Self {
    Self::Box { min, max }
  }

  pub fn center(&self) -> Option<Vec3> {
    match self {
      Self::Empty => None,
      &Self::Box { min, max } => Some((min + max) * 0.5),
    }
  }

  /// Computes the size of the bounding box. Returns 0 if the bounds are empty.
  pub fn size(&self) -> Vec3 {
    match self {
      Self::Empty => Vec3::ZERO,
      &Self::Box { min, max } => max - min,
    }
  }

  /// Expands the bounding box to contain the `other`.
  pub fn expand_to_bounds(&self, other: &Self) -> Self {
    match (self, other) {
      (Self::Empty, Self::Empty) => Self::Empty,
      (Self::Box { .. }, Self::Empty) => *self,
      (Self::Empty, Self::Box { .. }) => *other,
      (
        Self::Box { min, max },
        Self::Box { min: other_min, max: other_max },
      ) => Self::Box { min: min.min(*other_min), max: max.max(*other_max) },
    }
  }

  /// Expands the bounding box to contain `point`. If the box was empty, it will
  /// now hold only the `point`.
  pub fn expand_to_point(&self, point: Vec3) -> Self {
    match self {
      Self::Empty => Self::Box { min: point, max: point },
      &Self::Box { min, max } => {
        Self::Box { min: min.min(point), max: max.max(point) }
      }
    }
  }

  /// Detemrines if `other` intersects `self` at all.
  pub fn intersects_bounds(&self, other: &Self) -> bool {
    let (other_min, other_max) = match other {
      Self::Empty => return false,
      Self::Box { min, max } => (min, max),
    };
    match self {
      Self::Empty => false,
      Self::Box { min, max } => {
        min.x <= other_max.x
          && other_min.x <= max.x
          && min.y <= other_max.y
          && other_min.y <= max.y
          && min.z <= other_max.z
          && other_min.z <= max.z
      }
    }
  }

  /// The squared distance from `point` to the nearest point in the box. Points
  /// inside the box have a distance of zero. Empty boxes are infinitely far
  /// away.
  pub fn distance_squared_to_point(&self, point: Vec3) -> f32 {
    match self {
      Self::Empty => f32::INFINITY,
      &Self::Box { min, max } => point.clamp(min, max).distance_squared(point),
    }
  }
}

#[derive(Clone, Debug)]
pub enum BoundingBoxHierarchy<ValueType> {
  Leaf {
    bounds: BoundingBox,
    value: ValueType,
  },
  Branch {
    bounds: BoundingBox,
    children:
      Box<(BoundingBoxHierarchy<ValueType>, BoundingBoxHierarchy<ValueType>)>,
  },
}

impl<ValueType> BoundingBoxHierarchy<ValueType> {
  /// Creates a hierarchy from values and their bounding boxes. The values are
  /// all expected to be Some, and the values will be moved into the hierarchy
  /// (leaving behind None).
  pub fn new(values: &mut [(BoundingBox, Option<ValueType>)]) -> Self {
    assert!(!values.is_empty());
    if values.len() == 1 {
      let mut value = (BoundingBox::Empty, None);
      swap(&mut values[0], &mut value);
      return Self::Leaf { bounds: value.0, value: value.1.unwrap() };
    }

    let bounding_box = values
      .iter()
      .map(|v| &v.0)
      .fold(BoundingBox::Empty, |acc, b| acc.expand_to_bounds(b));
    let bounds_size = bounding_box.size();
    if bounds_size.x > bounds_size.y && bounds_size.x > bounds_size.z {
      values.sort_by_key(|v| OrdVar::new_unchecked(v.0.center().unwrap().x))
    } else if bounds_size.y > bounds_size.z {
      values.sort_by_key(|v| OrdVar::new_unchecked(v.0.center().unwrap().y))
    } else {
      values.sort_by_key(|v| OrdVar::new_unchecked(v.0.center().unwrap().z))
    }

    let split_index = values.len() / 2;

    Self::Branch {
      bounds: bounding_box,
      children: Box::new((
        Self::new(&mut values[..split_index]),
        Self::new(&mut values[split_index..]),
      )),
    }
  }

  #[cfg(test)]
  fn depth(&self) -> u32 {
    match self {
      BoundingBoxHierarchy::Leaf { .. } => 1,
      BoundingBoxHierarchy::Branch { children, .. } => {
        1 + children.0.depth().max(children.1.depth())
      }
    }
  }

  fn bounds(&self) -> &BoundingBox {
    match self {
      Self::Leaf { bounds, .. } | Self::Branch { bounds, .. } => bounds,
    }
  }

  pub fn query_box(&self, query: BoundingBox) -> Vec<&ValueType> {
    let mut result = Vec::new();
    if let BoundingBox::Box { .. } = &query {
      self.query_box_recursive(&query, &mut result);
    }
    result
  }

  fn query_box_recursive<'a, 'b>(
    &'a self,
    query: &'b BoundingBox,
    result: &'b mut Vec<&'a ValueType>,
  ) {
    match self {
      Self::Leaf { bounds, value } => {
        if query.intersects_bounds(bounds) {
          result.push(value);
        }
      }
      Self::Branch { bounds, children } => {
        if query.intersects_bounds(bounds) {
          children.0.query_box_recursive(query, result);
          children.1.query_box_recursive(query, result);
        }
      }
    }
  }

  /// Finds the value nearest to `point`. `distance_squared` computes the exact
  /// squared distance to a value, or `None` if the value must be skipped.
  /// Subtrees are visited nearest-bounds-first and pruned once their bounds
  /// are further than the best value found so far. Returns the value and its
  /// squared distance.
  pub fn query_nearest(
    &self,
    point: Vec3,
    mut distance_squared: impl FnMut(&ValueType) -> Option<f32>,
  ) -> Option<(&ValueType, f32)> {
    let mut pending = vec![self];
    let mut frontier = BinaryHeap::new();
    frontier.push((
      Reverse(OrdVar::new_unchecked(
        self.bounds().distance_squared_to_point(point),
      )),
      0,
    ));

    let mut best: Option<(&ValueType, f32)> = None;
    while let Some((Reverse(bounds_distance), index)) = frontier.pop() {
      if let Some((_, best_distance)) = best {
        if *bounds_distance >= best_distance {
          break;
        }
      }
      match pending[index] {
        Self::Leaf { value, .. } => {
          let Some(distance) = distance_squared(value) else {
            continue;
          };
          if best.map_or(true, |(_, best_distance)| distance < best_distance) {
            best = Some((value, distance));
          }
        }
        Self::Branch { children, .. } => {
          for child in [&children.0, &children.1] {
            frontier.push((
              Reverse(OrdVar::new_unchecked(
                child.bounds().distance_squared_to_point(point),
              )),
              pending.len(),
            ));
            pending.push(child);
          }
        }
      }
    }
    best
  }
}

#[cfg(test)]
#[path = "util_test.rs"]
mod test;
