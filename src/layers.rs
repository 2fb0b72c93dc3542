use std::fmt;

/// A set of layers that are traversable for a query. Each triangle of a
/// navigation mesh belongs to exactly one layer (e.g., one floor of a
/// building). A triangle is eligible for a query iff its layer is in the mask.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LayerMask(u64);

impl LayerMask {
  /// The number of distinct layers a mask can represent. Layer indices must be
  /// less than this.
  pub const MAX_LAYERS: usize = u64::BITS as usize;

  /// A mask with no layers.
  pub const NONE: Self = Self(0);

  /// A mask with every layer.
  pub const ALL: Self = Self(u64::MAX);

  /// Creates a mask containing only `layer`. Panics if `layer` is not less
  /// than [`Self::MAX_LAYERS`].
  pub fn single(layer: usize) -> Self {
    Self::NONE.with(layer)
  }

  /// Creates a mask from its raw bits. Bit `i` corresponds to layer `i`.
  pub const fn from_bits(bits: u64) -> Self {
    Self(bits)
  }

  /// The raw bits of the mask.
  pub const fn bits(self) -> u64 {
    self.0
  }

  /// Returns a copy of this mask with `layer` added.
  pub fn with(self, layer: usize) -> Self {
    assert!(
      layer < Self::MAX_LAYERS,
      "Layer {layer} is out of range (max {}).",
      Self::MAX_LAYERS
    );
    Self(self.0 | (1 << layer))
  }

  /// Returns a copy of this mask with `layer` removed.
  pub fn without(self, layer: usize) -> Self {
    if layer >= Self::MAX_LAYERS {
      return self;
    }
    Self(self.0 & !(1 << layer))
  }

  /// Whether `layer` is in the mask. Layers beyond [`Self::MAX_LAYERS`] are
  /// never contained.
  pub fn contains(self, layer: usize) -> bool {
    layer < Self::MAX_LAYERS && self.0 & (1 << layer) != 0
  }

  pub fn is_empty(self) -> bool {
    self.0 == 0
  }

  pub fn union(self, other: Self) -> Self {
    Self(self.0 | other.0)
  }

  pub fn intersection(self, other: Self) -> Self {
    Self(self.0 & other.0)
  }

  /// Iterates the layers in the mask in increasing order.
  pub fn iter(self) -> impl Iterator<Item = usize> {
    (0..Self::MAX_LAYERS).filter(move |&layer| self.contains(layer))
  }
}

impl FromIterator<usize> for LayerMask {
  fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
    iter.into_iter().fold(Self::NONE, Self::with)
  }
}

impl fmt::Debug for LayerMask {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_set().entries(self.iter()).finish()
  }
}

#[cfg(test)]
mod test {
  use super::LayerMask;

  #[test]
  fn mask_membership() {
    let mask = LayerMask::single(3).with(0);
    assert!(mask.contains(0));
    assert!(mask.contains(3));
    assert!(!mask.contains(1));
    assert!(!mask.contains(LayerMask::MAX_LAYERS));
    assert!(!mask.without(3).contains(3));
    assert_eq!(mask.iter().collect::<Vec<_>>(), [0, 3]);

    assert!(LayerMask::ALL.contains(LayerMask::MAX_LAYERS - 1));
    assert!(LayerMask::NONE.is_empty());
    assert_eq!([1, 2].into_iter().collect::<LayerMask>().bits(), 0b110);
  }

  #[test]
  fn mask_set_operations() {
    let a = LayerMask::from_bits(0b1010);
    let b = LayerMask::from_bits(0b0110);
    assert_eq!(a.union(b), LayerMask::from_bits(0b1110));
    assert_eq!(a.intersection(b), LayerMask::from_bits(0b0010));
    assert_eq!(format!("{:?}", a), "{1, 3}");
  }

  #[test]
  #[should_panic]
  fn adding_out_of_range_layer_panics() {
    let _ = LayerMask::NONE.with(LayerMask::MAX_LAYERS);
  }
}
