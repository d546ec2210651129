use roaring::RoaringBitmap;

use crate::bloom::Filter;
use crate::shape::Shape;

/// Roaring-compressed bit set. Cheap for large, sparsely populated shapes
/// such as per-bucket derived filters.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedFilter {
    shape: Shape,
    bitmap: RoaringBitmap,
}

impl CompressedFilter {
    pub fn new(shape: Shape) -> Self {
        CompressedFilter {
            shape,
            bitmap: RoaringBitmap::new(),
        }
    }

    pub(crate) fn union_with(&mut self, other: &CompressedFilter) {
        self.bitmap |= &other.bitmap;
    }

    pub(crate) fn is_superset(&self, other: &CompressedFilter) -> bool {
        other.bitmap.is_subset(&self.bitmap)
    }

    pub(crate) fn xor_cardinality(&self, other: &CompressedFilter) -> u32 {
        (&self.bitmap ^ &other.bitmap).len() as u32
    }
}

impl Filter for CompressedFilter {
    fn shape(&self) -> &Shape {
        &self.shape
    }

    fn is_set(&self, bit: u32) -> bool {
        self.bitmap.contains(bit)
    }

    fn set(&mut self, bit: u32) {
        debug_assert!(bit < self.shape.number_of_bits());
        self.bitmap.insert(bit);
    }

    fn set_bits(&self) -> Vec<u32> {
        self.bitmap.iter().collect()
    }

    fn cardinality(&self) -> u32 {
        self.bitmap.len() as u32
    }

    fn clear(&mut self) {
        self.bitmap.clear();
    }
}
