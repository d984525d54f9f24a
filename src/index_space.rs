use core::ops::Range;
use serde::{Deserialize, Serialize};




/**
 * Identifier for a Cartesian axis
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    I,
    J,
}

impl Axis {
    pub fn as_usize(self) -> usize {
        match self {
            Axis::I => 0,
            Axis::J => 1,
        }
    }
}




/**
 * Represents a rectangular region in a discrete, signed 64-bit index space.
 */
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexSpace {
    di: Range<i64>,
    dj: Range<i64>,
}




// ============================================================================
impl IndexSpace {


    pub fn new(di: Range<i64>, dj: Range<i64>) -> Self {

        assert!(
            di.start <= di.end && dj.start <= dj.end,
            "index space has negative volume");

        Self { di, dj }
    }


    /**
     * Return the number of indexes on each axis.
     */
    pub fn dim(&self) -> (usize, usize) {
        ((self.di.end - self.di.start) as usize,
         (self.dj.end - self.dj.start) as usize)
    }


    /**
     * Return the number of elements in this index space.
     */
    pub fn len(&self) -> usize {
        let (l, m) = self.dim();
        l * m
    }


    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }


    /**
     * Return the minimum index (inclusive).
     */
    pub fn start(&self) -> (i64, i64) {
        (self.di.start, self.dj.start)
    }


    /**
     * Return the maximum index (exclusive).
     */
    pub fn end(&self) -> (i64, i64) {
        (self.di.end, self.dj.end)
    }


    /**
     * Determine whether this index space contains the given index.
     */
    pub fn contains(&self, index: (i64, i64)) -> bool {
        self.di.contains(&index.0) && self.dj.contains(&index.1)
    }


    /**
     * Determine whether another index space is a subset of this one.
     */
    pub fn contains_space(&self, other: &Self) -> bool {
        other.di.start >= self.di.start && other.di.end <= self.di.end &&
        other.dj.start >= self.dj.start && other.dj.end <= self.dj.end
    }


    /**
     * Return the intersection with another index space, if it is non-empty.
     */
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let di = self.di.start.max(other.di.start)..self.di.end.min(other.di.end);
        let dj = self.dj.start.max(other.dj.start)..self.dj.end.min(other.dj.end);

        if di.start < di.end && dj.start < dj.end {
            Some(Self { di, dj })
        } else {
            None
        }
    }


    /**
     * Expand this index space by the given number of elements on each axis.
     */
    pub fn extend_all(&self, delta: i64) -> Self {
        Self::new(
            self.di.start - delta..self.di.end + delta,
            self.dj.start - delta..self.dj.end + delta)
    }


    /**
     * Trim this index space by the given number of elements on each axis.
     */
    pub fn trim_all(&self, delta: i64) -> Self {
        self.extend_all(-delta)
    }


    /**
     * Increase just the upper extent on the given axis. Face-centered data
     * normal to an axis lives on the cell space extended upper by one on that
     * axis.
     */
    pub fn extend_upper(&self, delta: i64, axis: Axis) -> Self {
        match axis {
            Axis::I => Self::new(self.di.start..self.di.end + delta, self.dj.clone()),
            Axis::J => Self::new(self.di.clone(), self.dj.start..self.dj.end + delta),
        }
    }


    /**
     * Map this index space to a finer granularity by an integer ratio.
     */
    pub fn refine_by(&self, ratio: i64) -> Self {
        Self::new(
            self.di.start * ratio..self.di.end * ratio,
            self.dj.start * ratio..self.dj.end * ratio)
    }


    /**
     * Map this index space to a coarser granularity by an integer ratio. The
     * result covers every coarse cell overlapped by this space, so coarsening
     * is the inverse of refining only when the bounds are ratio-aligned.
     */
    pub fn coarsen_by(&self, ratio: i64) -> Self {
        let lo = |a: i64| a.div_euclid(ratio);
        let hi = |a: i64| a.div_euclid(ratio) + (a.rem_euclid(ratio) != 0) as i64;
        Self::new(lo(self.di.start)..hi(self.di.end), lo(self.dj.start)..hi(self.dj.end))
    }


    /**
     * Return the linear offset for the given index, in a row-major memory
     * buffer aligned with the start of this index space.
     */
    pub fn row_major_offset(&self, index: (i64, i64)) -> usize {
        let i = (index.0 - self.di.start) as usize;
        let j = (index.1 - self.dj.start) as usize;
        let m = (self.dj.end - self.dj.start) as usize;
        i * m + j
    }


    /**
     * Return an iterator which traverses the index space in row-major order
     * (C-like; the final index increases fastest).
     */
    pub fn iter(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.di.clone().flat_map(move |i| self.dj.clone().map(move |j| (i, j)))
    }
}




/**
 * Less imposing factory function to construct an IndexSpace object.
 */
pub fn range2d(di: Range<i64>, dj: Range<i64>) -> IndexSpace {
    IndexSpace::new(di, dj)
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{range2d, Axis};

    #[test]
    fn index_space_has_correct_dim_and_len() {
        let space = range2d(-2..6, 4..10);
        assert_eq!(space.dim(), (8, 6));
        assert_eq!(space.len(), 48);
        assert_eq!(space.iter().count(), 48);
    }

    #[test]
    fn row_major_offsets_traverse_in_order() {
        let space = range2d(0..4, 0..3);
        for (n, index) in space.iter().enumerate() {
            assert_eq!(space.row_major_offset(index), n);
        }
    }

    #[test]
    fn refine_and_coarsen_are_inverse_on_aligned_spaces() {
        let space = range2d(-2..4, 0..6);
        assert_eq!(space.refine_by(2).coarsen_by(2), space);
    }

    #[test]
    fn coarsening_covers_partial_cells() {
        let space = range2d(-3..5, 1..4);
        assert_eq!(space.coarsen_by(2), range2d(-2..3, 0..2));
    }

    #[test]
    fn intersection_is_empty_for_disjoint_spaces() {
        let a = range2d(0..4, 0..4);
        let b = range2d(4..8, 0..4);
        let c = range2d(2..6, 2..6);
        assert!(a.intersection(&b).is_none());
        assert_eq!(a.intersection(&c), Some(range2d(2..4, 2..4)));
    }

    #[test]
    fn extend_upper_adds_face_row() {
        let space = range2d(0..4, 0..4);
        assert_eq!(space.extend_upper(1, Axis::I), range2d(0..5, 0..4));
        assert_eq!(space.extend_upper(1, Axis::J), range2d(0..4, 0..5));
    }
}
