use serde::{Deserialize, Serialize};
use crate::index_space::IndexSpace;




/**
 * A patch is a mapping from a rectangular region of a discrete index space to
 * field values: `num_fields` floating point numbers per cell, stored
 * row-major in a contiguous buffer. A patch carries no notion of refinement
 * level by itself; the level is implied by which layout the patch belongs to.
 */
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Patch {
    space: IndexSpace,
    num_fields: usize,
    data: Vec<f64>,
}




// ============================================================================
impl Patch {


    /**
     * Generate a zero-filled patch covering the given index space.
     */
    pub fn zeros(num_fields: usize, space: IndexSpace) -> Self {
        let data = vec![0.0; space.len() * num_fields];
        Self { space, num_fields, data }
    }


    /**
     * Generate a patch covering the given space, with values defined from a
     * closure which writes each cell's fields through a slice.
     */
    pub fn from_slice_function<F>(num_fields: usize, space: IndexSpace, f: F) -> Self
    where
        F: Fn((i64, i64), &mut [f64])
    {
        let mut patch = Self::zeros(num_fields, space);
        patch.for_each_mut(f);
        patch
    }


    /**
     * Generate a single-field patch from a scalar closure.
     */
    pub fn from_scalar_function<F>(space: IndexSpace, f: F) -> Self
    where
        F: Fn((i64, i64)) -> f64
    {
        Self::from_slice_function(1, space, |index, s| s[0] = f(index))
    }


    pub fn index_space(&self) -> &IndexSpace {
        &self.space
    }


    pub fn num_fields(&self) -> usize {
        self.num_fields
    }


    /**
     * Return the fields at the given index.
     */
    pub fn get_slice(&self, index: (i64, i64)) -> &[f64] {
        let n = self.space.row_major_offset(index) * self.num_fields;
        &self.data[n..n + self.num_fields]
    }


    pub fn get_slice_mut(&mut self, index: (i64, i64)) -> &mut [f64] {
        let n = self.space.row_major_offset(index) * self.num_fields;
        &mut self.data[n..n + self.num_fields]
    }


    /**
     * Return a single field value at the given index.
     */
    pub fn get(&self, index: (i64, i64), field: usize) -> f64 {
        self.get_slice(index)[field]
    }


    /**
     * Visit every cell in the patch with a mutable slice of its fields.
     */
    pub fn for_each_mut<F>(&mut self, f: F)
    where
        F: Fn((i64, i64), &mut [f64])
    {
        let space = self.space.clone();
        for (index, slice) in space.iter().zip(self.data.chunks_exact_mut(self.num_fields)) {
            f(index, slice)
        }
    }


    /**
     * Return a new patch covering a subset of this one's index space.
     */
    pub fn extract(&self, subset: IndexSpace) -> Self {
        assert!(
            self.space.contains_space(&subset),
            "extract space is not a subset of the patch");

        Self::from_slice_function(self.num_fields, subset, |index, slice| {
            slice.clone_from_slice(self.get_slice(index))
        })
    }


    /**
     * Copy field values from another patch over the region where the two
     * index spaces overlap. Indexes outside the overlap are not touched.
     */
    pub fn copy_from(&mut self, other: &Patch) {
        assert!(self.num_fields == other.num_fields);

        if let Some(overlap) = self.space.intersection(other.index_space()) {
            for index in overlap.iter() {
                self.get_slice_mut(index).clone_from_slice(other.get_slice(index))
            }
        }
    }


    /**
     * Sum one field over the whole patch.
     */
    pub fn field_sum(&self, field: usize) -> f64 {
        self.data[field..]
            .iter()
            .step_by(self.num_fields)
            .sum()
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use crate::index_space::range2d;
    use super::Patch;

    #[test]
    fn patch_access_works() {
        let patch = Patch::from_scalar_function(range2d(4..10, 4..10), |(i, j)| (i + j) as f64);
        assert_eq!(patch.get((5, 5), 0), 10.0);
        assert_eq!(patch.get((6, 8), 0), 14.0);
        assert_eq!(patch.num_fields(), 1);
    }

    #[test]
    fn extract_preserves_values() {
        let patch = Patch::from_scalar_function(range2d(0..8, 0..8), |(i, j)| (i * 8 + j) as f64);
        let inner = patch.extract(range2d(2..6, 2..6));
        for index in inner.index_space().iter() {
            assert_eq!(inner.get(index, 0), patch.get(index, 0));
        }
    }

    #[test]
    fn copy_from_touches_only_the_overlap() {
        let source = Patch::from_scalar_function(range2d(4..8, 4..8), |_| 1.0);
        let mut dest = Patch::zeros(1, range2d(0..6, 0..6));
        dest.copy_from(&source);

        for index in dest.index_space().iter() {
            let expect = if source.index_space().contains(index) { 1.0 } else { 0.0 };
            assert_eq!(dest.get(index, 0), expect);
        }
    }

    #[test]
    fn field_sum_selects_one_field() {
        let patch = Patch::from_slice_function(2, range2d(0..4, 0..4), |_, s| {
            s[0] = 1.0;
            s[1] = 2.0;
        });
        assert_eq!(patch.field_sum(0), 16.0);
        assert_eq!(patch.field_sum(1), 32.0);
    }
}
