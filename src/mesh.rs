use serde::{Deserialize, Serialize};
use crate::index_space::{range2d, Axis, IndexSpace};




/**
 * Physical geometry of one refinement level: the cell-index domain covering
 * the full problem extent at that level's resolution, together with the
 * physical bounds. Cell spacing follows from the two.
 */
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Geometry {
    pub domain: IndexSpace,
    pub prob_lo: (f64, f64),
    pub prob_hi: (f64, f64),
}




// ============================================================================
impl Geometry {

    pub fn cell_spacing(&self) -> (f64, f64) {
        let (ni, nj) = self.domain.dim();
        let d0 = (self.prob_hi.0 - self.prob_lo.0) / ni as f64;
        let d1 = (self.prob_hi.1 - self.prob_lo.1) / nj as f64;
        (d0, d1)
    }

    pub fn cell_center(&self, index: (i64, i64)) -> (f64, f64) {
        let (d0, d1) = self.cell_spacing();
        let x0 = self.prob_lo.0 + d0 * (index.0 as f64 + 0.5);
        let x1 = self.prob_lo.1 + d1 * (index.1 as f64 + 0.5);
        (x0, x1)
    }

    pub fn cell_volume(&self) -> f64 {
        let (d0, d1) = self.cell_spacing();
        d0 * d1
    }

    /**
     * Return the area (length, in 2D) of a face normal to the given axis.
     */
    pub fn face_area(&self, axis: Axis) -> f64 {
        let (d0, d1) = self.cell_spacing();
        match axis {
            Axis::I => d1,
            Axis::J => d0,
        }
    }

    /**
     * Return the geometry of the next finer level.
     */
    pub fn refine_by(&self, ratio: i64) -> Self {
        Self {
            domain: self.domain.refine_by(ratio),
            prob_lo: self.prob_lo,
            prob_hi: self.prob_hi,
        }
    }
}




/**
 * An ordered collection of disjoint boxes tiling a level's active region,
 * with an owner assignment mapping each box to the worker responsible for
 * it. Ownership of a box is exclusive for the duration of a step, so no
 * locking is needed anywhere in the engine.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoxLayout {
    boxes: Vec<IndexSpace>,
    owners: Vec<usize>,
}




// ============================================================================
impl BoxLayout {


    /**
     * Build a layout from a list of disjoint boxes, assigning owners
     * round-robin over the given number of workers.
     */
    pub fn new(boxes: Vec<IndexSpace>, num_workers: usize) -> Self {
        let workers = num_workers.max(1);
        let owners = (0..boxes.len()).map(|n| n % workers).collect();
        Self { boxes, owners }
    }


    pub fn boxes(&self) -> &[IndexSpace] {
        &self.boxes
    }


    pub fn num_boxes(&self) -> usize {
        self.boxes.len()
    }


    pub fn owner(&self, box_index: usize) -> usize {
        self.owners[box_index]
    }


    /**
     * Return the total number of cells in this layout.
     */
    pub fn total_cells(&self) -> usize {
        self.boxes.iter().map(|b| b.len()).sum()
    }


    /**
     * Return the index of the box containing the given cell, if any.
     */
    pub fn box_containing(&self, index: (i64, i64)) -> Option<usize> {
        self.boxes.iter().position(|b| b.contains(index))
    }


    pub fn contains_cell(&self, index: (i64, i64)) -> bool {
        self.box_containing(index).is_some()
    }
}




/**
 * Split a region into boxes no larger than `max_size` on either axis. Used
 * to chop the level-0 domain, and regrid clusters, into work units.
 */
pub fn split_boxes(region: &IndexSpace, max_size: i64) -> Vec<IndexSpace> {
    let (i0, j0) = region.start();
    let (i1, j1) = region.end();
    let mut result = Vec::new();

    let mut i = i0;
    while i < i1 {
        let iu = (i + max_size).min(i1);
        let mut j = j0;
        while j < j1 {
            let ju = (j + max_size).min(j1);
            result.push(range2d(i..iu, j..ju));
            j = ju;
        }
        i = iu;
    }
    result
}




/**
 * The grid hierarchy: the source of truth for which boxes exist at each
 * level, who owns them, the refinement ratio between adjacent levels, and
 * each level's geometry. Level slots are fixed at `max_level + 1`; slots
 * above `finest_level` are dormant. Mutated only during regrid.
 */
pub struct GridHierarchy {
    layouts: Vec<Option<BoxLayout>>,
    geoms: Vec<Geometry>,
    ref_ratio: Vec<i64>,
    finest_level: usize,
}




// ============================================================================
impl GridHierarchy {


    /**
     * Create a hierarchy with only level 0 populated. `ref_ratio[lev]` is
     * the coarse-to-fine factor between levels `lev` and `lev + 1`.
     */
    pub fn new(
        level0: BoxLayout,
        geom0: Geometry,
        ref_ratio: Vec<i64>,
        max_level: usize) -> Self
    {
        assert!(ref_ratio.len() >= max_level);
        assert!(ref_ratio.iter().all(|&r| r >= 2));

        let mut layouts: Vec<_> = (0..max_level + 1).map(|_| None).collect();
        let mut geoms = vec![geom0];

        for lev in 0..max_level {
            geoms.push(geoms[lev].refine_by(ref_ratio[lev]));
        }
        layouts[0] = Some(level0);

        Self {
            layouts,
            geoms,
            ref_ratio,
            finest_level: 0,
        }
    }


    pub fn max_level(&self) -> usize {
        self.layouts.len() - 1
    }


    pub fn finest_level(&self) -> usize {
        self.finest_level
    }


    pub fn num_levels(&self) -> usize {
        self.finest_level + 1
    }


    /**
     * Return the refinement ratio between `lev` and `lev + 1`.
     */
    pub fn ratio(&self, lev: usize) -> i64 {
        self.ref_ratio[lev]
    }


    pub fn geometry(&self, lev: usize) -> &Geometry {
        &self.geoms[lev]
    }


    pub fn layout(&self, lev: usize) -> &BoxLayout {
        self.layouts[lev].as_ref().expect("layout queried for a dormant level")
    }


    pub fn has_level(&self, lev: usize) -> bool {
        lev < self.layouts.len() && self.layouts[lev].is_some()
    }


    /**
     * Install a layout for the given level, which must be level 0 or have a
     * populated parent. Extends `finest_level` when the level is new.
     */
    pub fn set_layout(&mut self, lev: usize, layout: BoxLayout) {
        assert!(lev == 0 || self.layouts[lev - 1].is_some());

        self.layouts[lev] = Some(layout);
        self.finest_level = self.finest_level.max(lev);
    }


    /**
     * Drop every level above `lev`.
     */
    pub fn clear_above(&mut self, lev: usize) {
        for slot in self.layouts.iter_mut().skip(lev + 1) {
            *slot = None;
        }
        self.finest_level = self.finest_level.min(lev);
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use crate::index_space::range2d;
    use super::{split_boxes, BoxLayout, Geometry, GridHierarchy};

    fn geom8() -> Geometry {
        Geometry {
            domain: range2d(0..8, 0..8),
            prob_lo: (0.0, 0.0),
            prob_hi: (1.0, 1.0),
        }
    }

    #[test]
    fn split_boxes_tiles_the_region() {
        let region = range2d(0..10, 0..6);
        let boxes = split_boxes(&region, 4);
        let total: usize = boxes.iter().map(|b| b.len()).sum();
        assert_eq!(total, region.len());
        assert!(boxes.iter().all(|b| b.dim().0 <= 4 && b.dim().1 <= 4));
    }

    #[test]
    fn layout_locates_cells() {
        let layout = BoxLayout::new(split_boxes(&range2d(0..8, 0..8), 4), 2);
        assert_eq!(layout.num_boxes(), 4);
        assert_eq!(layout.total_cells(), 64);
        assert_eq!(layout.box_containing((0, 0)), Some(0));
        assert!(!layout.contains_cell((8, 0)));
        assert_eq!(layout.owner(0), 0);
        assert_eq!(layout.owner(1), 1);
        assert_eq!(layout.owner(2), 0);
    }

    #[test]
    fn hierarchy_levels_grow_and_clear() {
        let layout0 = BoxLayout::new(vec![range2d(0..8, 0..8)], 1);
        let mut hierarchy = GridHierarchy::new(layout0, geom8(), vec![2, 2], 2);

        assert_eq!(hierarchy.finest_level(), 0);
        assert_eq!(hierarchy.geometry(1).domain, range2d(0..16, 0..16));
        assert_eq!(hierarchy.geometry(2).domain, range2d(0..32, 0..32));

        hierarchy.set_layout(1, BoxLayout::new(vec![range2d(4..12, 4..12)], 1));
        assert_eq!(hierarchy.finest_level(), 1);
        assert!(hierarchy.has_level(1));

        hierarchy.clear_above(0);
        assert_eq!(hierarchy.finest_level(), 0);
        assert!(!hierarchy.has_level(1));
    }

    #[test]
    fn geometry_spacing_scales_with_refinement() {
        let geom = geom8();
        assert_eq!(geom.cell_spacing(), (0.125, 0.125));
        assert_eq!(geom.refine_by(2).cell_spacing(), (0.0625, 0.0625));
        assert_eq!(geom.cell_center((0, 0)), (0.0625, 0.0625));
    }
}
