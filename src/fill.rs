use crate::config::{BoundaryCondition, DomainBoundary};
use crate::index_space::IndexSpace;
use crate::patch::Patch;
use crate::state::LevelData;




/**
 * A read-only view of one level's field for filling purposes: the data (at
 * a single time; callers time-interpolate first) together with the domain
 * extent and physical boundary at that level's resolution. Valid regions of
 * the data answer coverage queries.
 */
pub struct FillSource<'a> {
    pub data: &'a LevelData,
    pub domain: &'a IndexSpace,
    pub boundary: &'a DomainBoundary,
}




// ============================================================================
impl FillSource<'_> {


    /**
     * Map an index onto the domain, wrapping coordinates on periodic axes.
     * The flag is false if a coordinate on a non-periodic axis falls outside
     * the domain (the cell is then governed by a physical boundary).
     */
    fn resolve(&self, index: (i64, i64)) -> ((i64, i64), bool) {
        let (i0, j0) = self.domain.start();
        let (i1, j1) = self.domain.end();
        let mut index = index;
        let mut inside = true;

        if index.0 < i0 || index.0 >= i1 {
            if self.boundary.is_periodic(0) {
                index.0 = (index.0 - i0).rem_euclid(i1 - i0) + i0;
            } else {
                inside = false;
            }
        }
        if index.1 < j0 || index.1 >= j1 {
            if self.boundary.is_periodic(1) {
                index.1 = (index.1 - j0).rem_euclid(j1 - j0) + j0;
            } else {
                inside = false;
            }
        }
        (index, inside)
    }


    /**
     * Valid-region value at a cell, after periodic wrapping. `None` if the
     * cell is outside a non-periodic face or not covered by the layout.
     */
    pub fn value(&self, index: (i64, i64), field: usize) -> Option<f64> {
        let (index, inside) = self.resolve(index);

        if inside {
            self.data.value_at(index, field)
        } else {
            None
        }
    }


    /**
     * Like `value`, but cells beyond a non-periodic face take the physical
     * boundary condition: the nearest interior value for outflow, or the
     * held value for Dirichlet. `None` only for interior cells the layout
     * does not cover.
     */
    pub fn value_bc(&self, index: (i64, i64), field: usize) -> Option<f64> {
        let (i0, j0) = self.domain.start();
        let (i1, j1) = self.domain.end();
        let (mut index, inside) = self.resolve(index);

        if !inside {
            for (axis, (c, lo, hi)) in [(index.0, i0, i1), (index.1, j0, j1)].iter().enumerate() {
                let bc = if *c < *lo {
                    self.boundary.lo[axis]
                } else if *c >= *hi {
                    self.boundary.hi[axis]
                } else {
                    continue;
                };
                match bc {
                    BoundaryCondition::Dirichlet(v) => return Some(v),
                    BoundaryCondition::Outflow => {
                        let clamped = (*c).max(*lo).min(*hi - 1);
                        match axis {
                            0 => index.0 = clamped,
                            _ => index.1 = clamped,
                        }
                    }
                    BoundaryCondition::Periodic => unreachable!(),
                }
            }
        }
        self.data.value_at(index, field)
    }
}




/**
 * Piecewise-linear slope limited to the minmod of the one-sided
 * differences. Falls back to zero where a neighbor is unavailable, which
 * degrades to piecewise-constant interpolation there.
 */
fn limited_slope(left: Option<f64>, center: f64, right: Option<f64>) -> f64 {
    match (left, right) {
        (Some(l), Some(r)) => {
            let dl = center - l;
            let dr = r - center;
            if dl * dr <= 0.0 {
                0.0
            } else if dl.abs() < dr.abs() {
                dl
            } else {
                dr
            }
        }
        _ => 0.0,
    }
}




/**
 * Conservative interpolation of one coarse cell's field onto a fine cell.
 * The linear profile integrates to the coarse value over the coarse cell,
 * so refining and then averaging down is the identity; for globally linear
 * data the minmod slopes are exact and the interpolation error vanishes.
 */
fn prolong(coarse: &FillSource, fine_index: (i64, i64), ratio: i64, field: usize) -> Option<f64> {
    let ci = (fine_index.0.div_euclid(ratio), fine_index.1.div_euclid(ratio));
    let center = coarse.value_bc(ci, field)?;

    let sx = limited_slope(
        coarse.value_bc((ci.0 - 1, ci.1), field),
        center,
        coarse.value_bc((ci.0 + 1, ci.1), field));
    let sy = limited_slope(
        coarse.value_bc((ci.0, ci.1 - 1), field),
        center,
        coarse.value_bc((ci.0, ci.1 + 1), field));

    // fine cell center offset from the coarse cell center, in coarse cells
    let ox = ((fine_index.0 - ci.0 * ratio) as f64 + 0.5) / ratio as f64 - 0.5;
    let oy = ((fine_index.1 - ci.1 * ratio) as f64 + 0.5) / ratio as f64 - 0.5;

    Some(center + sx * ox + sy * oy)
}




/**
 * Fill every cell of `dest`, ghost cells included. Same-level valid data
 * takes precedence; cells with no same-level source (ghost cells abutting
 * the coarse-fine boundary) are interpolated from the coarse source; cells
 * beyond a non-periodic domain face take the physical boundary condition.
 * Panics if a cell cannot be filled by any of the three, which indicates a
 * violation of proper nesting.
 */
pub fn fill_patch(
    dest: &mut Patch,
    same: &FillSource,
    coarse: Option<(&FillSource, i64)>)
{
    dest.for_each_mut(|index, slice| {
        for (field, s) in slice.iter_mut().enumerate() {
            *s = same
                .value(index, field)
                .or_else(|| coarse.and_then(|(c, r)| prolong(c, index, r, field)))
                .or_else(|| same.value_bc(index, field))
                .expect("cell not covered by same-level data, coarse data, or a physical boundary")
        }
    })
}




/**
 * Fill every cell of `dest` from the coarse level alone. Used when a
 * brand-new level appears: no same-level source exists yet.
 */
pub fn fill_coarse_patch(dest: &mut Patch, coarse: &FillSource, ratio: i64) {
    dest.for_each_mut(|index, slice| {
        for (field, s) in slice.iter_mut().enumerate() {
            *s = prolong(coarse, index, ratio, field)
                .expect("cell not covered by coarse data or a physical boundary")
        }
    })
}




/**
 * Overwrite every coarse cell covered by fine valid data with the
 * volume-weighted (here: arithmetic, cells being uniform) average of the
 * covering fine cells. Not optional for correctness: without it, coarse
 * cells underneath a finer level retain stale values after refluxing.
 */
pub fn average_down_level(fine: &LevelData, coarse: &mut LevelData, ratio: i64) {
    let num_fields = coarse.num_fields();
    let fine_ghost = fine.num_ghost();
    let coarse_ghost = coarse.num_ghost();
    let weight = 1.0 / (ratio * ratio) as f64;

    for fp in fine.patches() {
        let covered = fp.index_space().trim_all(fine_ghost).coarsen_by(ratio);

        for cp in coarse.patches_mut() {
            let valid = cp.index_space().trim_all(coarse_ghost);

            if let Some(overlap) = valid.intersection(&covered) {
                for ci in overlap.iter() {
                    let mut acc = vec![0.0; num_fields];
                    let fine_cells = IndexSpace::new(
                        ci.0 * ratio..(ci.0 + 1) * ratio,
                        ci.1 * ratio..(ci.1 + 1) * ratio);

                    for fi in fine_cells.iter() {
                        for (a, v) in acc.iter_mut().zip(fp.get_slice(fi)) {
                            *a += v;
                        }
                    }
                    for (s, a) in cp.get_slice_mut(ci).iter_mut().zip(&acc) {
                        *s = a * weight;
                    }
                }
            }
        }
    }
}
