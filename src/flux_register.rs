use std::collections::HashMap;
use crate::config::DomainBoundary;
use crate::index_space::{Axis, IndexSpace};
use crate::mesh::BoxLayout;
use crate::patch::Patch;
use crate::state::LevelData;




/**
 * Identifies one coarse face on the coarse-fine boundary. A face normal to
 * axis `I` with index `(i, j)` separates cells `(i - 1, j)` and `(i, j)`;
 * likewise for `J`. Indexes are canonical: wrapped into the domain on
 * periodic axes, so the two representations of a periodically identified
 * face collapse to one key.
 */
type FaceKey = (Axis, i64, i64);


struct FaceData {
    /// Net accumulated flux mismatch per field, in units of
    /// flux * area * time.
    values: Vec<f64>,

    /// The coarse cell not covered by fine data, which receives the
    /// correction.
    cell: (i64, i64),

    /// +1 when the uncovered cell sits on the low side of the face, -1 on
    /// the high side.
    sign: f64,
}




/**
 * Accumulates, over one coarse time step, the boundary fluxes contributed
 * independently by a coarse level's update and a fine level's subcycled
 * updates at their shared interface, and applies the correction restoring
 * conservation. A register belongs to the `lev / lev-1` interface and is
 * indexed at the coarse (`lev-1`) resolution; level 0 has no register.
 */
pub struct FluxRegister {
    faces: HashMap<FaceKey, FaceData>,
    domain: IndexSpace,
    periodic: (bool, bool),
    ratio: i64,
    num_fields: usize,
}




// ============================================================================
impl FluxRegister {


    /**
     * Discover the coarse-fine boundary of a fine layout: every face of a
     * coarsened fine box whose outward neighbor cell is neither covered by
     * the fine layout nor beyond a non-periodic domain face. The fine boxes
     * must be ratio-aligned.
     */
    pub fn new(
        fine_layout: &BoxLayout,
        crse_domain: &IndexSpace,
        boundary: &DomainBoundary,
        ratio: i64,
        num_fields: usize) -> Self
    {
        let periodic = (boundary.is_periodic(0), boundary.is_periodic(1));

        let mut register = Self {
            faces: HashMap::new(),
            domain: crse_domain.clone(),
            periodic,
            ratio,
            num_fields,
        };

        let coarsened: Vec<_> = fine_layout
            .boxes()
            .iter()
            .map(|b| {
                let c = b.coarsen_by(ratio);
                assert!(
                    c.refine_by(ratio) == *b,
                    "fine layout is not aligned to the refinement ratio");
                c
            })
            .collect();

        let covered = |cell: (i64, i64)| coarsened.iter().any(|c| c.contains(cell));

        for cb in &coarsened {
            let (i0, j0) = cb.start();
            let (i1, j1) = cb.end();

            for j in j0..j1 {
                register.try_insert(Axis::I, (i0, j), (i0 - 1, j), 1.0, &covered);
                register.try_insert(Axis::I, (i1, j), (i1, j), -1.0, &covered);
            }
            for i in i0..i1 {
                register.try_insert(Axis::J, (i, j0), (i, j0 - 1), 1.0, &covered);
                register.try_insert(Axis::J, (i, j1), (i, j1), -1.0, &covered);
            }
        }
        register
    }


    fn try_insert<F>(
        &mut self,
        axis: Axis,
        face: (i64, i64),
        neighbor: (i64, i64),
        sign: f64,
        covered: &F)
    where
        F: Fn((i64, i64)) -> bool
    {
        let neighbor = match self.wrap_cell(neighbor) {
            Some(cell) => cell,
            None => return,
        };
        if covered(neighbor) {
            return;
        }
        let key = self.canonical_face(axis, face);
        let num_fields = self.num_fields;

        self.faces.entry(key).or_insert(FaceData {
            values: vec![0.0; num_fields],
            cell: neighbor,
            sign,
        });
    }


    fn wrap_cell(&self, cell: (i64, i64)) -> Option<(i64, i64)> {
        let (i0, j0) = self.domain.start();
        let (i1, j1) = self.domain.end();
        let mut cell = cell;

        if cell.0 < i0 || cell.0 >= i1 {
            if !self.periodic.0 {
                return None;
            }
            cell.0 = (cell.0 - i0).rem_euclid(i1 - i0) + i0;
        }
        if cell.1 < j0 || cell.1 >= j1 {
            if !self.periodic.1 {
                return None;
            }
            cell.1 = (cell.1 - j0).rem_euclid(j1 - j0) + j0;
        }
        Some(cell)
    }


    /**
     * Wrap a face index so that the two periodic images of a domain-edge
     * face share one key. Only the face's normal coordinate lies on a face
     * lattice; the transverse coordinate is a cell coordinate.
     */
    fn canonical_face(&self, axis: Axis, face: (i64, i64)) -> FaceKey {
        let (i0, j0) = self.domain.start();
        let (i1, j1) = self.domain.end();
        let mut face = face;

        if self.periodic.0 {
            face.0 = (face.0 - i0).rem_euclid(i1 - i0) + i0;
        }
        if self.periodic.1 {
            face.1 = (face.1 - j0).rem_euclid(j1 - j0) + j0;
        }
        (axis, face.0, face.1)
    }


    /**
     * Zero the register. Called before the coarse level's advance
     * contributes, at the start of each coarse step.
     */
    pub fn reset(&mut self) {
        for face in self.faces.values_mut() {
            for v in &mut face.values {
                *v = 0.0;
            }
        }
    }


    /**
     * Accumulate a coarse-side face-centered flux patch. `weight` carries
     * the face area and coarse time step (positive: the coarse contribution
     * enters the register with a plus sign).
     */
    pub fn add_coarse(&mut self, flux: &Patch, axis: Axis, weight: f64) {
        let space = flux.index_space().clone();

        for face in space.iter() {
            let key = self.canonical_face(axis, face);
            if let Some(data) = self.faces.get_mut(&key) {
                for (v, f) in data.values.iter_mut().zip(flux.get_slice(face)) {
                    *v += f * weight;
                }
            }
        }
    }


    /**
     * Accumulate a fine-side face-centered flux patch from one sub-step.
     * Only fine faces lying on the coarse face lattice can contribute.
     * `weight` carries the fine face area and sub-step dt, negated: the fine
     * fluxes are the truth the coarse flux is measured against.
     */
    pub fn add_fine(&mut self, flux: &Patch, axis: Axis, weight: f64) {
        let space = flux.index_space().clone();
        let ratio = self.ratio;

        for face in space.iter() {
            let aligned = match axis {
                Axis::I => face.0.rem_euclid(ratio) == 0,
                Axis::J => face.1.rem_euclid(ratio) == 0,
            };
            if !aligned {
                continue;
            }
            let crse_face = (face.0.div_euclid(ratio), face.1.div_euclid(ratio));
            let key = self.canonical_face(axis, crse_face);

            if let Some(data) = self.faces.get_mut(&key) {
                for (v, f) in data.values.iter_mut().zip(flux.get_slice(face)) {
                    *v += f * weight;
                }
            }
        }
    }


    /**
     * Add the accumulated net flux mismatch into the coarse new-state field,
     * divided by the coarse cell volume and signed by which side of the face
     * the uncovered cell sits on. Touches only cells adjacent to the
     * coarse-fine interface. The register must hold contributions from
     * exactly one coarse step when this is called.
     */
    pub fn reflux(&self, coarse: &mut LevelData, cell_volume: f64, scale: f64) {
        let num_ghost = coarse.num_ghost();

        for face in self.faces.values() {
            let patch = coarse
                .patches_mut()
                .iter_mut()
                .find(|p| p.index_space().trim_all(num_ghost).contains(face.cell));

            if let Some(patch) = patch {
                let slice = patch.get_slice_mut(face.cell);
                for (s, v) in slice.iter_mut().zip(&face.values) {
                    *s += face.sign * v * scale / cell_volume;
                }
            }
        }
    }


    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use crate::config::{BoundaryCondition, DomainBoundary};
    use crate::index_space::{range2d, Axis};
    use crate::mesh::BoxLayout;
    use crate::patch::Patch;
    use crate::state::LevelData;
    use super::FluxRegister;

    fn outflow() -> DomainBoundary {
        DomainBoundary {
            lo: [BoundaryCondition::Outflow; 2],
            hi: [BoundaryCondition::Outflow; 2],
        }
    }

    #[test]
    fn boundary_faces_surround_an_interior_fine_box() {
        // fine box 8..16 squared at ratio 2 coarsens to 4..8 squared: a
        // 4x4 coarse island with 4 faces per side
        let fine_layout = BoxLayout::new(vec![range2d(8..16, 8..16)], 1);
        let register = FluxRegister::new(
            &fine_layout, &range2d(0..16, 0..16), &outflow(), 2, 1);
        assert_eq!(register.num_faces(), 16);
    }

    #[test]
    fn faces_on_non_periodic_domain_edges_are_dropped() {
        let fine_layout = BoxLayout::new(vec![range2d(0..8, 0..8)], 1);
        let register = FluxRegister::new(
            &fine_layout, &range2d(0..16, 0..16), &outflow(), 2, 1);
        // the two sides flush with the domain boundary contribute nothing
        assert_eq!(register.num_faces(), 8);
    }

    #[test]
    fn shared_faces_between_fine_boxes_are_interior() {
        let fine_layout = BoxLayout::new(
            vec![range2d(4..8, 4..8), range2d(8..12, 4..8)], 1);
        let register = FluxRegister::new(
            &fine_layout, &range2d(0..8, 0..8), &outflow(), 2, 1);
        // a 4x2 coarse footprint: 2 + 2 side faces and 4 + 4 top/bottom
        assert_eq!(register.num_faces(), 12);
    }

    #[test]
    fn matched_fluxes_cancel_and_mismatch_corrects_the_uncovered_cell() {
        let crse_domain = range2d(0..8, 0..8);
        let fine_layout = BoxLayout::new(vec![range2d(8..12, 0..16)], 1);
        let boundary = DomainBoundary::periodic();
        let mut register = FluxRegister::new(
            &fine_layout, &crse_domain, &boundary, 2, 1);

        // a band spanning j: only the two i-normal sides remain, 8 coarse
        // faces at i = 4 and i = 6
        assert_eq!(register.num_faces(), 16);

        let dt_crse = 0.5;
        let area_crse = 1.0;
        let crse_flux = Patch::from_slice_function(
            1, crse_domain.extend_upper(1, Axis::I), |_, s| s[0] = 3.0);

        register.reset();
        register.add_coarse(&crse_flux, Axis::I, dt_crse * area_crse);

        // two fine sub-steps whose fluxes average to the coarse value leave
        // the register holding zero
        let fine_flux = Patch::from_slice_function(
            1, range2d(8..13, 0..16), |_, s| s[0] = 3.0);
        for _ in 0..2 {
            register.add_fine(&fine_flux, Axis::I, -(dt_crse / 2.0) * (area_crse / 2.0));
        }

        let layout = BoxLayout::new(vec![crse_domain.clone()], 1);
        let mut coarse = LevelData::define(&layout, 1, 0);
        register.reflux(&mut coarse, 1.0, 1.0);
        assert_eq!(coarse.value_at((3, 0), 0), Some(0.0));
        assert_eq!(coarse.value_at((6, 0), 0), Some(0.0));

        // doubling the fine flux on the low side: the register holds
        // (coarse - fine) * dt * area = (3 - 6) * 0.5 = -1.5 per face, and
        // the uncovered low-side cell (3, j) is corrected by sign +1
        register.reset();
        register.add_coarse(&crse_flux, Axis::I, dt_crse * area_crse);
        let fine_flux2 = Patch::from_slice_function(
            1, range2d(8..13, 0..16), |_, s| s[0] = 6.0);
        for _ in 0..2 {
            register.add_fine(&fine_flux2, Axis::I, -(dt_crse / 2.0) * (area_crse / 2.0));
        }
        let mut coarse = LevelData::define(&layout, 1, 0);
        register.reflux(&mut coarse, 1.0, 1.0);
        assert_eq!(coarse.value_at((3, 5), 0), Some(-1.5));
        assert_eq!(coarse.value_at((6, 5), 0), Some(1.5));
        assert_eq!(coarse.value_at((2, 5), 0), Some(0.0));
    }
}
