use serde::{Deserialize, Serialize};
use crate::mesh::BoxLayout;
use crate::patch::Patch;

/// Sentinel subtracted from a level's time to mark the old snapshot invalid,
/// for levels that were just created or read back from a checkpoint.
pub const NO_OLD_DATA: f64 = 1e200;




/**
 * A field defined over one level's box layout: one patch per box, each
 * extended by `num_ghost` cells beyond its valid region. The valid regions
 * tile the level's active domain; ghost regions hold copies or
 * interpolations of neighboring, coarser, or boundary data.
 */
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LevelData {
    patches: Vec<Patch>,
    num_ghost: i64,
}




// ============================================================================
impl LevelData {


    /**
     * Allocate zero-filled data over the given layout.
     */
    pub fn define(layout: &BoxLayout, num_fields: usize, num_ghost: i64) -> Self {
        let patches = layout
            .boxes()
            .iter()
            .map(|b| Patch::zeros(num_fields, b.extend_all(num_ghost)))
            .collect();

        Self { patches, num_ghost }
    }


    pub fn num_ghost(&self) -> i64 {
        self.num_ghost
    }


    pub fn num_fields(&self) -> usize {
        self.patches.first().map_or(0, |p| p.num_fields())
    }


    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }


    pub fn patches_mut(&mut self) -> &mut [Patch] {
        &mut self.patches
    }


    /**
     * Return the field value at a cell within some patch's valid region, or
     * `None` if no valid region covers the cell. Ghost values are never
     * consulted.
     */
    pub fn value_at(&self, index: (i64, i64), field: usize) -> Option<f64> {
        self.patches
            .iter()
            .find(|p| p.index_space().trim_all(self.num_ghost).contains(index))
            .map(|p| p.get(index, field))
    }


    /**
     * Sum `field * cell_count` over valid regions only.
     */
    pub fn valid_sum(&self, field: usize) -> f64 {
        self.patches
            .iter()
            .map(|p| {
                p.index_space()
                    .trim_all(self.num_ghost)
                    .iter()
                    .map(|index| p.get(index, field))
                    .sum::<f64>()
            })
            .sum()
    }


    /**
     * Return `a * wa + b * wb` cell-by-cell. The two operands must be
     * defined over the same layout.
     */
    pub fn linear_combination(a: &Self, wa: f64, b: &Self, wb: f64) -> Self {
        assert!(a.patches.len() == b.patches.len());

        let patches = a
            .patches
            .iter()
            .zip(&b.patches)
            .map(|(pa, pb)| {
                assert!(pa.index_space() == pb.index_space());
                Patch::from_slice_function(pa.num_fields(), pa.index_space().clone(), |index, s| {
                    for (n, s) in s.iter_mut().enumerate() {
                        *s = pa.get(index, n) * wa + pb.get(index, n) * wb;
                    }
                })
            })
            .collect();

        Self { patches, num_ghost: a.num_ghost }
    }
}




/**
 * The old/new snapshot pair for one level, tagged with the simulation times
 * they represent. The invariant `t_old <= t_new` holds at all times;
 * `t_new - t_old` equals the level's time step between an advance and the
 * next swap.
 */
pub struct LevelState {
    pub old: LevelData,
    pub new: LevelData,
    pub t_old: f64,
    pub t_new: f64,
}




// ============================================================================
impl LevelState {


    /**
     * Swap the snapshots at the start of an advance: what was "new" becomes
     * "old", and the (now stale) "new" buffer is left for the advance to
     * overwrite. The caller bumps `t_new` once the step size is known.
     */
    pub fn swap_old_new(&mut self) {
        std::mem::swap(&mut self.old, &mut self.new);
        self.t_old = self.t_new;
    }


    /**
     * Return the minimal set of snapshots needed to interpolate the
     * requested time, with their time stamps. Times within a small fraction
     * of either stamp select that single snapshot; level times are computed
     * by repeated addition of sub-step dt and rarely land exactly on a
     * coarser level's stamp.
     */
    pub fn data_at(&self, time: f64) -> Vec<(&LevelData, f64)> {
        let teps = (self.t_new - self.t_old) * 1e-3;

        if time > self.t_new - teps && time < self.t_new + teps {
            vec![(&self.new, self.t_new)]
        } else if time > self.t_old - teps && time < self.t_old + teps {
            vec![(&self.old, self.t_old)]
        } else {
            vec![(&self.old, self.t_old), (&self.new, self.t_new)]
        }
    }


    /**
     * Materialize the level's field at the requested time, interpolating
     * linearly between the snapshots when neither stamp matches.
     */
    pub fn interp_at(&self, time: f64) -> LevelData {
        let parts = self.data_at(time);

        if parts.len() == 1 {
            parts[0].0.clone()
        } else {
            let (old, t0) = parts[0];
            let (new, t1) = parts[1];
            let wb = (time - t0) / (t1 - t0);
            LevelData::linear_combination(old, 1.0 - wb, new, wb)
        }
    }
}




/**
 * Owns the snapshot pairs for every level, in an arena of fixed-capacity
 * slots indexed by level number. Slots above the finest level are dormant.
 */
pub struct StateStore {
    levels: Vec<Option<LevelState>>,
}




// ============================================================================
impl StateStore {


    pub fn new(max_level: usize) -> Self {
        Self {
            levels: (0..max_level + 1).map(|_| None).collect(),
        }
    }


    /**
     * (Re)allocate both snapshots for a level with zero fill. The old
     * snapshot starts invalid.
     */
    pub fn define_level(
        &mut self,
        lev: usize,
        layout: &BoxLayout,
        num_fields: usize,
        num_ghost: i64,
        time: f64)
    {
        self.levels[lev] = Some(LevelState {
            old: LevelData::define(layout, num_fields, num_ghost),
            new: LevelData::define(layout, num_fields, num_ghost),
            t_old: time - NO_OLD_DATA,
            t_new: time,
        });
    }


    pub fn level(&self, lev: usize) -> &LevelState {
        self.levels[lev].as_ref().expect("state queried for a dormant level")
    }


    pub fn level_mut(&mut self, lev: usize) -> &mut LevelState {
        self.levels[lev].as_mut().expect("state queried for a dormant level")
    }


    /**
     * Atomically replace a level's snapshot pair (regrid remaps a level onto
     * a new layout by building the replacement first).
     */
    pub fn replace_level(&mut self, lev: usize, state: LevelState) {
        self.levels[lev] = Some(state);
    }


    /**
     * Borrow a level mutably together with the next finer level immutably,
     * as average-down and refluxing need.
     */
    pub fn coarse_fine_mut(&mut self, lev: usize) -> (&mut LevelState, &LevelState) {
        let (lo, hi) = self.levels.split_at_mut(lev + 1);
        let coarse = lo[lev].as_mut().expect("state queried for a dormant level");
        let fine = hi[0].as_ref().expect("state queried for a dormant level");
        (coarse, fine)
    }


    pub fn clear_level(&mut self, lev: usize) {
        self.levels[lev] = None;
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use crate::index_space::range2d;
    use crate::mesh::BoxLayout;
    use super::{LevelData, LevelState};

    fn constant_data(layout: &BoxLayout, value: f64) -> LevelData {
        let mut data = LevelData::define(layout, 1, 1);
        for p in data.patches_mut() {
            p.for_each_mut(|_, s| s[0] = value);
        }
        data
    }

    fn state_01(layout: &BoxLayout) -> LevelState {
        LevelState {
            old: constant_data(layout, 1.0),
            new: constant_data(layout, 3.0),
            t_old: 0.0,
            t_new: 1.0,
        }
    }

    #[test]
    fn data_at_selects_single_snapshots_near_the_stamps() {
        let layout = BoxLayout::new(vec![range2d(0..4, 0..4)], 1);
        let state = state_01(&layout);

        assert_eq!(state.data_at(1.0).len(), 1);
        assert_eq!(state.data_at(1.0 + 1e-4).len(), 1);
        assert_eq!(state.data_at(0.0).len(), 1);
        assert_eq!(state.data_at(0.5).len(), 2);
    }

    #[test]
    fn interp_at_is_linear_in_time() {
        let layout = BoxLayout::new(vec![range2d(0..4, 0..4)], 1);
        let state = state_01(&layout);

        let half = state.interp_at(0.5);
        assert_eq!(half.value_at((2, 2), 0), Some(2.0));

        let exact = state.interp_at(1.0);
        assert_eq!(exact.value_at((2, 2), 0), Some(3.0));
    }

    #[test]
    fn swap_promotes_new_to_old() {
        let layout = BoxLayout::new(vec![range2d(0..4, 0..4)], 1);
        let mut state = state_01(&layout);

        state.swap_old_new();
        assert_eq!(state.t_old, 1.0);
        assert_eq!(state.old.value_at((0, 0), 0), Some(3.0));
    }

    #[test]
    fn valid_sum_ignores_ghost_cells() {
        let layout = BoxLayout::new(vec![range2d(0..4, 0..4)], 1);
        let data = constant_data(&layout, 2.0);
        assert_eq!(data.valid_sum(0), 32.0);
    }
}
