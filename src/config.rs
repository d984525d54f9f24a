use serde::{Deserialize, Serialize};
use crate::error::Error;




/**
 * Physical boundary condition applied on one domain face. Periodic faces
 * wrap to the opposite side of the domain; outflow faces take the value of
 * the nearest interior cell (first-order extrapolation); Dirichlet faces
 * hold a fixed value.
 */
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum BoundaryCondition {
    Periodic,
    Outflow,
    Dirichlet(f64),
}




/**
 * Boundary conditions for the four domain faces: `lo[a]` and `hi[a]` for
 * axis `a`. A periodic condition must be applied to both faces of an axis.
 */
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DomainBoundary {
    pub lo: [BoundaryCondition; 2],
    pub hi: [BoundaryCondition; 2],
}




// ============================================================================
impl DomainBoundary {

    pub fn periodic() -> Self {
        Self {
            lo: [BoundaryCondition::Periodic; 2],
            hi: [BoundaryCondition::Periodic; 2],
        }
    }

    pub fn is_periodic(&self, axis: usize) -> bool {
        self.lo[axis] == BoundaryCondition::Periodic
    }

    /**
     * Reject mismatched periodic faces. A bad specification is a
     * configuration error and aborts the run.
     */
    pub fn validate(&self) -> Result<(), Error> {
        for axis in 0..2 {
            let lo = self.lo[axis] == BoundaryCondition::Periodic;
            let hi = self.hi[axis] == BoundaryCondition::Periodic;

            if lo != hi {
                return Err(Error::InvalidBoundaryCondition(format!(
                    "axis {} is periodic on one side only", axis)));
            }
        }
        Ok(())
    }
}

impl Default for DomainBoundary {
    fn default() -> Self {
        Self::periodic()
    }
}




/**
 * Static configuration for a run. Handed to the engine at initialization
 * and treated as immutable for the run's duration.
 */
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AmrConfig {

    /// Number of level-0 cells on each axis.
    pub n_cell: (i64, i64),

    /// Physical bounds of the domain.
    pub prob_lo: (f64, f64),
    pub prob_hi: (f64, f64),

    /// Deepest level the hierarchy may grow to. Level 0 always exists.
    pub max_level: usize,

    /// Coarse-to-fine refinement ratio per level; entries beyond the end
    /// repeat the last value.
    pub ref_ratio: Vec<i64>,

    /// Largest box edge produced by domain decomposition and regridding.
    pub max_box_size: i64,

    /// Fields per cell and ghost cells required by the physics kernel.
    pub num_fields: usize,
    pub num_ghost: i64,

    /// Regrid every this many steps of each level; 0 disables regridding.
    pub regrid_int: u64,

    /// Per-level refinement thresholds; a level without an entry stays
    /// untagged. Read once at first use.
    pub tag_thresholds: Vec<f64>,

    /// Enables flux registers and the conservative coarse-fine correction.
    pub do_reflux: bool,

    /// Level-0 time step; level `lev` runs at `dt / prod(ref_ratio[..lev])`.
    pub fixed_dt: f64,

    /// Run termination: whichever of the two is hit first.
    pub max_step: u64,
    pub stop_time: f64,

    /// Checkpoint/plotfile cadence in level-0 steps; 0 disables.
    pub chk_int: u64,
    pub chk_file: String,
    pub plot_int: u64,
    pub plot_file: String,

    /// Path of a checkpoint to restart from.
    pub restart: Option<String>,

    /// Worker count for the owner assignment; 0 means one per rayon thread.
    pub num_workers: usize,

    pub boundary: DomainBoundary,
}




// ============================================================================
impl AmrConfig {

    /**
     * Refinement ratio between `lev` and `lev + 1`, repeating the last
     * configured entry for deeper levels.
     */
    pub fn ratio(&self, lev: usize) -> i64 {
        let n = lev.min(self.ref_ratio.len() - 1);
        self.ref_ratio[n]
    }

    /**
     * The per-level ratio table sized for this run.
     */
    pub fn ratio_table(&self) -> Vec<i64> {
        (0..self.max_level.max(1)).map(|lev| self.ratio(lev)).collect()
    }

    pub fn worker_count(&self) -> usize {
        if self.num_workers == 0 {
            rayon::current_num_threads()
        } else {
            self.num_workers
        }
    }
}

impl Default for AmrConfig {
    fn default() -> Self {
        Self {
            n_cell: (64, 64),
            prob_lo: (0.0, 0.0),
            prob_hi: (1.0, 1.0),
            max_level: 0,
            ref_ratio: vec![2],
            max_box_size: 32,
            num_fields: 1,
            num_ghost: 2,
            regrid_int: 2,
            tag_thresholds: Vec::new(),
            do_reflux: true,
            fixed_dt: 1e-3,
            max_step: u64::MAX,
            stop_time: f64::MAX,
            chk_int: 0,
            chk_file: "chk".to_string(),
            plot_int: 0,
            plot_file: "plt".to_string(),
            restart: None,
            num_workers: 0,
            boundary: DomainBoundary::periodic(),
        }
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{AmrConfig, BoundaryCondition, DomainBoundary};

    #[test]
    fn ratio_repeats_the_last_entry() {
        let config = AmrConfig {
            max_level: 3,
            ref_ratio: vec![4, 2],
            ..AmrConfig::default()
        };
        assert_eq!(config.ratio(0), 4);
        assert_eq!(config.ratio(1), 2);
        assert_eq!(config.ratio(2), 2);
        assert_eq!(config.ratio_table(), vec![4, 2, 2]);
    }

    #[test]
    fn half_periodic_axis_is_rejected() {
        let boundary = DomainBoundary {
            lo: [BoundaryCondition::Periodic, BoundaryCondition::Outflow],
            hi: [BoundaryCondition::Outflow, BoundaryCondition::Outflow],
        };
        assert!(boundary.validate().is_err());
        assert!(DomainBoundary::periodic().validate().is_ok());
    }
}
