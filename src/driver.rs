use std::path::Path;
use rayon::prelude::*;
use crate::checkpoint::{self, Checkpoint};
use crate::config::AmrConfig;
use crate::error::Error;
use crate::fill::{average_down_level, fill_coarse_patch, fill_patch, FillSource};
use crate::flux_register::FluxRegister;
use crate::index_space::{range2d, Axis};
use crate::mesh::{split_boxes, BoxLayout, Geometry, GridHierarchy};
use crate::patch::Patch;
use crate::regrid::{make_fine_layout, tag_cells, TagThresholds};
use crate::state::{LevelData, LevelState, StateStore, NO_OLD_DATA};

/// Tag dilation applied before clustering, in cells of the tagged level.
const TAG_BUFFER: i64 = 1;




/**
 * The physics kernel the engine subcycles. Implementations see one patch at
 * a time and nothing else; the engine owns ghost filling, flux bookkeeping,
 * and level synchronization. Called concurrently from worker threads.
 */
pub trait PatchIntegrator: Send + Sync {


    /**
     * Write initial data at the given time into every cell of the patch,
     * ghost region included.
     */
    fn init_patch(&self, geom: &Geometry, patch: &mut Patch, time: f64);


    /**
     * Advance one patch from `time` to `time + dt`. `filled` holds the
     * state at `time` with ghost cells populated; results go to the valid
     * region of `out`, which covers the same index space (its ghost cells
     * are ignored). When `fluxes` is given, write the time-averaged flux
     * through cell faces: `fluxes[a]` at index `(i, j)` is the flux along
     * axis `a` through the low face of cell `(i, j)`, with one extra face
     * row at the patch's upper end. An `Err` aborts the run.
     */
    fn advance_patch(
        &self,
        geom: &Geometry,
        filled: &Patch,
        out: &mut Patch,
        fluxes: Option<&mut [Patch; 2]>,
        time: f64,
        dt: f64) -> Result<(), String>;
}




/**
 * The AMR driver: owns the grid hierarchy, the per-level field snapshots,
 * and the flux registers, and runs the recursive subcycled time stepping
 * loop around a `PatchIntegrator`.
 */
pub struct Amr<P: PatchIntegrator> {
    config: AmrConfig,
    hierarchy: GridHierarchy,
    store: StateStore,
    flux_reg: Vec<Option<FluxRegister>>,
    istep: Vec<u64>,
    last_regrid_step: Vec<u64>,
    dt: Vec<f64>,
    thresholds: TagThresholds,
    integrator: P,
}




// ============================================================================
impl<P: PatchIntegrator> Amr<P> {


    /**
     * Build the driver: validate the configuration, lay out level 0, and
     * either restore a checkpoint or generate initial data, growing finer
     * levels wherever the initial data trips the refinement thresholds.
     */
    pub fn new(config: AmrConfig, integrator: P) -> Result<Self, Error> {
        config.boundary.validate()?;

        let domain = range2d(0..config.n_cell.0, 0..config.n_cell.1);
        let geom0 = Geometry {
            domain: domain.clone(),
            prob_lo: config.prob_lo,
            prob_hi: config.prob_hi,
        };
        let layout0 = BoxLayout::new(
            split_boxes(&domain, config.max_box_size),
            config.worker_count());

        let hierarchy = GridHierarchy::new(
            layout0, geom0, config.ratio_table(), config.max_level);

        let num_levels = config.max_level + 1;
        let mut dt = vec![config.fixed_dt; num_levels];
        for lev in 1..num_levels {
            dt[lev] = dt[lev - 1] / config.ratio(lev - 1) as f64;
        }

        let mut amr = Self {
            hierarchy,
            store: StateStore::new(config.max_level),
            flux_reg: (0..num_levels).map(|_| None).collect(),
            istep: vec![0; num_levels],
            last_regrid_step: vec![0; num_levels],
            dt,
            thresholds: TagThresholds::new(),
            integrator,
            config,
        };

        match amr.config.restart.clone() {
            Some(path) => amr.restart_from(Path::new(&path))?,
            None => amr.init_from_scratch(0.0),
        }
        Ok(amr)
    }


    pub fn hierarchy(&self) -> &GridHierarchy {
        &self.hierarchy
    }


    pub fn state(&self) -> &StateStore {
        &self.store
    }


    pub fn current_time(&self) -> f64 {
        self.store.level(0).t_new
    }


    pub fn step_count(&self, lev: usize) -> u64 {
        self.istep[lev]
    }


    pub fn count_cells(&self, lev: usize) -> usize {
        self.hierarchy.layout(lev).total_cells()
    }


    /**
     * Run until the step or time limit is reached, writing checkpoints and
     * plotfiles at their configured cadences.
     */
    pub fn evolve(&mut self) -> Result<(), Error> {
        while self.istep[0] < self.config.max_step
            && self.current_time() < self.config.stop_time
        {
            let time = self.current_time();
            log::info!("step {} begins, t = {:.6e}", self.istep[0] + 1, time);

            self.time_step(0, time, 1)?;

            log::info!(
                "step {} ends, t = {:.6e}, cells = {}",
                self.istep[0],
                self.current_time(),
                (0..self.hierarchy.num_levels())
                    .map(|lev| self.count_cells(lev))
                    .sum::<usize>());

            if self.config.chk_int > 0 && self.istep[0] % self.config.chk_int == 0 {
                self.write_checkpoint()?;
            }
            if self.config.plot_int > 0 && self.istep[0] % self.config.plot_int == 0 {
                self.write_plotfile()?;
            }
        }
        if self.config.plot_int > 0 && self.istep[0] % self.config.plot_int != 0 {
            self.write_plotfile()?;
        }
        Ok(())
    }


    /**
     * Advance one level by its own time step, recursing into the next finer
     * level for one sub-step per unit of the refinement ratio, then
     * synchronize the two with a reflux and an average-down. Regrids first
     * when this level's step count hits the regrid cadence.
     */
    fn time_step(&mut self, lev: usize, time: f64, _iteration: i64) -> Result<(), Error> {
        if self.config.regrid_int > 0
            && lev < self.config.max_level
            && self.istep[lev] > self.last_regrid_step[lev]
            && self.istep[lev] % self.config.regrid_int == 0
        {
            self.regrid(lev, time);
            for k in lev..self.hierarchy.num_levels() {
                self.last_regrid_step[k] = self.istep[k];
            }
        }

        log::debug!(
            "level {} advances from t = {:.6e} with dt = {:.6e}",
            lev, time, self.dt[lev]);

        self.advance(lev, time)?;
        self.istep[lev] += 1;

        if lev < self.hierarchy.finest_level() {
            let ratio = self.hierarchy.ratio(lev);

            for i in 0..ratio {
                self.time_step(lev + 1, time + i as f64 * self.dt[lev + 1], i + 1)?;
            }
            if self.config.do_reflux {
                if let Some(register) = &self.flux_reg[lev + 1] {
                    let volume = self.hierarchy.geometry(lev).cell_volume();
                    register.reflux(&mut self.store.level_mut(lev).new, volume, 1.0);
                }
            }
            self.average_down_to(lev);
        }
        Ok(())
    }


    /**
     * One single-level update: rotate the snapshots, fill ghost regions
     * from this level and (time-interpolated) the next coarser one, and run
     * the integrator over the level's patches in parallel. Face fluxes are
     * folded into the registers on both sides of this level.
     */
    fn advance(&mut self, lev: usize, time: f64) -> Result<(), Error> {
        let dt = self.dt[lev];
        {
            let state = self.store.level_mut(lev);
            state.swap_old_new();
            state.t_new = state.t_old + dt;
        }

        let num_fields = self.config.num_fields;
        let num_ghost = self.config.num_ghost;
        let geom = self.hierarchy.geometry(lev).clone();
        let boundary = self.config.boundary.clone();
        let want_flux = self.config.do_reflux
            && (self.flux_reg[lev].is_some()
                || self.flux_reg.get(lev + 1).map_or(false, |r| r.is_some()));

        let coarse_data = if lev > 0 {
            Some((
                self.store.level(lev - 1).interp_at(time),
                self.hierarchy.geometry(lev - 1).domain.clone(),
                self.hierarchy.ratio(lev - 1),
            ))
        } else {
            None
        };

        let layout = self.hierarchy.layout(lev);
        let same_data = &self.store.level(lev).old;
        let integrator = &self.integrator;

        let (sender, receiver) = crossbeam_channel::unbounded();

        layout
            .boxes()
            .par_iter()
            .enumerate()
            .try_for_each_with(sender, |sender, (n, space)| -> Result<(), Error> {
                let same = FillSource {
                    data: same_data,
                    domain: &geom.domain,
                    boundary: &boundary,
                };
                let coarse = coarse_data.as_ref().map(|(data, domain, ratio)| {
                    (FillSource { data, domain, boundary: &boundary }, *ratio)
                });
                let mut filled = Patch::zeros(num_fields, space.extend_all(num_ghost));
                fill_patch(&mut filled, &same, coarse.as_ref().map(|(s, r)| (s, *r)));

                let mut out = Patch::zeros(num_fields, space.extend_all(num_ghost));
                let mut fluxes = if want_flux {
                    Some([
                        Patch::zeros(num_fields, space.extend_upper(1, Axis::I)),
                        Patch::zeros(num_fields, space.extend_upper(1, Axis::J)),
                    ])
                } else {
                    None
                };
                integrator
                    .advance_patch(&geom, &filled, &mut out, fluxes.as_mut(), time, dt)
                    .map_err(|message| Error::Hook { level: lev, message })?;

                sender.send((n, space.clone(), out, fluxes)).unwrap();
                Ok(())
            })?;

        if let Some(register) = self.flux_reg.get_mut(lev + 1).and_then(|r| r.as_mut()) {
            register.reset();
        }

        for (n, space, out, fluxes) in receiver.try_iter() {
            self.store.level_mut(lev).new.patches_mut()[n] = out;

            if let Some(fluxes) = fluxes {
                // the register below the finer level takes the coarse-side
                // contribution; faces shared by two patches of this level
                // are counted by the patch owning the face's high-side cell
                if let Some(register) = self.flux_reg.get_mut(lev + 1).and_then(|r| r.as_mut()) {
                    for axis in [Axis::I, Axis::J] {
                        let owned = fluxes[axis.as_usize()].extract(space.clone());
                        register.add_coarse(&owned, axis, dt * geom.face_area(axis));
                    }
                }
                if lev > 0 {
                    if let Some(register) = self.flux_reg[lev].as_mut() {
                        for axis in [Axis::I, Axis::J] {
                            register.add_fine(
                                &fluxes[axis.as_usize()],
                                axis,
                                -dt * geom.face_area(axis));
                        }
                    }
                }
            }
        }
        Ok(())
    }


    /**
     * Rebuild levels `base + 1` and finer from fresh tags. A level whose
     * tags vanish is dropped along with everything above it.
     */
    fn regrid(&mut self, base: usize, time: f64) {
        log::info!("regrid from level {} at t = {:.6e}", base, time);

        for lev in base..self.config.max_level {
            if !self.hierarchy.has_level(lev) {
                break;
            }
            match self.tagged_layout(lev) {
                Some(layout) => {
                    if self.hierarchy.has_level(lev + 1) {
                        if *self.hierarchy.layout(lev + 1) != layout {
                            self.remake_level(lev + 1, layout, time);
                        }
                    } else {
                        self.make_new_level_from_coarse(lev + 1, layout, time);
                    }
                }
                None => {
                    for k in lev + 1..self.hierarchy.num_levels() {
                        self.store.clear_level(k);
                        self.flux_reg[k] = None;
                    }
                    self.hierarchy.clear_above(lev);
                    return;
                }
            }
        }
    }


    /**
     * Tag a level and cluster the tags into the next finer level's layout,
     * or `None` if nothing (nestable) is tagged.
     */
    fn tagged_layout(&mut self, lev: usize) -> Option<BoxLayout> {
        let threshold = self.thresholds.threshold(&self.config, lev)?;
        let tags = tag_cells(&self.store.level(lev).new, 0, threshold);
        let ratio = self.hierarchy.ratio(lev);
        let nest_buffer = (self.config.num_ghost + ratio - 1) / ratio;

        make_fine_layout(
            &tags,
            self.hierarchy.layout(lev),
            &self.hierarchy.geometry(lev).domain,
            &self.config.boundary,
            TAG_BUFFER,
            nest_buffer,
            ratio,
            self.config.max_box_size,
            self.config.worker_count())
    }


    /**
     * Bring a brand-new level into existence at the given time, with data
     * interpolated entirely from the level below.
     */
    fn make_new_level_from_coarse(&mut self, lev: usize, layout: BoxLayout, time: f64) {
        self.hierarchy.set_layout(lev, layout.clone());
        self.store.define_level(
            lev, &layout, self.config.num_fields, self.config.num_ghost, time);

        let coarse_data = self.store.level(lev - 1).interp_at(time);
        let crse = FillSource {
            data: &coarse_data,
            domain: &self.hierarchy.geometry(lev - 1).domain,
            boundary: &self.config.boundary,
        };
        let ratio = self.hierarchy.ratio(lev - 1);

        for patch in self.store.level_mut(lev).new.patches_mut() {
            fill_coarse_patch(patch, &crse, ratio);
        }
        self.rebuild_flux_register(lev);
    }


    /**
     * Move an existing level onto a new layout: existing fine data carries
     * over where the layouts overlap, the rest interpolates from below. The
     * level restarts with no old snapshot.
     */
    fn remake_level(&mut self, lev: usize, layout: BoxLayout, time: f64) {
        let num_fields = self.config.num_fields;
        let num_ghost = self.config.num_ghost;
        let same_data = self.store.level(lev).interp_at(time);
        let coarse_data = self.store.level(lev - 1).interp_at(time);

        let mut new = LevelData::define(&layout, num_fields, num_ghost);
        {
            let same = FillSource {
                data: &same_data,
                domain: &self.hierarchy.geometry(lev).domain,
                boundary: &self.config.boundary,
            };
            let crse = FillSource {
                data: &coarse_data,
                domain: &self.hierarchy.geometry(lev - 1).domain,
                boundary: &self.config.boundary,
            };
            let ratio = self.hierarchy.ratio(lev - 1);

            for patch in new.patches_mut() {
                fill_patch(patch, &same, Some((&crse, ratio)));
            }
        }
        let old = LevelData::define(&layout, num_fields, num_ghost);
        self.store.replace_level(lev, LevelState {
            old,
            new,
            t_old: time - NO_OLD_DATA,
            t_new: time,
        });
        self.hierarchy.set_layout(lev, layout);
        self.rebuild_flux_register(lev);
    }


    fn rebuild_flux_register(&mut self, lev: usize) {
        self.flux_reg[lev] = if self.config.do_reflux && lev > 0 {
            Some(FluxRegister::new(
                self.hierarchy.layout(lev),
                &self.hierarchy.geometry(lev - 1).domain,
                &self.config.boundary,
                self.hierarchy.ratio(lev - 1),
                self.config.num_fields))
        } else {
            None
        };
    }


    fn init_from_scratch(&mut self, time: f64) {
        let layout0 = self.hierarchy.layout(0).clone();
        self.define_and_init_level(0, &layout0, time);

        while self.hierarchy.finest_level() < self.config.max_level {
            let lev = self.hierarchy.finest_level();

            match self.tagged_layout(lev) {
                Some(layout) => {
                    self.hierarchy.set_layout(lev + 1, layout.clone());
                    self.define_and_init_level(lev + 1, &layout, time);
                    self.rebuild_flux_register(lev + 1);
                }
                None => break,
            }
        }
        self.average_down();
    }


    /**
     * Allocate a level and write exact initial data on it. Used at startup
     * only; levels appearing later interpolate from below instead.
     */
    fn define_and_init_level(&mut self, lev: usize, layout: &BoxLayout, time: f64) {
        self.store.define_level(
            lev, layout, self.config.num_fields, self.config.num_ghost, time);

        let geom = self.hierarchy.geometry(lev).clone();
        for patch in self.store.level_mut(lev).new.patches_mut() {
            self.integrator.init_patch(&geom, patch, time);
        }
    }


    fn restart_from(&mut self, path: &Path) -> Result<(), Error> {
        log::info!("restarting from {}", path.display());
        let chk = checkpoint::read_checkpoint(path)?;

        if chk.finest_level > self.config.max_level {
            return Err(Error::Checkpoint(format!(
                "checkpoint has {} levels but max_level is {}",
                chk.finest_level + 1, self.config.max_level)));
        }
        let workers = self.config.worker_count();

        for lev in 0..chk.finest_level + 1 {
            let layout = BoxLayout::new(chk.boxes[lev].clone(), workers);
            let data = &chk.data[lev];

            if data.patches().len() != layout.num_boxes() {
                return Err(Error::Checkpoint(format!(
                    "level {} holds {} patches for {} boxes",
                    lev, data.patches().len(), layout.num_boxes())));
            }
            self.hierarchy.set_layout(lev, layout.clone());
            self.store.define_level(
                lev, &layout, self.config.num_fields, self.config.num_ghost,
                chk.t_new[lev]);
            self.store.level_mut(lev).new = data.clone();

            self.istep[lev] = chk.istep[lev];
            self.dt[lev] = chk.dt[lev];
            self.rebuild_flux_register(lev);
        }
        for lev in chk.finest_level + 1..self.config.max_level + 1 {
            self.dt[lev] = self.dt[lev - 1] / self.config.ratio(lev - 1) as f64;
        }
        Ok(())
    }


    fn average_down_to(&mut self, lev: usize) {
        let ratio = self.hierarchy.ratio(lev);
        let (coarse, fine) = self.store.coarse_fine_mut(lev);
        average_down_level(&fine.new, &mut coarse.new, ratio);
    }


    fn average_down(&mut self) {
        for lev in (0..self.hierarchy.finest_level()).rev() {
            self.average_down_to(lev);
        }
    }


    fn write_checkpoint(&self) -> Result<(), Error> {
        let dir = format!("{}{:05}", self.config.chk_file, self.istep[0]);
        log::info!("writing checkpoint {}", dir);

        let finest = self.hierarchy.finest_level();
        let chk = Checkpoint {
            finest_level: finest,
            istep: self.istep[..finest + 1].to_vec(),
            dt: self.dt[..finest + 1].to_vec(),
            t_new: (0..finest + 1).map(|lev| self.store.level(lev).t_new).collect(),
            boxes: (0..finest + 1)
                .map(|lev| self.hierarchy.layout(lev).boxes().to_vec())
                .collect(),
            data: (0..finest + 1)
                .map(|lev| self.store.level(lev).new.clone())
                .collect(),
        };
        checkpoint::write_checkpoint(Path::new(&dir), &chk)
    }


    fn write_plotfile(&self) -> Result<(), Error> {
        let dir = format!("{}{:05}", self.config.plot_file, self.istep[0]);
        log::info!("writing plotfile {}", dir);

        let finest = self.hierarchy.finest_level();
        let data: Vec<_> = (0..finest + 1)
            .map(|lev| &self.store.level(lev).new)
            .collect();

        checkpoint::write_plotfile(
            Path::new(&dir),
            self.current_time(),
            &self.hierarchy.geometry(0).domain,
            &data)
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use crate::config::AmrConfig;
    use crate::mesh::Geometry;
    use crate::patch::Patch;
    use super::{Amr, PatchIntegrator};

    /**
     * First-order upwind advection with unit velocity along i. At a Courant
     * number of one the update is an exact one-cell shift.
     */
    struct Upwind;

    impl PatchIntegrator for Upwind {

        fn init_patch(&self, geom: &Geometry, patch: &mut Patch, _time: f64) {
            patch.for_each_mut(|index, s| {
                let (x, y) = geom.cell_center(index);
                let r2 = (x - 0.5).powi(2) + (y - 0.5).powi(2);
                s[0] = (-r2 / 0.005).exp();
            });
        }

        fn advance_patch(
            &self,
            geom: &Geometry,
            filled: &Patch,
            out: &mut Patch,
            fluxes: Option<&mut [Patch; 2]>,
            _time: f64,
            dt: f64) -> Result<(), String>
        {
            let (dx, _) = geom.cell_spacing();
            let space = filled.index_space().clone();

            let flux_i = Patch::from_scalar_function(
                space.extend_upper(1, crate::index_space::Axis::I),
                |(i, j)| {
                    if space.contains((i - 1, j)) {
                        filled.get((i - 1, j), 0)
                    } else {
                        0.0
                    }
                });
            let flux_j = Patch::zeros(1, space.extend_upper(1, crate::index_space::Axis::J));

            out.for_each_mut(|(i, j), s| {
                if space.contains((i - 1, j)) && space.contains((i + 1, j)) {
                    let div = (flux_i.get((i + 1, j), 0) - flux_i.get((i, j), 0)) / dx;
                    s[0] = filled.get((i, j), 0) - dt * div;
                }
            });

            if let Some(f) = fluxes {
                for (dest, src) in f.iter_mut().zip([&flux_i, &flux_j]) {
                    dest.copy_from(src);
                }
            }
            Ok(())
        }
    }

    fn single_level_config(n: i64) -> AmrConfig {
        AmrConfig {
            n_cell: (n, n),
            max_level: 0,
            max_box_size: n / 2,
            num_ghost: 2,
            fixed_dt: 1.0 / n as f64,
            ..AmrConfig::default()
        }
    }

    #[test]
    fn single_level_advection_shifts_the_field_exactly() {
        let n = 16;
        let mut config = single_level_config(n);
        config.max_step = 4;

        let mut amr = Amr::new(config, Upwind).unwrap();
        let initial = amr.state().level(0).new.clone();
        amr.evolve().unwrap();

        // 4 steps at a Courant number of one shift the field by 4 cells
        let evolved = &amr.state().level(0).new;
        for i in 0..n {
            for j in 0..n {
                let shifted = initial.value_at(((i - 4).rem_euclid(n), j), 0).unwrap();
                let got = evolved.value_at((i, j), 0).unwrap();
                assert!((got - shifted).abs() < 1e-12, "mismatch at ({}, {})", i, j);
            }
        }
        assert_eq!(amr.step_count(0), 4);
        assert!((amr.current_time() - 4.0 / n as f64).abs() < 1e-12);
    }

    #[test]
    fn single_level_advection_matches_a_serial_reference_at_half_courant() {
        let n = 16i64;
        let mut config = single_level_config(n);
        config.fixed_dt = 0.5 / n as f64;
        config.max_step = 5;

        let mut amr = Amr::new(config, Upwind).unwrap();
        let initial = amr.state().level(0).new.clone();
        amr.evolve().unwrap();

        // the same donor-cell update, written out longhand over a flat grid
        let mut u = vec![0.0; (n * n) as usize];
        for i in 0..n {
            for j in 0..n {
                u[(i * n + j) as usize] = initial.value_at((i, j), 0).unwrap();
            }
        }
        for _ in 0..5 {
            let mut next = u.clone();
            for i in 0..n {
                for j in 0..n {
                    let up = u[((i - 1).rem_euclid(n) * n + j) as usize];
                    next[(i * n + j) as usize] =
                        u[(i * n + j) as usize] - 0.5 * (u[(i * n + j) as usize] - up);
                }
            }
            u = next;
        }
        let evolved = &amr.state().level(0).new;
        for i in 0..n {
            for j in 0..n {
                let got = evolved.value_at((i, j), 0).unwrap();
                assert!((got - u[(i * n + j) as usize]).abs() < 1e-12,
                    "mismatch at ({}, {})", i, j);
            }
        }
    }

    #[test]
    fn subcycling_runs_fine_levels_at_the_ratio_and_syncs_times() {
        let mut config = single_level_config(16);
        config.max_level = 1;
        config.ref_ratio = vec![2];
        config.tag_thresholds = vec![0.2];
        config.max_step = 3;

        let mut amr = Amr::new(config, Upwind).unwrap();
        assert_eq!(amr.hierarchy().finest_level(), 1);
        amr.evolve().unwrap();

        assert_eq!(amr.step_count(0), 3);
        assert_eq!(amr.step_count(1), 6);

        let t0 = amr.state().level(0).t_new;
        let t1 = amr.state().level(1).t_new;
        assert!((t0 - t1).abs() < 1e-12);
    }

    #[test]
    fn two_level_advection_conserves_the_total() {
        let mut config = single_level_config(32);
        config.max_level = 1;
        config.ref_ratio = vec![2];
        config.tag_thresholds = vec![0.2];
        config.do_reflux = true;
        config.regrid_int = 2;
        config.max_step = 6;

        let mut amr = Amr::new(config, Upwind).unwrap();
        let before = amr.state().level(0).new.valid_sum(0);
        amr.evolve().unwrap();
        let after = amr.state().level(0).new.valid_sum(0);

        // the coarse level carries averaged-down data everywhere, so its
        // valid sum measures the total over the hierarchy
        assert!((before - after).abs() < 1e-9, "{} vs {}", before, after);
    }

    #[test]
    fn restart_reproduces_an_uninterrupted_run() {
        let dir = tempfile::tempdir().unwrap();
        let chk_file = dir.path().join("chk").to_str().unwrap().to_string();

        let mut config = single_level_config(16);
        config.max_step = 4;
        config.chk_int = 2;
        config.chk_file = chk_file.clone();

        let mut straight = Amr::new(config.clone(), Upwind).unwrap();
        straight.evolve().unwrap();

        let mut config2 = config;
        config2.restart = Some(format!("{}{:05}", chk_file, 2));

        let mut resumed = Amr::new(config2, Upwind).unwrap();
        assert_eq!(resumed.step_count(0), 2);
        resumed.evolve().unwrap();
        assert_eq!(resumed.step_count(0), 4);

        let a = &straight.state().level(0).new;
        let b = &resumed.state().level(0).new;
        for i in 0..16 {
            for j in 0..16 {
                assert_eq!(a.value_at((i, j), 0), b.value_at((i, j), 0));
            }
        }
    }

    #[test]
    fn hook_errors_surface_with_the_level() {
        struct Failing;

        impl PatchIntegrator for Failing {
            fn init_patch(&self, _: &Geometry, patch: &mut Patch, _: f64) {
                patch.for_each_mut(|_, s| s[0] = 0.0);
            }
            fn advance_patch(
                &self, _: &Geometry, _: &Patch, _: &mut Patch,
                _: Option<&mut [Patch; 2]>, _: f64, _: f64) -> Result<(), String>
            {
                Err("blew up".to_string())
            }
        }

        let mut config = single_level_config(16);
        config.max_step = 1;

        let mut amr = Amr::new(config, Failing).unwrap();
        let err = amr.evolve().unwrap_err();
        assert!(format!("{}", err).contains("level 0"));
        assert!(format!("{}", err).contains("blew up"));
    }
}
