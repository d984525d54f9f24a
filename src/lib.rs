//! Strata is a block-structured adaptive mesh refinement (AMR) engine for
//! time-dependent systems of conservation laws. It manages a hierarchy of
//! nested, rectilinear grid levels at increasing spatial resolution, advances
//! each level with its own time step (subcycled in the style of
//! Berger-Colella AMR), keeps the levels consistent through ghost-cell
//! fill-patch, conservative flux correction at coarse-fine interfaces
//! (refluxing), and downward averaging, and rebuilds the grid layouts as
//! features move (regridding). The per-cell physics is supplied from the
//! outside as an opaque patch-advance operation; this crate owns only the
//! coordination machinery.

pub mod checkpoint;
pub mod config;
pub mod driver;
pub mod error;
pub mod fill;
pub mod flux_register;
pub mod index_space;
pub mod mesh;
pub mod patch;
pub mod regrid;
pub mod state;
