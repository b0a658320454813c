//! # Workflows Module
//!
//! End-to-end procedures run at each step of a CAMM refinement. Each one reads its
//! input files, drives the [`crate::core`] transformations and writes its results.
//!
//! - **Force-field update** ([`ff_update`]) - Renders the force field for the
//!   optimizer's current point, optionally with finite-difference variants.
//! - **Template generation** ([`fftpl`]) - Turns a PSF topology and a parameter
//!   configuration table into a force-field template.
//! - **Dakota initialization** ([`dakota_init`]) - Writes the optimizer's input file
//!   for the free parameters of a template.
//! - **Job chain** ([`pbs`]) - Writes the PBS scripts of a minimization, annealing
//!   and production chain and the script submitting them.
//!
//! A missing input file is a hard failure, and nothing is written when a constraint
//! cannot be resolved.

pub mod dakota_init;
pub mod error;
pub mod ff_update;
pub mod fftpl;
pub mod pbs;

pub use error::WorkflowError;
