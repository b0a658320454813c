//! # Core Module
//!
//! Stateless models and transformations shared by every CAMM workflow.
//!
//! - **Parameters** ([`params`]) - Free and tied force-field parameters, the
//!   arithmetic language of tie expressions, and the constraint resolver.
//! - **Templates** ([`template`]) - Placeholder rendering (`_NAME_(%-14.6f)`) and
//!   C-style numeric formatting.
//! - **File I/O** ([`io`]) - Force-field template XML, Dakota parameter, results and
//!   input files, the parameter configuration table and PSF topologies.
//! - **Scheduling** ([`scheduler`]) - PBS job-script templating and the records
//!   describing generated job files.

pub mod io;
pub mod params;
pub mod scheduler;
pub mod template;
