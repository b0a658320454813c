//! # CAMM Core Library
//!
//! Building blocks for CAMM molecular-mechanics / neutron-scattering refinement
//! workflows: force-field parameter templating, the broker-mediated handoff
//! between the Dakota optimizer and the Kepler workflow engine, and generation
//! of batch-scheduler job scripts.
//!
//! ## Architecture
//!
//! The library is split into three layers:
//!
//! - **[`core`]: The Foundation.** Stateless data models and pure transformations:
//!   force-field parameters, tie-expression evaluation, constraint resolution,
//!   template rendering with C-style numeric formats, and the file formats that
//!   carry them (force-field template XML, Dakota files, PSF topologies, PBS scripts).
//!
//! - **[`broker`]: The Job Handoff.** Message types and the request/reply exchange
//!   over a STOMP broker. A requester posts a job and blocks until the worker answers
//!   on a per-instance reply queue; a listener turns incoming jobs into supervised
//!   worker processes.
//!
//! - **[`workflows`]: The Public API.** End-to-end procedures that read input files,
//!   drive the `core` transformations and write the results, such as updating a
//!   force field from an optimizer's parameter file.

pub mod broker;
pub mod core;
pub mod workflows;
