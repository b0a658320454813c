//! Batch-scheduler job scripts and the records of the files they involve.
//!
//! [`pbs`] stamps stage options into PBS job templates and writes the script
//! chaining their submission; [`entry`] describes the generated files.

pub mod entry;
pub mod pbs;
