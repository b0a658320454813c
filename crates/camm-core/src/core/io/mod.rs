//! Reading and writing the file formats exchanged between the workflow stages.
//!
//! - [`fftpl`] - force-field template XML: parameter declarations plus template text.
//! - [`dakota`] - Dakota parameters, results and input files.
//! - [`paramconf`] - the hand-written table declaring which parameters to fit.
//! - [`psf`] - CHARMM/NAMD PSF topologies, the source of force-field templates.

pub mod dakota;
pub mod fftpl;
pub mod paramconf;
pub mod psf;
pub mod traits;
