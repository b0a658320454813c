use crate::core::io::dakota::DakotaError;
use crate::core::io::fftpl::FftplError;
use crate::core::io::paramconf::ParamConfError;
use crate::core::io::psf::PsfError;
use crate::core::params::resolver::ResolveError;
use crate::core::scheduler::pbs::PbsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Force-field template error: {0}")]
    Fftpl(#[from] FftplError),

    #[error("Dakota file error: {0}")]
    Dakota(#[from] DakotaError),

    #[error("Parameter configuration error: {0}")]
    ParamConf(#[from] ParamConfError),

    #[error("Topology error: {0}")]
    Psf(#[from] PsfError),

    #[error("Job script error: {0}")]
    Pbs(#[from] PbsError),

    #[error("Constraint resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Cannot access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid finite-difference step {0}: expected a value in (0, 1)")]
    InvalidStep(f64),
}

impl WorkflowError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
