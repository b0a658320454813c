use super::error::WorkflowError;
use crate::core::io::fftpl::ForcefieldTemplate;
use crate::core::io::paramconf::ParamConf;
use crate::core::io::psf::Psf;
use crate::core::io::traits::DocumentFile;
use std::fs;
use std::path::PathBuf;
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct FftplConfig {
    pub psf: PathBuf,
    /// Parameter configuration table naming the fitted charges.
    pub param_conf: PathBuf,
    pub output: PathBuf,
}

/// Builds a force-field template from a topology by replacing the seeded
/// charges with parameter placeholders.
#[instrument(skip_all, name = "fftpl_workflow")]
pub fn run(config: &FftplConfig) -> Result<ForcefieldTemplate, WorkflowError> {
    let conf = ParamConf::read_from_path(&config.param_conf)?;
    let text = fs::read_to_string(&config.psf).map_err(WorkflowError::io(&config.psf))?;
    let psf = Psf::parse(&text)?;
    info!(
        "Read {} atoms ({} format) and {} seeds for {} parameters.",
        psf.atoms.len(),
        psf.format,
        conf.seeds.len(),
        conf.params.len()
    );

    let template = ForcefieldTemplate::new(conf.params, psf.to_template(&conf.seeds)?);
    template.write_to_path(&config.output)?;
    info!("Wrote force-field template '{}'.", config.output.display());
    Ok(template)
}
