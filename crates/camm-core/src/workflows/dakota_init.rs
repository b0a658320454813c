use super::error::WorkflowError;
use crate::core::io::dakota::{self, DEFAULT_INPUT_TEMPLATE};
use crate::core::io::fftpl::ForcefieldTemplate;
use crate::core::io::traits::DocumentFile;
use std::fs;
use std::path::PathBuf;
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct DakotaInitConfig {
    /// Force-field template XML declaring the free parameters.
    pub template: PathBuf,
    /// Dakota input template; the built-in nl2sol setup when absent.
    pub input_template: Option<PathBuf>,
    pub output: PathBuf,
}

/// Writes the initial Dakota input file for the free parameters of a force-field template.
#[instrument(skip_all, name = "dakota_init_workflow")]
pub fn run(config: &DakotaInitConfig) -> Result<String, WorkflowError> {
    let template = ForcefieldTemplate::read_from_path(&config.template)?;
    let input_template = match &config.input_template {
        Some(path) => fs::read_to_string(path).map_err(WorkflowError::io(path))?,
        None => DEFAULT_INPUT_TEMPLATE.to_string(),
    };

    let input = dakota::populate_variables(&input_template, &template.params)?;
    fs::write(&config.output, &input).map_err(WorkflowError::io(&config.output))?;
    info!(
        "Wrote Dakota input '{}' for {} free parameters.",
        config.output.display(),
        template.params.free().count()
    );
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::params::parameter::{Bounds, Parameter, ParameterSet};
    use tempfile::tempdir;

    fn bounds(init: f64) -> Bounds {
        Bounds {
            init: Some(init),
            minimum: Some(0.0),
            maximum: Some(1.0),
            tolerance: Some(0.01),
        }
    }

    #[test]
    fn lists_free_parameters_alphabetically() {
        let dir = tempdir().unwrap();
        let params = ParameterSet::try_from_iter([
            Parameter::free("b0", bounds(0.2)),
            Parameter::tied("FF2", "2*FF1"),
            Parameter::free("FF1", bounds(0.45)),
        ])
        .unwrap();
        let template_path = dir.path().join("fftpl.xml");
        ForcefieldTemplate::new(params, "_FF1_(%f)").write_to_path(&template_path).unwrap();

        let input_template = dir.path().join("dakota.tpl");
        fs::write(&input_template, "n=_NVAR_ d=_DESCRIPTORS_ i=_INITIAL_POINT_").unwrap();
        let config = DakotaInitConfig {
            template: template_path,
            input_template: Some(input_template),
            output: dir.path().join("dakota.in"),
        };
        let input = run(&config).unwrap();
        assert_eq!(input, "n=2 d=\t'FF1'\t'b0' i=\t0.45\t0.2");
        assert_eq!(fs::read_to_string(&config.output).unwrap(), input);
    }

    #[test]
    fn default_template_is_fully_populated() {
        let dir = tempdir().unwrap();
        let params = ParameterSet::try_from_iter([Parameter::free("FF1", bounds(0.45))]).unwrap();
        let template_path = dir.path().join("fftpl.xml");
        ForcefieldTemplate::new(params, "").write_to_path(&template_path).unwrap();

        let config = DakotaInitConfig {
            template: template_path,
            input_template: None,
            output: dir.path().join("dakota.in"),
        };
        let input = run(&config).unwrap();
        assert!(input.contains("continuous_design = 1"));
        assert!(!input.contains("_NVAR_") && !input.contains("_MAX_STEP_"));
    }
}
