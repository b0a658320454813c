use super::error::WorkflowError;
use crate::core::io::dakota;
use crate::core::io::fftpl::ForcefieldTemplate;
use crate::core::io::traits::DocumentFile;
use crate::core::params::resolver::{ResolvedValues, resolve};
use crate::core::template::render;
use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

#[derive(Debug, Clone)]
pub struct FfUpdateConfig {
    /// Parameters file written by Dakota for this evaluation.
    pub dakota_params: PathBuf,
    /// Force-field template XML.
    pub template: PathBuf,
    pub output: PathBuf,
    /// Relative step of the forward/backward finite-difference variants.
    pub step: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct FfUpdateResult {
    pub values: ResolvedValues,
    /// Every file written: the scaled parameter files, then the main force
    /// field and its variants.
    pub written: Vec<PathBuf>,
}

/// Renders a concrete force field from a template and the optimizer's current point.
///
/// Every variant is resolved and rendered before anything touches the disk, so a
/// failing tie expression leaves no output behind.
#[instrument(skip_all, name = "ff_update_workflow")]
pub fn run(config: &FfUpdateConfig) -> Result<FfUpdateResult, WorkflowError> {
    let template = ForcefieldTemplate::read_from_path(&config.template)?;
    let params_text =
        fs::read_to_string(&config.dakota_params).map_err(WorkflowError::io(&config.dakota_params))?;
    let free_values = dakota::parse_params(&params_text)?;
    info!(
        "Loaded {} parameters from template, {} values from optimizer.",
        template.params.len(),
        free_values.len()
    );

    let values = resolve(&template.params, &free_values)?;
    let mut outputs = vec![(config.output.clone(), render(&template.template, &values))];
    let mut params_variants = Vec::new();
    let mut written = Vec::new();

    if let Some(step) = config.step {
        if !(step > 0.0 && step < 1.0) {
            return Err(WorkflowError::InvalidStep(step));
        }
        for (suffix, factor) in [("1", 1.0 + step), ("0", 1.0 - step)] {
            let scaled: IndexMap<String, f64> = free_values
                .iter()
                .map(|(name, value)| (name.clone(), value * factor))
                .collect();
            let variant = resolve(&template.params, &scaled)?;
            outputs.push((variant_path(&config.output, suffix), render(&template.template, &variant)));
            params_variants.push((
                suffixed_path(&config.dakota_params, suffix),
                dakota::scale_params(&params_text, factor)?,
            ));
        }
    }

    for (path, text) in params_variants {
        fs::write(&path, text).map_err(WorkflowError::io(&path))?;
        info!("Wrote scaled parameters '{}'.", path.display());
        written.push(path);
    }

    for (path, text) in outputs {
        if text.contains("_(%") {
            warn!("'{}' still holds unsubstituted placeholders.", path.display());
        }
        fs::write(&path, text).map_err(WorkflowError::io(&path))?;
        info!("Wrote force field '{}'.", path.display());
        written.push(path);
    }
    Ok(FfUpdateResult { values, written })
}

/// `params.in.3` becomes `params.in.3_1` for suffix `1`.
pub fn suffixed_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!("_{suffix}"));
    path.with_file_name(name)
}

/// `ff.psf` becomes `ff_1.psf` for suffix `1`.
pub fn variant_path(path: &Path, suffix: &str) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{stem}_{suffix}"),
    };
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::params::parameter::{Bounds, Parameter, ParameterSet};
    use crate::core::params::resolver::ResolveError;
    use tempfile::tempdir;

    fn write_inputs(dir: &Path, tie: &str) -> FfUpdateConfig {
        let params = ParameterSet::try_from_iter([
            Parameter::free("FF1", Bounds::default()),
            Parameter::tied("FF2", tie),
        ])
        .unwrap();
        let template = ForcefieldTemplate::new(params, "q1 _FF1_(%-14.6f)| q2 _FF2_(%-14.6f)| _UNKNOWN_(%f)\n");
        let template_path = dir.join("fftpl.xml");
        template.write_to_path(&template_path).unwrap();

        let params_path = dir.join("params.in.3");
        fs::write(&params_path, "1 variables\n4.500000000000000e-01 FF1\n1 functions\n").unwrap();

        FfUpdateConfig {
            dakota_params: params_path,
            template: template_path,
            output: dir.join("ff.psf"),
            step: None,
        }
    }

    #[test]
    fn renders_free_and_tied_values() {
        let dir = tempdir().unwrap();
        let config = write_inputs(dir.path(), "2*FF1");
        let result = run(&config).unwrap();

        assert_eq!(result.values["FF2"], 0.9);
        assert_eq!(result.written, vec![config.output.clone()]);
        let text = fs::read_to_string(&config.output).unwrap();
        assert_eq!(text, "q1 0.450000      | q2 0.900000      | _UNKNOWN_(%f)\n");
    }

    #[test]
    fn unresolved_tie_writes_nothing() {
        let dir = tempdir().unwrap();
        let mut config = write_inputs(dir.path(), "2*FF9");
        config.step = Some(0.01);
        match run(&config) {
            Err(WorkflowError::Resolve(ResolveError::UnresolvedReference { reference, .. })) => {
                assert_eq!(reference, "FF9")
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(!config.output.exists());
        assert!(!dir.path().join("ff_1.psf").exists());
        assert!(!dir.path().join("params.in.3_1").exists());
    }

    #[test]
    fn step_writes_forward_and_backward_variants() {
        let dir = tempdir().unwrap();
        let mut config = write_inputs(dir.path(), "2*FF1");
        config.step = Some(0.01);
        let result = run(&config).unwrap();
        assert_eq!(result.written.len(), 5);
        assert_eq!(result.written[0], dir.path().join("params.in.3_1"));
        assert_eq!(result.written[2], config.output);

        let forward = fs::read_to_string(dir.path().join("ff_1.psf")).unwrap();
        let backward = fs::read_to_string(dir.path().join("ff_0.psf")).unwrap();
        assert!(forward.starts_with("q1 0.454500      | q2 0.909000"));
        assert!(backward.starts_with("q1 0.445500      | q2 0.891000"));

        let forward = fs::read_to_string(dir.path().join("params.in.3_1")).unwrap();
        let backward = fs::read_to_string(dir.path().join("params.in.3_0")).unwrap();
        assert!((dakota::parse_params(&forward).unwrap()["FF1"] - 0.4545).abs() < 1e-12);
        assert!((dakota::parse_params(&backward).unwrap()["FF1"] - 0.4455).abs() < 1e-12);
        assert!(forward.ends_with("1 functions\n"));
    }

    #[test]
    fn rejects_out_of_range_steps() {
        let dir = tempdir().unwrap();
        let mut config = write_inputs(dir.path(), "2*FF1");
        config.step = Some(1.5);
        assert!(matches!(run(&config), Err(WorkflowError::InvalidStep(_))));
        assert!(!config.output.exists());
    }

    #[test]
    fn missing_params_file_is_a_hard_failure() {
        let dir = tempdir().unwrap();
        let mut config = write_inputs(dir.path(), "2*FF1");
        config.dakota_params = dir.path().join("absent.in");
        assert!(matches!(run(&config), Err(WorkflowError::Io { .. })));
    }

    #[test]
    fn variant_names_keep_the_extension() {
        assert_eq!(variant_path(Path::new("/w/ff.psf"), "1"), PathBuf::from("/w/ff_1.psf"));
        assert_eq!(variant_path(Path::new("forcefield"), "0"), PathBuf::from("forcefield_0"));
        assert_eq!(
            suffixed_path(Path::new("/w/params.in.3"), "0"),
            PathBuf::from("/w/params.in.3_0")
        );
    }
}
