use super::error::WorkflowError;
use crate::core::scheduler::entry::FileEntry;
use crate::core::scheduler::pbs::{JobChain, PbsConfig, plan_chain};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

#[derive(Debug, Clone)]
pub struct PbsWorkflowConfig {
    pub stages: PbsConfig,
    /// Directory the jobs run in, stamped into every script.
    pub workdir: String,
    pub queue: String,
    /// Template of the production NAMD configuration, with `_PROPREV_` and `_PRONEXT_`.
    pub production_conf: PathBuf,
    /// Where the scripts are written.
    pub output_dir: PathBuf,
}

/// Writes the job scripts of a minimization, annealing and production chain
/// together with the `qsub.sh` script that submits them.
#[instrument(skip_all, name = "pbs_workflow")]
pub fn run(config: &PbsWorkflowConfig) -> Result<Vec<FileEntry>, WorkflowError> {
    let production_conf =
        fs::read_to_string(&config.production_conf).map_err(WorkflowError::io(&config.production_conf))?;
    let chain = plan_chain(&config.stages, &config.workdir, &config.queue, &production_conf)?;
    write_chain(&chain, &config.output_dir)?;
    info!(
        "Wrote {} files for {} jobs to '{}'.",
        chain.files.len(),
        chain.entries.len() - 1,
        config.output_dir.display()
    );
    Ok(chain
        .entries
        .into_iter()
        .map(|entry| entry.relative_to(&config.output_dir))
        .collect())
}

fn write_chain(chain: &JobChain, dir: &Path) -> Result<(), WorkflowError> {
    fs::create_dir_all(dir).map_err(WorkflowError::io(dir))?;
    for file in &chain.files {
        let path = dir.join(&file.path);
        fs::write(&path, &file.contents).map_err(WorkflowError::io(&path))?;
        if file.executable {
            make_executable(&path)?;
        }
        debug!("Wrote '{}'.", path.display());
    }
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), WorkflowError> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = fs::metadata(path).map_err(WorkflowError::io(path))?.permissions();
    permissions.set_mode(permissions.mode() | 0o100);
    fs::set_permissions(path, permissions).map_err(WorkflowError::io(path))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), WorkflowError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scheduler::entry::FileKind;
    use crate::core::scheduler::pbs::PbsError;
    use tempfile::tempdir;

    fn config(dir: &Path, runs: u32) -> PbsWorkflowConfig {
        let production_conf = dir.join("production.conf");
        fs::write(&production_conf, "set inputname _PROPREV_\noutputName _PRONEXT_\n").unwrap();
        PbsWorkflowConfig {
            stages: PbsConfig {
                production_runs: runs,
                ..PbsConfig::default()
            },
            workdir: "/scratch/camm".to_string(),
            queue: "premium".to_string(),
            production_conf,
            output_dir: dir.join("jobs"),
        }
    }

    #[test]
    fn writes_the_whole_chain() {
        let dir = tempdir().unwrap();
        let config = config(dir.path(), 2);
        let entries = run(&config).unwrap();

        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0].primary().path, config.output_dir.join("minimization.pbs"));
        assert!(entries[2].is_composite());
        assert!(entries[2].find(FileKind::Configuration).is_some());

        let jobs = &config.output_dir;
        for name in ["minimization.pbs", "annealing.pbs", "production01.pbs", "production02.pbs"] {
            let text = fs::read_to_string(jobs.join(name)).unwrap();
            assert!(text.contains("cd /scratch/camm"), "{name}");
        }
        let second = fs::read_to_string(jobs.join("production02.conf")).unwrap();
        assert_eq!(second, "set inputname production01\noutputName production02\n");
        let submit = fs::read_to_string(jobs.join("qsub.sh")).unwrap();
        assert!(submit.contains("premium"));
    }

    #[cfg(unix)]
    #[test]
    fn submit_script_is_executable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let config = config(dir.path(), 1);
        run(&config).unwrap();
        let mode = fs::metadata(config.output_dir.join("qsub.sh")).unwrap().permissions().mode();
        assert_ne!(mode & 0o100, 0);
    }

    #[test]
    fn invalid_run_count_writes_nothing() {
        let dir = tempdir().unwrap();
        let config = config(dir.path(), 0);
        assert!(matches!(
            run(&config),
            Err(WorkflowError::Pbs(PbsError::InvalidRunCount(0)))
        ));
        assert!(!config.output_dir.exists());
    }
}
