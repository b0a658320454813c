use super::entry::{EntryPart, FileEntry, FileKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PbsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse PBS stage configuration: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Production run count must be between 1 and 99, got {0}")]
    InvalidRunCount(u32),
    #[error("Option '{0}' must not be empty")]
    EmptyOption(&'static str),
}

/// Batch resources and files of one simulation stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct StageOptions {
    pub walltime: String,
    pub cores: u32,
    /// NAMD configuration file. For production runs `XX` stands for the run number.
    pub conf_file: String,
    pub out_file: String,
}

impl StageOptions {
    fn new(walltime: &str, cores: u32, conf_file: &str, out_file: &str) -> Self {
        Self {
            walltime: walltime.to_string(),
            cores,
            conf_file: conf_file.to_string(),
            out_file: out_file.to_string(),
        }
    }
}

/// Options for the minimization, annealing and production job chain.
///
/// ```toml
/// production-runs = 4
/// depend-suffix = "@sdb"
///
/// [minimization]
/// walltime = "0:30:00"
/// cores = 48
/// conf-file = "minimization.conf"
/// out-file = "minimization.out"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct PbsConfig {
    pub minimization: StageOptions,
    pub annealing: StageOptions,
    pub production: StageOptions,
    pub production_runs: u32,
    /// Appended to the job id in `afterok` dependencies, naming the server
    /// that owns the job.
    pub depend_suffix: String,
    /// Replaces [`DEFAULT_JOB_TEMPLATE`] when set.
    pub job_template: Option<String>,
}

impl Default for PbsConfig {
    fn default() -> Self {
        Self {
            minimization: StageOptions::new("0:30:00", 48, "minimization.conf", "minimization.out"),
            annealing: StageOptions::new("0:59:00", 48, "annealing.conf", "annealing.out"),
            production: StageOptions::new("0:59:00", 48, "productionXX.conf", "productionXX.out"),
            production_runs: 4,
            depend_suffix: "@sdb".to_string(),
            job_template: None,
        }
    }
}

impl PbsConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, PbsError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, PbsError> {
        debug!("Loading PBS stage configuration from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<(), PbsError> {
        if !(1..=99).contains(&self.production_runs) {
            return Err(PbsError::InvalidRunCount(self.production_runs));
        }
        Ok(())
    }
}

pub const DEFAULT_JOB_TEMPLATE: &str = "#PBS -S /bin/bash
#PBS -j oe
#PBS -V
#PBS -l walltime=_WALLTIME_,mppwidth=_NCORE_

#submit simulations
cd _WORKDIR_
aprun -n _NCORE_ namd2 _CONFILE_ > _OUTFILE_
";

const SUBMIT_TEMPLATE: &str = "#!/bin/bash

PBS_JOBID=$(qsub -q _QUEUE_ minimization.pbs)
echo \"qsub -q _QUEUE_ minimization.pbs\"
sleep 1s
PBS_JOBID=$(qsub -q _QUEUE_ -W depend=afterok:${PBS_JOBID}_DEPEND_ annealing.pbs)
echo \"qsub -q _QUEUE_ -W depend=afterok:${PBS_JOBID}_DEPEND_ annealing.pbs\"
sleep 1s
for run in _RUNLIST_; do
  PBS_JOBID=$(qsub -q _QUEUE_ -W depend=afterok:${PBS_JOBID}_DEPEND_ production$run.pbs)
  echo \"qsub -q _QUEUE_ -W depend=afterok:${PBS_JOBID}_DEPEND_ production$run.pbs\"
  sleep 1s
done
";

/// Stamps a stage's options into a job template.
///
/// `run` replaces the `XX` marker of production file names.
pub fn render_job(template: &str, stage: &StageOptions, workdir: &str, run: Option<&str>) -> String {
    let label = |name: &str| match run {
        Some(run) => name.replace("XX", run),
        None => name.to_string(),
    };
    template
        .replace("_WALLTIME_", &stage.walltime)
        .replace("_NCORE_", &stage.cores.to_string())
        .replace("_CONFILE_", &label(&stage.conf_file))
        .replace("_OUTFILE_", &label(&stage.out_file))
        .replace("_WORKDIR_", workdir)
}

/// Points a production configuration at the run it restarts from and the run it writes.
pub fn render_production_conf(template: &str, previous: &str, next: &str) -> String {
    template.replace("_PROPREV_", previous).replace("_PRONEXT_", next)
}

/// Renders the script submitting the whole chain, each job waiting for the
/// successful completion of the one before it.
pub fn render_submit_script(queue: &str, runs: &[String], depend_suffix: &str) -> String {
    SUBMIT_TEMPLATE
        .replace("_QUEUE_", queue)
        .replace("_RUNLIST_", &runs.join(" "))
        .replace("_DEPEND_", depend_suffix)
}

/// A file to be written, relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub contents: String,
    pub executable: bool,
}

/// Every file of a job chain, plus one entry per submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobChain {
    pub files: Vec<GeneratedFile>,
    pub entries: Vec<FileEntry>,
}

/// Plans the minimization, annealing and production jobs and the script submitting them.
///
/// `production_conf` is the template the per-run `productionNN.conf` files are
/// derived from; the first run restarts from `annealing`.
pub fn plan_chain(
    config: &PbsConfig,
    workdir: &str,
    queue: &str,
    production_conf: &str,
) -> Result<JobChain, PbsError> {
    config.validate()?;
    if workdir.is_empty() {
        return Err(PbsError::EmptyOption("workdir"));
    }
    if queue.is_empty() {
        return Err(PbsError::EmptyOption("queue"));
    }

    let template = config.job_template.as_deref().unwrap_or(DEFAULT_JOB_TEMPLATE);
    let mut chain = JobChain {
        files: Vec::new(),
        entries: Vec::new(),
    };
    let mut add = |path: String, contents: String, executable: bool| {
        chain.files.push(GeneratedFile {
            path: PathBuf::from(path),
            contents,
            executable,
        });
    };

    add(
        "minimization.pbs".to_string(),
        render_job(template, &config.minimization, workdir, None),
        false,
    );
    add(
        "annealing.pbs".to_string(),
        render_job(template, &config.annealing, workdir, None),
        false,
    );

    let runs: Vec<String> = (1..=config.production_runs).map(|i| format!("{i:02}")).collect();
    let mut previous = "annealing".to_string();
    for run in &runs {
        let next = format!("production{run}");
        add(
            format!("{next}.pbs"),
            render_job(template, &config.production, workdir, Some(run)),
            false,
        );
        add(
            config.production.conf_file.replace("XX", run),
            render_production_conf(production_conf, &previous, &next),
            false,
        );
        previous = next;
    }

    add(
        "qsub.sh".to_string(),
        render_submit_script(queue, &runs, &config.depend_suffix),
        true,
    );

    chain.entries.push(FileEntry::single("minimization.pbs", FileKind::JobScript));
    chain.entries.push(FileEntry::single("annealing.pbs", FileKind::JobScript));
    for run in &runs {
        chain.entries.push(
            FileEntry::single(format!("production{run}.pbs"), FileKind::JobScript).with_part(EntryPart::new(
                config.production.conf_file.replace("XX", run),
                FileKind::Configuration,
            )),
        );
    }
    chain.entries.push(FileEntry::single("qsub.sh", FileKind::SubmitScript));
    debug!("Planned a chain of {} jobs", runs.len() + 2);
    Ok(chain)
}
