use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Oak Ridge National Laboratory",
    version,
    about = "CAMM CLI - Force-field templating, Dakota/Kepler job handoff and job-script generation for CAMM refinement workflows.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Broker and workflow-engine configuration (JSON)
    #[arg(short, long, global = true, value_name = "PATH", default_value = "/etc/kepler_consumer.conf")]
    pub config: PathBuf,

    /// Override a configuration value (e.g., -S params_ready_queue=TEST.PARAMS)
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", global = true)]
    pub set_values: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a force field from a template and a Dakota parameters file.
    FfUpdate(FfUpdateArgs),
    /// Build a force-field template from a PSF topology and a parameter table.
    Fftpl(FftplArgs),
    /// Write the initial Dakota input file for the free parameters of a template.
    DakotaInit(DakotaInitArgs),
    /// Write the PBS job chain (minimization, annealing, production) and its submit script.
    Pbs(PbsArgs),
    /// Hand a Dakota evaluation to the workflow engine and wait for its cost function.
    Driver(DriverArgs),
    /// Launch the workflow engine for every job posted on the params-ready queue.
    Listen,
    /// Post a finished evaluation's cost function on a reply queue.
    Report(ReportArgs),
    /// Publish an optimization status report.
    Status(StatusArgs),
    /// Log every status report published by running optimizations.
    Monitor,
}

#[derive(Args, Debug)]
pub struct FfUpdateArgs {
    /// Dakota parameters file of the current evaluation.
    #[arg(long = "dak", value_name = "PATH")]
    pub dakota_params: PathBuf,

    /// Force-field template XML.
    #[arg(long, value_name = "PATH")]
    pub fftpl: PathBuf,

    /// Output force field (e.g., ff.psf).
    #[arg(long = "ffout", value_name = "PATH")]
    pub output: PathBuf,

    /// Also write forward (_1) and backward (_0) variants with free parameters scaled by 1 ± STEP.
    #[arg(long, value_name = "FLOAT")]
    pub step: Option<f64>,
}

#[derive(Args, Debug)]
pub struct FftplArgs {
    #[arg(long, value_name = "PATH")]
    pub psf: PathBuf,

    /// Parameter configuration table (CSV).
    #[arg(long = "conf", value_name = "PATH")]
    pub param_conf: PathBuf,

    /// Output force-field template XML.
    #[arg(long = "out", value_name = "PATH", default_value = "fftpl.xml")]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct DakotaInitArgs {
    /// Force-field template XML declaring the free parameters.
    #[arg(long, value_name = "PATH")]
    pub fftpl: PathBuf,

    /// Dakota input template; a built-in nl2sol setup is used when omitted.
    #[arg(long, value_name = "PATH")]
    pub template: Option<PathBuf>,

    /// Output Dakota input file.
    #[arg(long = "outf", value_name = "PATH", default_value = "dakota.in")]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct PbsArgs {
    /// Working directory stamped into the job scripts.
    #[arg(long = "wd", value_name = "DIR")]
    pub workdir: String,

    /// Name of the qsub queue.
    #[arg(long, value_name = "NAME")]
    pub queue: String,

    /// Stage options (TOML); built-in defaults when omitted.
    #[arg(long, value_name = "PATH")]
    pub stages: Option<PathBuf>,

    /// Number of consecutive production runs, overriding the stage options.
    #[arg(long, value_name = "INT")]
    pub runs: Option<u32>,

    /// Production NAMD configuration template with _PROPREV_ and _PRONEXT_.
    #[arg(long, value_name = "PATH", default_value = "production.conf")]
    pub production_conf: PathBuf,

    /// Directory the scripts are written to.
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub out_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct DriverArgs {
    /// Parameters file written by Dakota.
    #[arg(value_name = "PARAMS_IN")]
    pub params_file: PathBuf,

    /// Results file Dakota expects.
    #[arg(value_name = "RESULTS_OUT")]
    pub results_file: PathBuf,

    /// Instance number naming the reply queue; defaults to the parent process id.
    #[arg(long, value_name = "ID")]
    pub instance: Option<String>,

    /// Working directory handed to the workflow engine.
    #[arg(short = 'd', long, value_name = "DIR", default_value = "/tmp")]
    pub work_dir: String,
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Reply queue named in the job request.
    #[arg(long, value_name = "QUEUE")]
    pub queue: String,

    /// Results file the optimizer expects.
    #[arg(long, value_name = "PATH")]
    pub output_file: String,

    /// Computed cost function.
    #[arg(long, value_name = "FLOAT", allow_negative_numbers = true)]
    pub cost: f64,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[arg(value_enum)]
    pub status: StatusKind,

    /// Optimization instance number; defaults to the parent process id.
    #[arg(long, value_name = "ID")]
    pub instance: Option<String>,

    /// Reporting user; defaults to $USER.
    #[arg(long, value_name = "NAME")]
    pub user: Option<String>,

    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub code: i64,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[value(rename_all = "snake_case")]
pub enum StatusKind {
    DakotaStart,
    StartIteration,
    StopIteration,
    DakotaStop,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_options_are_accepted_after_the_subcommand() {
        let cli = Cli::parse_from([
            "camm",
            "listen",
            "-vv",
            "--config",
            "/tmp/camm.json",
            "-S",
            "params_ready_queue=TEST",
        ]);
        assert!(matches!(cli.command, Commands::Listen));
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, PathBuf::from("/tmp/camm.json"));
        assert_eq!(cli.set_values, vec!["params_ready_queue=TEST".to_string()]);
    }

    #[test]
    fn driver_takes_dakota_positional_files() {
        let cli = Cli::parse_from(["camm", "driver", "params.in.3", "results.out.3"]);
        match cli.command {
            Commands::Driver(args) => {
                assert_eq!(args.params_file, PathBuf::from("params.in.3"));
                assert_eq!(args.results_file, PathBuf::from("results.out.3"));
                assert_eq!(args.work_dir, "/tmp");
                assert!(args.instance.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn status_names_use_the_wire_spelling() {
        let cli = Cli::parse_from(["camm", "status", "start_iteration", "--code", "-1"]);
        match cli.command {
            Commands::Status(args) => {
                assert_eq!(args.status, StatusKind::StartIteration);
                assert_eq!(args.code, -1);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn default_config_path_is_the_system_file() {
        let cli = Cli::parse_from(["camm", "monitor"]);
        assert_eq!(cli.config, PathBuf::from("/etc/kepler_consumer.conf"));
        assert!(!cli.quiet);
    }
}
