use crate::cli::PbsArgs;
use crate::error::{CliError, Result};
use camm::core::scheduler::pbs::PbsConfig;
use camm::workflows::pbs::{self, PbsWorkflowConfig};
use tracing::info;

pub async fn run(args: PbsArgs) -> Result<()> {
    let mut stages = match &args.stages {
        Some(path) => PbsConfig::from_file(path).map_err(|e| CliError::FileParsing {
            path: path.clone(),
            source: e.into(),
        })?,
        None => {
            info!("No stage options given, using the built-in defaults.");
            PbsConfig::default()
        }
    };
    if let Some(runs) = args.runs {
        stages.production_runs = runs;
    }

    let config = PbsWorkflowConfig {
        stages,
        workdir: args.workdir,
        queue: args.queue,
        production_conf: args.production_conf,
        output_dir: args.out_dir,
    };
    let entries = tokio::task::block_in_place(|| pbs::run(&config))?;

    println!("✓ Job chain written to: {}", config.output_dir.display());
    for entry in &entries {
        let names: Vec<String> = entry
            .names(true)
            .iter()
            .map(|path| path.display().to_string())
            .collect();
        println!("  {}", names.join(", "));
    }
    Ok(())
}
