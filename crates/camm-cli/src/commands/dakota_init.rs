use crate::cli::DakotaInitArgs;
use crate::error::Result;
use camm::workflows::dakota_init::{self, DakotaInitConfig};
use tracing::info;

pub async fn run(args: DakotaInitArgs) -> Result<()> {
    let config = DakotaInitConfig {
        template: args.fftpl,
        input_template: args.template,
        output: args.output,
    };
    if config.input_template.is_none() {
        info!("No Dakota input template given, using the built-in nl2sol setup.");
    }

    tokio::task::block_in_place(|| dakota_init::run(&config))?;
    println!("✓ Dakota input written to: {}", config.output.display());
    Ok(())
}
