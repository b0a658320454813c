use crate::cli::FfUpdateArgs;
use crate::error::Result;
use camm::workflows::ff_update::{self, FfUpdateConfig};
use tracing::info;

pub async fn run(args: FfUpdateArgs) -> Result<()> {
    let config = FfUpdateConfig {
        dakota_params: args.dakota_params,
        template: args.fftpl,
        output: args.output,
        step: args.step,
    };

    info!("Rendering force field from template {:?}", &config.template);
    let result = tokio::task::block_in_place(|| ff_update::run(&config))?;

    println!("✓ Resolved {} parameter(s).", result.values.len());
    for path in &result.written {
        println!("  Written: {}", path.display());
    }
    Ok(())
}
