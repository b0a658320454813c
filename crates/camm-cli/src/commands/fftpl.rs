use crate::cli::FftplArgs;
use crate::error::Result;
use camm::workflows::fftpl::{self, FftplConfig};
use tracing::info;

pub async fn run(args: FftplArgs) -> Result<()> {
    let config = FftplConfig {
        psf: args.psf,
        param_conf: args.param_conf,
        output: args.output,
    };

    info!("Building force-field template from {:?}", &config.psf);
    let template = tokio::task::block_in_place(|| fftpl::run(&config))?;

    let free = template.params.free().count();
    println!(
        "✓ Template with {} parameter(s) ({} free) written to: {}",
        template.params.len(),
        free,
        config.output.display()
    );
    Ok(())
}
