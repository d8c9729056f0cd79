use anyhow::Context;

use mlproject::{PipelineConfig, TrainingPipeline, logging};

fn main() -> anyhow::Result<()> {
    let config = PipelineConfig::discover().context("loading configuration")?;
    if let Some(path) = logging::init(&config.logs_path()) {
        eprintln!("logging to {}", path.display());
    }

    let outcome = TrainingPipeline::new(config).run().map_err(|err| {
        log::error!("{err}");
        err
    })?;

    println!("Training completed successfully. R2 Score: {}", outcome.r2_score());
    Ok(())
}
