pub mod featurize;
pub mod interpolate;
pub mod predict;
pub mod run;
pub mod train;

use anyhow::Result;

use crate::{cli::Cli, config::PipelineConfig};

/// Route `log` output through env_logger; `-v` is info, `-vv` debug. `RUST_LOG` wins when set.
pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// The `--config` file, or defaults when none is given.
pub(crate) fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path),
        None => Ok(PipelineConfig::default()),
    }
}
