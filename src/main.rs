use anyhow::Result;
use clap::Parser;

use bldpop::cli::{Cli, Commands};
use bldpop::commands::{self, featurize, interpolate, predict, run, train};

fn main() -> Result<()> {
    let cli = Cli::parse();
    commands::init_logging(cli.verbose);
    match &cli.command {
        Commands::Interpolate(args) => interpolate::run(&cli, args),
        Commands::Featurize(args) => featurize::run(&cli, args),
        Commands::Train(args) => train::run(&cli, args),
        Commands::Predict(args) => predict::run(&cli, args),
        Commands::Run(args) => run::run(&cli, args),
    }
}
