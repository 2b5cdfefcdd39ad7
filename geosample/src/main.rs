mod crowns;
mod options;
mod progress;
mod sample;

use anyhow::Result;
use clap::Parser;
use options::{Cli, Command};

fn main() -> Result<()> {
    let Cli { cmd } = Cli::parse();

    env_logger::init();

    match cmd {
        Command::Sample(args) => sample::run(&args.into()),
        Command::Crowns(args) => crowns::run(&args.cloud, &args.out_dir, (&args).into()),
    }
}
