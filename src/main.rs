use anyhow::Result;
use clap::Parser;
use env_logger::Env;

use usmatch::cli::SubCommandExtend;
use usmatch::config::{Opts, SubCommand};

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();
    match &opts.subcmd {
        SubCommand::Remap(cmd) => cmd.run(&opts),
        SubCommand::Pair(cmd) => cmd.run(&opts),
        SubCommand::Similar(cmd) => cmd.run(&opts),
        SubCommand::Show(cmd) => cmd.run(&opts),
    }
}
