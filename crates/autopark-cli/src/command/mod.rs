use clap::{Parser, Subcommand};

use self::{decode::DecodeArg, inspect::InspectArg, train::TrainArg};

mod decode;
mod inspect;
mod train;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// What mode to run the program in
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Train parking policies with the genetic algorithm
    Train(#[clap(flatten)] TrainArg),
    /// Decode a genome bit string into control coefficients
    Decode(#[clap(flatten)] DecodeArg),
    /// Validate and summarize a checkpoint file
    Inspect(#[clap(flatten)] InspectArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::Train(arg) => train::run(&arg)?,
        Mode::Decode(arg) => decode::run(&arg)?,
        Mode::Inspect(arg) => inspect::run(&arg)?,
    }
    Ok(())
}
