use std::path::PathBuf;

use anyhow::Context as _;
use autopark_genome::{DecodedGenome, GenomeLayout};
use autopark_training::params::EvolutionParams;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::util::{self, Output};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct InspectArg {
    /// Checkpoint file to inspect
    checkpoint: PathBuf,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckpointSummary {
    date_time: DateTime<Utc>,
    generation_index: usize,
    params: EvolutionParams,
    best_loss: Option<f64>,
    loss_history: Vec<f64>,
    avg_loss_history: Vec<f64>,
    first_genome: Option<DecodedGenome>,
}

pub(crate) fn run(arg: &InspectArg) -> anyhow::Result<()> {
    let InspectArg { checkpoint, output } = arg;
    let layout = GenomeLayout::PRODUCTION;
    let base = EvolutionParams::default();

    let path = checkpoint;
    let checkpoint = util::read_checkpoint_file(path)?;
    checkpoint
        .validate(&layout, &base)
        .with_context(|| format!("Invalid checkpoint: {}", path.display()))?;

    let first_genome = checkpoint
        .generation
        .first()
        .map(|genome| layout.decode(genome))
        .transpose()
        .context("Failed to decode the first genome")?;
    let summary = CheckpointSummary {
        date_time: checkpoint.date_time,
        generation_index: checkpoint.generation_index,
        params: checkpoint.params(&base),
        best_loss: checkpoint.loss_history.iter().copied().reduce(f64::min),
        loss_history: checkpoint.loss_history,
        avg_loss_history: checkpoint.avg_loss_history,
        first_genome,
    };

    eprintln!("Checkpoint is valid");
    eprintln!("  Saved at: {}", summary.date_time);
    eprintln!("  Generation: #{}", summary.generation_index);
    eprintln!("  Population: {} genomes", checkpoint.generation.len());
    if let Some(best_loss) = summary.best_loss {
        eprintln!("  Best loss: {best_loss:.3}");
    }
    Output::save_json(&summary, output.clone())?;
    Ok(())
}
