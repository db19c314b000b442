use std::path::PathBuf;

use anyhow::Context as _;
use autopark_genome::{Genome, GenomeLayout};

use crate::util::{self, Output, Precision};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct DecodeArg {
    /// Genome as a string of `0` and `1` characters
    genome: String,
    /// Number of distance sensors of the car
    #[arg(long, default_value_t = GenomeLayout::SENSOR_COUNT)]
    sensor_count: usize,
    /// Number format of the coefficients (`reduced` or `half`)
    #[arg(long, default_value = "reduced")]
    precision: Precision,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &DecodeArg) -> anyhow::Result<()> {
    let DecodeArg {
        genome,
        sensor_count,
        precision,
        output,
    } = arg;
    let layout = util::genome_layout(*sensor_count, *precision);
    let genome = genome
        .parse::<Genome>()
        .context("Failed to parse genome bit string")?;
    let decoded = layout.decode(&genome).with_context(|| {
        format!(
            "Failed to decode genome of {} genes (layout expects {})",
            genome.len(),
            layout.genome_length()
        )
    })?;

    eprintln!(
        "Decoded {} engine and {} steering coefficients",
        decoded.engine_coefficients.len(),
        decoded.steering_coefficients.len()
    );
    Output::save_json(&decoded, output.clone())?;
    Ok(())
}
