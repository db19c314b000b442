use std::path::PathBuf;

use anyhow::Context as _;
use autopark_genome::GenomeLayout;
use autopark_training::{
    params::EvolutionParams,
    scheduler::{ManualTimer, Scheduler, SchedulerState},
};
use rand::{Rng as _, SeedableRng as _};
use rand_pcg::Pcg32;
use tracing::info;

use crate::util::{self, Output};

use self::surrogate::SurrogateSimulator;

mod surrogate;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct TrainArg {
    /// Evolution parameters JSON file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of generations to evaluate
    #[arg(long, default_value_t = 20)]
    generations: usize,
    /// Random seed (drawn from the OS when omitted)
    #[arg(long)]
    seed: Option<u64>,
    /// Checkpoint file to resume from
    #[arg(long)]
    resume: Option<PathBuf>,
    /// Output file path for the final checkpoint
    #[arg(long)]
    checkpoint: Option<PathBuf>,
    #[arg(long)]
    generation_size: Option<usize>,
    #[arg(long)]
    batch_size: Option<usize>,
    #[arg(long)]
    mutation_probability: Option<f64>,
    #[arg(long)]
    elitism_percentage: Option<f64>,
    /// Standard deviation of the noise added to surrogate losses
    #[arg(long, default_value_t = 1.0)]
    noise: f64,
}

impl TrainArg {
    fn params(&self) -> anyhow::Result<EvolutionParams> {
        let mut params = match &self.config {
            Some(path) => util::read_params_file(path)?,
            None => EvolutionParams::default(),
        };
        if let Some(size) = self.generation_size {
            params.generation_size = size;
        }
        if let Some(size) = self.batch_size {
            params.batch_size = size;
        }
        if let Some(probability) = self.mutation_probability {
            params.mutation_probability = probability;
        }
        if let Some(percentage) = self.elitism_percentage {
            params.elitism_percentage = percentage;
        }
        params.validate().context("Invalid evolution parameters")?;
        Ok(params)
    }
}

pub(crate) fn run(arg: &TrainArg) -> anyhow::Result<()> {
    let layout = GenomeLayout::PRODUCTION;
    let params = arg.params()?;
    let seed = arg.seed.unwrap_or_else(|| rand::rng().random());
    eprintln!("Seed: {seed}");

    let checkpoint = arg
        .resume
        .as_ref()
        .map(util::read_checkpoint_file)
        .transpose()?;
    // a resumed run simulates with the parameters stored in its checkpoint
    let simulated = checkpoint
        .as_ref()
        .map_or_else(|| params.clone(), |checkpoint| checkpoint.params(&params));
    let simulator = SurrogateSimulator::new(
        layout,
        simulated.generation_lifetime_seconds,
        simulated.performance_boost,
        arg.noise,
        Pcg32::seed_from_u64(seed.wrapping_add(1)),
    )?;
    eprintln!(
        "Surrogate simulator: {} sensor sweeps per candidate",
        simulator.sweep_count()
    );

    let mut scheduler = Scheduler::new(
        params,
        layout,
        simulator,
        ManualTimer::new(),
        Pcg32::seed_from_u64(seed),
    )?;
    if let Some(checkpoint) = checkpoint {
        match scheduler.restore(checkpoint) {
            Ok(()) => eprintln!(
                "Resuming at generation #{}",
                scheduler.state().generation_index()
            ),
            Err(err) => eprintln!("Checkpoint rejected ({err}), starting from scratch"),
        }
    }

    let first_generation = scheduler.state().generation_index();
    let last_generation = first_generation + arg.generations;
    info!(
        seed,
        from = first_generation,
        to = last_generation,
        "training against the surrogate simulator"
    );
    scheduler.start();
    while scheduler.state().generation_index() < last_generation {
        let generation = scheduler.state().generation_index();

        if let Some((generation_index, losses)) = scheduler.simulator_mut().evaluate_next()? {
            for (id, loss) in losses {
                scheduler.report_loss(generation_index, &id, loss);
            }
        }
        let ticket = scheduler
            .timer_mut()
            .advance_to_deadline()
            .context("Batch timer is not armed")?;
        scheduler.on_timer_fired(ticket);

        if scheduler.state().generation_index() > generation {
            print_generation_summary(scheduler.state(), generation);
        }
    }
    scheduler.stop();

    let state = scheduler.state();
    eprintln!();
    eprintln!("Training completed");
    if let Some(best) = state.all_time_best() {
        eprintln!("Best candidate:");
        eprintln!("  Generation: #{}", best.generation_index);
        eprintln!("  Plate: {}", best.id);
        eprintln!("  Loss: {:.3}", best.loss);
        eprintln!("  Genome: {}", best.genome);
        let coefficients = layout.decode(&best.genome)?;
        eprintln!("  Engine: {:.3?}", coefficients.engine_coefficients);
        eprintln!("  Steering: {:.3?}", coefficients.steering_coefficients);
    }

    let checkpoint = scheduler.checkpoint();
    Output::save_json(&checkpoint, arg.checkpoint.clone())?;

    eprintln!();
    eprintln!("Checkpoint saved successfully");
    if let Some(path) = &arg.checkpoint {
        eprintln!("  Path: {}", path.display());
    }
    eprintln!("  Saved at: {}", checkpoint.date_time);
    eprintln!("  Next generation: #{}", checkpoint.generation_index);
    eprintln!("  History: {} generations", checkpoint.loss_history.len());

    Ok(())
}

fn print_generation_summary(state: &SchedulerState, generation: usize) {
    eprintln!("Generation #{generation}:");
    match (
        state.loss_history().get(generation),
        state.avg_loss_history().get(generation),
    ) {
        (Some(min), Some(avg)) => {
            eprintln!("  Min loss:  {min:.3}");
            eprintln!("  P50 loss:  {avg:.3}");
        }
        _ => eprintln!("  No losses reported"),
    }
    if let Some(best) = state.all_time_best() {
        eprintln!(
            "  Best ever: {:.3} ({} in generation #{})",
            best.loss, best.id, best.generation_index
        );
    }
}
