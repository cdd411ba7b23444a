//! Genetic search over piece order and rotation.
//!
//! A chromosome is a permutation of piece slots plus one rotation gene per
//! piece. Fitness is never computed analytically: every chromosome is decoded
//! by running NFP bottom-left fill with its order and rotations, and the
//! resulting utilization (scaled by the share of pieces placed) is the score.

use crate::layout::{seed_orderings, NestContext, PlacementStrategy, RotationChoice};
use crate::nfp_blf::NfpBlf;
use marker_core::ga::{
    GaConfig, GaProblem, GaProgress, GaRunner, Individual, PermutationChromosome,
};
use marker_core::solver::{ProgressCallback, ProgressInfo};
use marker_core::{Config, NestResult};
use rand::prelude::*;
use std::sync::Arc;
use std::time::Instant;

/// Order and rotation genes, plus the layout they decoded to.
#[derive(Debug, Clone)]
pub struct NestingChromosome {
    /// Placement order and per-piece rotation variant indices.
    pub genes: PermutationChromosome,
    rotation_options: Arc<[usize]>,
    layout: Option<Arc<NestResult>>,
}

impl NestingChromosome {
    /// Wraps explicit genes; `rotation_options[i]` is piece `i`'s variant count.
    pub fn new(genes: PermutationChromosome, rotation_options: Arc<[usize]>) -> Self {
        Self {
            genes,
            rotation_options,
            layout: None,
        }
    }

    /// Random order and rotations.
    pub fn random_with_options<R: Rng>(rotation_options: Arc<[usize]>, rng: &mut R) -> Self {
        let genes = PermutationChromosome::random_with_options(&rotation_options, rng);
        Self::new(genes, rotation_options)
    }

    /// Layout from the last evaluation, if any.
    pub fn layout(&self) -> Option<&NestResult> {
        self.layout.as_deref()
    }

    /// Per-piece rotation choices for the decoder.
    pub fn rotation_choices(&self) -> Vec<RotationChoice> {
        self.genes
            .rotations
            .iter()
            .map(|&r| RotationChoice::Fixed(r))
            .collect()
    }
}

impl Individual for NestingChromosome {
    type Fitness = f64;

    fn fitness(&self) -> f64 {
        self.genes.fitness()
    }

    fn random<R: Rng>(rng: &mut R) -> Self {
        Self::random_with_options(Arc::from(Vec::new()), rng)
    }

    fn crossover<R: Rng>(&self, other: &Self, rng: &mut R) -> Self {
        Self::new(
            self.genes.order_crossover(&other.genes, rng),
            Arc::clone(&self.rotation_options),
        )
    }

    fn mutate<R: Rng>(&mut self, rng: &mut R) {
        // 60% swap, 40% single rotation
        if rng.gen::<f64>() < 0.6 {
            self.genes.swap_mutate(rng);
        } else {
            self.genes.rotation_mutate(&self.rotation_options, rng);
        }
        self.layout = None;
    }
}

/// Decodes chromosomes against one nesting context.
pub struct NestingProblem<'c, 'a> {
    ctx: &'c NestContext<'a>,
    rotation_options: Arc<[usize]>,
    seeds: Vec<Vec<usize>>,
    preferred_rotations: Vec<usize>,
}

impl<'c, 'a> NestingProblem<'c, 'a> {
    /// Creates the problem; heuristic orderings seed the first individuals,
    /// each piece turned to its flattest variant that fits the strip.
    pub fn new(ctx: &'c NestContext<'a>) -> Self {
        let rotation_options: Arc<[usize]> =
            ctx.pieces.iter().map(|p| p.variant_count()).collect();
        let seeds = seed_orderings(ctx.pieces)
            .into_iter()
            .map(|(_, order)| order)
            .collect();
        let usable = ctx.strip.usable_width();
        let preferred_rotations = ctx
            .pieces
            .iter()
            .map(|piece| {
                piece
                    .fitting_variants(usable)
                    .min_by(|&a, &b| {
                        let (va, vb) = (&piece.variants()[a], &piece.variants()[b]);
                        va.height.total_cmp(&vb.height)
                    })
                    .unwrap_or(0)
            })
            .collect();
        Self {
            ctx,
            rotation_options,
            seeds,
            preferred_rotations,
        }
    }

    /// Number of pieces being ordered.
    pub fn num_pieces(&self) -> usize {
        self.ctx.pieces.len()
    }

    /// Runs the decoder for a chromosome.
    pub fn decode(&self, chromosome: &NestingChromosome) -> NestResult {
        NfpBlf.place(
            self.ctx,
            &chromosome.genes.genes,
            &chromosome.rotation_choices(),
        )
    }

    /// Utilization percentage scaled by the share of pieces placed.
    pub fn fitness_of(&self, layout: &NestResult) -> f64 {
        let total = self.num_pieces().max(1) as f64;
        layout.utilization_pct() * layout.placed_count() as f64 / total
    }
}

impl GaProblem for NestingProblem<'_, '_> {
    type Individual = NestingChromosome;

    fn evaluate(&self, individual: &mut Self::Individual) {
        let layout = self.decode(individual);
        individual.genes.set_fitness(self.fitness_of(&layout));
        individual.layout = Some(Arc::new(layout));
    }

    fn initialize_population<R: Rng>(&self, size: usize, rng: &mut R) -> Vec<Self::Individual> {
        let mut population: Vec<NestingChromosome> = self
            .seeds
            .iter()
            .take(size)
            .map(|order| {
                let genes = PermutationChromosome::from_parts(
                    order.clone(),
                    self.preferred_rotations.clone(),
                );
                NestingChromosome::new(genes, Arc::clone(&self.rotation_options))
            })
            .collect();
        while population.len() < size {
            population.push(NestingChromosome::random_with_options(
                Arc::clone(&self.rotation_options),
                rng,
            ));
        }
        population
    }

    fn on_generation(
        &self,
        generation: u32,
        best: &Self::Individual,
        _population: &[Self::Individual],
    ) {
        log::debug!(
            "GA generation {}: fitness={:.4}, placed={}/{}",
            generation,
            best.fitness(),
            best.layout().map_or(0, NestResult::placed_count),
            self.num_pieces()
        );
    }
}

/// Runs the genetic optimizer and returns the best layout it observed.
///
/// The time limit is whatever remains until the context deadline; the
/// target fitness is `config.target_utilization` as a percentage. Each
/// generation is reported to `progress` as phase `"genetic"`.
pub fn run_ga_nesting(
    ctx: &NestContext<'_>,
    config: &Config,
    progress: Option<&ProgressCallback>,
) -> NestResult {
    let mut ga_config = GaConfig::from_config(config);
    if let Some(deadline) = ctx.deadline {
        ga_config = ga_config.with_time_limit(deadline.saturating_duration_since(Instant::now()));
    }
    if let Some(target) = config.target_utilization {
        ga_config = ga_config.with_target_fitness(target * 100.0);
    }

    let runner = GaRunner::with_cancel_flag(
        ga_config,
        NestingProblem::new(ctx),
        Arc::clone(&ctx.cancelled),
    );
    let ga = runner.run_seeded_with_progress(config.seed, |p: GaProgress<f64>| {
        if let Some(callback) = progress {
            let info = ProgressInfo::new()
                .with_phase("genetic")
                .with_iteration(p.generation, p.max_generations)
                .with_utilization(p.best_fitness / 100.0)
                .with_elapsed(p.elapsed.as_millis() as u64);
            callback(if p.running { info } else { info.finished() });
        }
    });

    let mut layout = match ga.best.layout() {
        Some(layout) => layout.clone(),
        None => runner.problem().decode(&ga.best),
    };
    layout.timed_out |= ga.timed_out;
    layout.cancelled |= ga.cancelled;
    layout.target_reached = ga.target_reached;

    log::debug!(
        "GA finished after {} generations: best fitness {:.3}, {} of {} placed",
        ga.generations,
        ga.best.fitness(),
        layout.placed_count(),
        ctx.pieces.len()
    );

    layout
        .with_strategy("genetic")
        .with_generations(ga.generations)
        .with_best_fitness(ga.best.fitness())
        .with_fitness_history(ga.history)
}
