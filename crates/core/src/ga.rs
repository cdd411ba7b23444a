//! Genetic Algorithm framework for optimization.
//!
//! Crossover and mutation live on the [`Individual`]; evaluation and
//! population seeding live on the [`GaProblem`]. The runner owns the
//! generational loop: elitism, tournament selection, parallel evaluation and
//! the termination checks (generations, wall clock, target fitness,
//! stagnation, cancellation).
//!
//! All randomness flows through the RNG handed to [`GaRunner::run_with_rng`].
//! Progress is reported once per generation through a [`GaProgress`] callback.
//! Evaluation runs in parallel but is itself deterministic, so a fixed seed
//! reproduces a run exactly as long as no time limit cuts it short.

use crate::solver::Config;
use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the genetic algorithm.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GaConfig {
    /// Population size.
    pub population_size: usize,
    /// Maximum number of generations.
    pub max_generations: u32,
    /// Crossover rate (0.0 - 1.0).
    pub crossover_rate: f64,
    /// Mutation rate (0.0 - 1.0).
    pub mutation_rate: f64,
    /// Number of elite individuals to preserve each generation.
    pub elite_count: usize,
    /// Tournament size for selection.
    pub tournament_size: usize,
    /// Maximum time limit (None = unlimited).
    pub time_limit: Option<Duration>,
    /// Target fitness to stop early (None = run all generations).
    pub target_fitness: Option<f64>,
    /// Stagnation generations before early stop.
    pub stagnation_limit: Option<u32>,
}

impl Default for GaConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            max_generations: 500,
            crossover_rate: 0.85,
            mutation_rate: 0.05,
            elite_count: 5,
            tournament_size: 3,
            time_limit: None,
            target_fitness: None,
            stagnation_limit: Some(50),
        }
    }
}

impl GaConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the GA parameters from a run configuration.
    ///
    /// The time limit and target are left unset; the caller derives them from
    /// the remaining budget and its own fitness scale.
    pub fn from_config(config: &Config) -> Self {
        Self {
            population_size: config.population_size.max(2),
            max_generations: config.max_generations,
            crossover_rate: config.crossover_rate.clamp(0.0, 1.0),
            mutation_rate: config.mutation_rate.clamp(0.0, 1.0),
            elite_count: config.elite_count,
            tournament_size: config.tournament_size.max(1),
            time_limit: None,
            target_fitness: None,
            stagnation_limit: config.stagnation_limit,
        }
    }

    /// Sets the population size.
    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size.max(2);
        self
    }

    /// Sets the maximum generations.
    pub fn with_max_generations(mut self, gen: u32) -> Self {
        self.max_generations = gen;
        self
    }

    /// Sets the crossover rate.
    pub fn with_crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the mutation rate.
    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the elite count.
    pub fn with_elite_count(mut self, count: usize) -> Self {
        self.elite_count = count;
        self
    }

    /// Sets the time limit.
    pub fn with_time_limit(mut self, duration: Duration) -> Self {
        self.time_limit = Some(duration);
        self
    }

    /// Sets the target fitness.
    pub fn with_target_fitness(mut self, fitness: f64) -> Self {
        self.target_fitness = Some(fitness);
        self
    }

    /// Sets the stagnation limit.
    pub fn with_stagnation_limit(mut self, limit: Option<u32>) -> Self {
        self.stagnation_limit = limit;
        self
    }
}

/// Trait for individuals in the genetic algorithm.
pub trait Individual: Clone + Send + Sync {
    /// The fitness type (usually f64).
    type Fitness: PartialOrd + Copy + Send;

    /// Returns the fitness of this individual.
    fn fitness(&self) -> Self::Fitness;

    /// Creates a random individual.
    fn random<R: Rng>(rng: &mut R) -> Self;

    /// Performs crossover with another individual.
    fn crossover<R: Rng>(&self, other: &Self, rng: &mut R) -> Self;

    /// Mutates this individual in place.
    fn mutate<R: Rng>(&mut self, rng: &mut R);
}

/// Trait for problem-specific GA operations.
pub trait GaProblem: Send + Sync {
    /// The individual type for this problem.
    type Individual: Individual;

    /// Evaluates the fitness of an individual.
    fn evaluate(&self, individual: &mut Self::Individual);

    /// Evaluates multiple individuals in parallel.
    fn evaluate_parallel(&self, individuals: &mut [Self::Individual]) {
        individuals.par_iter_mut().for_each(|ind| {
            self.evaluate(ind);
        });
    }

    /// Creates an initial population.
    fn initialize_population<R: Rng>(&self, size: usize, rng: &mut R) -> Vec<Self::Individual> {
        (0..size).map(|_| Self::Individual::random(rng)).collect()
    }

    /// Called after each generation.
    fn on_generation(
        &self,
        _generation: u32,
        _best: &Self::Individual,
        _population: &[Self::Individual],
    ) {
    }
}

/// Progress information during GA execution.
#[derive(Debug, Clone)]
pub struct GaProgress<F> {
    /// Current generation number.
    pub generation: u32,
    /// Maximum generations configured.
    pub max_generations: u32,
    /// Best fitness so far.
    pub best_fitness: F,
    /// Average fitness of current population.
    pub avg_fitness: f64,
    /// Elapsed time since start.
    pub elapsed: Duration,
    /// Whether the algorithm is still running.
    pub running: bool,
}

/// Result of a GA run.
#[derive(Debug, Clone)]
pub struct GaResult<I: Individual> {
    /// The best individual observed over all generations.
    pub best: I,
    /// Final generation reached.
    pub generations: u32,
    /// Total elapsed time.
    pub elapsed: Duration,
    /// Whether the target fitness was reached.
    pub target_reached: bool,
    /// Whether the time limit ended the run.
    pub timed_out: bool,
    /// Whether the run was cancelled.
    pub cancelled: bool,
    /// Fitness history (best fitness per generation).
    pub history: Vec<f64>,
}

/// Genetic algorithm runner.
pub struct GaRunner<P: GaProblem> {
    config: GaConfig,
    problem: P,
    cancelled: Arc<AtomicBool>,
}

impl<P: GaProblem> GaRunner<P>
where
    <P::Individual as Individual>::Fitness: Into<f64>,
{
    /// Creates a new GA runner.
    pub fn new(config: GaConfig, problem: P) -> Self {
        Self::with_cancel_flag(config, problem, Arc::new(AtomicBool::new(false)))
    }

    /// Creates a runner that observes an existing cancellation flag.
    pub fn with_cancel_flag(config: GaConfig, problem: P, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            config,
            problem,
            cancelled,
        }
    }

    /// Returns a handle to cancel the algorithm.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Returns the problem being optimized.
    pub fn problem(&self) -> &P {
        &self.problem
    }

    /// Runs the genetic algorithm with an RNG seeded from `seed`.
    pub fn run_seeded(&self, seed: u64) -> GaResult<P::Individual> {
        self.run_seeded_with_progress(seed, |_| {})
    }

    /// Seeded run that reports every generation to `progress`.
    pub fn run_seeded_with_progress<F>(&self, seed: u64, progress: F) -> GaResult<P::Individual>
    where
        F: Fn(GaProgress<<P::Individual as Individual>::Fitness>),
    {
        self.run_with_rng(&mut StdRng::seed_from_u64(seed), progress)
    }

    /// Runs the genetic algorithm with a specific RNG and progress callback.
    pub fn run_with_rng<R: Rng, F>(&self, rng: &mut R, progress: F) -> GaResult<P::Individual>
    where
        F: Fn(GaProgress<<P::Individual as Individual>::Fitness>),
    {
        let start = Instant::now();
        let mut history = Vec::new();
        let population_size = self.config.population_size.max(2);
        let elite_count = self.config.elite_count.min(population_size);

        let mut population = self.problem.initialize_population(population_size, rng);
        if population.is_empty() {
            population.push(P::Individual::random(rng));
        }
        self.problem.evaluate_parallel(&mut population);
        sort_by_fitness(&mut population);

        let mut best = population[0].clone();
        let mut best_fitness: f64 = best.fitness().into();
        let mut stagnation_count = 0u32;
        let mut generation = 0u32;
        let mut target_reached = false;
        let mut timed_out = false;
        let mut cancelled = false;

        while generation < self.config.max_generations {
            if self.cancelled.load(Ordering::Relaxed) {
                cancelled = true;
                break;
            }

            if let Some(limit) = self.config.time_limit {
                if start.elapsed() > limit {
                    timed_out = true;
                    break;
                }
            }

            if let Some(target) = self.config.target_fitness {
                if best_fitness >= target {
                    target_reached = true;
                    break;
                }
            }

            history.push(best_fitness);

            let mut new_population: Vec<P::Individual> = population
                .iter()
                .take(elite_count)
                .cloned()
                .collect();

            let child_count = population_size.saturating_sub(new_population.len());
            let mut children: Vec<P::Individual> = Vec::with_capacity(child_count);
            while children.len() < child_count {
                let parent1 = self.tournament_select(&population, rng);
                let parent2 = self.tournament_select(&population, rng);

                let mut child = if rng.gen::<f64>() < self.config.crossover_rate {
                    parent1.crossover(parent2, rng)
                } else {
                    parent1.clone()
                };

                if rng.gen::<f64>() < self.config.mutation_rate {
                    child.mutate(rng);
                }

                children.push(child);
            }

            self.problem.evaluate_parallel(&mut children);
            new_population.extend(children);
            sort_by_fitness(&mut new_population);

            let new_best_fitness: f64 = new_population[0].fitness().into();
            if new_best_fitness > best_fitness {
                best = new_population[0].clone();
                best_fitness = new_best_fitness;
                stagnation_count = 0;
            } else {
                stagnation_count += 1;
            }

            self.problem
                .on_generation(generation, &best, &new_population);

            progress(GaProgress {
                generation,
                max_generations: self.config.max_generations,
                best_fitness: best.fitness(),
                avg_fitness: average_fitness(&new_population),
                elapsed: start.elapsed(),
                running: true,
            });

            population = new_population;
            generation += 1;

            if let Some(limit) = self.config.stagnation_limit {
                if stagnation_count >= limit {
                    log::debug!("GA stagnated after {} generations", generation);
                    break;
                }
            }
        }

        if let Some(target) = self.config.target_fitness {
            target_reached |= best_fitness >= target;
        }
        history.push(best_fitness);

        progress(GaProgress {
            generation,
            max_generations: self.config.max_generations,
            best_fitness: best.fitness(),
            avg_fitness: average_fitness(&population),
            elapsed: start.elapsed(),
            running: false,
        });

        GaResult {
            best,
            generations: generation,
            elapsed: start.elapsed(),
            target_reached,
            timed_out,
            cancelled,
            history,
        }
    }

    fn tournament_select<'a, R: Rng>(
        &self,
        population: &'a [P::Individual],
        rng: &mut R,
    ) -> &'a P::Individual {
        let mut best_idx = rng.gen_range(0..population.len());

        for _ in 1..self.config.tournament_size {
            let idx = rng.gen_range(0..population.len());
            if population[idx].fitness() > population[best_idx].fitness() {
                best_idx = idx;
            }
        }

        &population[best_idx]
    }
}

/// Stable descending sort; equal fitness keeps insertion order.
fn sort_by_fitness<I: Individual>(population: &mut [I]) {
    population.sort_by(|a, b| {
        b.fitness()
            .partial_cmp(&a.fitness())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

fn average_fitness<I: Individual>(population: &[I]) -> f64
where
    I::Fitness: Into<f64>,
{
    population.iter().map(|ind| ind.fitness().into()).sum::<f64>() / population.len().max(1) as f64
}

/// Permutation genes plus one rotation gene per item.
///
/// `rotations[i]` belongs to item `i` (not to position `i`), so crossover can
/// mix rotations independently of the order.
#[derive(Debug, Clone, PartialEq)]
pub struct PermutationChromosome {
    /// The permutation (indices).
    pub genes: Vec<usize>,
    /// Rotation option index for each item.
    pub rotations: Vec<usize>,
    /// Cached fitness value.
    fitness: f64,
}

impl PermutationChromosome {
    /// Creates the identity permutation with rotation 0 everywhere.
    pub fn new(size: usize) -> Self {
        Self::from_parts((0..size).collect(), vec![0; size])
    }

    /// Creates a chromosome from explicit genes.
    pub fn from_parts(genes: Vec<usize>, rotations: Vec<usize>) -> Self {
        Self {
            genes,
            rotations,
            fitness: f64::NEG_INFINITY,
        }
    }

    /// Creates a random chromosome; `rotation_options[i]` is the number of
    /// rotation choices for item `i`.
    pub fn random_with_options<R: Rng>(rotation_options: &[usize], rng: &mut R) -> Self {
        let mut genes: Vec<usize> = (0..rotation_options.len()).collect();
        genes.shuffle(rng);

        let rotations: Vec<usize> = rotation_options
            .iter()
            .map(|&options| rng.gen_range(0..options.max(1)))
            .collect();

        Self::from_parts(genes, rotations)
    }

    /// Returns the cached fitness value.
    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    /// Sets the fitness value.
    pub fn set_fitness(&mut self, fitness: f64) {
        self.fitness = fitness;
    }

    /// Returns the number of genes.
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    /// Returns true if empty.
    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Order crossover (OX1) on the permutation, per-gene coin flip on rotations.
    pub fn order_crossover<R: Rng>(&self, other: &Self, rng: &mut R) -> Self {
        let n = self.genes.len();
        if n < 2 || other.genes.len() != n {
            return self.clone();
        }

        let (mut p1, mut p2) = (rng.gen_range(0..n), rng.gen_range(0..n));
        if p1 > p2 {
            std::mem::swap(&mut p1, &mut p2);
        }

        // Segment from the first parent keeps its positions
        let mut child_genes = vec![usize::MAX; n];
        let mut used = vec![false; n];
        for i in p1..=p2 {
            child_genes[i] = self.genes[i];
            used[self.genes[i]] = true;
        }

        // Remaining slots take the second parent's order, starting after the segment
        let mut j = (p2 + 1) % n;
        for i in 0..n {
            let idx = (p2 + 1 + i) % n;
            if child_genes[idx] == usize::MAX {
                while used[other.genes[j]] {
                    j = (j + 1) % n;
                }
                child_genes[idx] = other.genes[j];
                used[other.genes[j]] = true;
                j = (j + 1) % n;
            }
        }

        let rotations: Vec<usize> = self
            .rotations
            .iter()
            .zip(&other.rotations)
            .map(|(a, b)| if rng.gen() { *a } else { *b })
            .collect();

        Self::from_parts(child_genes, rotations)
    }

    /// Swap mutation.
    pub fn swap_mutate<R: Rng>(&mut self, rng: &mut R) {
        if self.genes.len() < 2 {
            return;
        }

        let i = rng.gen_range(0..self.genes.len());
        let j = rng.gen_range(0..self.genes.len());
        self.genes.swap(i, j);
        self.fitness = f64::NEG_INFINITY;
    }

    /// Re-draws the rotation gene of one random item.
    pub fn rotation_mutate<R: Rng>(&mut self, rotation_options: &[usize], rng: &mut R) {
        if self.rotations.is_empty() {
            return;
        }

        let idx = rng.gen_range(0..self.rotations.len());
        let options = rotation_options.get(idx).copied().unwrap_or(1);
        if options <= 1 {
            return;
        }
        self.rotations[idx] = rng.gen_range(0..options);
        self.fitness = f64::NEG_INFINITY;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct SimpleIndividual {
        value: f64,
    }

    impl Individual for SimpleIndividual {
        type Fitness = f64;

        fn fitness(&self) -> f64 {
            // Maximize: -(x^2), optimal at x=0
            -self.value * self.value
        }

        fn random<R: Rng>(rng: &mut R) -> Self {
            Self {
                value: rng.gen_range(-100.0..100.0),
            }
        }

        fn crossover<R: Rng>(&self, other: &Self, rng: &mut R) -> Self {
            Self {
                value: if rng.gen() { self.value } else { other.value },
            }
        }

        fn mutate<R: Rng>(&mut self, rng: &mut R) {
            self.value += rng.gen_range(-10.0..10.0);
        }
    }

    struct SimpleProblem;

    impl GaProblem for SimpleProblem {
        type Individual = SimpleIndividual;

        fn evaluate(&self, _individual: &mut Self::Individual) {}
    }

    fn is_permutation(genes: &[usize]) -> bool {
        let mut sorted = genes.to_vec();
        sorted.sort_unstable();
        sorted == (0..genes.len()).collect::<Vec<_>>()
    }

    #[test]
    fn test_ga_basic() {
        let config = GaConfig::default()
            .with_population_size(50)
            .with_max_generations(100)
            .with_mutation_rate(0.5)
            .with_target_fitness(-0.01);

        let runner = GaRunner::new(config, SimpleProblem);
        let result = runner.run_seeded(7);

        assert!(result.best.value.abs() < 5.0);
        assert!(!result.history.is_empty());
    }

    #[test]
    fn test_ga_seeded_runs_are_identical() {
        let config = GaConfig::default()
            .with_population_size(20)
            .with_max_generations(30)
            .with_mutation_rate(0.3);

        let a = GaRunner::new(config.clone(), SimpleProblem).run_seeded(11);
        let b = GaRunner::new(config, SimpleProblem).run_seeded(11);
        assert_eq!(a.best.value, b.best.value);
        assert_eq!(a.history, b.history);
        assert_eq!(a.generations, b.generations);
    }

    #[test]
    fn test_ga_history_is_monotonic() {
        let config = GaConfig::default()
            .with_population_size(20)
            .with_max_generations(40)
            .with_elite_count(0)
            .with_mutation_rate(1.0);
        let result = GaRunner::new(config, SimpleProblem).run_seeded(3);
        assert!(result.history.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_ga_cancel_stops_immediately() {
        let runner = GaRunner::new(GaConfig::default(), SimpleProblem);
        runner.cancel_handle().store(true, Ordering::Relaxed);
        let result = runner.run_seeded(1);
        assert!(result.cancelled);
        assert_eq!(result.generations, 0);
    }

    #[test]
    fn test_progress_reports_every_generation() {
        use std::sync::Mutex;

        let config = GaConfig::default()
            .with_population_size(10)
            .with_max_generations(6)
            .with_stagnation_limit(None);
        let seen = Mutex::new(Vec::new());
        let result = GaRunner::new(config, SimpleProblem).run_seeded_with_progress(2, |p| {
            if let Ok(mut seen) = seen.lock() {
                seen.push((p.generation, p.running));
            }
        });

        let seen = seen.into_inner().unwrap();
        assert_eq!(result.generations, 6);
        assert_eq!(seen.len(), 7);
        assert!(seen[..6].iter().enumerate().all(|(i, &(g, running))| g == i as u32 && running));
        assert_eq!(seen[6], (6, false));
    }

    #[test]
    fn test_cancel_from_progress_callback() {
        let config = GaConfig::default()
            .with_population_size(10)
            .with_max_generations(1_000)
            .with_stagnation_limit(None);
        let runner = GaRunner::new(config, SimpleProblem);
        let handle = runner.cancel_handle();
        let result = runner.run_seeded_with_progress(4, |p| {
            if p.generation == 2 {
                handle.store(true, Ordering::Relaxed);
            }
        });
        assert!(result.cancelled);
        assert_eq!(result.generations, 3);
    }

    #[test]
    fn test_permutation_crossover() {
        let mut rng = StdRng::seed_from_u64(5);
        let options = vec![4; 10];
        let parent1 = PermutationChromosome::random_with_options(&options, &mut rng);
        let parent2 = PermutationChromosome::random_with_options(&options, &mut rng);

        for _ in 0..20 {
            let child = parent1.order_crossover(&parent2, &mut rng);
            assert_eq!(child.genes.len(), 10);
            assert!(is_permutation(&child.genes));
            for (i, r) in child.rotations.iter().enumerate() {
                assert!(*r == parent1.rotations[i] || *r == parent2.rotations[i]);
            }
        }
    }

    #[test]
    fn test_permutation_mutation() {
        let mut rng = StdRng::seed_from_u64(9);
        let options = vec![1, 2, 4, 4, 4, 1, 2, 4, 4, 4];
        let mut chromosome = PermutationChromosome::random_with_options(&options, &mut rng);

        for _ in 0..50 {
            chromosome.swap_mutate(&mut rng);
            chromosome.rotation_mutate(&options, &mut rng);
        }

        assert!(is_permutation(&chromosome.genes));
        for (i, r) in chromosome.rotations.iter().enumerate() {
            assert!(*r < options[i]);
        }
    }
}
