//! Solver traits and configuration.

use crate::error::{Error, Result};
use crate::result::NestResult;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default candidate rotation angles in degrees.
pub const DEFAULT_ROTATIONS: [f64; 4] = [0.0, 90.0, 180.0, 270.0];

/// Effort level requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Strategy {
    /// Constructive strategies plus NFP bottom-left-fill and compaction.
    #[default]
    Fast,
    /// Everything in `Fast`, followed by the genetic optimizer.
    Optimize,
}

/// Common configuration for a nesting run.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// Effort level.
    pub strategy: Strategy,

    /// Minimum clearance between pieces.
    pub spacing: f64,

    /// Clearance between pieces and the strip's side and bottom edges.
    pub margin: f64,

    /// Candidate rotation angles in degrees.
    pub rotations_deg: Vec<f64>,

    /// Maximum computation time in milliseconds (0 = unlimited).
    pub time_limit_ms: u64,

    /// Target utilization (0.0 - 1.0). The optimizer stops once reached.
    pub target_utilization: Option<f64>,

    /// Number of worker threads (0 = rayon's global pool).
    pub threads: usize,

    // GA-specific parameters
    /// Population size for GA.
    pub population_size: usize,

    /// Number of generations for GA.
    pub max_generations: u32,

    /// Crossover rate for GA (0.0 - 1.0).
    pub crossover_rate: f64,

    /// Mutation rate for GA (0.0 - 1.0).
    pub mutation_rate: f64,

    /// Elite count for GA.
    pub elite_count: usize,

    /// Tournament size for GA selection.
    pub tournament_size: usize,

    /// Generations without improvement before the GA stops (None = never).
    pub stagnation_limit: Option<u32>,

    /// Maximum slide-and-compact passes.
    pub compaction_passes: usize,

    /// Seed for the optimizer's RNG.
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            spacing: 0.0,
            margin: 0.0,
            rotations_deg: DEFAULT_ROTATIONS.to_vec(),
            time_limit_ms: 30000,
            target_utilization: None,
            threads: 0,
            population_size: 30,
            max_generations: 100,
            crossover_rate: 0.85,
            mutation_rate: 0.1,
            elite_count: 2,
            tournament_size: 3,
            stagnation_limit: Some(25),
            compaction_passes: 5,
            seed: 42,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the effort level.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the spacing between pieces.
    pub fn with_spacing(mut self, spacing: f64) -> Self {
        self.spacing = spacing;
        self
    }

    /// Sets the margin from the strip edges.
    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    /// Sets the clearance gap: full gap between pieces, half toward the strip edges.
    pub fn with_gap(mut self, gap: f64) -> Self {
        self.spacing = gap;
        self.margin = gap / 2.0;
        self
    }

    /// Sets the candidate rotation angles.
    pub fn with_rotations(mut self, degrees: Vec<f64>) -> Self {
        self.rotations_deg = degrees;
        self
    }

    /// Sets the time limit in milliseconds.
    pub fn with_time_limit(mut self, ms: u64) -> Self {
        self.time_limit_ms = ms;
        self
    }

    /// Sets the target utilization.
    pub fn with_target_utilization(mut self, util: f64) -> Self {
        self.target_utilization = Some(util.clamp(0.0, 1.0));
        self
    }

    /// Sets the number of worker threads.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Sets the GA population size.
    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size.max(2);
        self
    }

    /// Sets the GA generation limit.
    pub fn with_max_generations(mut self, generations: u32) -> Self {
        self.max_generations = generations;
        self
    }

    /// Sets the GA mutation rate.
    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the GA elite count.
    pub fn with_elite_count(mut self, count: usize) -> Self {
        self.elite_count = count;
        self
    }

    /// Sets the GA stagnation limit.
    pub fn with_stagnation_limit(mut self, limit: Option<u32>) -> Self {
        self.stagnation_limit = limit;
        self
    }

    /// Sets the maximum number of compaction passes.
    pub fn with_compaction_passes(mut self, passes: usize) -> Self {
        self.compaction_passes = passes;
        self
    }

    /// Sets the optimizer seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Checks that the configuration can drive a run.
    pub fn validate(&self) -> Result<()> {
        if !self.spacing.is_finite() || self.spacing < 0.0 {
            return Err(Error::ConfigError(format!(
                "gap must be finite and non-negative, got {}",
                self.spacing
            )));
        }
        if !self.margin.is_finite() || self.margin < 0.0 {
            return Err(Error::ConfigError(format!(
                "margin must be finite and non-negative, got {}",
                self.margin
            )));
        }
        if self.rotations_deg.iter().any(|a| !a.is_finite()) {
            return Err(Error::ConfigError("rotation angles must be finite".into()));
        }
        Ok(())
    }
}

/// Caller-facing options: `{ max_seconds, target_utilization_pct, strategy }`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NestOptions {
    /// Wall-clock budget in seconds (0 = unlimited).
    pub max_seconds: f64,
    /// Stop optimizing once this utilization percentage is reached.
    pub target_utilization_pct: Option<f64>,
    /// Effort level.
    pub strategy: Strategy,
}

impl Default for NestOptions {
    fn default() -> Self {
        Self {
            max_seconds: 30.0,
            target_utilization_pct: None,
            strategy: Strategy::Fast,
        }
    }
}

impl NestOptions {
    /// Converts the options into a run configuration for the given gap.
    pub fn to_config(&self, gap: f64) -> Config {
        let mut config = Config::new()
            .with_gap(gap)
            .with_strategy(self.strategy)
            .with_time_limit(seconds_to_ms(self.max_seconds));
        if let Some(pct) = self.target_utilization_pct {
            config = config.with_target_utilization(pct / 100.0);
        }
        config
    }
}

fn seconds_to_ms(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    }
}

/// Progress callback for long-running operations.
pub type ProgressCallback = Box<dyn Fn(ProgressInfo) + Send + Sync>;

/// Progress information during solving.
#[derive(Debug, Clone, Default)]
pub struct ProgressInfo {
    /// Current iteration/generation number.
    pub iteration: u32,
    /// Total expected iterations (0 if unknown).
    pub total_iterations: u32,
    /// Current best utilization (0.0 to 1.0).
    pub utilization: f64,
    /// Number of pieces placed in the current best layout.
    pub items_placed: usize,
    /// Total number of pieces.
    pub total_items: usize,
    /// Elapsed time in milliseconds.
    pub elapsed_ms: u64,
    /// Current phase description.
    pub phase: String,
    /// Whether the solver is still running.
    pub running: bool,
}

impl ProgressInfo {
    /// Creates a new progress info with default values.
    pub fn new() -> Self {
        Self {
            running: true,
            ..Default::default()
        }
    }

    /// Sets the iteration info.
    pub fn with_iteration(mut self, current: u32, total: u32) -> Self {
        self.iteration = current;
        self.total_iterations = total;
        self
    }

    /// Sets the utilization.
    pub fn with_utilization(mut self, utilization: f64) -> Self {
        self.utilization = utilization;
        self
    }

    /// Sets the items placed info.
    pub fn with_items(mut self, placed: usize, total: usize) -> Self {
        self.items_placed = placed;
        self.total_items = total;
        self
    }

    /// Sets the elapsed time.
    pub fn with_elapsed(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }

    /// Sets the phase description.
    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = phase.into();
        self
    }

    /// Marks the solver as finished.
    pub fn finished(mut self) -> Self {
        self.running = false;
        self
    }
}

/// Trait for strip nesting solvers.
pub trait Solver {
    /// The piece type this solver handles.
    type Piece;
    /// The strip type this solver handles.
    type Strip;

    /// Nests the pieces onto the strip.
    fn solve(&self, pieces: &[Self::Piece], strip: &Self::Strip) -> Result<NestResult>;

    /// Nests with a progress callback.
    fn solve_with_progress(
        &self,
        pieces: &[Self::Piece],
        strip: &Self::Strip,
        callback: ProgressCallback,
    ) -> Result<NestResult>;

    /// Cancels an ongoing run. The run returns its best layout so far.
    fn cancel(&self);
}
