//! Nest result representation.

use crate::placement::Placement;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A piece that did not make it onto the strip.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Unplaced {
    /// Source index of the piece.
    pub piece_id: usize,
    /// Human-readable reason.
    pub reason: String,
}

impl Unplaced {
    /// Creates a new unplaced entry.
    pub fn new(piece_id: usize, reason: impl Into<String>) -> Self {
        Self {
            piece_id,
            reason: reason.into(),
        }
    }
}

/// Result of a nesting run: one marker layout on a strip.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NestResult {
    /// Placements in the order they were made.
    pub placements: Vec<Placement>,

    /// Strip (fabric) width.
    pub strip_width: f64,

    /// Consumed strip length: highest Y over all placed outlines.
    pub length: f64,

    /// Utilization ratio (0.0 - 1.0): placed area / (width * length).
    pub utilization: f64,

    /// True when the input was empty or at least one piece was placed.
    pub success: bool,

    /// Pieces that could not be placed, each with a reason.
    pub unplaced: Vec<Unplaced>,

    /// Diagnostic message for failed runs.
    pub message: Option<String>,

    /// Strategy that produced this layout.
    pub strategy: Option<String>,

    /// Computation time in milliseconds.
    pub computation_time_ms: u64,

    /// Number of generations (for GA runs).
    pub generations: Option<u32>,

    /// Best fitness value achieved (for GA runs).
    pub best_fitness: Option<f64>,

    /// Best fitness per generation (for GA runs).
    pub fitness_history: Option<Vec<f64>>,

    /// Whether the time budget expired before the run finished.
    pub timed_out: bool,

    /// Whether the run was cancelled.
    pub cancelled: bool,

    /// Whether the target utilization was reached.
    pub target_reached: bool,
}

impl NestResult {
    /// Creates an empty layout on a strip of the given width.
    pub fn new(strip_width: f64) -> Self {
        Self {
            placements: Vec::new(),
            strip_width,
            length: 0.0,
            utilization: 0.0,
            success: true,
            unplaced: Vec::new(),
            message: None,
            strategy: None,
            computation_time_ms: 0,
            generations: None,
            best_fitness: None,
            fitness_history: None,
            timed_out: false,
            cancelled: false,
            target_reached: false,
        }
    }

    /// Builds a layout and derives length, utilization and success.
    pub fn from_placements(
        placements: Vec<Placement>,
        strip_width: f64,
        unplaced: Vec<Unplaced>,
    ) -> Self {
        let mut result = Self::new(strip_width);
        result.placements = placements;
        result.unplaced = unplaced;
        result.recompute();
        result
    }

    /// Recomputes length, utilization and success from the placements.
    pub fn recompute(&mut self) {
        self.length = self
            .placements
            .iter()
            .map(Placement::top)
            .fold(0.0, f64::max);
        let placed_area: f64 = self.placements.iter().map(Placement::area).sum();
        let strip_area = self.strip_width * self.length;
        self.utilization = if strip_area > 0.0 {
            placed_area / strip_area
        } else {
            0.0
        };
        self.success = !self.placements.is_empty() || self.unplaced.is_empty();
    }

    /// Utilization as a percentage (0 - 100).
    pub fn utilization_pct(&self) -> f64 {
        self.utilization * 100.0
    }

    /// Returns utilization as a percentage string.
    pub fn utilization_percent(&self) -> String {
        format!("{:.1}%", self.utilization * 100.0)
    }

    /// Returns the number of placed pieces.
    pub fn placed_count(&self) -> usize {
        self.placements.len()
    }

    /// Returns the number of unplaced pieces.
    pub fn unplaced_count(&self) -> usize {
        self.unplaced.len()
    }

    /// Returns true if every piece was placed.
    pub fn all_placed(&self) -> bool {
        self.unplaced.is_empty()
    }

    /// Ranking used to pick between layouts: more pieces placed first, then
    /// higher utilization, then shorter length. Ties keep `other`.
    pub fn is_better_than(&self, other: &NestResult) -> bool {
        if self.placed_count() != other.placed_count() {
            return self.placed_count() > other.placed_count();
        }
        if (self.utilization - other.utilization).abs() > 1e-9 {
            return self.utilization > other.utilization;
        }
        self.length < other.length - 1e-9
    }

    /// Sets the strategy name.
    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }

    /// Sets the generations count.
    pub fn with_generations(mut self, generations: u32) -> Self {
        self.generations = Some(generations);
        self
    }

    /// Sets the best fitness.
    pub fn with_best_fitness(mut self, fitness: f64) -> Self {
        self.best_fitness = Some(fitness);
        self
    }

    /// Sets the fitness history.
    pub fn with_fitness_history(mut self, history: Vec<f64>) -> Self {
        self.fitness_history = Some(history);
        self
    }

    /// Removes repeated unplaced entries for the same piece, keeping the first reason.
    pub fn deduplicate_unplaced(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.unplaced.retain(|u| seen.insert(u.piece_id));
    }

}

/// Summary statistics for a nest result.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NestSummary {
    /// Total pieces requested.
    pub total_requested: usize,
    /// Total pieces placed.
    pub total_placed: usize,
    /// Utilization percentage.
    pub utilization_percent: f64,
    /// Consumed strip length.
    pub length: f64,
    /// Computation time in milliseconds.
    pub time_ms: u64,
    /// Strategy used.
    pub strategy: String,
}

impl From<&NestResult> for NestSummary {
    fn from(result: &NestResult) -> Self {
        Self {
            total_requested: result.placements.len() + result.unplaced.len(),
            total_placed: result.placements.len(),
            utilization_percent: result.utilization * 100.0,
            length: result.length,
            time_ms: result.computation_time_ms,
            strategy: result
                .strategy
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square_at(id: usize, x: f64, y: f64, size: f64) -> Placement {
        let sq = vec![(0.0, 0.0), (size, 0.0), (size, size), (0.0, size)];
        Placement::new(id, 0.0, 0, x, y, &sq)
    }

    #[test]
    fn test_empty_result_is_successful() {
        let result = NestResult::from_placements(Vec::new(), 100.0, Vec::new());
        assert!(result.success);
        assert_relative_eq!(result.length, 0.0);
        assert_relative_eq!(result.utilization, 0.0);
        assert!(result.all_placed());
    }

    #[test]
    fn test_length_and_utilization() {
        let result = NestResult::from_placements(
            vec![square_at(0, 0.0, 0.0, 10.0), square_at(1, 10.0, 0.0, 10.0)],
            40.0,
            Vec::new(),
        );
        assert_relative_eq!(result.length, 10.0);
        assert_relative_eq!(result.utilization, 0.5);
        assert_relative_eq!(result.utilization_pct(), 50.0);
        assert_eq!(result.utilization_percent(), "50.0%");
    }

    #[test]
    fn test_overlapping_layout_reports_raw_utilization() {
        // stacked squares break the area bound; the ratio must show it
        let result = NestResult::from_placements(
            vec![square_at(0, 0.0, 0.0, 10.0), square_at(1, 0.0, 0.0, 10.0)],
            10.0,
            Vec::new(),
        );
        assert_relative_eq!(result.utilization, 2.0);
        assert!(result.length * result.strip_width < 200.0);
    }

    #[test]
    fn test_all_rejected_is_failure() {
        let result =
            NestResult::from_placements(Vec::new(), 10.0, vec![Unplaced::new(0, "too wide")]);
        assert!(!result.success);
        assert_eq!(result.unplaced_count(), 1);
    }

    #[test]
    fn test_ranking_prefers_placed_count_then_utilization() {
        let two = NestResult::from_placements(
            vec![square_at(0, 0.0, 0.0, 10.0), square_at(1, 0.0, 10.0, 10.0)],
            20.0,
            Vec::new(),
        );
        let one_dense =
            NestResult::from_placements(vec![square_at(0, 0.0, 0.0, 10.0)], 10.0, Vec::new());
        assert!(two.is_better_than(&one_dense));
        assert!(!one_dense.is_better_than(&two));

        let side_by_side = NestResult::from_placements(
            vec![square_at(0, 0.0, 0.0, 10.0), square_at(1, 10.0, 0.0, 10.0)],
            20.0,
            Vec::new(),
        );
        assert!(side_by_side.is_better_than(&two));
        assert!(!two.is_better_than(&two.clone()));
    }

    #[test]
    fn test_summary() {
        let mut result =
            NestResult::from_placements(vec![square_at(0, 0.0, 0.0, 10.0)], 20.0, Vec::new());
        result.computation_time_ms = 100;
        let result = result.with_strategy("skyline");

        let summary = NestSummary::from(&result);
        assert_eq!(summary.total_placed, 1);
        assert_relative_eq!(summary.utilization_percent, 50.0);
        assert_eq!(summary.strategy, "skyline");
    }

    #[test]
    fn test_deduplicate_unplaced() {
        let mut result = NestResult::new(10.0);
        result.unplaced.push(Unplaced::new(1, "too wide"));
        result.unplaced.push(Unplaced::new(1, "no room"));
        result.unplaced.push(Unplaced::new(2, "too wide"));
        result.deduplicate_unplaced();
        assert_eq!(result.unplaced.len(), 2);
        assert_eq!(result.unplaced[0].reason, "too wide");
    }
}
