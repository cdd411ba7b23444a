//! # Marker Core
//!
//! Shared types for the garment marker nesting engine.
//!
//! This crate holds everything that does not depend on a particular placement
//! strategy: the polygon geometry kernel, rigid transforms, the placement and
//! result types returned to callers, run configuration, and the genetic
//! algorithm framework used by the optimizer.
//!
//! ## Core Components
//!
//! - **Geometry kernel**: [`geom`] - area, centroid, rotation, point-in-polygon, collision predicates
//! - **Transform types**: [`Transform2D`], [`AABB2D`]
//! - **Results**: [`Placement`], [`NestResult`], [`NestSummary`]
//! - **Solver trait**: [`Solver`] - common interface for nesting engines
//! - **GA framework**: [`GaRunner`], [`GaProblem`] - genetic algorithm infrastructure
//!
//! ## Configuration
//!
//! Use [`Config`] to configure a run:
//!
//! ```rust
//! use marker_core::{Config, Strategy};
//!
//! let config = Config::new()
//!     .with_strategy(Strategy::Optimize)
//!     .with_gap(0.5)
//!     .with_time_limit(30000);
//! assert_eq!(config.margin, 0.25);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization support

pub mod error;
pub mod ga;
pub mod geom;
pub mod placement;
pub mod result;
pub mod solver;
pub mod transform;

// Re-exports
pub use error::{Error, Result};
pub use ga::{
    GaConfig, GaProblem, GaProgress, GaResult, GaRunner, Individual, PermutationChromosome,
};
pub use geom::{Point, Polygon};
pub use placement::Placement;
pub use result::{NestResult, NestSummary, Unplaced};
pub use solver::{
    Config, NestOptions, ProgressCallback, ProgressInfo, Solver, Strategy, DEFAULT_ROTATIONS,
};
pub use transform::{Transform2D, AABB2D};
