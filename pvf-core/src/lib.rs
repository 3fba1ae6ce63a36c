//! Path vector field training and pseudo-average trajectory synthesis.
//!
//! A [`model::PathVectorField`] learns a 2-D vector field over a triangular
//! lattice ([`geometry`]) from training trajectories, by an incremental,
//! order-dependent update rule. Once trained, it can walk the field from a
//! starting point to synthesize a pseudo-average trajectory.

pub mod error;
pub mod geometry;
pub mod metrics;
pub mod model;

pub use error::{ConfigurationError, InputError};
pub use geometry::{coord_from_ind, dist2node, find_trident, grid_dims, GridIndex, NodeIndex, Trident, Y_FACT};
pub use metrics::{traj_metrics, TrajectoryMetrics};
pub use model::{PathVectorField, RawState, TrainError};
