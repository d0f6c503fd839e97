//! `aerostate-runtime` – the state estimation pipeline.
//!
//! # Modules
//!
//! - [`config`] – [`EstimatorConfig`]: mode switches, frame naming, cycle
//!   rate, staleness bound and the fixed map origin.
//! - [`mode`] – [`select_mode`]: turns the configured switches into exactly
//!   one [`Mode`], or refuses.
//! - [`drift`] – [`DriftCorrector`]: keeps `map → odom` consistent with the
//!   selected `map → body` source.
//! - [`resolver`] – [`GlobalStateResolver`]: the `global → body` pose and
//!   global-frame velocity, holding the last good values.
//! - [`estimator`] – [`StateEstimator`]: input slots plus the per-cycle
//!   select / correct / broadcast / resolve / publish sequence.
//! - [`lifecycle`] – [`EstimatorNode`]: the managed
//!   unconfigured / inactive / active / finalized state machine.
//! - [`spin`] – [`spin_loop`]: fixed-rate async driver.
//! - [`telemetry`] – [`init_tracing`]: `tracing` subscriber with optional
//!   OTLP export.

pub mod config;
pub mod drift;
pub mod estimator;
pub mod lifecycle;
pub mod mode;
pub mod resolver;
pub mod spin;
pub mod telemetry;

pub use config::{DEFAULT_FREQUENCY_HZ, EstimatorConfig};
pub use drift::{DriftCorrector, correction};
pub use estimator::{CycleOutcome, CycleReport, StateEstimator};
pub use lifecycle::{EstimatorNode, LifecycleState, Transition};
pub use mode::{Mode, ModeFlags, select_mode};
pub use resolver::{GlobalStateResolver, VelocityEstimate};
pub use spin::spin_loop;
pub use telemetry::{TracerProviderGuard, init_tracing};
