//! Managed lifecycle of the estimator node.
//!
//! ```text
//!                 configure           activate
//! Unconfigured ─────────────▶ Inactive ─────────▶ Active
//!      ▲          cleanup        │  ▲  deactivate   │
//!      └─────────────────────────┘  └──────────────┘
//!
//! shutdown: any state except Finalized ──▶ Finalized
//! ```
//!
//! The [`StateEstimator`] exists only between `configure` and
//! `cleanup`/`shutdown`.  Samples delivered while it exists are buffered even
//! when the node is inactive; cycles only run while active.

use std::fmt;

use aerostate_middleware::EstimatePublisher;
use aerostate_types::{EstimatorError, Measurement};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::config::EstimatorConfig;
use crate::estimator::{CycleOutcome, StateEstimator};
use crate::mode::select_mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unconfigured,
    Inactive,
    Active,
    Finalized,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Unconfigured => "unconfigured",
            LifecycleState::Inactive => "inactive",
            LifecycleState::Active => "active",
            LifecycleState::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Configure,
    Activate,
    Deactivate,
    Cleanup,
    Shutdown,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Transition::Configure => "configure",
            Transition::Activate => "activate",
            Transition::Deactivate => "deactivate",
            Transition::Cleanup => "cleanup",
            Transition::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

impl LifecycleState {
    /// Target state of `transition`, or `None` when it is not allowed here.
    pub fn apply(self, transition: Transition) -> Option<LifecycleState> {
        use LifecycleState::*;
        match (self, transition) {
            (Unconfigured, Transition::Configure) => Some(Inactive),
            (Inactive, Transition::Activate) => Some(Active),
            (Active, Transition::Deactivate) => Some(Inactive),
            (Inactive, Transition::Cleanup) => Some(Unconfigured),
            (Finalized, Transition::Shutdown) => None,
            (_, Transition::Shutdown) => Some(Finalized),
            _ => None,
        }
    }
}

/// The estimator wrapped in its lifecycle, bound to an output sink.
///
/// # Example
///
/// ```rust
/// use aerostate_middleware::MemoryPublisher;
/// use aerostate_runtime::{EstimatorConfig, EstimatorNode, LifecycleState};
///
/// let mut node = EstimatorNode::new(EstimatorConfig::default(), MemoryPublisher::new());
/// node.configure().unwrap();
/// node.activate().unwrap();
/// assert_eq!(node.state(), LifecycleState::Active);
/// ```
pub struct EstimatorNode<P: EstimatePublisher> {
    config: EstimatorConfig,
    publisher: P,
    state: LifecycleState,
    estimator: Option<StateEstimator>,
}

impl<P: EstimatePublisher> EstimatorNode<P> {
    pub fn new(config: EstimatorConfig, publisher: P) -> Self {
        Self {
            config,
            publisher,
            state: LifecycleState::Unconfigured,
            estimator: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn estimator(&self) -> Option<&StateEstimator> {
        self.estimator.as_ref()
    }

    fn next_state(&self, transition: Transition) -> Result<LifecycleState, EstimatorError> {
        self.state
            .apply(transition)
            .ok_or_else(|| EstimatorError::InvalidTransition {
                from: self.state.to_string(),
                transition: transition.to_string(),
            })
    }

    /// Validate the configuration, select the mode and build the frame tree.
    ///
    /// On error the node stays `Unconfigured`.
    #[instrument(skip(self), fields(namespace = %self.config.namespace))]
    pub fn configure(&mut self) -> Result<(), EstimatorError> {
        let next = self.next_state(Transition::Configure)?;
        self.config.validate()?;
        let mode = select_mode(self.config.mode_flags())?;
        self.estimator = Some(StateEstimator::new(&self.config, mode, Utc::now())?);
        self.state = next;
        info!(state = %self.state, "configured");
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn activate(&mut self) -> Result<(), EstimatorError> {
        self.state = self.next_state(Transition::Activate)?;
        info!(state = %self.state, "activated");
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn deactivate(&mut self) -> Result<(), EstimatorError> {
        self.state = self.next_state(Transition::Deactivate)?;
        info!(state = %self.state, "deactivated");
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn cleanup(&mut self) -> Result<(), EstimatorError> {
        self.state = self.next_state(Transition::Cleanup)?;
        self.estimator = None;
        info!(state = %self.state, "cleaned up");
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn shutdown(&mut self) -> Result<(), EstimatorError> {
        self.state = self.next_state(Transition::Shutdown)?;
        self.estimator = None;
        info!(state = %self.state, "shut down");
        Ok(())
    }

    /// Feed one inbound sample to the estimator.
    ///
    /// # Errors
    ///
    /// - [`EstimatorError::NotConfigured`] when no estimator exists; the
    ///   sample is dropped.
    /// - [`EstimatorError::Transform`] when the sample is rejected.
    pub fn handle_measurement(&mut self, measurement: &Measurement) -> Result<(), EstimatorError> {
        let Some(estimator) = self.estimator.as_mut() else {
            debug!(state = %self.state, "sample ignored, estimator not configured");
            return Err(EstimatorError::NotConfigured);
        };
        estimator.on_measurement(measurement).map_err(|e| {
            warn!(error = %e, "rejected inbound sample");
            EstimatorError::from(e)
        })
    }

    /// Run one cycle at `now` if the node is active.
    pub fn run(&mut self, now: DateTime<Utc>) -> CycleOutcome {
        match (&mut self.estimator, self.state) {
            (Some(estimator), LifecycleState::Active) => estimator.run(now, &self.publisher),
            _ => CycleOutcome::Inactive,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use aerostate_middleware::MemoryPublisher;
    use aerostate_types::{Header, Odometry, Pose, Twist};
    use nalgebra::{Quaternion, Vector3};

    fn node(config: EstimatorConfig) -> EstimatorNode<MemoryPublisher> {
        EstimatorNode::new(config, MemoryPublisher::new())
    }

    fn odom_sample() -> Measurement {
        Measurement::Odometry(Odometry {
            header: Header::new(Utc::now(), "drone0/odom"),
            child_frame_id: "drone0/base_link".to_string(),
            pose: Pose {
                position: Vector3::new(1.0, 0.0, 0.0),
                orientation: Quaternion::identity(),
            },
            twist: Twist::default(),
        })
    }

    // ── Transition table ─────────────────────────────────────────────────────

    #[test]
    fn full_lifecycle_round_trip() {
        let mut n = node(EstimatorConfig::default());
        assert_eq!(n.state(), LifecycleState::Unconfigured);
        n.configure().unwrap();
        assert_eq!(n.state(), LifecycleState::Inactive);
        assert!(n.estimator().is_some());
        n.activate().unwrap();
        assert_eq!(n.state(), LifecycleState::Active);
        n.deactivate().unwrap();
        assert_eq!(n.state(), LifecycleState::Inactive);
        n.cleanup().unwrap();
        assert_eq!(n.state(), LifecycleState::Unconfigured);
        assert!(n.estimator().is_none());
        n.shutdown().unwrap();
        assert_eq!(n.state(), LifecycleState::Finalized);
    }

    #[test]
    fn invalid_transition_leaves_state_unchanged() {
        let mut n = node(EstimatorConfig::default());
        let err = n.activate().unwrap_err();
        assert!(matches!(err, EstimatorError::InvalidTransition { .. }));
        assert_eq!(n.state(), LifecycleState::Unconfigured);

        n.configure().unwrap();
        assert!(n.configure().is_err());
        assert!(n.deactivate().is_err());
        assert_eq!(n.state(), LifecycleState::Inactive);
    }

    #[test]
    fn shutdown_is_terminal() {
        let mut n = node(EstimatorConfig::default());
        n.configure().unwrap();
        n.activate().unwrap();
        n.shutdown().unwrap();
        assert!(n.estimator().is_none());
        assert!(n.shutdown().is_err());
        assert!(n.configure().is_err());
        assert_eq!(n.state(), LifecycleState::Finalized);
    }

    // ── Configure failures ───────────────────────────────────────────────────

    #[test]
    fn conflicting_modes_stay_unconfigured() {
        let mut n = node(EstimatorConfig {
            odom_only: true,
            ground_truth: true,
            ..Default::default()
        });
        assert!(matches!(n.configure(), Err(EstimatorError::ConflictingModes(_))));
        assert_eq!(n.state(), LifecycleState::Unconfigured);
        assert!(n.estimator().is_none());
    }

    #[test]
    fn sensor_fusion_stays_unconfigured() {
        let mut n = node(EstimatorConfig {
            sensor_fusion: true,
            ..Default::default()
        });
        assert!(matches!(n.configure(), Err(EstimatorError::ModeNotImplemented(_))));
        assert_eq!(n.state(), LifecycleState::Unconfigured);
    }

    #[test]
    fn base_frame_colliding_with_odom_stays_unconfigured() {
        let mut n = node(EstimatorConfig {
            base_frame: "odom".to_string(),
            ..Default::default()
        });
        assert!(matches!(n.configure(), Err(EstimatorError::Config(_))));
        assert_eq!(n.state(), LifecycleState::Unconfigured);
        assert!(n.estimator().is_none());
    }

    #[test]
    fn invalid_config_stays_unconfigured() {
        let mut n = node(EstimatorConfig {
            frequency_hz: 0.0,
            ..Default::default()
        });
        assert!(matches!(n.configure(), Err(EstimatorError::Config(_))));
        assert_eq!(n.state(), LifecycleState::Unconfigured);
    }

    // ── Samples and cycles ───────────────────────────────────────────────────

    #[test]
    fn samples_before_configure_are_ignored() {
        let mut n = node(EstimatorConfig::default());
        assert!(matches!(
            n.handle_measurement(&odom_sample()),
            Err(EstimatorError::NotConfigured)
        ));
    }

    #[test]
    fn inactive_node_buffers_but_does_not_cycle() {
        let mut n = node(EstimatorConfig::default());
        n.configure().unwrap();
        n.handle_measurement(&odom_sample()).unwrap();
        assert_eq!(n.run(Utc::now()), CycleOutcome::Inactive);
        assert!(n.publisher().is_empty());

        n.activate().unwrap();
        assert!(matches!(n.run(Utc::now()), CycleOutcome::Completed(_)));
        assert!(n.publisher().last_pose().is_some());
    }

    #[test]
    fn rejected_sample_maps_to_transform_error() {
        let mut n = node(EstimatorConfig::default());
        n.configure().unwrap();
        let mut sample = odom_sample();
        if let Measurement::Odometry(odom) = &mut sample {
            odom.pose.position.x = f64::NAN;
        }
        assert!(matches!(
            n.handle_measurement(&sample),
            Err(EstimatorError::Transform(_))
        ));
        assert!(!n.estimator().unwrap().is_ready());
    }
}
