//! [`StateEstimator`] – one instance of the estimation pipeline.
//!
//! Each call to [`StateEstimator::run`] performs one cycle:
//!
//! 1. **Select** – the active [`Mode`] picks the `map → body` source
//!    (odometry, ground truth).
//! 2. **Correct** – the [`DriftCorrector`] recomputes `map → odom`, or holds
//!    it when no source is available.
//! 3. **Broadcast** – fixed offsets, `map → odom` and `odom → body` are sent
//!    to the [`EstimatePublisher`].
//! 4. **Resolve** – the [`GlobalStateResolver`] composes `global → body` and
//!    converts the velocity into the global frame.
//! 5. **Publish** – the pose and velocity estimates are published.
//!
//! Inbound samples are written through `on_*` methods between cycles.  Each
//! input owns one slot: odometry writes the `odom → body` edge and the body
//! velocity, ground truth writes its own pose and velocity buffers.
//!
//! The estimator becomes *ready* on the first accepted sample and stays ready
//! from then on, so cycles keep running (with held values) even if every
//! input later goes silent.

use aerostate_middleware::EstimatePublisher;
use aerostate_tf::{EdgeKey, FrameGraph, FrameNames, RigidTransform, TfError};
use aerostate_types::{
    EstimatorError, Header, Measurement, Odometry, Pose, PoseStamped, TransformStamped,
    Twist, TwistStamped,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::config::EstimatorConfig;
use crate::drift::DriftCorrector;
use crate::mode::Mode;
use crate::resolver::{GlobalStateResolver, VelocityEstimate};

// ─────────────────────────────────────────────────────────────────────────────
// Cycle results
// ─────────────────────────────────────────────────────────────────────────────

/// What a single [`StateEstimator::run`] call produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub pose: PoseStamped,
    pub twist: TwistStamped,
    /// `true` when `map → odom` was recomputed this cycle.
    pub corrected: bool,
    /// Set when `global → body` could not be resolved and the previous pose
    /// was reported instead.
    pub lookup_error: Option<TfError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// No input has arrived yet.
    NotReady,
    /// The owning node is not active.
    Inactive,
    Completed(Box<CycleReport>),
}

impl CycleOutcome {
    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            CycleOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct GroundTruthPose {
    transform: RigidTransform,
    stamp: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// StateEstimator
// ─────────────────────────────────────────────────────────────────────────────

pub struct StateEstimator {
    mode: Mode,
    names: FrameNames,
    graph: FrameGraph,
    corrector: DriftCorrector,
    resolver: GlobalStateResolver,
    // ── input slots ──────────────────────────────────────────────────────────
    body_velocity: VelocityEstimate,
    gt_pose: Option<GroundTruthPose>,
    gt_twist: Option<TwistStamped>,
    ready: bool,
}

impl StateEstimator {
    /// Build the frame tree for `config` and the already selected `mode`.
    ///
    /// # Errors
    ///
    /// [`EstimatorError::ModeNotImplemented`] for [`Mode::SensorFusion`].
    pub fn new(config: &EstimatorConfig, mode: Mode, now: DateTime<Utc>) -> Result<Self, EstimatorError> {
        let mode = mode.ensure_implemented()?;
        let names = config.frame_names();
        let graph = FrameGraph::new(&names, config.map_anchor(), now);

        for edge in graph.edges() {
            info!("{} -> {}", edge.parent, edge.child);
        }

        Ok(Self {
            mode,
            resolver: GlobalStateResolver::new(&names, config.max_transform_age()),
            body_velocity: VelocityEstimate::zero(names.base.clone()),
            names,
            graph,
            corrector: DriftCorrector::new(),
            gt_pose: None,
            gt_twist: None,
            ready: false,
        })
    }

    // ── inputs ───────────────────────────────────────────────────────────────

    /// Odometry callback: overwrites `odom → body` and the body velocity.
    pub fn on_odometry(&mut self, msg: &Odometry) -> Result<(), TfError> {
        let transform = msg.pose.to_transform()?;
        let twist = finite_twist(&msg.twist)?;
        self.graph.odometry_writer().set(transform, msg.header.stamp);
        self.body_velocity = VelocityEstimate {
            linear: twist.linear,
            angular: twist.angular,
            frame: self.names.base.clone(),
        };
        self.ready = true;
        Ok(())
    }

    /// Ground-truth pose callback (pose of the body in the map frame).
    pub fn on_ground_truth_pose(&mut self, msg: &PoseStamped) -> Result<(), TfError> {
        let transform = msg.pose.to_transform()?;
        self.gt_pose = Some(GroundTruthPose {
            transform,
            stamp: msg.header.stamp,
        });
        self.ready = true;
        Ok(())
    }

    /// Ground-truth velocity callback.
    pub fn on_ground_truth_twist(&mut self, msg: &TwistStamped) -> Result<(), TfError> {
        finite_twist(&msg.twist)?;
        self.gt_twist = Some(msg.clone());
        self.ready = true;
        Ok(())
    }

    /// Dispatch any inbound [`Measurement`] to its callback.
    pub fn on_measurement(&mut self, measurement: &Measurement) -> Result<(), TfError> {
        match measurement {
            Measurement::Odometry(msg) => self.on_odometry(msg),
            Measurement::GroundTruthPose(msg) => self.on_ground_truth_pose(msg),
            Measurement::GroundTruthTwist(msg) => self.on_ground_truth_twist(msg),
        }
    }

    // ── cycle ────────────────────────────────────────────────────────────────

    /// Run one estimation cycle stamped at `now`.
    #[instrument(skip(self, publisher), fields(mode = %self.mode))]
    pub fn run(&mut self, now: DateTime<Utc>, publisher: &impl EstimatePublisher) -> CycleOutcome {
        if !self.ready {
            return CycleOutcome::NotReady;
        }

        let map_to_body = self.map_to_body_estimate();
        let odom_to_body = self.graph.edge(EdgeKey::OdomToBody).transform;
        let corrected = self.corrector.update(
            self.graph.correction_writer(),
            &odom_to_body,
            map_to_body.as_ref(),
            now,
        );

        self.publish_tfs(now, publisher);

        let lookup_error = match self.resolver.resolve_pose(&self.graph, now) {
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "transform failure, holding last pose");
                Some(e)
            }
        };
        self.resolver
            .resolve_velocity(self.mode, &self.body_velocity, self.gt_twist.as_ref());

        let report = CycleReport {
            pose: self.pose_estimate(now),
            twist: self.twist_estimate(now),
            corrected,
            lookup_error,
        };
        publish_or_log("pose", publisher.publish_pose(&report.pose));
        publish_or_log("twist", publisher.publish_twist(&report.twist));
        CycleOutcome::Completed(Box::new(report))
    }

    /// Pick the `map → body` source for the active mode.
    ///
    /// In ground-truth mode the ground-truth pose also replaces `odom → body`
    /// so that odometry and map agree and no correction is carried.
    fn map_to_body_estimate(&mut self) -> Option<RigidTransform> {
        match self.mode {
            Mode::OdomOnly => Some(self.graph.edge(EdgeKey::OdomToBody).transform),
            Mode::GroundTruth => {
                let gt = self.gt_pose.as_ref()?;
                self.graph.odometry_writer().set(gt.transform, gt.stamp);
                Some(gt.transform)
            }
            // Rejected in `new`.
            Mode::SensorFusion => None,
        }
    }

    fn publish_tfs(&self, now: DateTime<Utc>, publisher: &impl EstimatePublisher) {
        for key in EdgeKey::ALL {
            let edge = self.graph.edge(key);
            let msg = TransformStamped {
                header: Header::new(now, edge.parent.clone()),
                child_frame_id: edge.child.clone(),
                transform: edge.transform,
            };
            let result = if key.is_static() {
                publisher.send_static_transform(&msg)
            } else {
                publisher.send_transform(&msg)
            };
            publish_or_log("transform", result);
        }
    }

    fn pose_estimate(&self, now: DateTime<Utc>) -> PoseStamped {
        PoseStamped {
            header: Header::new(now, self.resolver.global_frame()),
            pose: Pose::from_transform(self.resolver.pose()),
        }
    }

    fn twist_estimate(&self, now: DateTime<Utc>) -> TwistStamped {
        let velocity = self.resolver.velocity();
        TwistStamped {
            header: Header::new(now, velocity.frame.clone()),
            twist: Twist {
                linear: velocity.linear,
                angular: velocity.angular,
            },
        }
    }

    // ── accessors ────────────────────────────────────────────────────────────

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn names(&self) -> &FrameNames {
        &self.names
    }

    pub fn graph(&self) -> &FrameGraph {
        &self.graph
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Last resolved `global → body` pose.
    pub fn pose(&self) -> &RigidTransform {
        self.resolver.pose()
    }

    /// Last resolved global-frame velocity.
    pub fn velocity(&self) -> &VelocityEstimate {
        self.resolver.velocity()
    }

    pub fn corrector(&self) -> &DriftCorrector {
        &self.corrector
    }
}

fn finite_twist(twist: &Twist) -> Result<Twist, TfError> {
    if twist.linear.iter().chain(twist.angular.iter()).all(|c| c.is_finite()) {
        Ok(*twist)
    } else {
        Err(TfError::NonFinite("twist"))
    }
}

fn publish_or_log(what: &str, result: Result<(), EstimatorError>) {
    if let Err(e) = result {
        debug!(what, error = %e, "publish failed");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
