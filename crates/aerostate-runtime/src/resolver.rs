//! Global state resolution.
//!
//! Turns the frame tree into the externally reported pose and velocity:
//!
//! - **Pose** – the composed `global → body` transform.  If it cannot be
//!   resolved the previous pose is kept and the failure is returned to the
//!   caller.
//! - **Velocity** – in odometry mode the body-frame linear velocity is
//!   rotated into the global frame by the current `global → body` rotation.
//!   Angular velocity is passed through without rotation (known limitation,
//!   kept for compatibility with existing consumers).  In ground-truth mode
//!   the ground-truth velocity is reported verbatim.

use aerostate_tf::{FrameGraph, FrameNames, RigidTransform, TfError};
use aerostate_types::TwistStamped;
use chrono::{DateTime, TimeDelta, Utc};
use nalgebra::Vector3;

use crate::mode::Mode;

/// Linear and angular velocity tagged with the frame they are expressed in.
#[derive(Debug, Clone, PartialEq)]
pub struct VelocityEstimate {
    pub linear: Vector3<f64>,
    pub angular: Vector3<f64>,
    pub frame: String,
}

impl VelocityEstimate {
    pub fn zero(frame: impl Into<String>) -> Self {
        Self {
            linear: Vector3::zeros(),
            angular: Vector3::zeros(),
            frame: frame.into(),
        }
    }
}

/// Holds the last good global pose and velocity.
#[derive(Debug, Clone)]
pub struct GlobalStateResolver {
    global_frame: String,
    base_frame: String,
    max_age: Option<TimeDelta>,
    pose: RigidTransform,
    velocity: VelocityEstimate,
}

impl GlobalStateResolver {
    pub fn new(names: &FrameNames, max_age: Option<TimeDelta>) -> Self {
        Self {
            global_frame: names.global.clone(),
            base_frame: names.base.clone(),
            max_age,
            pose: RigidTransform::identity(),
            velocity: VelocityEstimate::zero(names.global.clone()),
        }
    }

    /// Look up `global → body`.  On failure the previous pose is retained.
    pub fn resolve_pose(
        &mut self,
        graph: &FrameGraph,
        now: DateTime<Utc>,
    ) -> Result<&RigidTransform, TfError> {
        self.pose = graph.lookup(&self.global_frame, &self.base_frame, now, self.max_age)?;
        Ok(&self.pose)
    }

    /// Derive the global-frame velocity for `mode`.
    ///
    /// `body_velocity` is the latest odometry velocity in the body frame;
    /// `ground_truth` the latest ground-truth velocity, if any.  With no
    /// ground-truth sample yet the previous velocity is kept.
    pub fn resolve_velocity(
        &mut self,
        mode: Mode,
        body_velocity: &VelocityEstimate,
        ground_truth: Option<&TwistStamped>,
    ) -> &VelocityEstimate {
        match mode {
            Mode::OdomOnly => {
                self.velocity = VelocityEstimate {
                    linear: self.pose.rotate_vector(&body_velocity.linear),
                    angular: body_velocity.angular,
                    frame: self.global_frame.clone(),
                };
            }
            Mode::GroundTruth => {
                if let Some(gt) = ground_truth {
                    self.velocity = VelocityEstimate {
                        linear: gt.twist.linear,
                        angular: gt.twist.angular,
                        frame: gt.header.frame_id.clone(),
                    };
                }
            }
            // Rejected before a resolver is ever driven with it.
            Mode::SensorFusion => {}
        }
        &self.velocity
    }

    pub fn pose(&self) -> &RigidTransform {
        &self.pose
    }

    pub fn velocity(&self) -> &VelocityEstimate {
        &self.velocity
    }

    pub fn global_frame(&self) -> &str {
        &self.global_frame
    }
}
