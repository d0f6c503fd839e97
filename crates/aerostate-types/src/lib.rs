use aerostate_tf::{RigidTransform, TfError};
use chrono::{DateTime, Utc};
use nalgebra::{Quaternion, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Timestamp and reference frame attached to every stamped message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub stamp: DateTime<Utc>,
    /// Frame the payload is expressed in (e.g. "earth", "drone0/odom").
    #[serde(default)]
    pub frame_id: String,
}

impl Header {
    pub fn new(stamp: DateTime<Utc>, frame_id: impl Into<String>) -> Self {
        Self {
            stamp,
            frame_id: frame_id.into(),
        }
    }
}

/// Position and orientation as received on the wire.
///
/// The orientation is a raw quaternion; it is only trusted after
/// [`Pose::to_transform`] has normalised it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vector3<f64>,
    pub orientation: Quaternion<f64>,
}

impl Pose {
    /// Validate and convert into a [`RigidTransform`].
    pub fn to_transform(&self) -> Result<RigidTransform, TfError> {
        RigidTransform::from_parts(self.position, self.orientation)
    }

    pub fn from_transform(t: &RigidTransform) -> Self {
        Self {
            position: t.translation,
            orientation: t.rotation.into_inner(),
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            orientation: Quaternion::identity(),
        }
    }
}

/// Linear (m/s) and angular (rad/s) velocity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Twist {
    pub linear: Vector3<f64>,
    pub angular: Vector3<f64>,
}

/// Odometry sample: body pose in the odom frame plus body-frame velocity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Odometry {
    pub header: Header,
    #[serde(default)]
    pub child_frame_id: String,
    pub pose: Pose,
    #[serde(default)]
    pub twist: Twist,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseStamped {
    pub header: Header,
    pub pose: Pose,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwistStamped {
    pub header: Header,
    pub twist: Twist,
}

/// A `header.frame_id → child_frame_id` transform as broadcast to the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformStamped {
    pub header: Header,
    pub child_frame_id: String,
    pub transform: RigidTransform,
}

/// Inbound samples consumed by the estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Measurement {
    Odometry(Odometry),
    GroundTruthPose(PoseStamped),
    GroundTruthTwist(TwistStamped),
}

/// Unified event wrapper for the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "aerostate-runtime::estimator"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    Measurement(Measurement),
    Transform(TransformStamped),
    StaticTransform(TransformStamped),
    PoseEstimate(PoseStamped),
    TwistEstimate(TwistStamped),
}

/// Global error type spanning configuration, lifecycle and transform faults.
#[derive(Error, Debug)]
pub enum EstimatorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Conflicting estimation modes enabled: {}", .0.join(", "))]
    ConflictingModes(Vec<String>),

    #[error("Estimation mode not implemented: {0}")]
    ModeNotImplemented(String),

    #[error("Invalid lifecycle transition '{transition}' from state {from}")]
    InvalidTransition { from: String, transition: String },

    #[error("Estimator not configured")]
    NotConfigured,

    #[error("Transform error: {0}")]
    Transform(#[from] TfError),

    #[error("Channel error: {0}")]
    Channel(String),
}
