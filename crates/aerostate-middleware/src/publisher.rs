//! Outbound seam of the estimator.
//!
//! The estimator never talks to a transport directly.  Each cycle it hands
//! its transforms and estimates to an [`EstimatePublisher`]; what happens
//! next (event bus, log file, test recorder) is the publisher's business.

use std::sync::Mutex;

use aerostate_types::{
    EstimatorError, Event, EventPayload, PoseStamped, TransformStamped, TwistStamped,
};
use tracing::trace;

use crate::bus::{EventBus, Topic};

/// Destination for everything the estimator broadcasts per cycle.
///
/// # Contract
///
/// * `send_static_transform` – a fixed frame offset (re-sent every cycle).
/// * `send_transform` – a dynamic frame edge.
/// * `publish_pose` / `publish_twist` – the global-frame state estimate.
///
/// Errors are reported back but the estimator treats them as non-fatal.
pub trait EstimatePublisher {
    fn send_static_transform(&self, transform: &TransformStamped) -> Result<(), EstimatorError>;

    fn send_transform(&self, transform: &TransformStamped) -> Result<(), EstimatorError>;

    fn publish_pose(&self, pose: &PoseStamped) -> Result<(), EstimatorError>;

    fn publish_twist(&self, twist: &TwistStamped) -> Result<(), EstimatorError>;
}

/// [`EstimatePublisher`] that forwards to [`EventBus`] topics.
#[derive(Clone, Debug)]
pub struct BusPublisher {
    bus: EventBus,
    source: String,
}

impl BusPublisher {
    pub fn new(bus: EventBus, source: impl Into<String>) -> Self {
        Self {
            bus,
            source: source.into(),
        }
    }

    fn emit(&self, topic: Topic, payload: EventPayload) -> Result<(), EstimatorError> {
        let receivers = self
            .bus
            .publish_to(topic, Event::new(self.source.clone(), payload))?;
        trace!(topic = topic.as_str(), receivers, "published");
        Ok(())
    }
}

impl EstimatePublisher for BusPublisher {
    fn send_static_transform(&self, transform: &TransformStamped) -> Result<(), EstimatorError> {
        self.emit(Topic::TfStatic, EventPayload::StaticTransform(transform.clone()))
    }

    fn send_transform(&self, transform: &TransformStamped) -> Result<(), EstimatorError> {
        self.emit(Topic::Tf, EventPayload::Transform(transform.clone()))
    }

    fn publish_pose(&self, pose: &PoseStamped) -> Result<(), EstimatorError> {
        self.emit(Topic::SelfLocalizationPose, EventPayload::PoseEstimate(pose.clone()))
    }

    fn publish_twist(&self, twist: &TwistStamped) -> Result<(), EstimatorError> {
        self.emit(Topic::SelfLocalizationTwist, EventPayload::TwistEstimate(twist.clone()))
    }
}

/// [`EstimatePublisher`] that keeps everything in memory, in publish order.
///
/// Handy for replay tooling and for asserting on estimator output.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    records: Mutex<Vec<EventPayload>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain and return everything published so far.
    pub fn take(&self) -> Vec<EventPayload> {
        self.records
            .lock()
            .map(|mut r| std::mem::take(&mut *r))
            .unwrap_or_default()
    }

    /// Most recent pose estimate, if any.
    pub fn last_pose(&self) -> Option<PoseStamped> {
        self.find_last(|p| match p {
            EventPayload::PoseEstimate(pose) => Some(pose.clone()),
            _ => None,
        })
    }

    /// Most recent velocity estimate, if any.
    pub fn last_twist(&self) -> Option<TwistStamped> {
        self.find_last(|p| match p {
            EventPayload::TwistEstimate(twist) => Some(twist.clone()),
            _ => None,
        })
    }

    /// Most recent dynamic transform with the given child frame.
    pub fn last_transform(&self, child_frame: &str) -> Option<TransformStamped> {
        self.find_last(|p| match p {
            EventPayload::Transform(tf) if tf.child_frame_id == child_frame => Some(tf.clone()),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find_last<T>(&self, pick: impl Fn(&EventPayload) -> Option<T>) -> Option<T> {
        let records = self.records.lock().ok()?;
        records.iter().rev().find_map(pick)
    }

    fn push(&self, payload: EventPayload) -> Result<(), EstimatorError> {
        self.records
            .lock()
            .map_err(|e| EstimatorError::Channel(format!("memory publisher poisoned: {e}")))?
            .push(payload);
        Ok(())
    }
}

impl EstimatePublisher for MemoryPublisher {
    fn send_static_transform(&self, transform: &TransformStamped) -> Result<(), EstimatorError> {
        self.push(EventPayload::StaticTransform(transform.clone()))
    }

    fn send_transform(&self, transform: &TransformStamped) -> Result<(), EstimatorError> {
        self.push(EventPayload::Transform(transform.clone()))
    }

    fn publish_pose(&self, pose: &PoseStamped) -> Result<(), EstimatorError> {
        self.push(EventPayload::PoseEstimate(pose.clone()))
    }

    fn publish_twist(&self, twist: &TwistStamped) -> Result<(), EstimatorError> {
        self.push(EventPayload::TwistEstimate(twist.clone()))
    }
}
