//! Headless, typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! | Topic | Name | Traffic |
//! |---|---|---|
//! | [`Topic::SensorOdom`] | `sensor_measurements/odom` | Raw odometry samples |
//! | [`Topic::GroundTruthPose`] | `ground_truth/pose` | External ground-truth pose |
//! | [`Topic::GroundTruthTwist`] | `ground_truth/twist` | External ground-truth velocity |
//! | [`Topic::Tf`] | `tf` | Dynamic frame edges |
//! | [`Topic::TfStatic`] | `tf_static` | Fixed frame offsets |
//! | [`Topic::SelfLocalizationPose`] | `self_localization/pose` | Pose estimate |
//! | [`Topic::SelfLocalizationTwist`] | `self_localization/twist` | Velocity estimate |

use std::collections::HashMap;

use aerostate_types::{EstimatorError, Event, EventPayload, Measurement};
use tokio::sync::broadcast;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// First-class routing topics on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    SensorOdom,
    GroundTruthPose,
    GroundTruthTwist,
    Tf,
    TfStatic,
    SelfLocalizationPose,
    SelfLocalizationTwist,
}

impl Topic {
    pub const ALL: [Topic; 7] = [
        Topic::SensorOdom,
        Topic::GroundTruthPose,
        Topic::GroundTruthTwist,
        Topic::Tf,
        Topic::TfStatic,
        Topic::SelfLocalizationPose,
        Topic::SelfLocalizationTwist,
    ];

    /// Inbound topics the estimator is fed from.
    pub const INPUTS: [Topic; 3] = [
        Topic::SensorOdom,
        Topic::GroundTruthPose,
        Topic::GroundTruthTwist,
    ];

    /// Outbound topics written by the estimator.
    pub const OUTPUTS: [Topic; 4] = [
        Topic::Tf,
        Topic::TfStatic,
        Topic::SelfLocalizationPose,
        Topic::SelfLocalizationTwist,
    ];

    /// Topic name relative to the vehicle namespace.
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::SensorOdom => "sensor_measurements/odom",
            Topic::GroundTruthPose => "ground_truth/pose",
            Topic::GroundTruthTwist => "ground_truth/twist",
            Topic::Tf => "tf",
            Topic::TfStatic => "tf_static",
            Topic::SelfLocalizationPose => "self_localization/pose",
            Topic::SelfLocalizationTwist => "self_localization/twist",
        }
    }

    /// The topic a payload naturally belongs on.
    pub fn for_payload(payload: &EventPayload) -> Self {
        match payload {
            EventPayload::Measurement(Measurement::Odometry(_)) => Topic::SensorOdom,
            EventPayload::Measurement(Measurement::GroundTruthPose(_)) => Topic::GroundTruthPose,
            EventPayload::Measurement(Measurement::GroundTruthTwist(_)) => Topic::GroundTruthTwist,
            EventPayload::Transform(_) => Topic::Tf,
            EventPayload::StaticTransform(_) => Topic::TfStatic,
            EventPayload::PoseEstimate(_) => Topic::SelfLocalizationPose,
            EventPayload::TwistEstimate(_) => Topic::SelfLocalizationTwist,
        }
    }
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    channels: HashMap<Topic, broadcast::Sender<Event>>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently and is
    /// raised to at least one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let channels = Topic::ALL
            .iter()
            .map(|topic| (*topic, broadcast::channel(capacity).0))
            .collect();
        Self { channels }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event, or
    /// [`EstimatorError::Channel`] when nobody is subscribed to the topic.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, EstimatorError> {
        self.topic_sender(topic)
            .send(event)
            .map_err(|_| EstimatorError::Channel(format!("No subscribers for topic {}", topic.as_str())))
    }

    /// Publish `event` on the topic derived from its payload.
    pub fn publish(&self, event: Event) -> Result<usize, EstimatorError> {
        let topic = Topic::for_payload(&event.payload);
        self.publish_to(topic, event)
    }

    /// Subscribe to a specific [`Topic`] channel.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        // Every topic is inserted in `new`.
        &self.channels[&topic]
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Topic-based receiver
// ---------------------------------------------------------------------------

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Non-blocking receive; used by synchronous consumers and tests.
    pub fn try_recv(&mut self) -> Result<Event, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}
