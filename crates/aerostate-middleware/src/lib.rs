//! `aerostate-middleware` – message plumbing around the estimator core.
//!
//! # Modules
//!
//! - [`bus`] – topic-partitioned publish/subscribe [`EventBus`] built on
//!   Tokio broadcast channels.
//! - [`publisher`] – the [`EstimatePublisher`] seam through which the
//!   estimator broadcasts transforms and state estimates, plus the
//!   bus-backed [`BusPublisher`] and the in-memory [`MemoryPublisher`].

pub mod bus;
pub mod publisher;

pub use bus::{EventBus, Topic, TopicReceiver};
pub use publisher::{BusPublisher, EstimatePublisher, MemoryPublisher};
