//! `aerostate-tf` – rigid-body transforms and the estimator frame tree.
//!
//! Everything the state estimator knows about space lives here: how two
//! transforms chain together, how a transform is undone, and how the fixed
//! `global → map → odom → body` tree is stored and queried.
//!
//! # Modules
//!
//! - [`transform`] – [`RigidTransform`][transform::RigidTransform]: a
//!   translation plus unit-quaternion rotation, with the [`compose`],
//!   [`invert`] and [`difference`] primitives.
//! - [`frame_graph`] – [`FrameGraph`][frame_graph::FrameGraph]: the three
//!   live edges of the estimator tree.  Each producer mutates its edge through
//!   a narrow [`EdgeWriter`][frame_graph::EdgeWriter].
//! - [`names`] – [`FrameNames`][names::FrameNames]: namespaced frame
//!   identifiers for multi-vehicle deployments.
//! - [`error`] – [`TfError`][error::TfError].

pub mod error;
pub mod frame_graph;
pub mod names;
pub mod transform;

pub use error::TfError;
pub use frame_graph::{EdgeKey, EdgeWriter, FrameEdge, FrameGraph};
pub use names::{FrameNames, generate_tf_name};
pub use transform::{RigidTransform, compose, difference, invert};
