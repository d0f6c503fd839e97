//! The estimator's frame tree.
//!
//! The tree is a fixed chain of four frames and three edges:
//!
//! ```text
//! global ──(anchor)──▶ map ──(correction)──▶ odom ──(odometry)──▶ body
//! ```
//!
//! | Edge | Writer | Update rate |
//! |---|---|---|
//! | [`EdgeKey::GlobalToMap`] | startup / re-anchoring | fixed |
//! | [`EdgeKey::MapToOdom`] | drift corrector | every cycle |
//! | [`EdgeKey::OdomToBody`] | odometry (or ground truth) input | every sample |
//!
//! Edges are created with identity transforms and never removed.  Each
//! producer borrows an [`EdgeWriter`] for its own edge only; nothing else in
//! the graph is reachable through it.
//!
//! # Example
//!
//! ```rust
//! use aerostate_tf::{FrameGraph, FrameNames, RigidTransform};
//! use chrono::Utc;
//! use nalgebra::Vector3;
//!
//! let names = FrameNames::new("earth", "drone0", "base_link");
//! let now = Utc::now();
//! let mut graph = FrameGraph::new(&names, RigidTransform::identity(), now);
//!
//! graph
//!     .odometry_writer()
//!     .set(RigidTransform::from_translation(Vector3::new(1.0, 0.0, 0.0)), now);
//!
//! let t = graph.lookup("earth", "drone0/base_link", now, None).unwrap();
//! assert!((t.translation.x - 1.0).abs() < 1e-12);
//! ```

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TfError;
use crate::names::FrameNames;
use crate::transform::{RigidTransform, compose, difference};

// ────────────────────────────────────────────────────────────────────────────
// Edge identity
// ────────────────────────────────────────────────────────────────────────────

/// The three live edges, ordered from the root outwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKey {
    GlobalToMap,
    MapToOdom,
    OdomToBody,
}

impl EdgeKey {
    pub const ALL: [EdgeKey; 3] = [EdgeKey::GlobalToMap, EdgeKey::MapToOdom, EdgeKey::OdomToBody];

    fn index(self) -> usize {
        match self {
            EdgeKey::GlobalToMap => 0,
            EdgeKey::MapToOdom => 1,
            EdgeKey::OdomToBody => 2,
        }
    }

    /// Static edges are exempt from the staleness bound.
    pub fn is_static(self) -> bool {
        matches!(self, EdgeKey::GlobalToMap)
    }
}

/// One directed `parent → child` edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameEdge {
    pub parent: String,
    pub child: String,
    pub transform: RigidTransform,
    pub stamp: DateTime<Utc>,
}

impl FrameEdge {
    fn new(parent: &str, child: &str, transform: RigidTransform, stamp: DateTime<Utc>) -> Self {
        Self {
            parent: parent.to_string(),
            child: child.to_string(),
            transform,
            stamp,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// EdgeWriter
// ────────────────────────────────────────────────────────────────────────────

/// Mutable access to exactly one edge of a [`FrameGraph`].
pub struct EdgeWriter<'a> {
    edge: &'a mut FrameEdge,
}

impl EdgeWriter<'_> {
    /// Overwrite the edge transform and its timestamp.
    pub fn set(&mut self, transform: RigidTransform, stamp: DateTime<Utc>) {
        self.edge.transform = transform;
        self.edge.stamp = stamp;
    }

    pub fn current(&self) -> &RigidTransform {
        &self.edge.transform
    }
}

// ────────────────────────────────────────────────────────────────────────────
// FrameGraph
// ────────────────────────────────────────────────────────────────────────────

/// Fixed `global → map → odom → body` chain.
#[derive(Debug, Clone)]
pub struct FrameGraph {
    edges: [FrameEdge; 3],
}

impl FrameGraph {
    /// Build the tree with `anchor` on the `global → map` edge and identity
    /// transforms on the other two.
    pub fn new(names: &FrameNames, anchor: RigidTransform, stamp: DateTime<Utc>) -> Self {
        let identity = RigidTransform::identity();
        Self {
            edges: [
                FrameEdge::new(&names.global, &names.map, anchor, stamp),
                FrameEdge::new(&names.map, &names.odom, identity, stamp),
                FrameEdge::new(&names.odom, &names.base, identity, stamp),
            ],
        }
    }

    pub fn edge(&self, key: EdgeKey) -> &FrameEdge {
        &self.edges[key.index()]
    }

    /// All edges, root first.
    pub fn edges(&self) -> &[FrameEdge] {
        &self.edges
    }

    /// Writer for the fixed `global → map` edge.
    pub fn anchor_writer(&mut self) -> EdgeWriter<'_> {
        EdgeWriter {
            edge: &mut self.edges[EdgeKey::GlobalToMap.index()],
        }
    }

    /// Writer for the `map → odom` drift-correction edge.
    pub fn correction_writer(&mut self) -> EdgeWriter<'_> {
        EdgeWriter {
            edge: &mut self.edges[EdgeKey::MapToOdom.index()],
        }
    }

    /// Writer for the `odom → body` odometry edge.
    pub fn odometry_writer(&mut self) -> EdgeWriter<'_> {
        EdgeWriter {
            edge: &mut self.edges[EdgeKey::OdomToBody.index()],
        }
    }

    /// Position of `frame` along the chain (0 = root).
    fn depth(&self, frame: &str) -> Option<usize> {
        if self.edges[0].parent == frame {
            return Some(0);
        }
        self.edges.iter().position(|e| e.child == frame).map(|i| i + 1)
    }

    /// Pose of the frame at `depth` relative to the root.
    fn pose_from_root(&self, depth: usize) -> RigidTransform {
        self.edges[..depth]
            .iter()
            .fold(RigidTransform::identity(), |acc, e| compose(&acc, &e.transform))
    }

    /// Pose of `child` expressed in `parent`.
    ///
    /// Any two frames of the tree can be queried; asking for an ancestor of
    /// `parent` yields the inverse chain.  Every dynamic edge traversed
    /// between the two frames must be younger than `max_age` (when given)
    /// relative to `now`.
    pub fn lookup(
        &self,
        parent: &str,
        child: &str,
        now: DateTime<Utc>,
        max_age: Option<TimeDelta>,
    ) -> Result<RigidTransform, TfError> {
        let from = self
            .depth(parent)
            .ok_or_else(|| TfError::UnknownFrame(parent.to_string()))?;
        let to = self
            .depth(child)
            .ok_or_else(|| TfError::UnknownFrame(child.to_string()))?;

        if let Some(max_age) = max_age {
            let (lo, hi) = (from.min(to), from.max(to));
            for key in &EdgeKey::ALL[lo..hi] {
                if key.is_static() {
                    continue;
                }
                let edge = self.edge(*key);
                let age = now - edge.stamp;
                if age > max_age {
                    debug!(parent = %edge.parent, child = %edge.child, age_ms = age.num_milliseconds(), "stale edge");
                    return Err(TfError::Stale {
                        parent: edge.parent.clone(),
                        child: edge.child.clone(),
                        age_ms: age.num_milliseconds(),
                        max_age_ms: max_age.num_milliseconds(),
                    });
                }
            }
        }

        let result = difference(&self.pose_from_root(to), &self.pose_from_root(from));
        if !result.is_finite() {
            return Err(TfError::NonFinite("lookup"));
        }
        Ok(result)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
