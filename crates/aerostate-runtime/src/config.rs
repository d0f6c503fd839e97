//! Estimator configuration.
//!
//! Mirrors the node parameters of a vehicle's state estimator: which
//! estimation mode to run, how frames are named, the cycle rate, and the
//! fixed offset of the vehicle's map in the global frame.

use std::time::Duration;

use aerostate_tf::names::DEFAULT_GLOBAL_FRAME;
use aerostate_tf::{FrameNames, RigidTransform};
use aerostate_types::EstimatorError;
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::mode::ModeFlags;

/// Loop frequency of the periodic cycle when none is configured.
pub const DEFAULT_FREQUENCY_HZ: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Use raw odometry as the map-referenced body pose.
    pub odom_only: bool,
    /// Use the external ground-truth pose and velocity.
    pub ground_truth: bool,
    /// Reserved; selecting it is rejected at configure time.
    pub sensor_fusion: bool,
    /// Body frame name, namespaced on use.  Empty falls back to the namespace.
    pub base_frame: String,
    /// Vehicle namespace (e.g. "drone0").
    pub namespace: String,
    /// Shared, un-namespaced global reference frame.
    pub global_frame: String,
    /// Rate of the periodic estimation cycle.
    pub frequency_hz: f64,
    /// Dynamic edges older than this fail the global lookup.  `None` leaves
    /// staleness unbounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_transform_age_ms: Option<u64>,
    /// `[x, y, z, roll, pitch, yaw]` of the map origin in the global frame.
    pub map_origin: [f64; 6],
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            odom_only: false,
            ground_truth: false,
            sensor_fusion: false,
            base_frame: "base_link".to_string(),
            namespace: "drone0".to_string(),
            global_frame: DEFAULT_GLOBAL_FRAME.to_string(),
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            max_transform_age_ms: None,
            map_origin: [0.0; 6],
        }
    }
}

impl EstimatorConfig {
    pub fn mode_flags(&self) -> ModeFlags {
        ModeFlags {
            odom_only: self.odom_only,
            ground_truth: self.ground_truth,
            sensor_fusion: self.sensor_fusion,
        }
    }

    pub fn frame_names(&self) -> FrameNames {
        FrameNames::new(&self.global_frame, &self.namespace, &self.base_frame)
    }

    /// The fixed `global → map` transform.
    pub fn map_anchor(&self) -> RigidTransform {
        let [x, y, z, roll, pitch, yaw] = self.map_origin;
        RigidTransform::from_xyz_rpy(x, y, z, roll, pitch, yaw)
    }

    pub fn max_transform_age(&self) -> Option<TimeDelta> {
        self.max_transform_age_ms
            .map(|ms| {
                i64::try_from(ms)
                    .ok()
                    .and_then(TimeDelta::try_milliseconds)
                    .unwrap_or(TimeDelta::MAX)
            })
    }

    /// Period of the estimation cycle.
    pub fn cycle_period(&self) -> Result<Duration, EstimatorError> {
        if !self.frequency_hz.is_finite() || self.frequency_hz <= 0.0 {
            return Err(EstimatorError::Config(format!(
                "frequency_hz must be a positive number, got {}",
                self.frequency_hz
            )));
        }
        Ok(Duration::from_secs_f64(1.0 / self.frequency_hz))
    }

    /// Reject values that would make the frame tree unusable.
    pub fn validate(&self) -> Result<(), EstimatorError> {
        self.cycle_period()?;
        if self.global_frame.is_empty() {
            return Err(EstimatorError::Config("global_frame must not be empty".to_string()));
        }
        if self.base_frame.is_empty() && self.namespace.trim_start_matches('/').is_empty() {
            return Err(EstimatorError::Config(
                "base_frame and namespace cannot both be empty".to_string(),
            ));
        }
        if let Some(name) = self.frame_names().duplicate() {
            return Err(EstimatorError::Config(format!(
                "frame name '{name}' is used for more than one frame"
            )));
        }
        if self.map_origin.iter().any(|v| !v.is_finite()) {
            return Err(EstimatorError::Config("map_origin must be finite".to_string()));
        }
        Ok(())
    }
}
