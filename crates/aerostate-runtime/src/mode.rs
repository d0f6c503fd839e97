//! Estimation mode selection.
//!
//! The mode decides where the map-referenced body pose comes from on each
//! cycle.  It is chosen once at configure time and held for the whole
//! session; switching requires a cleanup and a fresh configure.

use std::fmt;

use aerostate_types::EstimatorError;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Source of the `map → body` estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// `map → body` is exactly `odom → body`; no drift correction.
    OdomOnly,
    /// `map → body` is the externally supplied ground-truth pose.
    GroundTruth,
    /// Fused estimate.  Not implemented; rejected by [`Mode::ensure_implemented`].
    SensorFusion,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::OdomOnly => "odom_only",
            Mode::GroundTruth => "ground_truth",
            Mode::SensorFusion => "sensor_fusion",
        }
    }

    /// Upper-case announcement logged when the mode is selected.
    pub fn banner(self) -> &'static str {
        match self {
            Mode::OdomOnly => "ODOM ONLY MODE",
            Mode::GroundTruth => "GROUND TRUTH MODE",
            Mode::SensorFusion => "SENSOR FUSION MODE",
        }
    }

    /// Fail fast for modes that have no estimator behind them.
    pub fn ensure_implemented(self) -> Result<Self, EstimatorError> {
        match self {
            Mode::OdomOnly | Mode::GroundTruth => Ok(self),
            Mode::SensorFusion => Err(EstimatorError::ModeNotImplemented(self.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three boolean mode switches as they appear in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeFlags {
    pub odom_only: bool,
    pub ground_truth: bool,
    pub sensor_fusion: bool,
}

impl ModeFlags {
    fn enabled(&self) -> Vec<Mode> {
        [
            (self.odom_only, Mode::OdomOnly),
            (self.ground_truth, Mode::GroundTruth),
            (self.sensor_fusion, Mode::SensorFusion),
        ]
        .into_iter()
        .filter_map(|(on, mode)| on.then_some(mode))
        .collect()
    }
}

/// Resolve the configured flags into exactly one implemented [`Mode`].
///
/// | Flags set | Result |
/// |---|---|
/// | none | `OdomOnly`, with a warning |
/// | one implemented mode | that mode |
/// | `sensor_fusion` | [`EstimatorError::ModeNotImplemented`] |
/// | more than one | [`EstimatorError::ConflictingModes`] |
pub fn select_mode(flags: ModeFlags) -> Result<Mode, EstimatorError> {
    let enabled = flags.enabled();
    let mode = match enabled.as_slice() {
        [] => {
            warn!("no estimation mode enabled, defaulting to odom_only");
            Mode::OdomOnly
        }
        [single] => *single,
        many => {
            return Err(EstimatorError::ConflictingModes(
                many.iter().map(|m| m.to_string()).collect(),
            ));
        }
    };
    let mode = mode.ensure_implemented()?;
    info!(mode = %mode, "{}", mode.banner());
    Ok(mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_flags_defaults_to_odom_only() {
        assert_eq!(select_mode(ModeFlags::default()).unwrap(), Mode::OdomOnly);
    }

    #[test]
    fn single_flag_selects_that_mode() {
        let odom = ModeFlags {
            odom_only: true,
            ..Default::default()
        };
        let gt = ModeFlags {
            ground_truth: true,
            ..Default::default()
        };
        assert_eq!(select_mode(odom).unwrap(), Mode::OdomOnly);
        assert_eq!(select_mode(gt).unwrap(), Mode::GroundTruth);
    }

    #[test]
    fn sensor_fusion_fails_fast() {
        let flags = ModeFlags {
            sensor_fusion: true,
            ..Default::default()
        };
        let err = select_mode(flags).unwrap_err();
        assert!(matches!(err, EstimatorError::ModeNotImplemented(ref m) if m == "sensor_fusion"));
    }

    #[test]
    fn multiple_flags_conflict() {
        let flags = ModeFlags {
            odom_only: true,
            ground_truth: true,
            sensor_fusion: false,
        };
        match select_mode(flags) {
            Err(EstimatorError::ConflictingModes(modes)) => {
                assert_eq!(modes, vec!["odom_only", "ground_truth"]);
            }
            other => panic!("expected ConflictingModes, got {other:?}"),
        }
    }
}
