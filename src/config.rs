use serde::{Deserialize, Serialize};

use crate::counter::BoundaryLine;
use crate::{Error, Result};

/// Detection filter settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Detector class id mapped to [`ObjectClass::Person`](crate::ObjectClass).
    pub person_class: u32,
    /// Detector class id mapped to [`ObjectClass::Umbrella`](crate::ObjectClass).
    pub umbrella_class: u32,
    pub min_confidence: f64,
    pub min_area: f64,
    pub max_area: f64,
    pub min_aspect: f64,
    pub max_aspect: f64,
    pub nms_iou: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            person_class: 0,
            umbrella_class: 25,
            min_confidence: 0.4,
            min_area: 100.0,
            max_area: 50_000.0,
            min_aspect: 0.2,
            max_aspect: 5.0,
            nms_iou: 0.4,
        }
    }
}

/// Track manager settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Matching gate in pixels; detections further from every predicted
    /// centroid start a new track.
    pub max_distance: f64,
    /// Consecutive missed frames before a track is removed.
    pub max_misses: u32,
    /// Centroids kept per track for trajectory reporting.
    pub history_len: usize,
    /// Velocity magnitude cap per axis, pixels per frame.
    pub velocity_clamp: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            max_distance: 50.0,
            max_misses: 50,
            history_len: 10,
            velocity_clamp: 25.0,
        }
    }
}

/// Composite correlation settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    pub enabled: bool,
    /// Maximum centroid distance between person and umbrella, pixels.
    pub max_distance: f64,
    /// Half-angle of the carried-above cone, degrees from straight up.
    pub max_angle_deg: f64,
    /// Consecutive qualifying frames before a pair becomes a composite.
    pub promote_after: u32,
    /// Consecutive failing frames before a composite dissolves.
    pub dissolve_after: u32,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_distance: 80.0,
            max_angle_deg: 45.0,
            promote_after: 10,
            dissolve_after: 15,
        }
    }
}

/// Full engine configuration. Applied as an immutable snapshot per frame;
/// see [`ConfigHandle`](crate::ConfigHandle).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub detection: DetectionConfig,
    pub tracking: TrackingConfig,
    pub correlation: CorrelationConfig,
    pub lines: Vec<BoundaryLine>,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        let d = &self.detection;
        if !(0.0..=1.0).contains(&d.min_confidence) {
            return Err(Error::InvalidConfig(format!(
                "min_confidence must be within [0, 1], got {}",
                d.min_confidence
            )));
        }
        if !d.min_area.is_finite() || d.min_area < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "min_area must be non-negative, got {}",
                d.min_area
            )));
        }
        if !d.max_area.is_finite() || d.max_area <= d.min_area {
            return Err(Error::InvalidConfig(format!(
                "max_area must exceed min_area, got {}..{}",
                d.min_area, d.max_area
            )));
        }
        if !d.min_aspect.is_finite() || d.min_aspect < 0.0 || d.max_aspect <= d.min_aspect {
            return Err(Error::InvalidConfig(format!(
                "aspect band must be 0 <= min < max, got {}..{}",
                d.min_aspect, d.max_aspect
            )));
        }
        if !(0.0..=1.0).contains(&d.nms_iou) {
            return Err(Error::InvalidConfig(format!(
                "nms_iou must be within [0, 1], got {}",
                d.nms_iou
            )));
        }

        let t = &self.tracking;
        if !t.max_distance.is_finite() || t.max_distance <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "max_distance must be positive, got {}",
                t.max_distance
            )));
        }
        if t.history_len == 0 {
            return Err(Error::InvalidConfig(
                "history_len must be at least 1".into(),
            ));
        }
        if !t.velocity_clamp.is_finite() || t.velocity_clamp <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "velocity_clamp must be positive, got {}",
                t.velocity_clamp
            )));
        }

        let c = &self.correlation;
        if !c.max_distance.is_finite() || c.max_distance <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "correlation max_distance must be positive, got {}",
                c.max_distance
            )));
        }
        if !c.max_angle_deg.is_finite() || c.max_angle_deg <= 0.0 || c.max_angle_deg > 180.0 {
            return Err(Error::InvalidConfig(format!(
                "max_angle_deg must be within (0, 180], got {}",
                c.max_angle_deg
            )));
        }
        if c.promote_after == 0 {
            return Err(Error::InvalidConfig(
                "promote_after must be at least 1".into(),
            ));
        }

        for (index, line) in self.lines.iter().enumerate() {
            if line.is_degenerate() {
                return Err(Error::InvalidConfig(format!(
                    "line {index} is degenerate"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_negative_gate_is_rejected() {
        let mut config = EngineConfig::default();
        config.tracking.max_distance = -1.0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_area_band_is_rejected() {
        let mut config = EngineConfig::default();
        config.detection.max_area = 50.0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_degenerate_line_is_rejected() {
        let mut config = EngineConfig::default();
        config.lines = vec![BoundaryLine::new(10.0, 10.0, 10.0, 10.0)];

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let mut config = EngineConfig::default();
        config.lines = vec![BoundaryLine::vertical(320.0, 480.0)];

        let json = serde_json::to_string(&config).expect("config serializes");
        let parsed: EngineConfig = serde_json::from_str(&json).expect("config parses");

        assert_eq!(parsed, config);
    }
}
