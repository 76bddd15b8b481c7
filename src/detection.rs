use std::cmp::Ordering;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::bbox::BBox;
use crate::config::DetectionConfig;

/// Closed set of object classes the engine tracks. Raw detector class ids
/// are mapped onto this enum by the allow-list in [`DetectionConfig`];
/// everything else is discarded at the filter boundary.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    Person,
    Umbrella,
}

/// One detector output box, exactly as delivered by the external model.
#[derive(Clone, Copy, Debug)]
pub struct RawDetection {
    pub class_id: u32,
    pub score: f64,
    pub x_1: f64,
    pub y_1: f64,
    pub x_2: f64,
    pub y_2: f64,
}

#[derive(Clone, Copy, Debug)]
pub struct Detection {
    pub bbox: BBox,
    pub class: ObjectClass,
    pub score: f64,
}

impl Detection {
    pub fn centroid(&self) -> Vector2<f64> {
        self.bbox.centroid()
    }
}

/// Normalizes a frame's raw detections before they reach the tracker:
/// class allow-list, confidence floor, geometry sanity, area and aspect
/// bands, then per-class non-maximum suppression.
pub struct DetectionFilter;

impl DetectionFilter {
    pub fn apply(config: &DetectionConfig, raw: &[RawDetection]) -> Vec<Detection> {
        let mut detections: Vec<Detection> = raw
            .iter()
            .filter_map(|r| Self::accept(config, r))
            .collect();

        detections = Self::suppress_overlaps(detections, config.nms_iou);

        trace!(raw = raw.len(), kept = detections.len(), "detections filtered");
        detections
    }

    fn accept(config: &DetectionConfig, raw: &RawDetection) -> Option<Detection> {
        let class = if raw.class_id == config.person_class {
            ObjectClass::Person
        } else if raw.class_id == config.umbrella_class {
            ObjectClass::Umbrella
        } else {
            return None;
        };

        if !raw.score.is_finite() || raw.score < config.min_confidence {
            return None;
        }

        let corners = [raw.x_1, raw.y_1, raw.x_2, raw.y_2];
        if corners.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let bbox = BBox::new(raw.x_1, raw.y_1, raw.x_2, raw.y_2);
        if !bbox.is_valid() {
            return None;
        }

        let area = bbox.area();
        if area < config.min_area || area > config.max_area {
            return None;
        }

        let aspect = bbox.aspect_ratio();
        if aspect < config.min_aspect || aspect > config.max_aspect {
            return None;
        }

        Some(Detection {
            bbox,
            class,
            score: raw.score.min(1.0),
        })
    }

    /// Greedy per-class non-maximum suppression, highest score first.
    fn suppress_overlaps(mut detections: Vec<Detection>, iou_threshold: f64) -> Vec<Detection> {
        detections.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
        for candidate in detections {
            let suppressed = kept.iter().any(|k| {
                k.class == candidate.class && k.bbox.iou(&candidate.bbox) > iou_threshold
            });
            if !suppressed {
                kept.push(candidate);
            }
        }
        kept
    }
}
