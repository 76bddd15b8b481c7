use std::collections::VecDeque;

use nalgebra::Vector2;
use serde::Serialize;

use crate::correlate::CompositeId;
use crate::detection::ObjectClass;
use crate::motion::CentroidFilter;

pub type TrackId = u64;

/// Which half-plane of a boundary line a track was last seen on.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Undetermined,
    A,
    B,
}

/// Per-line crossing state. `counted_entry`/`counted_exit` enforce the
/// at-most-one-count-per-direction invariant: each flag is set when its
/// direction fires and cleared only when the opposite transition completes.
#[derive(Clone, Copy, Debug)]
pub struct LineState {
    pub side: Side,
    pub counted_entry: bool,
    pub counted_exit: bool,
}

impl Default for LineState {
    fn default() -> Self {
        Self {
            side: Side::Undetermined,
            counted_entry: false,
            counted_exit: false,
        }
    }
}

pub struct Track {
    pub id: TrackId,
    pub class: ObjectClass,
    pub motion: CentroidFilter,
    pub history: VecDeque<Vector2<f64>>,
    pub misses: u32,
    pub created_at: u64,
    pub line_states: Vec<LineState>,
    pub composite: Option<CompositeId>,
}

impl Track {
    pub fn new(
        id: TrackId,
        class: ObjectClass,
        centroid: Vector2<f64>,
        created_at: u64,
        velocity_clamp: f64,
    ) -> Self {
        let mut history = VecDeque::new();
        history.push_back(centroid);

        Self {
            id,
            class,
            motion: CentroidFilter::new(centroid, velocity_clamp),
            history,
            misses: 0,
            created_at,
            line_states: Vec::new(),
            composite: None,
        }
    }

    pub fn centroid(&self) -> Vector2<f64> {
        self.motion.position()
    }

    pub fn record_position(&mut self, position: Vector2<f64>, history_len: usize) {
        if self.history.len() >= history_len {
            self.history.pop_front();
        }
        self.history.push_back(position);
    }

    /// Accessory member of a composite; excluded from line evaluation.
    pub fn is_composited_accessory(&self) -> bool {
        self.composite.is_some() && self.class == ObjectClass::Umbrella
    }

    /// Forgets all per-line crossing state; sides are re-determined on the
    /// next evaluated frame without firing a count.
    pub fn reset_crossing_state(&mut self) {
        for state in &mut self.line_states {
            *state = LineState::default();
        }
    }
}
