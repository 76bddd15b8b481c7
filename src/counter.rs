use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::track::{LineState, Side, Track, TrackId};

/// A directed virtual boundary in frame coordinates.
///
/// The side of a point is the sign of the cross product with the segment
/// direction: side B is the half-plane the cross product is non-negative
/// on, so points exactly on the line are side B. Crossing A to B counts as
/// an entry, B to A as an exit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundaryLine {
    pub x_1: f64,
    pub y_1: f64,
    pub x_2: f64,
    pub y_2: f64,
}

impl BoundaryLine {
    pub fn new(x_1: f64, y_1: f64, x_2: f64, y_2: f64) -> Self {
        Self { x_1, y_1, x_2, y_2 }
    }

    /// Vertical line spanning the frame height; side B is the half-plane
    /// at or right of `x`, so left-to-right movement is an entry.
    pub fn vertical(x: f64, height: f64) -> Self {
        Self::new(x, height, x, 0.0)
    }

    /// Horizontal line at `y` spanning the frame width; side B is below
    /// the line (image y grows downward), so downward movement is an
    /// entry.
    pub fn horizontal(y: f64, width: f64) -> Self {
        Self::new(0.0, y, width, y)
    }

    pub fn side_of(&self, point: Vector2<f64>) -> Side {
        let cross = (self.x_2 - self.x_1) * (point.y - self.y_1)
            - (self.y_2 - self.y_1) * (point.x - self.x_1);
        if cross >= 0.0 { Side::B } else { Side::A }
    }

    pub fn is_degenerate(&self) -> bool {
        let finite = [self.x_1, self.y_1, self.x_2, self.y_2]
            .iter()
            .all(|v| v.is_finite());
        !finite || (self.x_1 == self.x_2 && self.y_1 == self.y_2)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Entry,
    Exit,
}

/// Running totals for one boundary line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LineTotals {
    pub entries: u64,
    pub exits: u64,
}

impl LineTotals {
    /// Net occupancy change contributed by this line.
    pub fn delta(&self) -> i64 {
        self.entries as i64 - self.exits as i64
    }
}

/// A crossing counted this frame, with the totals after the event.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct CountEvent {
    pub line: usize,
    pub direction: Direction,
    pub track: TrackId,
    pub entries: u64,
    pub exits: u64,
}

/// Converts track trajectories into entry/exit counts per boundary line.
pub struct CrossingCounter {
    totals: Vec<LineTotals>,
}

impl Default for CrossingCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl CrossingCounter {
    pub fn new() -> Self {
        Self { totals: Vec::new() }
    }

    pub fn totals(&self) -> &[LineTotals] {
        &self.totals
    }

    pub fn reset(&mut self) {
        for totals in &mut self.totals {
            *totals = LineTotals::default();
        }
    }

    /// Keeps per-line totals aligned with the configured line list.
    /// Totals at surviving indices persist across a geometry tweak.
    pub fn resize(&mut self, lines: usize) {
        self.totals.resize(lines, LineTotals::default());
    }

    /// Advances every track's crossing state machine one frame and
    /// returns the events fired.
    ///
    /// The first frame a side is determined never counts; a count fires
    /// only on a completed A/B transition, at most once per direction
    /// until the opposite transition completes. Composited umbrellas are
    /// skipped entirely.
    pub fn process(&mut self, tracks: &mut [Track], lines: &[BoundaryLine]) -> Vec<CountEvent> {
        self.resize(lines.len());

        let mut events = Vec::new();
        for track in tracks.iter_mut() {
            if track.is_composited_accessory() {
                continue;
            }

            let centroid = track.centroid();
            if !centroid.x.is_finite() || !centroid.y.is_finite() {
                continue;
            }

            track
                .line_states
                .resize(lines.len(), LineState::default());

            for (index, line) in lines.iter().enumerate() {
                let side = line.side_of(centroid);
                let state = &mut track.line_states[index];

                match (state.side, side) {
                    (Side::Undetermined, _) => state.side = side,
                    (Side::A, Side::B) => {
                        state.side = Side::B;
                        if !state.counted_entry {
                            state.counted_entry = true;
                            events.push(self.fire(index, Direction::Entry, track.id));
                        }
                        state.counted_exit = false;
                    }
                    (Side::B, Side::A) => {
                        state.side = Side::A;
                        if !state.counted_exit {
                            state.counted_exit = true;
                            events.push(self.fire(index, Direction::Exit, track.id));
                        }
                        state.counted_entry = false;
                    }
                    _ => {}
                }
            }
        }
        events
    }

    fn fire(&mut self, line: usize, direction: Direction, track: TrackId) -> CountEvent {
        let totals = &mut self.totals[line];
        match direction {
            Direction::Entry => totals.entries += 1,
            Direction::Exit => totals.exits += 1,
        }

        info!(
            track,
            line,
            direction = ?direction,
            entries = totals.entries,
            exits = totals.exits,
            delta = totals.delta(),
            "crossing counted"
        );

        CountEvent {
            line,
            direction,
            track,
            entries: totals.entries,
            exits: totals.exits,
        }
    }
}
