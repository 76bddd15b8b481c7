use tracing::debug;

use crate::associate::associate_detections_to_tracks;
use crate::config::TrackingConfig;
use crate::detection::Detection;
use crate::track::{Track, TrackId};

/// Per-instance identity assignment. Owns the live track set and the id
/// counter; ids increase monotonically and are never reused, including
/// across [`CentroidTracker::clear`]. Tracks are stored in creation order,
/// which is also ascending id order.
pub struct CentroidTracker {
    tracks: Vec<Track>,
    next_id: TrackId,
}

impl Default for CentroidTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl CentroidTracker {
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 0,
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub(crate) fn tracks_mut(&mut self) -> &mut [Track] {
        &mut self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Drops all live tracks. The id counter is kept so identities from
    /// before the reset can never be reassigned.
    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    /// Advances the tracker by one frame.
    ///
    /// Every live track is predicted, detections are assigned under the
    /// distance gate, matched tracks are corrected, unmatched detections
    /// spawn new tracks and unmatched tracks age. An empty detection slice
    /// is not an error; it ages every track.
    ///
    /// Returns the ids of tracks removed this frame.
    pub fn update(
        &mut self,
        detections: &[Detection],
        config: &TrackingConfig,
        frame: u64,
    ) -> Vec<TrackId> {
        let predicted: Vec<_> = self
            .tracks
            .iter_mut()
            .map(|track| track.motion.predict())
            .collect();

        let (matched, unmatched_detections, unmatched_tracks) =
            associate_detections_to_tracks(detections, &self.tracks, &predicted, config.max_distance);

        for &(detection_index, track_index) in &matched {
            let track = &mut self.tracks[track_index];
            let corrected = track.motion.update(detections[detection_index].centroid());
            track.misses = 0;
            track.record_position(corrected, config.history_len);
        }

        for &track_index in &unmatched_tracks {
            let track = &mut self.tracks[track_index];
            track.misses += 1;
            track.record_position(predicted[track_index], config.history_len);
        }

        for &detection_index in &unmatched_detections {
            let detection = &detections[detection_index];
            let track = Track::new(
                self.next_id,
                detection.class,
                detection.centroid(),
                frame,
                config.velocity_clamp,
            );
            debug!(id = track.id, class = ?track.class, "track created");
            self.next_id += 1;
            self.tracks.push(track);
        }

        let mut removed = Vec::new();
        self.tracks.retain(|track| {
            if track.misses > config.max_misses {
                debug!(id = track.id, misses = track.misses, "track removed");
                removed.push(track.id);
                return false;
            }
            true
        });

        removed
    }
}
