use std::cmp::Ordering;

use itertools::Itertools;
use serde::Serialize;
use tracing::info;

use crate::config::CorrelationConfig;
use crate::detection::ObjectClass;
use crate::track::{Track, TrackId};

pub type CompositeId = u64;

/// A person track and the umbrella track it carries, counted as one
/// entity. `missed_frames` counts consecutive frames the pair geometry
/// failed; reaching the configured grace period dissolves the composite.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct Composite {
    pub id: CompositeId,
    pub person: TrackId,
    pub umbrella: TrackId,
    #[serde(skip)]
    pub missed_frames: u32,
}

struct PairCandidate {
    person: TrackId,
    umbrella: TrackId,
    streak: u32,
}

/// Links person and umbrella tracks into composites.
pub struct Correlator {
    composites: Vec<Composite>,
    candidates: Vec<PairCandidate>,
    next_id: CompositeId,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            composites: Vec::new(),
            candidates: Vec::new(),
            next_id: 0,
        }
    }

    pub fn composites(&self) -> &[Composite] {
        &self.composites
    }

    pub fn clear(&mut self) {
        self.composites.clear();
        self.candidates.clear();
    }

    /// Dissolves composites and candidates whose members were removed by
    /// the tracker this frame.
    pub fn prune(&mut self, removed: &[TrackId], tracks: &mut [Track]) {
        if removed.is_empty() {
            return;
        }

        let gone = |id: TrackId| removed.contains(&id);

        let mut dissolved = Vec::new();
        self.composites.retain(|composite| {
            if gone(composite.person) || gone(composite.umbrella) {
                dissolved.push(*composite);
                return false;
            }
            true
        });
        for composite in dissolved {
            info!(composite = composite.id, "composite dissolved, member lost");
            release_members(tracks, &composite);
        }

        self.candidates
            .retain(|candidate| !gone(candidate.person) && !gone(candidate.umbrella));
    }

    /// Evaluates the carry test for one frame: existing composites decay
    /// or refresh, candidate pairs accumulate their streak, and pairs that
    /// held for the configured number of consecutive frames are promoted.
    pub fn update(&mut self, tracks: &mut [Track], config: &CorrelationConfig) {
        self.refresh_composites(tracks, config);
        self.advance_candidates(tracks, config);
        self.promote_candidates(tracks, config);
    }

    /// Dissolves every composite, e.g. when correlation is switched off.
    pub fn dissolve_all(&mut self, tracks: &mut [Track]) {
        for composite in std::mem::take(&mut self.composites) {
            release_members(tracks, &composite);
        }
        self.candidates.clear();
    }

    fn refresh_composites(&mut self, tracks: &mut [Track], config: &CorrelationConfig) {
        for composite in &mut self.composites {
            let person = find(tracks, composite.person);
            let umbrella = find(tracks, composite.umbrella);

            let holds = match (person, umbrella) {
                (Some(p), Some(u)) => carried_by(&tracks[p], &tracks[u], config),
                _ => false,
            };

            if holds {
                composite.missed_frames = 0;
            } else {
                composite.missed_frames += 1;
            }
        }

        let dissolve_after = config.dissolve_after;
        let mut dissolved = Vec::new();
        self.composites.retain(|composite| {
            if composite.missed_frames > dissolve_after {
                dissolved.push(*composite);
                return false;
            }
            true
        });
        for composite in dissolved {
            info!(composite = composite.id, "composite dissolved, correlation lost");
            release_members(tracks, &composite);
        }
    }

    fn advance_candidates(&mut self, tracks: &[Track], config: &CorrelationConfig) {
        let person_indices: Vec<usize> = tracks
            .iter()
            .positions(|t| t.class == ObjectClass::Person && t.composite.is_none())
            .collect();
        let umbrella_indices: Vec<usize> = tracks
            .iter()
            .positions(|t| t.class == ObjectClass::Umbrella && t.composite.is_none())
            .collect();

        // Each umbrella courts its nearest qualifying person this frame.
        let mut confirmed: Vec<(TrackId, TrackId)> = Vec::new();
        for &u in &umbrella_indices {
            let umbrella = &tracks[u];
            let nearest = person_indices
                .iter()
                .filter(|&&p| carried_by(&tracks[p], umbrella, config))
                .min_by(|&&a, &&b| {
                    let da = (tracks[a].centroid() - umbrella.centroid()).norm();
                    let db = (tracks[b].centroid() - umbrella.centroid()).norm();
                    da.partial_cmp(&db).unwrap_or(Ordering::Equal)
                });

            if let Some(&p) = nearest {
                confirmed.push((tracks[p].id, umbrella.id));
            }
        }

        // A streak only survives while the same pairing is confirmed on
        // every consecutive frame.
        self.candidates
            .retain(|candidate| confirmed.contains(&(candidate.person, candidate.umbrella)));
        for candidate in &mut self.candidates {
            candidate.streak += 1;
        }
        for (person, umbrella) in confirmed {
            let known = self
                .candidates
                .iter()
                .any(|c| c.person == person && c.umbrella == umbrella);
            if !known {
                self.candidates.push(PairCandidate {
                    person,
                    umbrella,
                    streak: 1,
                });
            }
        }
    }

    fn promote_candidates(&mut self, tracks: &mut [Track], config: &CorrelationConfig) {
        let ready: Vec<(TrackId, TrackId)> = self
            .candidates
            .iter()
            .filter(|c| c.streak >= config.promote_after)
            .map(|c| (c.person, c.umbrella))
            .collect();

        for (person, umbrella) in ready {
            self.candidates
                .retain(|c| !(c.person == person && c.umbrella == umbrella));

            let (Some(p), Some(u)) = (find(tracks, person), find(tracks, umbrella)) else {
                continue;
            };
            if tracks[p].composite.is_some() || tracks[u].composite.is_some() {
                continue;
            }

            let composite = Composite {
                id: self.next_id,
                person,
                umbrella,
                missed_frames: 0,
            };
            self.next_id += 1;

            tracks[p].composite = Some(composite.id);
            tracks[u].composite = Some(composite.id);
            info!(
                composite = composite.id,
                person, umbrella, "composite promoted"
            );
            self.composites.push(composite);
        }
    }
}

/// The carry test: the umbrella centroid sits within the configured
/// distance of the person centroid, and its bearing from the person lies
/// within the configured cone around straight up (image y grows downward).
fn carried_by(person: &Track, umbrella: &Track, config: &CorrelationConfig) -> bool {
    let pc = person.centroid();
    let uc = umbrella.centroid();

    let distance = (pc - uc).norm();
    if !distance.is_finite() || distance > config.max_distance {
        return false;
    }

    let dx = uc.x - pc.x;
    let up = pc.y - uc.y;
    if up <= 0.0 {
        return false;
    }

    dx.abs().atan2(up).to_degrees() <= config.max_angle_deg
}

fn find(tracks: &[Track], id: TrackId) -> Option<usize> {
    tracks.iter().position(|t| t.id == id)
}

fn release_members(tracks: &mut [Track], composite: &Composite) {
    for track in tracks.iter_mut() {
        if track.id == composite.person || track.id == composite.umbrella {
            track.composite = None;
            // The accessory's side state froze while it was excluded from
            // counting; force re-discovery so the backlog of movement
            // cannot fire a count.
            if track.class == ObjectClass::Umbrella {
                track.reset_crossing_state();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector2;

    fn config() -> CorrelationConfig {
        CorrelationConfig {
            promote_after: 3,
            ..CorrelationConfig::default()
        }
    }

    fn person(id: TrackId, x: f64, y: f64) -> Track {
        Track::new(id, ObjectClass::Person, Vector2::new(x, y), 0, 25.0)
    }

    fn umbrella(id: TrackId, x: f64, y: f64) -> Track {
        Track::new(id, ObjectClass::Umbrella, Vector2::new(x, y), 0, 25.0)
    }

    #[test]
    fn test_pair_promotes_after_consecutive_frames() {
        let config = config();
        let mut correlator = Correlator::new();
        let mut tracks = vec![person(0, 100.0, 200.0), umbrella(1, 105.0, 150.0)];

        correlator.update(&mut tracks, &config);
        correlator.update(&mut tracks, &config);
        assert!(correlator.composites().is_empty());

        correlator.update(&mut tracks, &config);
        assert_eq!(correlator.composites().len(), 1);
        assert_eq!(tracks[0].composite, Some(0));
        assert_eq!(tracks[1].composite, Some(0));
    }

    #[test]
    fn test_interrupted_streak_starts_over() {
        let config = config();
        let mut correlator = Correlator::new();
        let mut tracks = vec![person(0, 100.0, 200.0), umbrella(1, 105.0, 150.0)];

        correlator.update(&mut tracks, &config);
        correlator.update(&mut tracks, &config);

        // Move the umbrella out of reach for one frame.
        let far = umbrella(1, 400.0, 150.0);
        tracks[1] = far;
        correlator.update(&mut tracks, &config);

        tracks[1] = umbrella(1, 105.0, 150.0);
        correlator.update(&mut tracks, &config);
        correlator.update(&mut tracks, &config);
        assert!(correlator.composites().is_empty());

        correlator.update(&mut tracks, &config);
        assert_eq!(correlator.composites().len(), 1);
    }

    #[test]
    fn test_umbrella_below_person_is_not_carried() {
        let config = config();
        let mut correlator = Correlator::new();
        let mut tracks = vec![person(0, 100.0, 200.0), umbrella(1, 100.0, 260.0)];

        for _ in 0..5 {
            correlator.update(&mut tracks, &config);
        }

        assert!(correlator.composites().is_empty());
    }

    #[test]
    fn test_umbrella_pairs_with_nearest_person() {
        let config = config();
        let mut correlator = Correlator::new();
        let mut tracks = vec![
            person(0, 60.0, 200.0),
            person(1, 100.0, 200.0),
            umbrella(2, 95.0, 150.0),
        ];

        for _ in 0..3 {
            correlator.update(&mut tracks, &config);
        }

        assert_eq!(correlator.composites().len(), 1);
        assert_eq!(correlator.composites()[0].person, 1);
        assert_eq!(tracks[0].composite, None);
    }

    #[test]
    fn test_dissolution_after_grace_period() {
        let mut config = config();
        config.dissolve_after = 2;

        let mut correlator = Correlator::new();
        let mut tracks = vec![person(0, 100.0, 200.0), umbrella(1, 105.0, 150.0)];

        for _ in 0..3 {
            correlator.update(&mut tracks, &config);
        }
        assert_eq!(correlator.composites().len(), 1);

        // Separate the pair; the composite outlives the failure for the
        // grace period, then dissolves.
        tracks[1] = umbrella(1, 400.0, 150.0);
        tracks[1].composite = Some(0);
        correlator.update(&mut tracks, &config);
        correlator.update(&mut tracks, &config);
        assert_eq!(correlator.composites().len(), 1);

        correlator.update(&mut tracks, &config);
        assert!(correlator.composites().is_empty());
        assert_eq!(tracks[0].composite, None);
        assert_eq!(tracks[1].composite, None);
    }

    #[test]
    fn test_member_removal_dissolves_composite() {
        let config = config();
        let mut correlator = Correlator::new();
        let mut tracks = vec![person(0, 100.0, 200.0), umbrella(1, 105.0, 150.0)];

        for _ in 0..3 {
            correlator.update(&mut tracks, &config);
        }
        assert_eq!(correlator.composites().len(), 1);

        let mut remaining = vec![tracks.remove(1)];
        correlator.prune(&[0], &mut remaining);

        assert!(correlator.composites().is_empty());
        assert_eq!(remaining[0].composite, None);
    }

    #[test]
    fn test_composited_person_is_not_repaired() {
        let config = config();
        let mut correlator = Correlator::new();
        let mut tracks = vec![
            person(0, 100.0, 200.0),
            umbrella(1, 105.0, 150.0),
            umbrella(2, 95.0, 150.0),
        ];

        for _ in 0..6 {
            correlator.update(&mut tracks, &config);
        }

        assert_eq!(correlator.composites().len(), 1);
        assert_eq!(correlator.composites()[0].umbrella, 1);
        assert_eq!(tracks[2].composite, None);
    }
}
