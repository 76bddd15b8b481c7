use std::collections::HashSet;

use nalgebra::Vector2;
use pathfinding::prelude::{Matrix, kuhn_munkres_min};

use crate::detection::Detection;
use crate::track::Track;

// used to convert pixel distances to some large integer since
// the weight matrix of the hungarian algorithm only
// accepts integers.
const DISTANCE_MULTIPLIER: f64 = 1000.0;

// Cost for a pair that must never match (gate exceeded, class mismatch,
// non-finite geometry). Large against any real distance, small enough that
// a full frame of forced assignments stays far below i64 overflow.
const INELIGIBLE_COST: i64 = 1_000_000_000;

/// Assigns detections to tracks by minimizing summed centroid distance.
///
/// ## Args
///  - detections: The frame's filtered detections.
///  - tracks: All live tracks, sorted by ascending id.
///  - predicted: Predicted centroid per track, parallel to `tracks`.
///  - max_distance: The matching gate; pairs further apart than this are
///    ineligible regardless of the global optimum.
///
/// A pair is only valid when the classes agree and the distance is inside
/// the gate. Equal-distance ties resolve to the lower track id.
///
/// Returns (matched (detection, track) index pairs, unmatched detection
/// indices, unmatched track indices).
pub fn associate_detections_to_tracks(
    detections: &[Detection],
    tracks: &[Track],
    predicted: &[Vector2<f64>],
    max_distance: f64,
) -> (Vec<(usize, usize)>, Vec<usize>, Vec<usize>) {
    if detections.is_empty() || tracks.is_empty() {
        return (
            Vec::new(),
            (0..detections.len()).collect(),
            (0..tracks.len()).collect(),
        );
    }

    let distance_matrix = calc_distance_matrix(detections, predicted);
    let cost_matrix = calc_cost_matrix(detections, tracks, &distance_matrix, max_distance);

    calculate_matching(detections, tracks, &cost_matrix, &distance_matrix, max_distance)
}

fn calc_distance_matrix(detections: &[Detection], predicted: &[Vector2<f64>]) -> Vec<Vec<f64>> {
    detections
        .iter()
        .map(|detection| {
            let centroid = detection.centroid();
            predicted.iter().map(|p| (centroid - p).norm()).collect()
        })
        .collect()
}

fn calc_cost_matrix(
    detections: &[Detection],
    tracks: &[Track],
    distance_matrix: &[Vec<f64>],
    max_distance: f64,
) -> Matrix<i64> {
    let rows = detections.len();
    let columns = tracks.len();

    let mut matrix = Matrix::new(rows, columns, 0i64);

    for (i, detection) in detections.iter().enumerate() {
        for (j, track) in tracks.iter().enumerate() {
            let distance = distance_matrix[i][j];

            matrix[(i, j)] = if !distance.is_finite()
                || distance > max_distance
                || detection.class != track.class
            {
                INELIGIBLE_COST
            } else {
                // The column index is a sub-pixel bias that keeps
                // equal-distance assignments on the lowest track id.
                (distance * DISTANCE_MULTIPLIER) as i64 + j as i64
            };
        }
    }

    matrix
}

fn calculate_matching(
    detections: &[Detection],
    tracks: &[Track],
    cost_matrix: &Matrix<i64>,
    distance_matrix: &[Vec<f64>],
    max_distance: f64,
) -> (Vec<(usize, usize)>, Vec<usize>, Vec<usize>) {
    // kuhn_munkres requires rows <= columns.
    let transpose = cost_matrix.rows > cost_matrix.columns;
    let transposed;
    let weights = if transpose {
        transposed = cost_matrix.transposed();
        &transposed
    } else {
        cost_matrix
    };

    let assignment_vector = kuhn_munkres_min(weights).1;
    let assigned: HashSet<usize> = assignment_vector.iter().cloned().collect();

    let mut unmatched_detections = if transpose {
        (0..weights.columns)
            .filter(|col| !assigned.contains(col))
            .collect()
    } else {
        Vec::new()
    };
    let mut unmatched_tracks = if transpose {
        Vec::new()
    } else {
        (0..weights.columns)
            .filter(|col| !assigned.contains(col))
            .collect()
    };

    let mut matched = Vec::new();

    for (i, &j) in assignment_vector.iter().enumerate() {
        let (detection_index, track_index) = if transpose { (j, i) } else { (i, j) };

        let distance = distance_matrix[detection_index][track_index];
        let invalid_distance = !distance.is_finite() || distance > max_distance;
        let invalid_class = detections[detection_index].class != tracks[track_index].class;

        if invalid_distance || invalid_class {
            unmatched_detections.push(detection_index);
            unmatched_tracks.push(track_index);
            continue;
        }
        matched.push((detection_index, track_index));
    }

    unmatched_detections.sort_unstable();
    unmatched_tracks.sort_unstable();

    (matched, unmatched_detections, unmatched_tracks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;
    use crate::detection::ObjectClass;

    fn detection_at(x: f64, y: f64, class: ObjectClass) -> Detection {
        Detection {
            bbox: BBox::new(x - 10.0, y - 20.0, x + 10.0, y + 20.0),
            class,
            score: 0.9,
        }
    }

    fn track_at(id: u64, x: f64, y: f64, class: ObjectClass) -> (Track, Vector2<f64>) {
        let track = Track::new(id, class, Vector2::new(x, y), 0, 25.0);
        let predicted = Vector2::new(x, y);
        (track, predicted)
    }

    #[test]
    fn test_nearest_track_wins() {
        let detections = vec![
            detection_at(0.0, 0.0, ObjectClass::Person),
            detection_at(100.0, 0.0, ObjectClass::Person),
        ];
        let (track_a, predicted_a) = track_at(0, 2.0, 0.0, ObjectClass::Person);
        let (track_b, predicted_b) = track_at(1, 98.0, 0.0, ObjectClass::Person);

        let (matched, unmatched_detections, unmatched_tracks) = associate_detections_to_tracks(
            &detections,
            &[track_a, track_b],
            &[predicted_a, predicted_b],
            50.0,
        );

        assert_eq!(matched, vec![(0, 0), (1, 1)]);
        assert!(unmatched_detections.is_empty());
        assert!(unmatched_tracks.is_empty());
    }

    #[test]
    fn test_gate_rejects_distant_pairs() {
        let detections = vec![detection_at(0.0, 0.0, ObjectClass::Person)];
        let (track, predicted) = track_at(0, 200.0, 0.0, ObjectClass::Person);

        let (matched, unmatched_detections, unmatched_tracks) =
            associate_detections_to_tracks(&detections, &[track], &[predicted], 50.0);

        assert!(matched.is_empty());
        assert_eq!(unmatched_detections, vec![0]);
        assert_eq!(unmatched_tracks, vec![0]);
    }

    #[test]
    fn test_class_mismatch_never_matches() {
        let detections = vec![detection_at(0.0, 0.0, ObjectClass::Umbrella)];
        let (track, predicted) = track_at(0, 1.0, 0.0, ObjectClass::Person);

        let (matched, unmatched_detections, unmatched_tracks) =
            associate_detections_to_tracks(&detections, &[track], &[predicted], 50.0);

        assert!(matched.is_empty());
        assert_eq!(unmatched_detections, vec![0]);
        assert_eq!(unmatched_tracks, vec![0]);
    }

    #[test]
    fn test_equal_distance_tie_prefers_lower_id() {
        let detections = vec![detection_at(50.0, 0.0, ObjectClass::Person)];
        let (track_a, predicted_a) = track_at(3, 40.0, 0.0, ObjectClass::Person);
        let (track_b, predicted_b) = track_at(7, 60.0, 0.0, ObjectClass::Person);

        let (matched, _, unmatched_tracks) = associate_detections_to_tracks(
            &detections,
            &[track_a, track_b],
            &[predicted_a, predicted_b],
            50.0,
        );

        assert_eq!(matched, vec![(0, 0)]);
        assert_eq!(unmatched_tracks, vec![1]);
    }
}
