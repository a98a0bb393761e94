use std::cmp::Ordering;
use std::collections::HashMap;

use crate::types::ScoredKeypoint;

/// Sorts strongest first; ties keep their incoming order
pub fn sort_by_response(keypoints: &mut [ScoredKeypoint]) {
    keypoints.sort_by(|a, b| b.response.partial_cmp(&a.response).unwrap_or(Ordering::Equal));
}

/// Greedy non-maximum suppression.
///
/// Walks the keypoints strongest first and accepts one only if no accepted
/// keypoint lies strictly closer than `min_distance`. Accepted points are
/// bucketed on a grid of `min_distance` cells so only the 3x3 neighbourhood
/// is searched. The result is ordered by descending response.
pub fn non_maximum_suppression(keypoints: &[ScoredKeypoint], min_distance: f32) -> Vec<ScoredKeypoint> {
    let mut sorted = keypoints.to_vec();
    sort_by_response(&mut sorted);

    if min_distance <= 0.0 || sorted.len() < 2 {
        return sorted;
    }

    let cell = min_distance;
    let min_distance_sq = min_distance * min_distance;
    let cell_of = |kp: &ScoredKeypoint| {
        (
            (kp.keypoint.x / cell).floor() as i64,
            (kp.keypoint.y / cell).floor() as i64,
        )
    };

    let mut grid: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    let mut accepted: Vec<ScoredKeypoint> = Vec::new();

    for candidate in sorted {
        let (cx, cy) = cell_of(&candidate);
        let suppressed = (cx - 1..=cx + 1).any(|gx| {
            (cy - 1..=cy + 1).any(|gy| {
                grid.get(&(gx, gy)).is_some_and(|bucket| {
                    bucket.iter().any(|&i| {
                        let dx = candidate.keypoint.x - accepted[i].keypoint.x;
                        let dy = candidate.keypoint.y - accepted[i].keypoint.y;
                        dx * dx + dy * dy < min_distance_sq
                    })
                })
            })
        });

        if !suppressed {
            grid.entry((cx, cy)).or_default().push(accepted.len());
            accepted.push(candidate);
        }
    }

    accepted
}

/// Keeps the `max` strongest keypoints
pub fn retain_strongest(keypoints: &mut Vec<ScoredKeypoint>, max: usize) {
    sort_by_response(keypoints);
    keypoints.truncate(max);
}
