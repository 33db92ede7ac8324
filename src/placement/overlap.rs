//! Resolution of markers that overlap on screen
//!
//! Two markers overlap when their relative bearings are within a tolerance of
//! each other. Clusters are resolved nearest first.

use crate::algorithms::geodesy::bearing_difference;
use crate::placement::MarkerId;
use crate::utils::config::PlacementConfig;

/// How overlapping markers are treated
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlapPolicy {
    /// Overlaps are left alone
    Ignore,
    /// Each marker is raised by `step_m` per nearer marker it overlaps
    Offset { tolerance_deg: f64, step_m: f64 },
    /// Markers overlapping a nearer visible marker are hidden
    Remove { tolerance_deg: f64 },
}

impl OverlapPolicy {
    pub fn from_config(config: &PlacementConfig) -> Self {
        let tolerance_deg = config.overlap_bearing_tolerance_deg;
        if config.remove_overlapping {
            OverlapPolicy::Remove { tolerance_deg }
        } else if config.offset_overlapping {
            OverlapPolicy::Offset {
                tolerance_deg,
                step_m: config.overlap_height_step_m,
            }
        } else {
            OverlapPolicy::Ignore
        }
    }
}

/// A placed marker as seen by the overlap resolver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapCandidate {
    pub marker: MarkerId,
    pub relative_bearing_deg: f64,
    pub true_distance_m: f64,
}

/// Adjustment decided for one marker
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlapAction {
    Raise { marker: MarkerId, by_m: f64 },
    Hide { marker: MarkerId },
}

/// Decide raises or removals for a set of placed markers
pub fn resolve_overlaps(candidates: &[OverlapCandidate], policy: OverlapPolicy) -> Vec<OverlapAction> {
    let tolerance_deg = match policy {
        OverlapPolicy::Ignore => return Vec::new(),
        OverlapPolicy::Offset { tolerance_deg, .. } | OverlapPolicy::Remove { tolerance_deg } => tolerance_deg,
    };

    let mut by_distance: Vec<&OverlapCandidate> = candidates.iter().collect();
    by_distance.sort_by(|a, b| a.true_distance_m.total_cmp(&b.true_distance_m));

    let overlaps = |a: &OverlapCandidate, b: &OverlapCandidate| {
        bearing_difference(a.relative_bearing_deg, b.relative_bearing_deg) < tolerance_deg
    };

    let mut actions = Vec::new();
    let mut kept: Vec<&OverlapCandidate> = Vec::with_capacity(by_distance.len());

    for candidate in by_distance {
        match policy {
            OverlapPolicy::Offset { step_m, .. } => {
                let nearer = kept.iter().filter(|other| overlaps(candidate, other)).count();
                if nearer > 0 {
                    actions.push(OverlapAction::Raise {
                        marker: candidate.marker,
                        by_m: step_m * nearer as f64,
                    });
                }
                kept.push(candidate);
            }
            OverlapPolicy::Remove { .. } => {
                if kept.iter().any(|other| overlaps(candidate, other)) {
                    actions.push(OverlapAction::Hide {
                        marker: candidate.marker,
                    });
                } else {
                    kept.push(candidate);
                }
            }
            OverlapPolicy::Ignore => {}
        }
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(index: usize, bearing: f64, distance: f64) -> OverlapCandidate {
        OverlapCandidate {
            marker: MarkerId::new(index),
            relative_bearing_deg: bearing,
            true_distance_m: distance,
        }
    }

    #[test]
    fn test_policy_from_config() {
        let mut config = PlacementConfig::default();
        assert_eq!(OverlapPolicy::from_config(&config), OverlapPolicy::Ignore);

        config.offset_overlapping = true;
        assert_eq!(
            OverlapPolicy::from_config(&config),
            OverlapPolicy::Offset {
                tolerance_deg: 5.0,
                step_m: 0.5
            }
        );
    }

    #[test]
    fn test_offset_raises_farther_markers() {
        let candidates = [
            candidate(0, 10.0, 300.0),
            candidate(1, 12.0, 100.0),
            candidate(2, 358.0, 200.0),
            candidate(3, 90.0, 50.0),
        ];
        let actions = resolve_overlaps(
            &candidates,
            OverlapPolicy::Offset {
                tolerance_deg: 5.0,
                step_m: 0.5,
            },
        );

        // 358 and 12 are 14 degrees apart
        assert_eq!(
            actions,
            vec![OverlapAction::Raise {
                marker: MarkerId::new(0),
                by_m: 0.5
            }]
        );
    }

    #[test]
    fn test_offset_stacks_clusters() {
        let candidates = [candidate(0, 1.0, 300.0), candidate(1, 359.0, 200.0), candidate(2, 0.0, 100.0)];
        let actions = resolve_overlaps(
            &candidates,
            OverlapPolicy::Offset {
                tolerance_deg: 5.0,
                step_m: 0.5,
            },
        );

        assert_eq!(
            actions,
            vec![
                OverlapAction::Raise {
                    marker: MarkerId::new(1),
                    by_m: 0.5
                },
                OverlapAction::Raise {
                    marker: MarkerId::new(0),
                    by_m: 1.0
                },
            ]
        );
    }

    #[test]
    fn test_remove_keeps_nearest() {
        let candidates = [candidate(0, 45.0, 900.0), candidate(1, 47.0, 150.0), candidate(2, 180.0, 400.0)];
        let actions = resolve_overlaps(&candidates, OverlapPolicy::Remove { tolerance_deg: 5.0 });

        assert_eq!(
            actions,
            vec![OverlapAction::Hide {
                marker: MarkerId::new(0)
            }]
        );
    }

    #[test]
    fn test_ignore_policy() {
        let candidates = [candidate(0, 45.0, 900.0), candidate(1, 45.0, 150.0)];
        assert!(resolve_overlaps(&candidates, OverlapPolicy::Ignore).is_empty());
    }
}
