use std::collections::HashSet;

use crate::config::engine_config::FusionConfig;
use crate::fusion::domain::fusion_scorer::{FusionScorer, MatchScore};
use crate::gallery::domain::identity_record::IdentityRecord;
use crate::shared::ids::{Pid, SceneId};
use crate::shared::observation::ObservationSample;

/// Outcome for a single detection of the frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Resolution {
    /// Score reached the accept threshold.
    Accepted { pid: Pid, score: MatchScore },
    /// Best available identity, but not convincingly: bind tentatively.
    Ambiguous { pid: Pid, score: MatchScore },
    /// No identity above the reject threshold was left for this detection.
    Unmatched,
}

impl Resolution {
    pub fn pid(&self) -> Option<Pid> {
        match self {
            Resolution::Accepted { pid, .. } | Resolution::Ambiguous { pid, .. } => Some(*pid),
            Resolution::Unmatched => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoredPair {
    pub detection: usize,
    pub pid: Pid,
    pub score: MatchScore,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AssignmentOutcome {
    /// One entry per input detection, in input order.
    pub resolutions: Vec<Resolution>,
    /// Candidate pairs scoring strictly between reject and accept.
    pub ambiguous_pairs: usize,
}

impl AssignmentOutcome {
    pub fn accepted_count(&self) -> usize {
        self.resolutions
            .iter()
            .filter(|r| matches!(r, Resolution::Accepted { .. }))
            .count()
    }

    pub fn ambiguous_count(&self) -> usize {
        self.resolutions
            .iter()
            .filter(|r| matches!(r, Resolution::Ambiguous { .. }))
            .count()
    }
}

/// Greedy one-to-one assignment of a frame's unbound detections to gallery
/// identities.
#[derive(Clone, Copy, Debug)]
pub struct AssignmentResolver {
    accept: f64,
    reject: f64,
}

impl AssignmentResolver {
    pub fn new(accept: f64, reject: f64) -> Self {
        Self { accept, reject }
    }

    pub fn from_config(config: &FusionConfig) -> Self {
        Self::new(config.accept_threshold, config.reject_threshold)
    }

    pub fn resolve(
        &self,
        samples: &[&ObservationSample],
        candidates: &[&IdentityRecord],
        scorer: &dyn FusionScorer,
        scene: SceneId,
    ) -> AssignmentOutcome {
        let pairs = samples
            .iter()
            .enumerate()
            .flat_map(|(detection, sample)| {
                candidates.iter().map(move |record| ScoredPair {
                    detection,
                    pid: record.pid(),
                    score: scorer.score(sample, record, scene),
                })
            })
            .collect();
        self.assign(pairs, samples.len())
    }

    /// Resolves pre-scored pairs for `detections` detections.
    ///
    /// Pairs are taken by descending score, ties broken by detection index
    /// and then PID, each detection and identity used at most once. The
    /// first pair at or below reject ends the walk.
    pub fn assign(&self, mut pairs: Vec<ScoredPair>, detections: usize) -> AssignmentOutcome {
        let ambiguous_pairs = pairs
            .iter()
            .filter(|p| p.score.value > self.reject && p.score.value < self.accept)
            .count();

        pairs.sort_by(|a, b| {
            b.score
                .value
                .total_cmp(&a.score.value)
                .then(a.detection.cmp(&b.detection))
                .then(a.pid.cmp(&b.pid))
        });

        let mut resolutions = vec![Resolution::Unmatched; detections];
        let mut used_pids = HashSet::new();
        for pair in &pairs {
            if pair.score.value <= self.reject {
                break;
            }
            let Some(slot) = resolutions.get_mut(pair.detection) else {
                continue;
            };
            if *slot != Resolution::Unmatched || used_pids.contains(&pair.pid) {
                continue;
            }
            used_pids.insert(pair.pid);
            *slot = if pair.score.value >= self.accept {
                Resolution::Accepted {
                    pid: pair.pid,
                    score: pair.score,
                }
            } else {
                Resolution::Ambiguous {
                    pid: pair.pid,
                    score: pair.score,
                }
            };
        }

        AssignmentOutcome {
            resolutions,
            ambiguous_pairs,
        }
    }
}
