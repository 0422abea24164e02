use crate::gallery::domain::identity_record::IdentityRecord;
use crate::shared::ids::SceneId;
use crate::shared::observation::ObservationSample;

/// Fused match score of one detection against one identity, with the
/// per-signal similarities kept for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchScore {
    /// Combined score in `[0, 1]`.
    pub value: f64,
    /// `None` when either side lacks a face.
    pub face: Option<f64>,
    pub body: f64,
    /// `None` when positions are not comparable (different scene).
    pub spatial: Option<f64>,
}

/// Domain interface for scoring a detection against a gallery identity.
///
/// Implementations must be pure: same inputs, same score, no mutation.
pub trait FusionScorer: Send + Sync {
    fn score(&self, sample: &ObservationSample, record: &IdentityRecord, scene: SceneId)
        -> MatchScore;

    /// Score from appearance alone, ignoring where the identity was last seen.
    fn appearance_score(&self, sample: &ObservationSample, record: &IdentityRecord) -> MatchScore;
}
