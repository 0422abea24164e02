use crate::config::engine_config::{
    EngineConfig, FusionConfig, FusionWeights, MissingFacePolicy, SpatialConfig,
};
use crate::fusion::domain::fusion_scorer::{FusionScorer, MatchScore};
use crate::gallery::domain::identity_record::IdentityRecord;
use crate::shared::ids::SceneId;
use crate::shared::observation::ObservationSample;
use crate::similarity::appearance::{body_similarity, face_similarity};
use crate::similarity::spatial::{anchor_similarity, spatial_continuity, spatial_score};

/// Weighted mean of face, body and spatial similarity.
///
/// Weights of unavailable signals are redistributed rather than dropped, so
/// a detection is never penalised for evidence nobody could have provided.
pub struct WeightedFusionScorer {
    fusion: FusionConfig,
    spatial: SpatialConfig,
}

impl WeightedFusionScorer {
    pub fn new(fusion: FusionConfig, spatial: SpatialConfig) -> Self {
        Self { fusion, spatial }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.fusion, config.spatial)
    }

    fn visual(&self, sample: &ObservationSample, record: &IdentityRecord) -> (Option<f64>, f64) {
        let face = face_similarity(sample.face.as_ref(), record.face_exemplars().iter());
        let body = body_similarity(&sample.body, record.body_exemplars().iter());
        (face, body)
    }

    fn combine(&self, face: Option<f64>, body: f64, spatial: Option<f64>) -> MatchScore {
        MatchScore {
            value: fuse(&self.fusion.weights, self.fusion.missing_face, face, body, spatial),
            face,
            body,
            spatial,
        }
    }
}

impl FusionScorer for WeightedFusionScorer {
    fn score(
        &self,
        sample: &ObservationSample,
        record: &IdentityRecord,
        scene: SceneId,
    ) -> MatchScore {
        let (face, body) = self.visual(sample, record);
        let spatial = (record.last_scene() == scene).then(|| {
            let continuity = spatial_continuity(
                record.last_bbox(),
                record.last_timestamp(),
                &sample.bbox,
                sample.timestamp,
                &self.spatial,
            );
            let anchor = anchor_similarity(
                &sample.fingerprint,
                record.anchor_fingerprint(),
                self.spatial.anchor_scale,
            );
            spatial_score(continuity, anchor, self.spatial.anchor_bonus)
        });
        self.combine(face, body, spatial)
    }

    fn appearance_score(&self, sample: &ObservationSample, record: &IdentityRecord) -> MatchScore {
        let (face, body) = self.visual(sample, record);
        self.combine(face, body, None)
    }
}

/// `Σ wᵢ sᵢ / Σ wᵢ` after moving the weight of missing signals onto the
/// available ones. The total weight is preserved.
pub fn fuse(
    weights: &FusionWeights,
    missing_face: MissingFacePolicy,
    face: Option<f64>,
    body: f64,
    spatial: Option<f64>,
) -> f64 {
    let (mut wf, mut wb, mut ws) = (weights.face, weights.body, weights.spatial);

    if face.is_none() {
        match missing_face {
            MissingFacePolicy::Proportional if spatial.is_some() && wb + ws > 0.0 => {
                let (body_share, spatial_share) = (wb, ws);
                let shares = body_share + spatial_share;
                wb += wf * body_share / shares;
                ws += wf * spatial_share / shares;
            }
            _ => wb += wf,
        }
        wf = 0.0;
    }

    if spatial.is_none() {
        let (face_share, body_share) = (wf, wb);
        let visual = face_share + body_share;
        if visual > 0.0 {
            wf += ws * face_share / visual;
            wb += ws * body_share / visual;
        }
        ws = 0.0;
    }

    let total = wf + wb + ws;
    if total <= 0.0 {
        return 0.0;
    }
    let weighted = wf * face.unwrap_or(0.0) + wb * body + ws * spatial.unwrap_or(0.0);
    (weighted / total).clamp(0.0, 1.0)
}
