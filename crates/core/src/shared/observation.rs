use super::anchor::AnchorFingerprint;
use super::bbox::BoundingBox;
use super::embedding::Embedding;
use super::ids::TrackId;

/// A detection that passed validation, ready for scoring.
#[derive(Clone, Debug, PartialEq)]
pub struct ObservationSample {
    pub local_track_id: TrackId,
    pub frame_index: usize,
    pub timestamp: f64,
    pub bbox: BoundingBox,
    pub face: Option<Embedding>,
    pub body: Embedding,
    pub fingerprint: AnchorFingerprint,
}
