use serde::{Deserialize, Serialize};

use super::anchor::AnchorObject;
use super::bbox::BoundingBox;
use super::ids::TrackId;

/// One observed person in one frame, as produced by the upstream tracker
/// and embedding extractors.
///
/// The body embedding is required by contract but kept optional here so a
/// violation can be reported per detection instead of failing the parse.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "track_id")]
    pub local_track_id: TrackId,
    pub bbox: BoundingBox,
    #[serde(rename = "face", default, skip_serializing_if = "Option::is_none")]
    pub face_embedding: Option<Vec<f32>>,
    #[serde(rename = "body", default, skip_serializing_if = "Option::is_none")]
    pub body_embedding: Option<Vec<f32>>,
}

/// Everything observed in one frame: person detections plus anchor objects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameObservations {
    pub frame_index: usize,
    /// Seconds since the start of the video.
    pub timestamp: f64,
    #[serde(default)]
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub anchors: Vec<AnchorObject>,
}

/// One element of the input stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Frame(FrameObservations),
    /// Separates two scenes; local track IDs do not carry across it.
    SceneBoundary,
}
