use serde::{Deserialize, Serialize};

use super::ids::{Pid, SceneId, TrackId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Confirmed,
    /// Tentative or conflicted assignment; downstream may render it differently.
    LowConfidence,
}

/// Stable identity emitted for one detection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityLabel {
    pub frame_index: usize,
    #[serde(rename = "track_id")]
    pub local_track_id: TrackId,
    pub pid: Pid,
    pub confidence: Confidence,
}

/// A detection excluded from identity resolution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedDetection {
    pub frame_index: usize,
    pub local_track_id: TrackId,
    pub reason: String,
}

/// Outcome of resolving one frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameResolution {
    pub frame_index: usize,
    pub scene: SceneId,
    pub labels: Vec<IdentityLabel>,
    pub skipped: Vec<SkippedDetection>,
    /// Detections accepted against an existing identity by full resolution.
    pub accepted_matches: usize,
    pub created_identities: usize,
}

impl FrameResolution {
    pub fn new(frame_index: usize, scene: SceneId) -> Self {
        Self {
            frame_index,
            scene,
            ..Default::default()
        }
    }

    pub fn label_for(&self, local_track_id: TrackId) -> Option<&IdentityLabel> {
        self.labels
            .iter()
            .find(|l| l.local_track_id == local_track_id)
    }

    pub fn pid_for(&self, local_track_id: TrackId) -> Option<Pid> {
        self.label_for(local_track_id).map(|l| l.pid)
    }
}
