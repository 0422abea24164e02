use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::gallery::domain::gallery::Gallery;
use crate::gallery::domain::identity_record::{IdentityRecord, IdentityState};
use crate::shared::ids::{Pid, SceneId, TrackId};

/// Audit view of one identity at the end of a run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IdentitySummary {
    pub pid: Pid,
    pub state: IdentityState,
    pub graduated: bool,
    pub first_scene: SceneId,
    pub first_frame: usize,
    pub first_timestamp: f64,
    pub last_scene: SceneId,
    pub last_frame: usize,
    pub last_timestamp: f64,
    pub observations: usize,
    pub scenes_seen: u32,
    pub face_exemplars: usize,
    pub body_exemplars: usize,
}

impl From<&IdentityRecord> for IdentitySummary {
    fn from(record: &IdentityRecord) -> Self {
        Self {
            pid: record.pid(),
            state: record.state(),
            graduated: record.graduated(),
            first_scene: record.first_scene(),
            first_frame: record.first_frame(),
            first_timestamp: record.first_timestamp(),
            last_scene: record.last_scene(),
            last_frame: record.last_frame(),
            last_timestamp: record.last_timestamp(),
            observations: record.observations(),
            scenes_seen: record.scenes_seen(),
            face_exemplars: record.face_exemplars().len(),
            body_exemplars: record.body_exemplars().len(),
        }
    }
}

/// Tracks folded together within a scene.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MergedTracks {
    pub scene: SceneId,
    pub pid: Pid,
    pub tracks: Vec<TrackId>,
}

/// Outcome of resolving one video, written next to the labels.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ResolutionReport {
    pub frames: usize,
    pub scenes: usize,
    pub labels_written: usize,
    pub skipped_detections: usize,
    /// Labels withheld because their identity never graduated.
    pub dropped_transient_labels: usize,
    pub forced_new_identities: usize,
    pub conflicted_tracks: usize,
    pub merged_tracks: Vec<MergedTracks>,
    pub identities: Vec<IdentitySummary>,
}

impl ResolutionReport {
    pub fn with_gallery(mut self, gallery: &Gallery) -> Self {
        self.identities = gallery.records().iter().map(IdentitySummary::from).collect();
        self
    }

    pub fn count_in_state(&self, state: IdentityState) -> usize {
        self.identities.iter().filter(|i| i.state == state).count()
    }

    pub fn write_json(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .map_err(|e| format!("Failed to write report {}: {e}", path.display()))?;
        Ok(())
    }
}
