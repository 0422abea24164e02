use serde::{Deserialize, Serialize};

use super::exemplar_set::ExemplarSet;
use crate::config::engine_config::GalleryConfig;
use crate::shared::anchor::AnchorFingerprint;
use crate::shared::bbox::BoundingBox;
use crate::shared::ids::{Pid, SceneId};
use crate::shared::observation::ObservationSample;

/// Lifecycle of an identity: `new → active ⇄ stale → expired`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityState {
    /// Observed in a single frame so far.
    New,
    Active,
    /// Missed at least one scene.
    Stale,
    /// Out of the matching pool for good; kept for audit.
    Expired,
}

impl IdentityState {
    pub fn is_matchable(self) -> bool {
        self != IdentityState::Expired
    }
}

/// A persistent person identity and the evidence used to re-identify it.
#[derive(Clone, Debug)]
pub struct IdentityRecord {
    pid: Pid,
    state: IdentityState,
    face_exemplars: ExemplarSet,
    body_exemplars: ExemplarSet,
    last_bbox: BoundingBox,
    last_frame: usize,
    last_timestamp: f64,
    last_scene: SceneId,
    anchor_fingerprint: AnchorFingerprint,
    /// Scene boundaries crossed since the last match.
    staleness: u32,
    first_frame: usize,
    first_timestamp: f64,
    first_scene: SceneId,
    observations: usize,
    scenes_seen: u32,
    graduated: bool,
}

impl IdentityRecord {
    pub(crate) fn new(
        pid: Pid,
        sample: &ObservationSample,
        scene: SceneId,
        exemplar_capacity: usize,
    ) -> Self {
        let mut face_exemplars = ExemplarSet::new(exemplar_capacity);
        if let Some(face) = &sample.face {
            face_exemplars.insert(face.clone());
        }
        Self {
            pid,
            state: IdentityState::New,
            face_exemplars,
            body_exemplars: ExemplarSet::seeded(exemplar_capacity, sample.body.clone()),
            last_bbox: sample.bbox,
            last_frame: sample.frame_index,
            last_timestamp: sample.timestamp,
            last_scene: scene,
            anchor_fingerprint: sample.fingerprint.clone(),
            staleness: 0,
            first_frame: sample.frame_index,
            first_timestamp: sample.timestamp,
            first_scene: scene,
            observations: 1,
            scenes_seen: 1,
            graduated: false,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn state(&self) -> IdentityState {
        self.state
    }

    pub fn is_matchable(&self) -> bool {
        self.state.is_matchable()
    }

    pub fn face_exemplars(&self) -> &ExemplarSet {
        &self.face_exemplars
    }

    pub fn body_exemplars(&self) -> &ExemplarSet {
        &self.body_exemplars
    }

    pub fn last_bbox(&self) -> &BoundingBox {
        &self.last_bbox
    }

    pub fn last_frame(&self) -> usize {
        self.last_frame
    }

    pub fn last_timestamp(&self) -> f64 {
        self.last_timestamp
    }

    pub fn last_scene(&self) -> SceneId {
        self.last_scene
    }

    pub fn anchor_fingerprint(&self) -> &AnchorFingerprint {
        &self.anchor_fingerprint
    }

    pub fn staleness(&self) -> u32 {
        self.staleness
    }

    pub fn first_scene(&self) -> SceneId {
        self.first_scene
    }

    pub fn first_frame(&self) -> usize {
        self.first_frame
    }

    pub fn first_timestamp(&self) -> f64 {
        self.first_timestamp
    }

    pub fn observations(&self) -> usize {
        self.observations
    }

    pub fn scenes_seen(&self) -> u32 {
        self.scenes_seen
    }

    /// Whether the identity was ever observed beyond its creation frame.
    pub fn graduated(&self) -> bool {
        self.graduated
    }

    /// Records a successful match. `fold_exemplars` is false when the
    /// evidence is too uncertain to shape future matching.
    pub(crate) fn observe(
        &mut self,
        sample: &ObservationSample,
        scene: SceneId,
        fold_exemplars: bool,
    ) {
        let new_frame = (scene, sample.frame_index) != (self.first_scene, self.first_frame);
        match self.state {
            IdentityState::New if new_frame => {
                self.state = IdentityState::Active;
                self.graduated = true;
            }
            IdentityState::Stale => self.state = IdentityState::Active,
            _ => {}
        }

        if scene != self.last_scene {
            self.scenes_seen += 1;
        }
        self.last_bbox = sample.bbox;
        self.last_frame = sample.frame_index;
        self.last_timestamp = sample.timestamp;
        self.last_scene = scene;
        if !sample.fingerprint.is_empty() {
            self.anchor_fingerprint = sample.fingerprint.clone();
        }
        self.staleness = 0;
        self.observations += 1;

        if fold_exemplars {
            if let Some(face) = &sample.face {
                self.face_exemplars.insert(face.clone());
            }
            self.body_exemplars.insert(sample.body.clone());
        }
    }

    /// Ages the record at the end of `scene`. `now` is the latest timestamp
    /// seen in the video. Returns the new state if it changed.
    pub(crate) fn conclude_scene(
        &mut self,
        scene: SceneId,
        now: Option<f64>,
        budget: &GalleryConfig,
    ) -> Option<IdentityState> {
        if self.state == IdentityState::Expired || self.last_scene == scene {
            return None;
        }

        let previous = self.state;
        self.staleness += 1;
        if self.state == IdentityState::Active {
            self.state = IdentityState::Stale;
        }

        let over_scenes = self.staleness > budget.staleness_budget_scenes;
        let over_time = match (budget.staleness_budget_secs, now) {
            (Some(limit), Some(now)) => now - self.last_timestamp > limit,
            _ => false,
        };
        if over_scenes || over_time {
            self.state = IdentityState::Expired;
        }

        (self.state != previous).then_some(self.state)
    }
}
