use std::collections::HashSet;

use thiserror::Error;

use crate::assignment::domain::assignment_resolver::{AssignmentResolver, Resolution};
use crate::config::engine_config::{ConfigError, EngineConfig};
use crate::fusion::domain::fusion_scorer::FusionScorer;
use crate::fusion::infrastructure::weighted_fusion_scorer::WeightedFusionScorer;
use crate::gallery::domain::gallery::Gallery;
use crate::gallery::domain::identity_record::IdentityRecord;
use crate::lifecycle::domain::detection_validator::DetectionValidator;
use crate::lifecycle::domain::track_binding::{BindingStatus, TrackBinding, TrackBindingTable};
use crate::shared::detection::FrameObservations;
use crate::shared::ids::{Pid, SceneId, TrackId};
use crate::shared::observation::ObservationSample;
use crate::shared::resolution::{Confidence, FrameResolution, IdentityLabel, SkippedDetection};

/// Upstream contract violations. Fatal for the video being processed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResolveError {
    #[error("frame {frame_index} does not follow frame {previous} in scene {scene}")]
    FrameOutOfOrder {
        scene: SceneId,
        previous: usize,
        frame_index: usize,
    },
    #[error("frame {frame_index} has a non-finite timestamp")]
    InvalidTimestamp { frame_index: usize },
}

/// What happened to the gallery and bindings when a scene was concluded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SceneSummary {
    pub scene: SceneId,
    pub frames: usize,
    /// Local tracks bound during the scene.
    pub bindings: usize,
    /// Identities that several tracks of the scene converged on.
    pub merged_tracks: Vec<(Pid, Vec<TrackId>)>,
    /// Tentative bindings turned into new identities at the boundary.
    pub forced_new: Vec<(TrackId, Pid)>,
    pub conflicted_tracks: Vec<TrackId>,
    pub staled: Vec<Pid>,
    pub expired: Vec<Pid>,
}

/// How a detection ended up in the frame's assignment batch.
#[derive(Clone, Copy, Debug)]
enum Pending {
    /// First sighting of the track in this scene.
    Fresh,
    /// Tentatively bound; the deferral is still running.
    Deferred { ambiguous_frames: u32 },
    /// Confirmed track whose appearance no longer supports its identity.
    Drifted { pid: Pid },
}

/// Owns the gallery and turns ordered frame observations into stable
/// identity labels.
///
/// Frames must arrive in order; scene boundaries are signalled with
/// [`end_scene`](Self::end_scene).
pub struct IdentityLifecycleManager {
    config: EngineConfig,
    scorer: Box<dyn FusionScorer>,
    resolver: AssignmentResolver,
    validator: DetectionValidator,
    gallery: Gallery,
    bindings: TrackBindingTable,
    scene: SceneId,
    frames_in_scene: usize,
    last_frame: Option<usize>,
    latest_timestamp: Option<f64>,
}

impl IdentityLifecycleManager {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let scorer = Box::new(WeightedFusionScorer::from_config(&config));
        Ok(Self::with_scorer(config, scorer))
    }

    /// Uses a custom scorer. The configuration is trusted as given.
    pub fn with_scorer(config: EngineConfig, scorer: Box<dyn FusionScorer>) -> Self {
        Self {
            resolver: AssignmentResolver::from_config(&config.fusion),
            validator: DetectionValidator::new(&config.embeddings),
            config,
            scorer,
            gallery: Gallery::new(),
            bindings: TrackBindingTable::new(),
            scene: 0,
            frames_in_scene: 0,
            last_frame: None,
            latest_timestamp: None,
        }
    }

    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    pub fn bindings(&self) -> &TrackBindingTable {
        &self.bindings
    }

    pub fn current_scene(&self) -> SceneId {
        self.scene
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolves every detection of one frame to a PID.
    ///
    /// Invalid detections are skipped and reported in the result; only a
    /// broken frame order is an error.
    pub fn process_frame(
        &mut self,
        frame: &FrameObservations,
    ) -> Result<FrameResolution, ResolveError> {
        self.admit(frame)?;

        let mut result = FrameResolution::new(frame.frame_index, self.scene);
        let (samples, rejected) = self
            .validator
            .validate_frame(frame, self.config.spatial.anchor_radius);
        for error in rejected {
            log::warn!("Frame {}: skipping detection, {error}", frame.frame_index);
            result.skipped.push(SkippedDetection {
                frame_index: frame.frame_index,
                local_track_id: error.track_id(),
                reason: error.to_string(),
            });
        }

        let mut labels: Vec<Option<IdentityLabel>> = vec![None; samples.len()];
        let mut claimed = HashSet::new();
        let mut batch = Vec::new();

        for (i, sample) in samples.iter().enumerate() {
            match self.refresh_bound(sample) {
                Refresh::Done(label, pid) => {
                    if let Some(pid) = pid {
                        claimed.insert(pid);
                    }
                    labels[i] = Some(label);
                }
                Refresh::Resolve(pending) => batch.push((i, pending)),
            }
        }

        if !batch.is_empty() {
            let outcome = {
                let probes: Vec<&ObservationSample> =
                    batch.iter().map(|(i, _)| &samples[*i]).collect();
                let candidates: Vec<&IdentityRecord> = self
                    .gallery
                    .matchable()
                    .filter(|r| !claimed.contains(&r.pid()))
                    .collect();
                self.resolver
                    .resolve(&probes, &candidates, self.scorer.as_ref(), self.scene)
            };
            log::debug!(
                "Frame {}: {} unbound detections, {} ambiguous candidate pairs",
                frame.frame_index,
                batch.len(),
                outcome.ambiguous_pairs
            );

            for ((i, pending), resolution) in batch.into_iter().zip(outcome.resolutions) {
                let label = self.apply(&samples[i], pending, resolution, &mut result);
                labels[i] = Some(label);
            }
        }

        result.labels = labels.into_iter().flatten().collect();
        Ok(result)
    }

    /// Concludes the current scene: settles tentative bindings, ages the
    /// gallery and forgets every local track.
    ///
    /// A scene without frames is not concluded and leaves the gallery as is.
    pub fn end_scene(&mut self) -> SceneSummary {
        if self.frames_in_scene == 0 {
            log::debug!("Ignoring boundary of empty scene {}", self.scene);
            return SceneSummary {
                scene: self.scene,
                ..SceneSummary::default()
            };
        }

        let mut forced_new = Vec::new();
        for track in self.bindings.tentative_tracks() {
            let Some(BindingStatus::Tentative { pending, .. }) =
                self.bindings.get(track).map(|b| b.status.clone())
            else {
                continue;
            };
            let pid = self.create_identity(&pending);
            log::info!(
                "Scene {}: track {track} still ambiguous at boundary, new identity {pid}",
                self.scene
            );
            forced_new.push((track, pid));
        }

        let merged_tracks = self.bindings.merged_groups();
        for (pid, tracks) in &merged_tracks {
            log::info!("Scene {}: tracks {tracks:?} merged into {pid}", self.scene);
        }

        let transitions =
            self.gallery
                .conclude_scene(self.scene, self.latest_timestamp, &self.config.gallery);
        for pid in &transitions.expired {
            log::debug!("Identity {pid} expired");
        }

        let summary = SceneSummary {
            scene: self.scene,
            frames: self.frames_in_scene,
            bindings: self.bindings.len(),
            merged_tracks,
            forced_new,
            conflicted_tracks: self.bindings.conflicted_tracks(),
            staled: transitions.staled,
            expired: transitions.expired,
        };

        self.bindings.clear();
        self.scene += 1;
        self.frames_in_scene = 0;
        self.last_frame = None;
        summary
    }

    /// Concludes a scene still in progress and hands back the gallery.
    pub fn finish(mut self) -> Gallery {
        self.end_scene();
        self.gallery
    }

    fn admit(&mut self, frame: &FrameObservations) -> Result<(), ResolveError> {
        if !frame.timestamp.is_finite() {
            return Err(ResolveError::InvalidTimestamp {
                frame_index: frame.frame_index,
            });
        }
        if let Some(previous) = self.last_frame {
            if frame.frame_index <= previous {
                return Err(ResolveError::FrameOutOfOrder {
                    scene: self.scene,
                    previous,
                    frame_index: frame.frame_index,
                });
            }
        }
        self.last_frame = Some(frame.frame_index);
        self.frames_in_scene += 1;
        self.latest_timestamp = Some(
            self.latest_timestamp
                .map_or(frame.timestamp, |t| t.max(frame.timestamp)),
        );
        Ok(())
    }

    /// Continuity shortcut for tracks that already hold a binding.
    fn refresh_bound(&mut self, sample: &ObservationSample) -> Refresh {
        let track = sample.local_track_id;
        let Some(binding) = self.bindings.get(track) else {
            return Refresh::Resolve(Pending::Fresh);
        };
        let pid = binding.pid;

        match binding.status {
            BindingStatus::Tentative {
                ambiguous_frames, ..
            } => return Refresh::Resolve(Pending::Deferred { ambiguous_frames }),
            BindingStatus::Confirmed if binding.conflicted => {
                return Refresh::Done(label(sample, pid, Confidence::LowConfidence), None)
            }
            BindingStatus::Confirmed => {}
        }

        let Some(record) = self.gallery.get(pid) else {
            return Refresh::Resolve(Pending::Fresh);
        };
        let appearance = self.scorer.appearance_score(sample, record).value;
        if appearance < self.config.binding.swap_threshold {
            log::debug!(
                "Frame {}: track {track} drifted from {pid} (appearance {appearance:.3})",
                sample.frame_index
            );
            return Refresh::Resolve(Pending::Drifted { pid });
        }
        self.observe(pid, sample, true);
        Refresh::Done(label(sample, pid, Confidence::Confirmed), Some(pid))
    }

    fn apply(
        &mut self,
        sample: &ObservationSample,
        pending: Pending,
        resolution: Resolution,
        result: &mut FrameResolution,
    ) -> IdentityLabel {
        let track = sample.local_track_id;
        match (pending, resolution) {
            (Pending::Drifted { pid }, Resolution::Accepted { pid: matched, .. })
                if matched == pid =>
            {
                self.observe(pid, sample, true);
                label(sample, pid, Confidence::Confirmed)
            }
            (Pending::Drifted { pid }, Resolution::Ambiguous { pid: matched, .. })
                if matched == pid =>
            {
                self.observe(pid, sample, false);
                label(sample, pid, Confidence::LowConfidence)
            }
            (Pending::Drifted { pid }, other) => {
                log::warn!(
                    "Scene {}: track {track} bound to {pid} now resembles {}, keeping {pid}",
                    self.scene,
                    other
                        .pid()
                        .map_or_else(|| "no known identity".to_string(), |p| p.to_string())
                );
                if let Some(binding) = self.bindings.get_mut(track) {
                    binding.conflicted = true;
                }
                label(sample, pid, Confidence::LowConfidence)
            }
            (_, Resolution::Accepted { pid, score }) => {
                log::debug!(
                    "Frame {}: track {track} matched {pid} ({:.3})",
                    sample.frame_index,
                    score.value
                );
                self.bindings
                    .bind(track, TrackBinding::confirmed(pid, sample.frame_index));
                self.observe(pid, sample, true);
                result.accepted_matches += 1;
                label(sample, pid, Confidence::Confirmed)
            }
            (pending, Resolution::Ambiguous { pid, .. }) => {
                let ambiguous_frames = match pending {
                    Pending::Deferred { ambiguous_frames } => ambiguous_frames + 1,
                    _ => 1,
                };
                if ambiguous_frames > self.config.binding.max_ambiguous_frames {
                    log::info!(
                        "Frame {}: track {track} ambiguous for {ambiguous_frames} frames, new identity",
                        sample.frame_index
                    );
                    return self.found_identity(sample, result);
                }
                self.bindings.bind(
                    track,
                    TrackBinding::tentative(pid, ambiguous_frames, sample.clone()),
                );
                label(sample, pid, Confidence::LowConfidence)
            }
            (pending, Resolution::Unmatched) => {
                if let Pending::Deferred { .. } = pending {
                    log::info!(
                        "Frame {}: track {track} lost all candidates, new identity",
                        sample.frame_index
                    );
                }
                self.found_identity(sample, result)
            }
        }
    }

    fn found_identity(
        &mut self,
        sample: &ObservationSample,
        result: &mut FrameResolution,
    ) -> IdentityLabel {
        let pid = self.create_identity(sample);
        result.created_identities += 1;
        label(sample, pid, Confidence::Confirmed)
    }

    fn create_identity(&mut self, sample: &ObservationSample) -> Pid {
        let pid = self
            .gallery
            .create(sample, self.scene, self.config.gallery.exemplar_capacity);
        self.bindings.bind(
            sample.local_track_id,
            TrackBinding::confirmed(pid, sample.frame_index),
        );
        log::debug!(
            "Frame {}: track {} is new identity {pid}",
            sample.frame_index,
            sample.local_track_id
        );
        pid
    }

    fn observe(&mut self, pid: Pid, sample: &ObservationSample, fold_exemplars: bool) {
        if let Some(record) = self.gallery.get_mut(pid) {
            record.observe(sample, self.scene, fold_exemplars);
        }
    }
}

enum Refresh {
    /// Labelled without assignment; carries the identity it claims, if any.
    Done(IdentityLabel, Option<Pid>),
    Resolve(Pending),
}

fn label(sample: &ObservationSample, pid: Pid, confidence: Confidence) -> IdentityLabel {
    IdentityLabel {
        frame_index: sample.frame_index,
        local_track_id: sample.local_track_id,
        pid,
        confidence,
    }
}
