use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

use crate::config::engine_config::EmbeddingConfig;
use crate::shared::anchor::AnchorContext;
use crate::shared::detection::{Detection, FrameObservations};
use crate::shared::embedding::{Embedding, EmbeddingError};
use crate::shared::ids::TrackId;
use crate::shared::observation::ObservationSample;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Modality {
    Face,
    Body,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modality::Face => write!(f, "face"),
            Modality::Body => write!(f, "body"),
        }
    }
}

/// Why a detection was left out of identity resolution.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DetectionError {
    #[error("track {track_id}: missing body embedding")]
    MissingBodyEmbedding { track_id: TrackId },
    #[error("track {track_id}: {modality} embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        track_id: TrackId,
        modality: Modality,
        expected: usize,
        actual: usize,
    },
    #[error("track {track_id}: invalid {modality} embedding: {source}")]
    InvalidEmbedding {
        track_id: TrackId,
        modality: Modality,
        source: EmbeddingError,
    },
    #[error("track {track_id}: degenerate bounding box")]
    InvalidBoundingBox { track_id: TrackId },
    #[error("track {track_id}: duplicate track id in frame")]
    DuplicateTrack { track_id: TrackId },
}

impl DetectionError {
    pub fn track_id(&self) -> TrackId {
        match self {
            DetectionError::MissingBodyEmbedding { track_id }
            | DetectionError::DimensionMismatch { track_id, .. }
            | DetectionError::InvalidEmbedding { track_id, .. }
            | DetectionError::InvalidBoundingBox { track_id }
            | DetectionError::DuplicateTrack { track_id } => *track_id,
        }
    }
}

/// Turns raw detections into scored-ready samples.
///
/// Embedding dimensions come from the configuration when set, otherwise
/// from the first valid detection of each modality.
#[derive(Clone, Debug, Default)]
pub struct DetectionValidator {
    face_dim: Option<usize>,
    body_dim: Option<usize>,
}

impl DetectionValidator {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            face_dim: config.face_dim,
            body_dim: config.body_dim,
        }
    }

    pub fn face_dim(&self) -> Option<usize> {
        self.face_dim
    }

    pub fn body_dim(&self) -> Option<usize> {
        self.body_dim
    }

    /// Validates every detection of a frame. Accepted samples keep the
    /// frame's detection order; for a repeated track ID only the first
    /// occurrence is considered.
    pub fn validate_frame(
        &mut self,
        frame: &FrameObservations,
        anchor_radius: f64,
    ) -> (Vec<ObservationSample>, Vec<DetectionError>) {
        let anchors = AnchorContext::from_objects(&frame.anchors);
        let mut seen = HashSet::new();
        let mut samples = Vec::with_capacity(frame.detections.len());
        let mut rejected = Vec::new();

        for detection in &frame.detections {
            let track_id = detection.local_track_id;
            if !seen.insert(track_id) {
                rejected.push(DetectionError::DuplicateTrack { track_id });
                continue;
            }
            match self.validate(detection) {
                Ok((face, body)) => samples.push(ObservationSample {
                    local_track_id: track_id,
                    frame_index: frame.frame_index,
                    timestamp: frame.timestamp,
                    bbox: detection.bbox,
                    face,
                    body,
                    fingerprint: anchors.fingerprint(&detection.bbox, anchor_radius),
                }),
                Err(e) => rejected.push(e),
            }
        }
        (samples, rejected)
    }

    /// An empty face vector counts as "no face".
    pub fn validate(
        &mut self,
        detection: &Detection,
    ) -> Result<(Option<Embedding>, Embedding), DetectionError> {
        let track_id = detection.local_track_id;
        if !detection.bbox.is_valid() {
            return Err(DetectionError::InvalidBoundingBox { track_id });
        }

        let body_raw = detection
            .body_embedding
            .as_deref()
            .filter(|b| !b.is_empty())
            .ok_or(DetectionError::MissingBodyEmbedding { track_id })?;
        let body = checked(track_id, Modality::Body, body_raw, self.body_dim)?;

        let face = match detection.face_embedding.as_deref() {
            Some(raw) if !raw.is_empty() => {
                Some(checked(track_id, Modality::Face, raw, self.face_dim)?)
            }
            _ => None,
        };

        self.body_dim.get_or_insert(body.dim());
        if let Some(face) = &face {
            self.face_dim.get_or_insert(face.dim());
        }
        Ok((face, body))
    }
}

fn checked(
    track_id: TrackId,
    modality: Modality,
    raw: &[f32],
    expected: Option<usize>,
) -> Result<Embedding, DetectionError> {
    if let Some(expected) = expected {
        if raw.len() != expected {
            return Err(DetectionError::DimensionMismatch {
                track_id,
                modality,
                expected,
                actual: raw.len(),
            });
        }
    }
    Embedding::new(raw.to_vec()).map_err(|source| DetectionError::InvalidEmbedding {
        track_id,
        modality,
        source,
    })
}
