//! Tunable parameters of the identity resolution engine.
//!
//! Every weight and threshold is deployment configuration: lighting and pose
//! conditions shift the optimal balance, so nothing here is baked into the
//! scoring or assignment code.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_FACE_WEIGHT: f64 = 0.55;
pub const DEFAULT_BODY_WEIGHT: f64 = 0.30;
pub const DEFAULT_SPATIAL_WEIGHT: f64 = 0.15;
pub const DEFAULT_ACCEPT_THRESHOLD: f64 = 0.72;
pub const DEFAULT_REJECT_THRESHOLD: f64 = 0.45;

pub const DEFAULT_POSITION_SCALE: f64 = 1.0;
pub const DEFAULT_TIME_SCALE_SECS: f64 = 2.0;
pub const DEFAULT_ANCHOR_RADIUS: f64 = 1.5;
pub const DEFAULT_ANCHOR_SCALE: f64 = 0.5;
pub const DEFAULT_ANCHOR_BONUS: f64 = 0.3;

pub const DEFAULT_EXEMPLAR_CAPACITY: usize = 8;
pub const DEFAULT_STALENESS_BUDGET_SCENES: u32 = 3;

pub const DEFAULT_MAX_AMBIGUOUS_FRAMES: u32 = 5;
pub const DEFAULT_SWAP_THRESHOLD: f64 = 0.3;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{field} must be {expected}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },
    #[error("reject threshold ({reject}) must be below accept threshold ({accept})")]
    ThresholdOrder { accept: f64, reject: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFacePolicy {
    /// The whole face weight moves to the body signal.
    ToBody,
    /// The face weight is split over body and spatial by their own weights.
    Proportional,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionWeights {
    pub face: f64,
    pub body: f64,
    pub spatial: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            face: DEFAULT_FACE_WEIGHT,
            body: DEFAULT_BODY_WEIGHT,
            spatial: DEFAULT_SPATIAL_WEIGHT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub weights: FusionWeights,
    pub missing_face: MissingFacePolicy,
    /// Scores at or above are accepted outright.
    pub accept_threshold: f64,
    /// Scores at or below are ruled out.
    pub reject_threshold: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            weights: FusionWeights::default(),
            missing_face: MissingFacePolicy::ToBody,
            accept_threshold: DEFAULT_ACCEPT_THRESHOLD,
            reject_threshold: DEFAULT_REJECT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    /// Displacement, in diagonals of the new box, at which continuity falls to 1/e.
    pub position_scale: f64,
    /// Elapsed seconds at which continuity falls to 1/e.
    pub time_scale_secs: f64,
    /// Anchors farther than this many box-heights are not part of a fingerprint.
    pub anchor_radius: f64,
    /// Offset difference, in box-heights, at which an anchor match falls to 1/e.
    pub anchor_scale: f64,
    /// Share of the remaining headroom an exact anchor match adds to continuity.
    pub anchor_bonus: f64,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            position_scale: DEFAULT_POSITION_SCALE,
            time_scale_secs: DEFAULT_TIME_SCALE_SECS,
            anchor_radius: DEFAULT_ANCHOR_RADIUS,
            anchor_scale: DEFAULT_ANCHOR_SCALE,
            anchor_bonus: DEFAULT_ANCHOR_BONUS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    /// Maximum exemplars kept per modality per identity.
    pub exemplar_capacity: usize,
    /// Scene boundaries without a match after which an identity expires.
    pub staleness_budget_scenes: u32,
    /// Optional wall-clock budget, checked at scene boundaries.
    pub staleness_budget_secs: Option<f64>,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            exemplar_capacity: DEFAULT_EXEMPLAR_CAPACITY,
            staleness_budget_scenes: DEFAULT_STALENESS_BUDGET_SCENES,
            staleness_budget_secs: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    /// Frames a track may stay ambiguous before a new identity is forced.
    pub max_ambiguous_frames: u32,
    /// Appearance score against the bound identity below which a bound
    /// track is re-resolved from scratch.
    pub swap_threshold: f64,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            max_ambiguous_frames: DEFAULT_MAX_AMBIGUOUS_FRAMES,
            swap_threshold: DEFAULT_SWAP_THRESHOLD,
        }
    }
}

/// Expected embedding sizes. `None` adopts the size of the first valid
/// embedding seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub face_dim: Option<usize>,
    pub body_dim: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub fusion: FusionConfig,
    pub spatial: SpatialConfig,
    pub gallery: GalleryConfig,
    pub binding: BindingConfig,
    pub embeddings: EmbeddingConfig,
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fusion = &self.fusion;
        unit_interval("fusion.accept_threshold", fusion.accept_threshold)?;
        unit_interval("fusion.reject_threshold", fusion.reject_threshold)?;
        if fusion.reject_threshold >= fusion.accept_threshold {
            return Err(ConfigError::ThresholdOrder {
                accept: fusion.accept_threshold,
                reject: fusion.reject_threshold,
            });
        }

        non_negative("fusion.weights.face", fusion.weights.face)?;
        non_negative("fusion.weights.spatial", fusion.weights.spatial)?;
        positive("fusion.weights.body", fusion.weights.body)?;

        positive("spatial.position_scale", self.spatial.position_scale)?;
        positive("spatial.time_scale_secs", self.spatial.time_scale_secs)?;
        non_negative("spatial.anchor_radius", self.spatial.anchor_radius)?;
        positive("spatial.anchor_scale", self.spatial.anchor_scale)?;
        unit_interval("spatial.anchor_bonus", self.spatial.anchor_bonus)?;

        if self.gallery.exemplar_capacity == 0 {
            return Err(ConfigError::OutOfRange {
                field: "gallery.exemplar_capacity",
                value: 0.0,
                expected: "at least 1",
            });
        }
        if let Some(secs) = self.gallery.staleness_budget_secs {
            positive("gallery.staleness_budget_secs", secs)?;
        }

        unit_interval("binding.swap_threshold", self.binding.swap_threshold)?;

        for (field, dim) in [
            ("embeddings.face_dim", self.embeddings.face_dim),
            ("embeddings.body_dim", self.embeddings.body_dim),
        ] {
            if dim == Some(0) {
                return Err(ConfigError::OutOfRange {
                    field,
                    value: 0.0,
                    expected: "at least 1",
                });
            }
        }
        Ok(())
    }
}

fn unit_interval(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            expected: "between 0.0 and 1.0",
        })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            expected: "finite and non-negative",
        })
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            expected: "finite and positive",
        })
    }
}
