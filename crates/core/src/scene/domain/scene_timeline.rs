use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("failed to read scene list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid scene list: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("scene {index} has invalid range {start}..{end}")]
    InvalidSpan { index: usize, start: f64, end: f64 },
    #[error("scene {index} overlaps the previous scene")]
    Overlap { index: usize },
    #[error("frame rate must be positive, got {0}")]
    InvalidFrameRate(f64),
}

/// A shot, in seconds from the start of the video.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct SceneSpan {
    pub start: f64,
    pub end: f64,
}

impl SceneSpan {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

impl From<(f64, f64)> for SceneSpan {
    fn from((start, end): (f64, f64)) -> Self {
        Self { start, end }
    }
}

impl From<SceneSpan> for (f64, f64) {
    fn from(span: SceneSpan) -> Self {
        (span.start, span.end)
    }
}

/// Ordered, non-overlapping scenes of one video.
///
/// Stored as JSON: `[[0.0, 4.2], [4.2, 11.0], ...]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneTimeline {
    spans: Vec<SceneSpan>,
}

impl SceneTimeline {
    pub fn new(spans: Vec<SceneSpan>) -> Result<Self, TimelineError> {
        for (index, span) in spans.iter().enumerate() {
            if !span.start.is_finite() || !span.end.is_finite() || span.end < span.start {
                return Err(TimelineError::InvalidSpan {
                    index,
                    start: span.start,
                    end: span.end,
                });
            }
            if index > 0 && span.start < spans[index - 1].end {
                return Err(TimelineError::Overlap { index });
            }
        }
        Ok(Self { spans })
    }

    /// Builds scenes from shot-cut frame numbers: the video is split at
    /// every distinct cut, from frame 0 to `total_frames`.
    pub fn from_cuts(
        cut_frames: &[usize],
        total_frames: usize,
        fps: f64,
    ) -> Result<Self, TimelineError> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(TimelineError::InvalidFrameRate(fps));
        }
        let mut boundaries: Vec<usize> = cut_frames
            .iter()
            .copied()
            .filter(|&c| c > 0 && c < total_frames)
            .collect();
        boundaries.sort_unstable();
        boundaries.dedup();
        boundaries.insert(0, 0);
        boundaries.push(total_frames);

        let spans = boundaries
            .windows(2)
            .map(|w| SceneSpan {
                start: w[0] as f64 / fps,
                end: w[1] as f64 / fps,
            })
            .collect();
        Self::new(spans)
    }

    pub fn from_json_str(json: &str) -> Result<Self, TimelineError> {
        let spans: Vec<SceneSpan> = serde_json::from_str(json)?;
        Self::new(spans)
    }

    pub fn load(path: &Path) -> Result<Self, TimelineError> {
        Self::from_json_str(&read(path)?)
    }

    /// Reads a JSON list of shot-cut frame numbers, as written by a shot
    /// detector, and splits the video at those cuts.
    pub fn load_cuts(path: &Path, total_frames: usize, fps: f64) -> Result<Self, TimelineError> {
        let cuts: Vec<usize> = serde_json::from_str(&read(path)?)?;
        Self::from_cuts(&cuts, total_frames, fps)
    }

    pub fn spans(&self) -> &[SceneSpan] {
        &self.spans
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Folds every scene shorter than `min_duration` into the scene before
    /// it. The first scene is always kept.
    pub fn merge_short_scenes(&self, min_duration: f64) -> SceneTimeline {
        let mut merged: Vec<SceneSpan> = Vec::with_capacity(self.spans.len());
        for span in &self.spans {
            match merged.last_mut() {
                Some(previous) if span.duration() < min_duration => previous.end = span.end,
                _ => merged.push(*span),
            }
        }
        SceneTimeline { spans: merged }
    }

    /// Index of the scene a timestamp falls in. Timestamps before the first
    /// scene belong to it; those past the last scene to the last.
    pub fn scene_index_at(&self, timestamp: f64) -> Option<usize> {
        if self.spans.is_empty() {
            return None;
        }
        let after = self.spans.partition_point(|s| s.start <= timestamp);
        Some(after.saturating_sub(1))
    }
}

fn read(path: &Path) -> Result<String, TimelineError> {
    fs::read_to_string(path).map_err(|source| TimelineError::Io {
        path: path.to_path_buf(),
        source,
    })
}
