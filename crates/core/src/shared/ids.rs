use std::fmt;

use serde::{Deserialize, Serialize};

/// Local track identifier issued by the upstream tracker. Only meaningful
/// within the scene (and tracker run) that issued it.
pub type TrackId = u32;

/// Zero-based index of a scene within one video.
pub type SceneId = u32;

/// Persistent person identity label.
///
/// Assigned monotonically starting at 1 and never reused, so a PID doubles
/// as the index of its record in the gallery arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pid(pub u32);

impl Pid {
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
