use std::collections::BTreeMap;

use crate::shared::ids::{Pid, TrackId};
use crate::shared::observation::ObservationSample;

#[derive(Clone, Debug, PartialEq)]
pub enum BindingStatus {
    Confirmed,
    /// Best candidate so far was ambiguous; re-resolved on every frame.
    Tentative {
        ambiguous_frames: u32,
        /// Latest evidence, used to found a new identity if the deferral runs out.
        pending: ObservationSample,
    },
}

/// Association of a local track with a global identity for one scene.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackBinding {
    pub pid: Pid,
    pub status: BindingStatus,
    pub bound_at_frame: usize,
    /// Set once the track's appearance drifted to another identity.
    pub conflicted: bool,
}

impl TrackBinding {
    pub fn confirmed(pid: Pid, frame_index: usize) -> Self {
        Self {
            pid,
            status: BindingStatus::Confirmed,
            bound_at_frame: frame_index,
            conflicted: false,
        }
    }

    pub fn tentative(pid: Pid, ambiguous_frames: u32, pending: ObservationSample) -> Self {
        Self {
            pid,
            bound_at_frame: pending.frame_index,
            status: BindingStatus::Tentative {
                ambiguous_frames,
                pending,
            },
            conflicted: false,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == BindingStatus::Confirmed
    }
}

/// Per-scene table of local track bindings. Discarded at every scene boundary
/// since tracker IDs are not stable across cuts.
#[derive(Clone, Debug, Default)]
pub struct TrackBindingTable {
    bindings: BTreeMap<TrackId, TrackBinding>,
}

impl TrackBindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, track: TrackId) -> Option<&TrackBinding> {
        self.bindings.get(&track)
    }

    pub(crate) fn get_mut(&mut self, track: TrackId) -> Option<&mut TrackBinding> {
        self.bindings.get_mut(&track)
    }

    pub(crate) fn bind(&mut self, track: TrackId, binding: TrackBinding) {
        self.bindings.insert(track, binding);
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TrackId, &TrackBinding)> {
        self.bindings.iter().map(|(t, b)| (*t, b))
    }

    pub fn tentative_tracks(&self) -> Vec<TrackId> {
        self.iter()
            .filter(|(_, b)| !b.is_confirmed())
            .map(|(t, _)| t)
            .collect()
    }

    pub fn conflicted_tracks(&self) -> Vec<TrackId> {
        self.iter()
            .filter(|(_, b)| b.conflicted)
            .map(|(t, _)| t)
            .collect()
    }

    /// Identities that more than one confirmed track converged on, with the
    /// tracks involved. Sorted by PID, tracks ascending.
    pub fn merged_groups(&self) -> Vec<(Pid, Vec<TrackId>)> {
        let mut by_pid: BTreeMap<Pid, Vec<TrackId>> = BTreeMap::new();
        for (track, binding) in self.iter().filter(|(_, b)| b.is_confirmed()) {
            by_pid.entry(binding.pid).or_default().push(track);
        }
        by_pid
            .into_iter()
            .filter(|(_, tracks)| tracks.len() > 1)
            .collect()
    }

    pub(crate) fn clear(&mut self) {
        self.bindings.clear();
    }
}
