use super::identity_record::{IdentityRecord, IdentityState};
use crate::config::engine_config::GalleryConfig;
use crate::shared::ids::{Pid, SceneId};
use crate::shared::observation::ObservationSample;

/// State changes applied to the gallery at a scene boundary.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SceneTransitions {
    pub staled: Vec<Pid>,
    pub expired: Vec<Pid>,
}

/// Arena of every identity seen in a video, indexed by PID.
///
/// Records are never removed; expiry is a state, so PIDs held by bindings,
/// labels or logs always resolve.
#[derive(Clone, Debug, Default)]
pub struct Gallery {
    records: Vec<IdentityRecord>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[IdentityRecord] {
        &self.records
    }

    pub fn get(&self, pid: Pid) -> Option<&IdentityRecord> {
        index_of(pid).and_then(|i| self.records.get(i))
    }

    pub(crate) fn get_mut(&mut self, pid: Pid) -> Option<&mut IdentityRecord> {
        index_of(pid).and_then(move |i| self.records.get_mut(i))
    }

    /// Records still eligible for matching, in PID order.
    pub fn matchable(&self) -> impl Iterator<Item = &IdentityRecord> {
        self.records.iter().filter(|r| r.is_matchable())
    }

    pub fn count_in_state(&self, state: IdentityState) -> usize {
        self.records.iter().filter(|r| r.state() == state).count()
    }

    /// Identities never observed past their creation frame.
    pub fn transient_pids(&self) -> Vec<Pid> {
        self.records
            .iter()
            .filter(|r| !r.graduated())
            .map(|r| r.pid())
            .collect()
    }

    pub(crate) fn create(
        &mut self,
        sample: &ObservationSample,
        scene: SceneId,
        exemplar_capacity: usize,
    ) -> Pid {
        let pid = Pid(self.records.len() as u32 + 1);
        self.records
            .push(IdentityRecord::new(pid, sample, scene, exemplar_capacity));
        pid
    }

    pub(crate) fn conclude_scene(
        &mut self,
        scene: SceneId,
        now: Option<f64>,
        budget: &GalleryConfig,
    ) -> SceneTransitions {
        let mut transitions = SceneTransitions::default();
        for record in &mut self.records {
            match record.conclude_scene(scene, now, budget) {
                Some(IdentityState::Stale) => transitions.staled.push(record.pid()),
                Some(IdentityState::Expired) => transitions.expired.push(record.pid()),
                _ => {}
            }
        }
        transitions
    }
}

fn index_of(pid: Pid) -> Option<usize> {
    (pid.0 as usize).checked_sub(1)
}
