use std::collections::HashSet;

use crate::shared::ids::Pid;
use crate::shared::resolution::IdentityLabel;

/// Filters identity labels by PID inclusion/exclusion sets.
///
/// `keep` takes precedence over `drop`:
/// - If `keep` is Some: keep only labels whose PID is in the set.
/// - Else if `drop` is Some: keep labels whose PID is NOT in the set.
/// - Else: keep all labels.
pub fn filter_labels(
    labels: &[IdentityLabel],
    keep: Option<&HashSet<Pid>>,
    drop: Option<&HashSet<Pid>>,
) -> Vec<IdentityLabel> {
    if let Some(pids) = keep {
        labels
            .iter()
            .filter(|l| pids.contains(&l.pid))
            .cloned()
            .collect()
    } else if let Some(pids) = drop {
        labels
            .iter()
            .filter(|l| !pids.contains(&l.pid))
            .cloned()
            .collect()
    } else {
        labels.to_vec()
    }
}
