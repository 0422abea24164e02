use crate::config::engine_config::SpatialConfig;
use crate::shared::anchor::AnchorFingerprint;
use crate::shared::bbox::BoundingBox;

/// How plausible it is that a person last seen at `last` is now at `current`.
///
/// `exp(-d / position_scale) * exp(-dt / time_scale_secs)`, with `d` the
/// centroid displacement in diagonals of the current box and `dt` the
/// elapsed seconds (negative gaps count as zero).
pub fn spatial_continuity(
    last: &BoundingBox,
    last_timestamp: f64,
    current: &BoundingBox,
    timestamp: f64,
    config: &SpatialConfig,
) -> f64 {
    let diagonal = current.diagonal().max(f64::EPSILON);
    let displacement = last.centroid_distance(current) / diagonal;
    let elapsed = (timestamp - last_timestamp).max(0.0);
    (-displacement / config.position_scale).exp() * (-elapsed / config.time_scale_secs).exp()
}

/// Agreement between two anchor fingerprints, `None` if either is empty.
///
/// Same-class entries are paired one-to-one, closest first, and each pair
/// contributes `exp(-distance / scale)`. The sum is divided by the larger
/// fingerprint, so unpaired anchors on either side dilute the score and the
/// result does not depend on argument order.
pub fn anchor_similarity(a: &AnchorFingerprint, b: &AnchorFingerprint, scale: f64) -> Option<f64> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    let mut pairs: Vec<(f64, usize, usize)> = Vec::new();
    for (i, ea) in a.entries().iter().enumerate() {
        for (j, eb) in b.entries().iter().enumerate() {
            if ea.class == eb.class {
                let d = (ea.offset.0 - eb.offset.0).hypot(ea.offset.1 - eb.offset.1);
                pairs.push((d, i, j));
            }
        }
    }
    pairs.sort_by(|x, y| x.0.total_cmp(&y.0));

    let mut used_a = vec![false; a.len()];
    let mut used_b = vec![false; b.len()];
    let mut total = 0.0;
    for (d, i, j) in pairs {
        if used_a[i] || used_b[j] {
            continue;
        }
        used_a[i] = true;
        used_b[j] = true;
        total += (-d / scale).exp();
    }
    Some((total / a.len().max(b.len()) as f64).clamp(0.0, 1.0))
}

/// Continuity with the anchor bonus folded in. The bonus only fills the
/// headroom above `continuity`, so an absent anchor signal never lowers it.
pub fn spatial_score(continuity: f64, anchor: Option<f64>, bonus: f64) -> f64 {
    let continuity = continuity.clamp(0.0, 1.0);
    match anchor {
        Some(a) => continuity + bonus * a.clamp(0.0, 1.0) * (1.0 - continuity),
        None => continuity,
    }
}
