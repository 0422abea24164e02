use crate::shared::embedding::Embedding;

/// Raw cosine similarity in `[-1, 1]`. Zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = (norm_a * norm_b).sqrt();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    (dot / denom).clamp(-1.0, 1.0)
}

/// Cosine of two embeddings mapped to `[0, 1]`; anti-correlated vectors
/// carry no more evidence than unrelated ones, so negatives clamp to 0.
pub fn unit_similarity(a: &Embedding, b: &Embedding) -> f64 {
    cosine_similarity(a.as_slice(), b.as_slice()).max(0.0)
}

/// Best match of `probe` against a set of exemplars, `None` for an empty set.
pub fn best_exemplar_similarity<'a>(
    probe: &Embedding,
    exemplars: impl IntoIterator<Item = &'a Embedding>,
) -> Option<f64> {
    exemplars
        .into_iter()
        .map(|e| unit_similarity(probe, e))
        .fold(None, |best, s| Some(best.map_or(s, |b: f64| b.max(s))))
}

/// Defined only when the detection shows a face and the identity has face
/// exemplars to compare against.
pub fn face_similarity<'a>(
    probe: Option<&Embedding>,
    exemplars: impl IntoIterator<Item = &'a Embedding>,
) -> Option<f64> {
    probe.and_then(|p| best_exemplar_similarity(p, exemplars))
}

/// Always defined; an identity without body exemplars scores 0.
pub fn body_similarity<'a>(
    probe: &Embedding,
    exemplars: impl IntoIterator<Item = &'a Embedding>,
) -> f64 {
    best_exemplar_similarity(probe, exemplars).unwrap_or(0.0)
}
