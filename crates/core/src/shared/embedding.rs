use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EmbeddingError {
    #[error("embedding is empty")]
    Empty,
    #[error("embedding contains non-finite values")]
    NonFinite,
    #[error("embedding has zero norm")]
    ZeroNorm,
}

/// Appearance vector produced by an external face or body model.
///
/// Construction validates the raw values and stores an L2-normalized copy,
/// so the dot product of two embeddings is their cosine similarity.
#[derive(Clone, Debug, PartialEq)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(mut values: Vec<f32>) -> Result<Self, EmbeddingError> {
        if values.is_empty() {
            return Err(EmbeddingError::Empty);
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(EmbeddingError::NonFinite);
        }
        if !l2_normalize(&mut values) {
            return Err(EmbeddingError::ZeroNorm);
        }
        Ok(Self(values))
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

/// Normalizes in place. Returns false (leaving `v` untouched) for a zero vector.
pub fn l2_normalize(v: &mut [f32]) -> bool {
    let norm: f64 = v
        .iter()
        .map(|x| (*x as f64) * (*x as f64))
        .sum::<f64>()
        .sqrt();
    if norm <= f64::EPSILON {
        return false;
    }
    for x in v.iter_mut() {
        *x = (*x as f64 / norm) as f32;
    }
    true
}
