//! Pure comparison functions over embeddings and spatial descriptors.
//!
//! Nothing here holds state or touches the gallery; every function is
//! deterministic for identical inputs.

pub mod appearance;
pub mod spatial;
