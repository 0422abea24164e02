pub mod anchor;
pub mod bbox;
pub mod constants;
pub mod detection;
pub mod embedding;
pub mod ids;
pub mod observation;
pub mod resolution;
