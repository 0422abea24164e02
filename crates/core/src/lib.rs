pub mod assignment;
pub mod config;
pub mod fusion;
pub mod gallery;
pub mod lifecycle;
pub mod pipeline;
pub mod scene;
pub mod shared;
pub mod similarity;
