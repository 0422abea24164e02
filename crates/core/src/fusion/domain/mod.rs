pub mod fusion_scorer;
