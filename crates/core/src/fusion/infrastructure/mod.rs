pub mod weighted_fusion_scorer;
