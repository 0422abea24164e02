pub mod scene_timeline;
