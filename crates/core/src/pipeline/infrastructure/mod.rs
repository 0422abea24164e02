pub mod jsonl_label_writer;
pub mod jsonl_observation_reader;
pub mod scene_boundary_source;
pub mod threaded_batch_executor;
