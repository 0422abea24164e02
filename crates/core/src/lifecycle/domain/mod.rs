pub mod detection_validator;
pub mod track_binding;
