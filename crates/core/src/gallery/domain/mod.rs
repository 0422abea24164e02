pub mod exemplar_set;
pub mod gallery;
pub mod identity_record;
