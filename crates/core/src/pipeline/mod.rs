pub mod identity_report;
pub mod infrastructure;
pub mod label_filter;
pub mod label_sink;
pub mod observation_source;
pub mod resolution_logger;
pub mod resolve_identities_use_case;
