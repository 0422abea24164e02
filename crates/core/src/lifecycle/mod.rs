pub mod domain;
pub mod identity_lifecycle_manager;

#[cfg(test)]
mod scenario_tests;
