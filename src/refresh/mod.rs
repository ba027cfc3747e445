// Module declarations
mod account_calculator;
mod candidate_selector;
mod refresh_model;
mod refresh_service;

#[cfg(test)]
mod refresh_service_tests;

// Re-export the public interface
pub use account_calculator::*;
pub use candidate_selector::*;
pub use refresh_model::*;
pub use refresh_service::*;
