// Module declarations
pub(crate) mod sources_model;
pub(crate) mod sources_repository;
pub(crate) mod sources_traits;

// Re-export the public interface
pub use sources_model::{SourceRow, SERVER_MT4, SERVER_MT5};
pub use sources_repository::SourceRepository;
pub use sources_traits::SourceRepositoryTrait;
