// Module declarations
pub(crate) mod summaries_model;
pub(crate) mod summaries_repository;
pub(crate) mod summaries_traits;

// Re-export the public interface
pub use summaries_model::{EntitySummary, EntitySummaryDB};
pub use summaries_repository::SummaryRepository;
pub use summaries_traits::SummaryRepositoryTrait;
