// Module declarations
pub(crate) mod accounts_model;
pub(crate) mod accounts_repository;
pub(crate) mod accounts_traits;

// Re-export the public interface
pub use accounts_model::{AccountKey, AccountRecord, AccountRecordDB};
pub use accounts_repository::AccountRecordRepository;
pub use accounts_traits::AccountRecordRepositoryTrait;
