// Module declarations
pub(crate) mod directory_model;
pub(crate) mod directory_repository;
pub(crate) mod directory_traits;

// Re-export the public interface
pub use directory_model::DirectoryProfile;
pub use directory_repository::DirectoryRepository;
pub use directory_traits::DirectoryLookupTrait;
