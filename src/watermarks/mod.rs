// Module declarations
pub(crate) mod watermarks_model;
pub(crate) mod watermarks_repository;
pub(crate) mod watermarks_traits;

// Re-export the public interface
pub use watermarks_model::Watermark;
pub use watermarks_repository::WatermarkRepository;
pub use watermarks_traits::WatermarkRepositoryTrait;
