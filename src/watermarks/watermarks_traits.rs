use crate::db::DbConnection;
use crate::errors::Result;
use crate::watermarks::Watermark;

/// Trait defining the contract for watermark storage operations.
pub trait WatermarkRepositoryTrait: Send + Sync {
    fn get(
        &self,
        conn: &mut DbConnection,
        dataset: &str,
        partition_key: &str,
    ) -> Result<Option<Watermark>>;

    /// Upsert by (dataset, partition_key). Called as the last write of a run,
    /// inside the run transaction.
    fn upsert(&self, conn: &mut DbConnection, watermark: &Watermark) -> Result<()>;
}
