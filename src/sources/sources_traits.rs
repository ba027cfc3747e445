use chrono::NaiveDateTime;
use std::collections::HashMap;

use crate::db::DbConnection;
use crate::errors::Result;
use crate::sources::SourceRow;

/// Trait defining the contract for reading the source trading tables.
/// Both source-system tables are unioned behind every method.
pub trait SourceRepositoryTrait: Send + Sync {
    /// Per-entity max `last_updated` across all source rows of both tables.
    fn max_last_updated_by_client(
        &self,
        conn: &mut DbConnection,
    ) -> Result<HashMap<i64, NaiveDateTime>>;

    /// All source rows belonging to the given entities.
    fn rows_for_clients(
        &self,
        conn: &mut DbConnection,
        client_ids: &[i64],
    ) -> Result<Vec<SourceRow>>;

    /// Every source row carrying an entity id (full-load path).
    fn all_rows(&self, conn: &mut DbConnection) -> Result<Vec<SourceRow>>;
}
