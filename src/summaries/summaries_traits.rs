use chrono::NaiveDateTime;
use std::collections::HashMap;

use crate::db::DbConnection;
use crate::errors::Result;
use crate::summaries::EntitySummary;

/// Trait defining the contract for Entity Summary storage operations.
pub trait SummaryRepositoryTrait: Send + Sync {
    /// Entity id -> stored summary `last_updated`, for candidate selection.
    fn last_updated_by_client(
        &self,
        conn: &mut DbConnection,
    ) -> Result<HashMap<i64, NaiveDateTime>>;

    fn get_by_ids(
        &self,
        conn: &mut DbConnection,
        client_ids: &[i64],
    ) -> Result<Vec<EntitySummary>>;

    fn list_all(&self, conn: &mut DbConnection) -> Result<Vec<EntitySummary>>;

    /// Replace-on-conflict upsert keyed by entity id.
    fn upsert(&self, conn: &mut DbConnection, summaries: &[EntitySummary]) -> Result<usize>;

    /// Removes summaries of entities that no longer have any Account Record.
    fn delete_by_ids(&self, conn: &mut DbConnection, client_ids: &[i64]) -> Result<usize>;

    fn truncate(&self, conn: &mut DbConnection) -> Result<()>;

    /// (row count, max last_updated) of the summary table, for the
    /// freshness/status surface.
    fn stats(&self, conn: &mut DbConnection) -> Result<(i64, Option<NaiveDateTime>)>;
}
