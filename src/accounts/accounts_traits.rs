use std::collections::HashSet;

use crate::accounts::{AccountKey, AccountRecord};
use crate::db::DbConnection;
use crate::errors::Result;

/// Trait defining the contract for Account Record storage operations.
///
/// Write methods run on the enclosing run transaction's connection; they are
/// only reachable from the run controller.
pub trait AccountRecordRepositoryTrait: Send + Sync {
    /// Replace-on-conflict upsert keyed by (client_id, login, server).
    fn upsert(&self, conn: &mut DbConnection, records: &[AccountRecord]) -> Result<usize>;

    /// Deletes rows of the given entities whose key no longer appears in
    /// `live_keys`. Entities outside `client_ids` are never touched.
    fn delete_orphans(
        &self,
        conn: &mut DbConnection,
        client_ids: &[i64],
        live_keys: &HashSet<AccountKey>,
    ) -> Result<usize>;

    fn list_by_clients(
        &self,
        conn: &mut DbConnection,
        client_ids: &[i64],
    ) -> Result<Vec<AccountRecord>>;

    fn list_all(&self, conn: &mut DbConnection) -> Result<Vec<AccountRecord>>;

    fn count(&self, conn: &mut DbConnection) -> Result<i64>;

    fn truncate(&self, conn: &mut DbConnection) -> Result<()>;

    /// Drill-down read: one entity's accounts ordered by (server, login).
    fn list_by_client(&self, client_id: i64) -> Result<Vec<AccountRecord>>;
}
