use diesel::prelude::*;
use log::debug;
use std::collections::HashSet;
use std::sync::Arc;

use crate::accounts::{AccountKey, AccountRecord, AccountRecordDB, AccountRecordRepositoryTrait};
use crate::db::{get_connection, DbConnection, DbPool};
use crate::errors::Result;
use crate::schema::pnl_accounts;

/// Repository for the account-level aggregate table.
pub struct AccountRecordRepository {
    pool: Arc<DbPool>,
}

impl AccountRecordRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

impl AccountRecordRepositoryTrait for AccountRecordRepository {
    fn upsert(&self, conn: &mut DbConnection, records: &[AccountRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let db_models: Vec<AccountRecordDB> = records
            .iter()
            .cloned()
            .map(AccountRecordDB::from)
            .collect();
        debug!("Upserting {} account records", db_models.len());

        let affected = diesel::replace_into(pnl_accounts::table)
            .values(&db_models)
            .execute(conn)?;
        Ok(affected)
    }

    fn delete_orphans(
        &self,
        conn: &mut DbConnection,
        client_ids: &[i64],
        live_keys: &HashSet<AccountKey>,
    ) -> Result<usize> {
        use crate::schema::pnl_accounts::dsl::*;

        if client_ids.is_empty() {
            return Ok(0);
        }

        let existing: Vec<(i64, i64, String)> = pnl_accounts
            .filter(client_id.eq_any(client_ids))
            .select((client_id, login, server))
            .load(conn)?;

        let mut deleted = 0;
        for key in existing {
            if live_keys.contains(&key) {
                continue;
            }
            debug!(
                "Deleting orphan account client_id={} login={} server={}",
                key.0, key.1, key.2
            );
            deleted += diesel::delete(pnl_accounts.find(key)).execute(conn)?;
        }
        Ok(deleted)
    }

    fn list_by_clients(
        &self,
        conn: &mut DbConnection,
        client_ids: &[i64],
    ) -> Result<Vec<AccountRecord>> {
        use crate::schema::pnl_accounts::dsl::*;

        if client_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = pnl_accounts
            .filter(client_id.eq_any(client_ids))
            .order((client_id.asc(), server.asc(), login.asc()))
            .load::<AccountRecordDB>(conn)?;
        Ok(rows.into_iter().map(AccountRecord::from).collect())
    }

    fn list_all(&self, conn: &mut DbConnection) -> Result<Vec<AccountRecord>> {
        use crate::schema::pnl_accounts::dsl::*;

        let rows = pnl_accounts
            .order((client_id.asc(), server.asc(), login.asc()))
            .load::<AccountRecordDB>(conn)?;
        Ok(rows.into_iter().map(AccountRecord::from).collect())
    }

    fn count(&self, conn: &mut DbConnection) -> Result<i64> {
        let total = pnl_accounts::table.count().get_result(conn)?;
        Ok(total)
    }

    fn truncate(&self, conn: &mut DbConnection) -> Result<()> {
        diesel::delete(pnl_accounts::table).execute(conn)?;
        Ok(())
    }

    fn list_by_client(&self, target_client_id: i64) -> Result<Vec<AccountRecord>> {
        use crate::schema::pnl_accounts::dsl::*;

        let mut conn = get_connection(&self.pool)?;
        let rows = pnl_accounts
            .filter(client_id.eq(target_client_id))
            .order((server.asc(), login.asc()))
            .load::<AccountRecordDB>(&mut conn)?;
        Ok(rows.into_iter().map(AccountRecord::from).collect())
    }
}
