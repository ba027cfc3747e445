use chrono::NaiveDateTime;
use diesel::dsl::max;
use diesel::prelude::*;
use log::debug;
use std::collections::HashMap;

use crate::db::DbConnection;
use crate::errors::Result;
use crate::schema::pnl_summaries;
use crate::summaries::{EntitySummary, EntitySummaryDB, SummaryRepositoryTrait};

/// Repository for the client-level aggregate table.
#[derive(Default)]
pub struct SummaryRepository;

impl SummaryRepository {
    pub fn new() -> Self {
        Self
    }
}

impl SummaryRepositoryTrait for SummaryRepository {
    fn last_updated_by_client(
        &self,
        conn: &mut DbConnection,
    ) -> Result<HashMap<i64, NaiveDateTime>> {
        use crate::schema::pnl_summaries::dsl::*;

        let rows: Vec<(i64, NaiveDateTime)> = pnl_summaries
            .select((client_id, last_updated))
            .load(conn)?;
        Ok(rows.into_iter().collect())
    }

    fn get_by_ids(
        &self,
        conn: &mut DbConnection,
        client_ids: &[i64],
    ) -> Result<Vec<EntitySummary>> {
        use crate::schema::pnl_summaries::dsl::*;

        if client_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = pnl_summaries
            .filter(client_id.eq_any(client_ids))
            .load::<EntitySummaryDB>(conn)?;
        Ok(rows.into_iter().map(EntitySummary::from).collect())
    }

    fn list_all(&self, conn: &mut DbConnection) -> Result<Vec<EntitySummary>> {
        use crate::schema::pnl_summaries::dsl::*;

        let rows = pnl_summaries
            .order(client_id.asc())
            .load::<EntitySummaryDB>(conn)?;
        Ok(rows.into_iter().map(EntitySummary::from).collect())
    }

    fn upsert(&self, conn: &mut DbConnection, summaries: &[EntitySummary]) -> Result<usize> {
        if summaries.is_empty() {
            return Ok(0);
        }

        let db_models: Vec<EntitySummaryDB> = summaries
            .iter()
            .cloned()
            .map(EntitySummaryDB::from)
            .collect();
        debug!("Upserting {} entity summaries", db_models.len());

        let affected = diesel::replace_into(pnl_summaries::table)
            .values(&db_models)
            .execute(conn)?;
        Ok(affected)
    }

    fn delete_by_ids(&self, conn: &mut DbConnection, client_ids: &[i64]) -> Result<usize> {
        use crate::schema::pnl_summaries::dsl::*;

        if client_ids.is_empty() {
            return Ok(0);
        }
        let deleted = diesel::delete(pnl_summaries.filter(client_id.eq_any(client_ids)))
            .execute(conn)?;
        Ok(deleted)
    }

    fn truncate(&self, conn: &mut DbConnection) -> Result<()> {
        diesel::delete(pnl_summaries::table).execute(conn)?;
        Ok(())
    }

    fn stats(&self, conn: &mut DbConnection) -> Result<(i64, Option<NaiveDateTime>)> {
        use crate::schema::pnl_summaries::dsl::*;

        let total: i64 = pnl_summaries.count().get_result(conn)?;
        let newest: Option<NaiveDateTime> = pnl_summaries
            .select(max(last_updated))
            .first(conn)?;
        Ok((total, newest))
    }
}
