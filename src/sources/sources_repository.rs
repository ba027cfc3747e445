use chrono::NaiveDateTime;
use diesel::dsl::max;
use diesel::prelude::*;
use std::collections::HashMap;

use crate::db::DbConnection;
use crate::errors::Result;
use crate::sources::sources_model::SourceRowDB;
use crate::sources::{SourceRow, SourceRepositoryTrait, SERVER_MT4, SERVER_MT5};

/// Repository reading the two source trading tables. Every read takes the
/// run's connection so candidate selection and aggregation see one snapshot.
#[derive(Default)]
pub struct SourceRepository;

impl SourceRepository {
    pub fn new() -> Self {
        Self
    }

    fn merge_max(
        target: &mut HashMap<i64, NaiveDateTime>,
        rows: Vec<(Option<i64>, Option<NaiveDateTime>)>,
    ) {
        for (client_id, last_updated) in rows {
            let (Some(client_id), Some(last_updated)) = (client_id, last_updated) else {
                continue;
            };
            target
                .entry(client_id)
                .and_modify(|current| {
                    if last_updated > *current {
                        *current = last_updated;
                    }
                })
                .or_insert(last_updated);
        }
    }
}

impl SourceRepositoryTrait for SourceRepository {
    fn max_last_updated_by_client(
        &self,
        conn: &mut DbConnection,
    ) -> Result<HashMap<i64, NaiveDateTime>> {
        use crate::schema::user_summaries_mt4 as mt4;
        use crate::schema::user_summaries_mt5 as mt5;

        let mut merged: HashMap<i64, NaiveDateTime> = HashMap::new();

        let mt5_rows = mt5::table
            .filter(mt5::user_id.is_not_null())
            .group_by(mt5::user_id)
            .select((mt5::user_id, max(mt5::last_updated)))
            .load::<(Option<i64>, Option<NaiveDateTime>)>(conn)?;
        Self::merge_max(&mut merged, mt5_rows);

        let mt4_rows = mt4::table
            .filter(mt4::user_id.is_not_null())
            .group_by(mt4::user_id)
            .select((mt4::user_id, max(mt4::last_updated)))
            .load::<(Option<i64>, Option<NaiveDateTime>)>(conn)?;
        Self::merge_max(&mut merged, mt4_rows);

        Ok(merged)
    }

    fn rows_for_clients(
        &self,
        conn: &mut DbConnection,
        client_ids: &[i64],
    ) -> Result<Vec<SourceRow>> {
        use crate::schema::user_summaries_mt4 as mt4;
        use crate::schema::user_summaries_mt5 as mt5;

        if client_ids.is_empty() {
            return Ok(Vec::new());
        }
        let wanted: Vec<Option<i64>> = client_ids.iter().map(|id| Some(*id)).collect();

        let mt5_rows = mt5::table
            .filter(mt5::user_id.eq_any(&wanted))
            .load::<SourceRowDB>(conn)?;
        let mt4_rows = mt4::table
            .filter(mt4::user_id.eq_any(&wanted))
            .load::<SourceRowDB>(conn)?;

        Ok(mt5_rows
            .into_iter()
            .filter_map(|row| row.into_domain(SERVER_MT5))
            .chain(
                mt4_rows
                    .into_iter()
                    .filter_map(|row| row.into_domain(SERVER_MT4)),
            )
            .collect())
    }

    fn all_rows(&self, conn: &mut DbConnection) -> Result<Vec<SourceRow>> {
        use crate::schema::user_summaries_mt4 as mt4;
        use crate::schema::user_summaries_mt5 as mt5;

        let mt5_rows = mt5::table
            .filter(mt5::user_id.is_not_null())
            .load::<SourceRowDB>(conn)?;
        let mt4_rows = mt4::table
            .filter(mt4::user_id.is_not_null())
            .load::<SourceRowDB>(conn)?;

        Ok(mt5_rows
            .into_iter()
            .filter_map(|row| row.into_domain(SERVER_MT5))
            .chain(
                mt4_rows
                    .into_iter()
                    .filter_map(|row| row.into_domain(SERVER_MT4)),
            )
            .collect())
    }
}
