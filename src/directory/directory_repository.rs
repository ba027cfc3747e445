use diesel::prelude::*;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

use crate::constants::DIRECTORY_BATCH_SIZE;
use crate::db::{get_connection, DbPool};
use crate::directory::{DirectoryLookupTrait, DirectoryProfile};
use crate::errors::Result;

/// Directory lookup backed by the `directory_users` table.
///
/// Uses its own connection: the directory is an external source and must not
/// hold the run transaction open.
pub struct DirectoryRepository {
    pool: Arc<DbPool>,
}

impl DirectoryRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

impl DirectoryLookupTrait for DirectoryRepository {
    fn fetch_profiles(&self, client_ids: &[i64]) -> Result<HashMap<i64, DirectoryProfile>> {
        use crate::schema::directory_users::dsl::*;

        let mut profiles: HashMap<i64, DirectoryProfile> = HashMap::new();
        if client_ids.is_empty() {
            return Ok(profiles);
        }

        let mut conn = get_connection(&self.pool)?;
        for batch in client_ids.chunks(DIRECTORY_BATCH_SIZE) {
            let rows: Vec<(i64, Option<String>, Option<i16>)> = directory_users
                .filter(id.eq_any(batch))
                .select((id, zipcode, is_enabled))
                .load(&mut conn)?;
            for (row_id, row_zipcode, row_enabled) in rows {
                // Coerce the enabled flag to strict 0/1
                let enabled = row_enabled.map(|flag| if flag == 1 { 1 } else { 0 });
                profiles.insert(
                    row_id,
                    DirectoryProfile {
                        client_id: row_id,
                        zipcode: row_zipcode,
                        is_enabled: enabled,
                    },
                );
            }
        }

        debug!(
            "Directory lookup resolved {} of {} entities",
            profiles.len(),
            client_ids.len()
        );
        Ok(profiles)
    }
}
