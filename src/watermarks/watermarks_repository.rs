use diesel::prelude::*;
use log::debug;

use crate::db::DbConnection;
use crate::errors::Result;
use crate::schema::etl_watermarks;
use crate::watermarks::{Watermark, WatermarkRepositoryTrait};

/// Repository for the etl_watermarks table.
#[derive(Default)]
pub struct WatermarkRepository;

impl WatermarkRepository {
    pub fn new() -> Self {
        Self
    }
}

impl WatermarkRepositoryTrait for WatermarkRepository {
    fn get(
        &self,
        conn: &mut DbConnection,
        target_dataset: &str,
        target_partition: &str,
    ) -> Result<Option<Watermark>> {
        use crate::schema::etl_watermarks::dsl::*;

        let row = etl_watermarks
            .find((target_dataset, target_partition))
            .first::<Watermark>(conn)
            .optional()?;
        Ok(row)
    }

    fn upsert(&self, conn: &mut DbConnection, watermark: &Watermark) -> Result<()> {
        debug!(
            "Advancing watermark {}/{} to {}",
            watermark.dataset, watermark.partition_key, watermark.last_updated
        );
        diesel::replace_into(etl_watermarks::table)
            .values(watermark)
            .execute(conn)?;
        Ok(())
    }
}
