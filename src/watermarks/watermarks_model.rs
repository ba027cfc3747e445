use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// Durable high-water mark of one dataset partition.
///
/// `last_updated` records how recent the pipeline *output* is: the max
/// source `last_updated` observed in the last committed run, never wall-clock
/// time. It only advances after the encompassing transaction commits.
#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    PartialEq,
    Serialize,
    Deserialize,
    Debug,
    Clone,
)]
#[diesel(table_name = crate::schema::etl_watermarks)]
#[diesel(primary_key(dataset, partition_key))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct Watermark {
    pub dataset: String,
    pub partition_key: String,
    pub last_updated: NaiveDateTime,
}
