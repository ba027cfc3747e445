use chrono::NaiveDateTime;
use diesel::prelude::*;
use num_traits::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Domain model for one entity (client) summary: the sums of all of the
/// entity's live Account Records plus directory-sourced descriptive fields.
///
/// Summary rows are always recomputed in full from the account table, never
/// patched incrementally, so they cannot drift from their constituents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySummary {
    pub client_id: i64,
    pub client_name: Option<String>,
    pub zipcode: Option<String>,
    pub is_enabled: i16,
    pub account_count: i64,
    pub total_balance: Decimal,
    pub total_equity: Decimal,
    pub total_floating_pnl: Decimal,
    pub total_closed_profit: Decimal,
    pub total_commission: Decimal,
    pub total_deposit: Decimal,
    pub total_withdrawal: Decimal,
    pub total_volume_lots: Decimal,
    pub total_overnight_volume_lots: Decimal,
    /// Computed from the summed volumes, not averaged per account
    pub swap_free_ratio: Decimal,
    pub last_updated: NaiveDateTime,
}

/// Database model for entity summaries
#[derive(
    Queryable, Identifiable, Insertable, AsChangeset, Selectable, PartialEq, Debug, Clone,
)]
#[diesel(table_name = crate::schema::pnl_summaries)]
#[diesel(primary_key(client_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct EntitySummaryDB {
    pub client_id: i64,
    pub client_name: Option<String>,
    pub zipcode: Option<String>,
    pub is_enabled: i16,
    pub account_count: i64,
    pub total_balance: f64,
    pub total_equity: f64,
    pub total_floating_pnl: f64,
    pub total_closed_profit: f64,
    pub total_commission: f64,
    pub total_deposit: f64,
    pub total_withdrawal: f64,
    pub total_volume_lots: f64,
    pub total_overnight_volume_lots: f64,
    pub swap_free_ratio: f64,
    pub last_updated: NaiveDateTime,
}

fn to_db(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

fn from_db(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

// Conversion implementations
impl From<EntitySummary> for EntitySummaryDB {
    fn from(domain: EntitySummary) -> Self {
        Self {
            client_id: domain.client_id,
            client_name: domain.client_name,
            zipcode: domain.zipcode,
            is_enabled: domain.is_enabled,
            account_count: domain.account_count,
            total_balance: to_db(domain.total_balance),
            total_equity: to_db(domain.total_equity),
            total_floating_pnl: to_db(domain.total_floating_pnl),
            total_closed_profit: to_db(domain.total_closed_profit),
            total_commission: to_db(domain.total_commission),
            total_deposit: to_db(domain.total_deposit),
            total_withdrawal: to_db(domain.total_withdrawal),
            total_volume_lots: to_db(domain.total_volume_lots),
            total_overnight_volume_lots: to_db(domain.total_overnight_volume_lots),
            swap_free_ratio: to_db(domain.swap_free_ratio),
            last_updated: domain.last_updated,
        }
    }
}

impl From<EntitySummaryDB> for EntitySummary {
    fn from(db: EntitySummaryDB) -> Self {
        Self {
            client_id: db.client_id,
            client_name: db.client_name,
            zipcode: db.zipcode,
            is_enabled: db.is_enabled,
            account_count: db.account_count,
            total_balance: from_db(db.total_balance),
            total_equity: from_db(db.total_equity),
            total_floating_pnl: from_db(db.total_floating_pnl),
            total_closed_profit: from_db(db.total_closed_profit),
            total_commission: from_db(db.total_commission),
            total_deposit: from_db(db.total_deposit),
            total_withdrawal: from_db(db.total_withdrawal),
            total_volume_lots: from_db(db.total_volume_lots),
            total_overnight_volume_lots: from_db(db.total_overnight_volume_lots),
            swap_free_ratio: from_db(db.swap_free_ratio),
            last_updated: db.last_updated,
        }
    }
}
