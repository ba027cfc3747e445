use chrono::NaiveDateTime;
use diesel::prelude::*;
use num_traits::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Composite identity of an Account Record: (entity, sub-account, source system)
pub type AccountKey = (i64, i64, String);

/// Domain model for one aggregated trading account.
///
/// Monetary and volume fields are fixed-point, four decimal places, already
/// cent-normalized. `last_updated` is the max across the contributing source
/// rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub client_id: i64,
    pub login: i64,
    pub server: String,
    pub currency: String,
    pub user_name: Option<String>,
    pub user_group: Option<String>,
    pub country: Option<String>,
    pub balance: Decimal,
    pub equity: Decimal,
    pub floating_pnl: Decimal,
    pub closed_profit: Decimal,
    pub commission: Decimal,
    pub deposit: Decimal,
    pub withdrawal: Decimal,
    pub volume_lots: Decimal,
    pub overnight_volume_lots: Decimal,
    /// -1 sentinel when no volume was traded, else 1 - overnight/volume in [0,1]
    pub swap_free_ratio: Decimal,
    pub last_updated: NaiveDateTime,
}

impl AccountRecord {
    pub fn key(&self) -> AccountKey {
        (self.client_id, self.login, self.server.clone())
    }
}

/// Database model for account records
#[derive(
    Queryable, Identifiable, Insertable, AsChangeset, Selectable, PartialEq, Debug, Clone,
)]
#[diesel(table_name = crate::schema::pnl_accounts)]
#[diesel(primary_key(client_id, login, server))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AccountRecordDB {
    pub client_id: i64,
    pub login: i64,
    pub server: String,
    pub currency: String,
    pub user_name: Option<String>,
    pub user_group: Option<String>,
    pub country: Option<String>,
    pub balance: f64,
    pub equity: f64,
    pub floating_pnl: f64,
    pub closed_profit: f64,
    pub commission: f64,
    pub deposit: f64,
    pub withdrawal: f64,
    pub volume_lots: f64,
    pub overnight_volume_lots: f64,
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
impl From<AccountRecord> for AccountRecordDB {
    fn from(domain: AccountRecord) -> Self {
        Self {
            client_id: domain.client_id,
            login: domain.login,
            server: domain.server,
            currency: domain.currency,
            user_name: domain.user_name,
            user_group: domain.user_group,
            country: domain.country,
            balance: to_db(domain.balance),
            equity: to_db(domain.equity),
            floating_pnl: to_db(domain.floating_pnl),
            closed_profit: to_db(domain.closed_profit),
            commission: to_db(domain.commission),
            deposit: to_db(domain.deposit),
            withdrawal: to_db(domain.withdrawal),
            volume_lots: to_db(domain.volume_lots),
            overnight_volume_lots: to_db(domain.overnight_volume_lots),
            swap_free_ratio: to_db(domain.swap_free_ratio),
            last_updated: domain.last_updated,
        }
    }
}

impl From<AccountRecordDB> for AccountRecord {
    fn from(db: AccountRecordDB) -> Self {
        Self {
            client_id: db.client_id,
            login: db.login,
            server: db.server,
            currency: db.currency,
            user_name: db.user_name,
            user_group: db.user_group,
            country: db.country,
            balance: from_db(db.balance),
            equity: from_db(db.equity),
            floating_pnl: from_db(db.floating_pnl),
            closed_profit: from_db(db.closed_profit),
            commission: from_db(db.commission),
            deposit: from_db(db.deposit),
            withdrawal: from_db(db.withdrawal),
            volume_lots: from_db(db.volume_lots),
            overnight_volume_lots: from_db(db.overnight_volume_lots),
            swap_free_ratio: from_db(db.swap_free_ratio),
            last_updated: db.last_updated,
        }
    }
}
