use chrono::NaiveDateTime;
use diesel::prelude::*;
use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Source-system tag for the MT5 trading server family
pub const SERVER_MT5: &str = "MT5";

/// Source-system tag for the MT4 trading server family
pub const SERVER_MT4: &str = "MT4";

/// One raw source row: the per-login trading summary on one source system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRow {
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
    pub closed_sell_volume: Decimal,
    pub closed_buy_volume: Decimal,
    pub closed_sell_overnight_volume: Decimal,
    pub closed_buy_overnight_volume: Decimal,
    pub last_updated: NaiveDateTime,
}

/// Database row shared by both source tables (identical column layout).
#[derive(Queryable, Debug, Clone)]
pub(crate) struct SourceRowDB {
    pub user_id: Option<i64>,
    pub login: i64,
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
    pub closed_sell_volume: f64,
    pub closed_buy_volume: f64,
    pub closed_sell_overnight_volume: f64,
    pub closed_buy_overnight_volume: f64,
    pub last_updated: NaiveDateTime,
}

fn decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

impl SourceRowDB {
    /// Converts to the domain row, tagging it with its source system.
    /// Rows without a client id carry no entity and are filtered out upstream.
    pub(crate) fn into_domain(self, server: &str) -> Option<SourceRow> {
        let client_id = self.user_id?;
        Some(SourceRow {
            client_id,
            login: self.login,
            server: server.to_string(),
            currency: self.currency,
            user_name: self.user_name,
            user_group: self.user_group,
            country: self.country,
            balance: decimal(self.balance),
            equity: decimal(self.equity),
            floating_pnl: decimal(self.floating_pnl),
            closed_profit: decimal(self.closed_profit),
            commission: decimal(self.commission),
            deposit: decimal(self.deposit),
            withdrawal: decimal(self.withdrawal),
            closed_sell_volume: decimal(self.closed_sell_volume),
            closed_buy_volume: decimal(self.closed_buy_volume),
            closed_sell_overnight_volume: decimal(self.closed_sell_overnight_volume),
            closed_buy_overnight_volume: decimal(self.closed_buy_overnight_volume),
            last_updated: self.last_updated,
        })
    }
}
