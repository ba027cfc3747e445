use log::warn;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::accounts::{AccountKey, AccountRecord};
use crate::constants::{CENT_CURRENCY, MONEY_DECIMAL_PRECISION};
use crate::directory::DirectoryProfile;
use crate::sources::SourceRow;
use crate::summaries::EntitySummary;

/// Derived ratio over traded volume: -1 sentinel when nothing was traded,
/// else `1 - overnight/volume` clamped to [0,1]. Anomalous inputs (negative
/// volume, overnight exceeding traded) are logged and resolved to the
/// sentinel / clamped value instead of failing the run.
pub fn swap_free_ratio(client_id: i64, volume_lots: Decimal, overnight_volume_lots: Decimal) -> Decimal {
    if volume_lots < Decimal::ZERO {
        warn!(
            "Data anomaly for client {}: negative volume_lots {}",
            client_id, volume_lots
        );
        return Decimal::NEGATIVE_ONE;
    }
    if volume_lots.is_zero() {
        return Decimal::NEGATIVE_ONE;
    }

    if overnight_volume_lots < Decimal::ZERO {
        warn!(
            "Data anomaly for client {}: negative overnight_volume_lots {}",
            client_id, overnight_volume_lots
        );
        return Decimal::ONE;
    }

    let ratio = Decimal::ONE - overnight_volume_lots / volume_lots;
    if ratio < Decimal::ZERO {
        warn!(
            "Data anomaly for client {}: overnight_volume_lots {} exceeds volume_lots {}",
            client_id, overnight_volume_lots, volume_lots
        );
        return Decimal::ZERO;
    }
    ratio.round_dp(MONEY_DECIMAL_PRECISION)
}

/// Accumulator for one (client, login, server) group.
#[derive(Default)]
struct AccountAccumulator {
    currency: Option<String>,
    user_name: Option<String>,
    user_group: Option<String>,
    country: Option<String>,
    balance: Decimal,
    equity: Decimal,
    floating_pnl: Decimal,
    closed_profit: Decimal,
    commission: Decimal,
    deposit: Decimal,
    withdrawal: Decimal,
    volume_lots: Decimal,
    overnight_volume_lots: Decimal,
    last_updated: Option<chrono::NaiveDateTime>,
}

fn pick_first(slot: &mut Option<String>, value: &Option<String>) {
    // First by ascending order, nulls last (matches the summary read surface)
    if let Some(v) = value {
        match slot {
            Some(current) if current.as_str() <= v.as_str() => {}
            _ => *slot = Some(v.clone()),
        }
    }
}

/// Recomputes Account Records from raw source rows, grouped by
/// (client_id, login, server).
///
/// Cent-denominated rows are normalized (divided by 100) before summation;
/// normalizing after the sum would distort groups that mix cent and regular
/// rows.
pub fn aggregate_accounts(rows: &[SourceRow]) -> Vec<AccountRecord> {
    let mut groups: BTreeMap<AccountKey, AccountAccumulator> = BTreeMap::new();

    for row in rows {
        let scale = if row.currency == CENT_CURRENCY {
            Decimal::ONE_HUNDRED
        } else {
            Decimal::ONE
        };

        let acc = groups
            .entry((row.client_id, row.login, row.server.clone()))
            .or_default();

        acc.currency = match acc.currency.take() {
            Some(current) if current.as_str() >= row.currency.as_str() => Some(current),
            _ => Some(row.currency.clone()),
        };
        pick_first(&mut acc.user_name, &row.user_name);
        pick_first(&mut acc.user_group, &row.user_group);
        pick_first(&mut acc.country, &row.country);

        acc.balance += row.balance / scale;
        acc.equity += row.equity / scale;
        acc.floating_pnl += row.floating_pnl / scale;
        acc.closed_profit += row.closed_profit / scale;
        acc.commission += row.commission / scale;
        acc.deposit += row.deposit / scale;
        acc.withdrawal += row.withdrawal / scale;
        acc.volume_lots += (row.closed_sell_volume + row.closed_buy_volume) / scale;
        acc.overnight_volume_lots +=
            (row.closed_sell_overnight_volume + row.closed_buy_overnight_volume) / scale;

        acc.last_updated = Some(match acc.last_updated {
            Some(current) if current >= row.last_updated => current,
            _ => row.last_updated,
        });
    }

    groups
        .into_iter()
        .filter_map(|((client_id, login, server), acc)| {
            let last_updated = acc.last_updated?;
            let volume_lots = acc.volume_lots.round_dp(MONEY_DECIMAL_PRECISION);
            let overnight_volume_lots = acc.overnight_volume_lots.round_dp(MONEY_DECIMAL_PRECISION);
            Some(AccountRecord {
                client_id,
                login,
                server,
                currency: acc.currency.unwrap_or_default(),
                user_name: acc.user_name,
                user_group: acc.user_group,
                country: acc.country,
                balance: acc.balance.round_dp(MONEY_DECIMAL_PRECISION),
                equity: acc.equity.round_dp(MONEY_DECIMAL_PRECISION),
                floating_pnl: acc.floating_pnl.round_dp(MONEY_DECIMAL_PRECISION),
                closed_profit: acc.closed_profit.round_dp(MONEY_DECIMAL_PRECISION),
                commission: acc.commission.round_dp(MONEY_DECIMAL_PRECISION),
                deposit: acc.deposit.round_dp(MONEY_DECIMAL_PRECISION),
                withdrawal: acc.withdrawal.round_dp(MONEY_DECIMAL_PRECISION),
                volume_lots,
                overnight_volume_lots,
                swap_free_ratio: swap_free_ratio(client_id, volume_lots, overnight_volume_lots),
                last_updated,
            })
        })
        .collect()
}

/// Fully recomputes one entity's summary from its current Account Records.
///
/// Returns None when the entity has no accounts left (its summary row must
/// be removed, never left stale). Directory misses retain the previously
/// stored descriptive fields; the enabled flag defaults to 1.
pub fn summarize_client(
    client_id: i64,
    accounts: &[AccountRecord],
    profile: Option<&DirectoryProfile>,
    previous: Option<&EntitySummary>,
) -> Option<EntitySummary> {
    if accounts.is_empty() {
        return None;
    }

    let mut client_name: Option<String> = None;
    let mut total_balance = Decimal::ZERO;
    let mut total_equity = Decimal::ZERO;
    let mut total_floating_pnl = Decimal::ZERO;
    let mut total_closed_profit = Decimal::ZERO;
    let mut total_commission = Decimal::ZERO;
    let mut total_deposit = Decimal::ZERO;
    let mut total_withdrawal = Decimal::ZERO;
    let mut total_volume_lots = Decimal::ZERO;
    let mut total_overnight_volume_lots = Decimal::ZERO;
    let mut last_updated = accounts[0].last_updated;

    for account in accounts {
        pick_first(&mut client_name, &account.user_name);
        total_balance += account.balance;
        total_equity += account.equity;
        total_floating_pnl += account.floating_pnl;
        total_closed_profit += account.closed_profit;
        total_commission += account.commission;
        total_deposit += account.deposit;
        total_withdrawal += account.withdrawal;
        total_volume_lots += account.volume_lots;
        total_overnight_volume_lots += account.overnight_volume_lots;
        if account.last_updated > last_updated {
            last_updated = account.last_updated;
        }
    }

    let (zipcode, is_enabled) = match profile {
        Some(profile) => (profile.zipcode.clone(), profile.is_enabled.unwrap_or(1)),
        None => (
            previous.and_then(|p| p.zipcode.clone()),
            previous.map(|p| p.is_enabled).unwrap_or(1),
        ),
    };

    let total_volume_lots = total_volume_lots.round_dp(MONEY_DECIMAL_PRECISION);
    let total_overnight_volume_lots = total_overnight_volume_lots.round_dp(MONEY_DECIMAL_PRECISION);

    Some(EntitySummary {
        client_id,
        client_name,
        zipcode,
        is_enabled,
        account_count: accounts.len() as i64,
        total_balance: total_balance.round_dp(MONEY_DECIMAL_PRECISION),
        total_equity: total_equity.round_dp(MONEY_DECIMAL_PRECISION),
        total_floating_pnl: total_floating_pnl.round_dp(MONEY_DECIMAL_PRECISION),
        total_closed_profit: total_closed_profit.round_dp(MONEY_DECIMAL_PRECISION),
        total_commission: total_commission.round_dp(MONEY_DECIMAL_PRECISION),
        total_deposit: total_deposit.round_dp(MONEY_DECIMAL_PRECISION),
        total_withdrawal: total_withdrawal.round_dp(MONEY_DECIMAL_PRECISION),
        total_volume_lots,
        total_overnight_volume_lots,
        // Ratio over the summed volumes, not an average of per-account ratios
        swap_free_ratio: swap_free_ratio(client_id, total_volume_lots, total_overnight_volume_lots),
        last_updated,
    })
}
