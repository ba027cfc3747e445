use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::accounts::{AccountKey, AccountRecord, AccountRecordRepositoryTrait};
use crate::db::{create_pool, DbConnection, DbPool};
use crate::directory::{DirectoryLookupTrait, DirectoryProfile};
use crate::errors::{DirectoryError, Error, Result};
use crate::refresh::RefreshService;
use crate::sources::{SourceRepositoryTrait, SourceRow};
use crate::summaries::{EntitySummary, SummaryRepositoryTrait};
use crate::watermarks::{Watermark, WatermarkRepositoryTrait};

fn ts(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 5, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

fn source_row(client_id: i64, login: i64, server: &str, last_updated: NaiveDateTime) -> SourceRow {
    SourceRow {
        client_id,
        login,
        server: server.to_string(),
        currency: "USD".to_string(),
        user_name: None,
        user_group: None,
        country: None,
        balance: dec!(100),
        equity: dec!(100),
        floating_pnl: Decimal::ZERO,
        closed_profit: Decimal::ZERO,
        commission: Decimal::ZERO,
        deposit: Decimal::ZERO,
        withdrawal: Decimal::ZERO,
        closed_sell_volume: dec!(1),
        closed_buy_volume: dec!(1),
        closed_sell_overnight_volume: Decimal::ZERO,
        closed_buy_overnight_volume: Decimal::ZERO,
        last_updated,
    }
}

struct MockSourceRepository {
    rows: Vec<SourceRow>,
}

impl MockSourceRepository {
    fn new(rows: Vec<SourceRow>) -> Self {
        Self { rows }
    }
}

impl SourceRepositoryTrait for MockSourceRepository {
    fn max_last_updated_by_client(
        &self,
        _conn: &mut DbConnection,
    ) -> Result<HashMap<i64, NaiveDateTime>> {
        let mut max: HashMap<i64, NaiveDateTime> = HashMap::new();
        for row in &self.rows {
            max.entry(row.client_id)
                .and_modify(|current| {
                    if row.last_updated > *current {
                        *current = row.last_updated;
                    }
                })
                .or_insert(row.last_updated);
        }
        Ok(max)
    }

    fn rows_for_clients(
        &self,
        _conn: &mut DbConnection,
        client_ids: &[i64],
    ) -> Result<Vec<SourceRow>> {
        let wanted: HashSet<i64> = client_ids.iter().copied().collect();
        Ok(self
            .rows
            .iter()
            .filter(|row| wanted.contains(&row.client_id))
            .cloned()
            .collect())
    }

    fn all_rows(&self, _conn: &mut DbConnection) -> Result<Vec<SourceRow>> {
        Ok(self.rows.clone())
    }
}

/// Source mock whose max map advertises an entity that no longer has rows,
/// simulating rows deleted between the candidate scan and the detail read.
struct VanishingSourceRepository {
    inner: MockSourceRepository,
    advertised: i64,
    advertised_at: NaiveDateTime,
}

impl SourceRepositoryTrait for VanishingSourceRepository {
    fn max_last_updated_by_client(
        &self,
        conn: &mut DbConnection,
    ) -> Result<HashMap<i64, NaiveDateTime>> {
        let mut max = self.inner.max_last_updated_by_client(conn)?;
        max.insert(self.advertised, self.advertised_at);
        Ok(max)
    }

    fn rows_for_clients(
        &self,
        conn: &mut DbConnection,
        client_ids: &[i64],
    ) -> Result<Vec<SourceRow>> {
        self.inner.rows_for_clients(conn, client_ids)
    }

    fn all_rows(&self, conn: &mut DbConnection) -> Result<Vec<SourceRow>> {
        self.inner.all_rows(conn)
    }
}

#[derive(Default)]
struct MockAccountRepository {
    records: RwLock<HashMap<AccountKey, AccountRecord>>,
}

impl MockAccountRepository {
    fn seed(&self, records: Vec<AccountRecord>) {
        let mut stored = self.records.write().unwrap();
        for record in records {
            stored.insert(record.key(), record);
        }
    }

    fn keys(&self) -> HashSet<AccountKey> {
        self.records.read().unwrap().keys().cloned().collect()
    }
}

impl AccountRecordRepositoryTrait for MockAccountRepository {
    fn upsert(&self, _conn: &mut DbConnection, records: &[AccountRecord]) -> Result<usize> {
        let mut stored = self.records.write().unwrap();
        for record in records {
            stored.insert(record.key(), record.clone());
        }
        Ok(records.len())
    }

    fn delete_orphans(
        &self,
        _conn: &mut DbConnection,
        client_ids: &[i64],
        live_keys: &HashSet<AccountKey>,
    ) -> Result<usize> {
        let candidates: HashSet<i64> = client_ids.iter().copied().collect();
        let mut stored = self.records.write().unwrap();
        let before = stored.len();
        stored.retain(|key, _| !candidates.contains(&key.0) || live_keys.contains(key));
        Ok(before - stored.len())
    }

    fn list_by_clients(
        &self,
        _conn: &mut DbConnection,
        client_ids: &[i64],
    ) -> Result<Vec<AccountRecord>> {
        let wanted: HashSet<i64> = client_ids.iter().copied().collect();
        Ok(self
            .records
            .read()
            .unwrap()
            .values()
            .filter(|record| wanted.contains(&record.client_id))
            .cloned()
            .collect())
    }

    fn list_all(&self, _conn: &mut DbConnection) -> Result<Vec<AccountRecord>> {
        Ok(self.records.read().unwrap().values().cloned().collect())
    }

    fn count(&self, _conn: &mut DbConnection) -> Result<i64> {
        Ok(self.records.read().unwrap().len() as i64)
    }

    fn truncate(&self, _conn: &mut DbConnection) -> Result<()> {
        self.records.write().unwrap().clear();
        Ok(())
    }

    fn list_by_client(&self, client_id: i64) -> Result<Vec<AccountRecord>> {
        let mut accounts: Vec<AccountRecord> = self
            .records
            .read()
            .unwrap()
            .values()
            .filter(|record| record.client_id == client_id)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| (&a.server, a.login).cmp(&(&b.server, b.login)));
        Ok(accounts)
    }
}

#[derive(Default)]
struct MockSummaryRepository {
    summaries: RwLock<HashMap<i64, EntitySummary>>,
}

impl MockSummaryRepository {
    fn seed(&self, summaries: Vec<EntitySummary>) {
        let mut stored = self.summaries.write().unwrap();
        for summary in summaries {
            stored.insert(summary.client_id, summary);
        }
    }

    fn get(&self, client_id: i64) -> Option<EntitySummary> {
        self.summaries.read().unwrap().get(&client_id).cloned()
    }
}

impl SummaryRepositoryTrait for MockSummaryRepository {
    fn last_updated_by_client(
        &self,
        _conn: &mut DbConnection,
    ) -> Result<HashMap<i64, NaiveDateTime>> {
        Ok(self
            .summaries
            .read()
            .unwrap()
            .values()
            .map(|summary| (summary.client_id, summary.last_updated))
            .collect())
    }

    fn get_by_ids(
        &self,
        _conn: &mut DbConnection,
        client_ids: &[i64],
    ) -> Result<Vec<EntitySummary>> {
        let stored = self.summaries.read().unwrap();
        Ok(client_ids
            .iter()
            .filter_map(|client_id| stored.get(client_id).cloned())
            .collect())
    }

    fn list_all(&self, _conn: &mut DbConnection) -> Result<Vec<EntitySummary>> {
        Ok(self.summaries.read().unwrap().values().cloned().collect())
    }

    fn upsert(&self, _conn: &mut DbConnection, summaries: &[EntitySummary]) -> Result<usize> {
        let mut stored = self.summaries.write().unwrap();
        for summary in summaries {
            stored.insert(summary.client_id, summary.clone());
        }
        Ok(summaries.len())
    }

    fn delete_by_ids(&self, _conn: &mut DbConnection, client_ids: &[i64]) -> Result<usize> {
        let mut stored = self.summaries.write().unwrap();
        let before = stored.len();
        for client_id in client_ids {
            stored.remove(client_id);
        }
        Ok(before - stored.len())
    }

    fn truncate(&self, _conn: &mut DbConnection) -> Result<()> {
        self.summaries.write().unwrap().clear();
        Ok(())
    }

    fn stats(&self, _conn: &mut DbConnection) -> Result<(i64, Option<NaiveDateTime>)> {
        let stored = self.summaries.read().unwrap();
        let max = stored.values().map(|summary| summary.last_updated).max();
        Ok((stored.len() as i64, max))
    }
}

struct MockDirectory {
    profiles: HashMap<i64, DirectoryProfile>,
    fail: bool,
}

impl MockDirectory {
    fn new(profiles: Vec<DirectoryProfile>) -> Self {
        Self {
            profiles: profiles.into_iter().map(|p| (p.client_id, p)).collect(),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            profiles: HashMap::new(),
            fail: true,
        }
    }
}

impl DirectoryLookupTrait for MockDirectory {
    fn fetch_profiles(&self, client_ids: &[i64]) -> Result<HashMap<i64, DirectoryProfile>> {
        if self.fail {
            return Err(Error::Directory(DirectoryError::Unavailable(
                "directory source offline".to_string(),
            )));
        }
        Ok(client_ids
            .iter()
            .filter_map(|client_id| self.profiles.get(client_id).cloned())
            .map(|profile| (profile.client_id, profile))
            .collect())
    }
}

#[derive(Default)]
struct MockWatermarkRepository {
    watermark: RwLock<Option<Watermark>>,
}

impl MockWatermarkRepository {
    fn get_stored(&self) -> Option<Watermark> {
        self.watermark.read().unwrap().clone()
    }
}

impl WatermarkRepositoryTrait for MockWatermarkRepository {
    fn get(
        &self,
        _conn: &mut DbConnection,
        _dataset: &str,
        _partition_key: &str,
    ) -> Result<Option<Watermark>> {
        Ok(self.watermark.read().unwrap().clone())
    }

    fn upsert(&self, _conn: &mut DbConnection, watermark: &Watermark) -> Result<()> {
        *self.watermark.write().unwrap() = Some(watermark.clone());
        Ok(())
    }
}

struct TestHarness {
    service: RefreshService,
    accounts: Arc<MockAccountRepository>,
    summaries: Arc<MockSummaryRepository>,
    watermarks: Arc<MockWatermarkRepository>,
}

fn test_pool() -> Arc<DbPool> {
    create_pool(":memory:").unwrap()
}

fn harness(
    sources: Arc<dyn SourceRepositoryTrait>,
    directory: Arc<dyn DirectoryLookupTrait>,
) -> TestHarness {
    let accounts = Arc::new(MockAccountRepository::default());
    let summaries = Arc::new(MockSummaryRepository::default());
    let watermarks = Arc::new(MockWatermarkRepository::default());
    let service = RefreshService::new(
        test_pool(),
        sources,
        accounts.clone(),
        summaries.clone(),
        directory,
        watermarks.clone(),
    );
    TestHarness {
        service,
        accounts,
        summaries,
        watermarks,
    }
}

fn account(client_id: i64, login: i64, server: &str, last_updated: NaiveDateTime) -> AccountRecord {
    AccountRecord {
        client_id,
        login,
        server: server.to_string(),
        currency: "USD".to_string(),
        user_name: None,
        user_group: None,
        country: None,
        balance: dec!(100),
        equity: dec!(100),
        floating_pnl: Decimal::ZERO,
        closed_profit: Decimal::ZERO,
        commission: Decimal::ZERO,
        deposit: Decimal::ZERO,
        withdrawal: Decimal::ZERO,
        volume_lots: dec!(2),
        overnight_volume_lots: Decimal::ZERO,
        swap_free_ratio: Decimal::ONE,
        last_updated,
    }
}

fn summary(client_id: i64, last_updated: NaiveDateTime) -> EntitySummary {
    EntitySummary {
        client_id,
        client_name: None,
        zipcode: None,
        is_enabled: 1,
        account_count: 1,
        total_balance: dec!(100),
        total_equity: dec!(100),
        total_floating_pnl: Decimal::ZERO,
        total_closed_profit: Decimal::ZERO,
        total_commission: Decimal::ZERO,
        total_deposit: Decimal::ZERO,
        total_withdrawal: Decimal::ZERO,
        total_volume_lots: dec!(2),
        total_overnight_volume_lots: Decimal::ZERO,
        swap_free_ratio: Decimal::ONE,
        last_updated,
    }
}

#[test]
fn run_with_no_candidates_is_a_no_op() {
    let sources = Arc::new(MockSourceRepository::new(vec![source_row(
        1,
        100,
        "MT5",
        ts(1, 0),
    )]));
    let h = harness(sources, Arc::new(MockDirectory::new(vec![])));
    h.summaries.seed(vec![summary(1, ts(1, 0))]);

    let stats = h.service.run_incremental().unwrap();

    assert_eq!(stats.candidates_total(), 0);
    assert_eq!(stats.accounts_upserted, 0);
    assert_eq!(stats.summaries_upserted, 0);
    assert!(stats.watermark.is_none());
    assert!(h.watermarks.get_stored().is_none());
}

#[test]
fn missing_entity_gets_accounts_summary_and_watermark() {
    let sources = Arc::new(MockSourceRepository::new(vec![
        source_row(1, 100, "MT5", ts(1, 0)),
        source_row(1, 200, "MT4", ts(2, 0)),
    ]));
    let h = harness(sources, Arc::new(MockDirectory::new(vec![])));

    let stats = h.service.run_incremental().unwrap();

    assert_eq!(stats.candidates_missing, 1);
    assert_eq!(stats.candidates_lag, 0);
    assert_eq!(stats.accounts_upserted, 2);
    assert_eq!(stats.summaries_upserted, 1);

    let stored = h.summaries.get(1).unwrap();
    assert_eq!(stored.account_count, 2);
    assert_eq!(stored.total_balance, dec!(200.0000));
    assert_eq!(stored.last_updated, ts(2, 0));

    let watermark = h.watermarks.get_stored().unwrap();
    assert_eq!(watermark.last_updated, ts(2, 0));
    assert_eq!(stats.watermark, Some(ts(2, 0)));
}

#[test]
fn second_run_after_success_selects_nothing() {
    let sources = Arc::new(MockSourceRepository::new(vec![source_row(
        1,
        100,
        "MT5",
        ts(1, 0),
    )]));
    let h = harness(sources, Arc::new(MockDirectory::new(vec![])));

    let first = h.service.run_incremental().unwrap();
    assert_eq!(first.candidates_total(), 1);

    let second = h.service.run_incremental().unwrap();
    assert_eq!(second.candidates_total(), 0);
    assert_eq!(second.accounts_upserted, 0);
}

#[test]
fn lagging_run_touches_only_the_lagging_entity() {
    // Entity 1 is up to date; entity 2's source moved past its summary.
    let sources = Arc::new(MockSourceRepository::new(vec![
        source_row(1, 100, "MT5", ts(9, 0)),
        source_row(2, 200, "MT5", ts(2, 0)),
    ]));
    let h = harness(sources, Arc::new(MockDirectory::new(vec![])));
    h.accounts.seed(vec![
        account(1, 100, "MT5", ts(9, 0)),
        account(2, 200, "MT5", ts(1, 0)),
    ]);
    let mut untouched = summary(1, ts(9, 0));
    untouched.zipcode = Some("99999".to_string());
    h.summaries.seed(vec![untouched.clone(), summary(2, ts(1, 0))]);

    let stats = h.service.run_incremental().unwrap();

    assert_eq!(stats.candidates_lag, 1);
    assert_eq!(stats.candidates_missing, 0);
    // Entity 1's summary row is byte-for-byte what was stored before.
    assert_eq!(h.summaries.get(1).unwrap(), untouched);
    assert_eq!(h.summaries.get(2).unwrap().last_updated, ts(2, 0));
    // Watermark reflects the touched entity, not entity 1's later timestamp.
    assert_eq!(h.watermarks.get_stored().unwrap().last_updated, ts(2, 0));
}

#[test]
fn orphan_cleanup_is_scoped_to_candidates() {
    let sources = Arc::new(MockSourceRepository::new(vec![source_row(
        1,
        100,
        "MT5",
        ts(2, 0),
    )]));
    let h = harness(sources, Arc::new(MockDirectory::new(vec![])));
    h.accounts.seed(vec![
        // Stale row of the candidate entity: gone from source, must go.
        account(1, 900, "MT4", ts(1, 0)),
        // Row of a non-candidate entity with no source rows at all: must stay.
        account(7, 700, "MT5", ts(1, 0)),
    ]);
    h.summaries.seed(vec![summary(1, ts(1, 0))]);

    let stats = h.service.run_incremental().unwrap();

    assert_eq!(stats.orphans_deleted, 1);
    let keys = h.accounts.keys();
    assert!(keys.contains(&(1, 100, "MT5".to_string())));
    assert!(!keys.contains(&(1, 900, "MT4".to_string())));
    assert!(keys.contains(&(7, 700, "MT5".to_string())));
}

#[test]
fn entity_with_no_remaining_rows_loses_its_summary() {
    let sources = Arc::new(VanishingSourceRepository {
        inner: MockSourceRepository::new(vec![]),
        advertised: 5,
        advertised_at: ts(3, 0),
    });
    let h = harness(sources, Arc::new(MockDirectory::new(vec![])));
    h.accounts.seed(vec![account(5, 100, "MT5", ts(1, 0))]);
    h.summaries.seed(vec![summary(5, ts(1, 0))]);

    let stats = h.service.run_incremental().unwrap();

    assert_eq!(stats.orphans_deleted, 1);
    assert_eq!(stats.summaries_deleted, 1);
    assert!(h.summaries.get(5).is_none());
    // Nothing was upserted, so the watermark does not move.
    assert!(h.watermarks.get_stored().is_none());
}

#[test]
fn directory_profiles_enrich_summaries_and_changes_are_counted() {
    let sources = Arc::new(MockSourceRepository::new(vec![source_row(
        1,
        100,
        "MT5",
        ts(2, 0),
    )]));
    let directory = Arc::new(MockDirectory::new(vec![DirectoryProfile {
        client_id: 1,
        zipcode: Some("10115".to_string()),
        is_enabled: Some(0),
    }]));
    let h = harness(sources, directory);
    let mut previous = summary(1, ts(1, 0));
    previous.zipcode = Some("80331".to_string());
    h.summaries.seed(vec![previous]);

    let stats = h.service.run_incremental().unwrap();

    assert_eq!(stats.profiles_fetched, 1);
    assert_eq!(stats.zipcode_changes, 1);
    let stored = h.summaries.get(1).unwrap();
    assert_eq!(stored.zipcode.as_deref(), Some("10115"));
    assert_eq!(stored.is_enabled, 0);
}

#[test]
fn directory_miss_keeps_previous_descriptive_fields() {
    let sources = Arc::new(MockSourceRepository::new(vec![source_row(
        1,
        100,
        "MT5",
        ts(2, 0),
    )]));
    let h = harness(sources, Arc::new(MockDirectory::new(vec![])));
    let mut previous = summary(1, ts(1, 0));
    previous.zipcode = Some("80331".to_string());
    previous.is_enabled = 0;
    h.summaries.seed(vec![previous]);

    let stats = h.service.run_incremental().unwrap();

    assert_eq!(stats.zipcode_changes, 0);
    let stored = h.summaries.get(1).unwrap();
    assert_eq!(stored.zipcode.as_deref(), Some("80331"));
    assert_eq!(stored.is_enabled, 0);
}

#[test]
fn directory_failure_fails_the_run_without_advancing_the_watermark() {
    let sources = Arc::new(MockSourceRepository::new(vec![source_row(
        1,
        100,
        "MT5",
        ts(2, 0),
    )]));
    let h = harness(sources, Arc::new(MockDirectory::failing()));

    let result = h.service.run_incremental();

    assert!(result.is_err());
    assert!(h.watermarks.get_stored().is_none());
    assert!(h.summaries.get(1).is_none());
}

#[test]
fn full_load_rebuilds_from_scratch() {
    let sources = Arc::new(MockSourceRepository::new(vec![
        source_row(1, 100, "MT5", ts(1, 0)),
        source_row(2, 200, "MT4", ts(3, 0)),
    ]));
    let h = harness(sources, Arc::new(MockDirectory::new(vec![])));
    // Leftovers from a previous life of the tables.
    h.accounts.seed(vec![account(9, 900, "MT5", ts(1, 0))]);
    h.summaries.seed(vec![summary(9, ts(1, 0))]);

    let stats = h.service.run_full_load().unwrap();

    assert_eq!(stats.clients, 2);
    assert_eq!(stats.accounts, 2);
    assert_eq!(stats.watermark, Some(ts(3, 0)));
    assert!(h.summaries.get(9).is_none());
    assert!(!h.accounts.keys().contains(&(9, 900, "MT5".to_string())));
    assert_eq!(h.watermarks.get_stored().unwrap().last_updated, ts(3, 0));
}

#[test]
fn refresh_status_reports_summary_stats() {
    let sources = Arc::new(MockSourceRepository::new(vec![source_row(
        1,
        100,
        "MT5",
        ts(2, 0),
    )]));
    let h = harness(sources, Arc::new(MockDirectory::new(vec![])));

    h.service.run_incremental().unwrap();
    let status = h.service.refresh_status().unwrap();

    assert_eq!(status.total_clients, 1);
    assert_eq!(status.total_accounts, 1);
    assert_eq!(status.last_updated, Some(ts(2, 0)));
}

#[test]
fn check_summaries_reports_and_fixes_drift() {
    let sources = Arc::new(MockSourceRepository::new(vec![]));
    let h = harness(sources, Arc::new(MockDirectory::new(vec![])));
    h.accounts.seed(vec![account(1, 100, "MT5", ts(1, 0))]);
    let mut drifted = summary(1, ts(1, 0));
    drifted.total_balance = dec!(9999);
    h.summaries.seed(vec![drifted]);

    let drifts = h.service.check_summaries(false).unwrap();
    assert!(drifts.iter().any(|d| d.client_id == 1 && d.field == "total_balance"));
    // Report-only mode leaves the row alone.
    assert_eq!(h.summaries.get(1).unwrap().total_balance, dec!(9999));

    h.service.check_summaries(true).unwrap();
    assert_eq!(h.summaries.get(1).unwrap().total_balance, dec!(100.0000));

    let clean = h.service.check_summaries(false).unwrap();
    assert!(clean.is_empty());
}

#[test]
fn check_summaries_flags_summary_without_accounts() {
    let sources = Arc::new(MockSourceRepository::new(vec![]));
    let h = harness(sources, Arc::new(MockDirectory::new(vec![])));
    h.summaries.seed(vec![summary(3, ts(1, 0))]);

    let drifts = h.service.check_summaries(true).unwrap();

    assert_eq!(drifts.len(), 1);
    assert_eq!(drifts[0].client_id, 3);
    assert!(h.summaries.get(3).is_none());
}
