use log::{debug, error, info};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use crate::accounts::{AccountKey, AccountRecord, AccountRecordRepository, AccountRecordRepositoryTrait};
use crate::constants::{WATERMARK_DATASET, WATERMARK_PARTITION_ALL, ZIPCODE_CHANGE_LOG_LIMIT};
use crate::db::{get_connection, DbConnection, DbPool, DbTransactionExecutor};
use crate::directory::{DirectoryLookupTrait, DirectoryProfile, DirectoryRepository};
use crate::errors::Result;
use crate::refresh::{
    aggregate_accounts, select_candidates, summarize_client, Candidate, CandidateReason,
    FullLoadStats, RefreshStats, RefreshStatus, RunPhase, SummaryDrift,
};
use crate::sources::{SourceRepository, SourceRepositoryTrait};
use crate::summaries::{EntitySummary, SummaryRepository, SummaryRepositoryTrait};
use crate::watermarks::{Watermark, WatermarkRepository, WatermarkRepositoryTrait};

/// Run controller for the client PnL pipeline.
///
/// Owns the two batch operations (incremental refresh, full load) and the
/// small read surface around them. Each run's write path executes as one
/// transaction: a failure in any phase rolls back every write and leaves the
/// watermark untouched, so the next run retries the same candidates.
pub struct RefreshService {
    pool: Arc<DbPool>,
    sources: Arc<dyn SourceRepositoryTrait>,
    accounts: Arc<dyn AccountRecordRepositoryTrait>,
    summaries: Arc<dyn SummaryRepositoryTrait>,
    directory: Arc<dyn DirectoryLookupTrait>,
    watermarks: Arc<dyn WatermarkRepositoryTrait>,
}

fn enter(phase: &mut RunPhase, next: RunPhase) {
    debug!("run phase {} -> {}", phase, next);
    *phase = next;
}

impl RefreshService {
    pub fn new(
        pool: Arc<DbPool>,
        sources: Arc<dyn SourceRepositoryTrait>,
        accounts: Arc<dyn AccountRecordRepositoryTrait>,
        summaries: Arc<dyn SummaryRepositoryTrait>,
        directory: Arc<dyn DirectoryLookupTrait>,
        watermarks: Arc<dyn WatermarkRepositoryTrait>,
    ) -> Self {
        Self {
            pool,
            sources,
            accounts,
            summaries,
            directory,
            watermarks,
        }
    }

    /// Creates a service wired to the concrete repositories.
    pub fn with_defaults(pool: Arc<DbPool>) -> Self {
        Self::new(
            pool.clone(),
            Arc::new(SourceRepository::new()),
            Arc::new(AccountRecordRepository::new(pool.clone())),
            Arc::new(SummaryRepository::new()),
            Arc::new(DirectoryRepository::new(pool)),
            Arc::new(WatermarkRepository::new()),
        )
    }

    /// Runs one incremental refresh. Parameterless by design: connection
    /// configuration comes from the environment, candidate selection from the
    /// stored state.
    pub fn run_incremental(&self) -> Result<RefreshStats> {
        let run_start = Instant::now();
        let mut phase = RunPhase::Idle;
        info!("Starting incremental refresh for {}", WATERMARK_DATASET);

        let result = self
            .pool
            .execute(|conn| self.run_incremental_tx(conn, &mut phase, run_start));

        match result {
            Ok(stats) => {
                self.log_refresh_stats(&stats);
                Ok(stats)
            }
            Err(e) => {
                let failed_in = phase;
                error!(
                    "Incremental refresh failed during {}: {} (rolled back, watermark unchanged)",
                    failed_in, e
                );
                Err(e)
            }
        }
    }

    fn run_incremental_tx(
        &self,
        conn: &mut DbConnection,
        phase: &mut RunPhase,
        run_start: Instant,
    ) -> Result<RefreshStats> {
        let mut stats = RefreshStats::default();

        enter(phase, RunPhase::SelectingCandidates);
        let t0 = Instant::now();
        if let Some(prior) =
            self.watermarks
                .get(conn, WATERMARK_DATASET, WATERMARK_PARTITION_ALL)?
        {
            debug!("Prior watermark: {}", prior.last_updated);
        }
        let source_max = self.sources.max_last_updated_by_client(conn)?;
        let summary_last_updated = self.summaries.last_updated_by_client(conn)?;
        let candidates = select_candidates(&source_max, &summary_last_updated);
        stats.candidates_missing = candidates
            .iter()
            .filter(|c| c.reason == CandidateReason::Missing)
            .count();
        stats.candidates_lag = candidates.len() - stats.candidates_missing;
        stats.timings.selecting_candidates = t0.elapsed();

        if candidates.is_empty() {
            // Exit before the directory round trip: no candidates, no cost.
            enter(phase, RunPhase::Done);
            info!("No candidates. Nothing to refresh.");
            stats.timings.total = run_start.elapsed();
            return Ok(stats);
        }
        let candidate_ids: Vec<i64> = candidates.iter().map(|c| c.client_id).collect();

        enter(phase, RunPhase::UpsertingAccounts);
        let t1 = Instant::now();
        let source_rows = self.sources.rows_for_clients(conn, &candidate_ids)?;
        let records = aggregate_accounts(&source_rows);
        stats.accounts_upserted = self.accounts.upsert(conn, &records)?;
        stats.timings.upserting_accounts = t1.elapsed();

        enter(phase, RunPhase::CleaningOrphans);
        let t2 = Instant::now();
        let live_keys: HashSet<AccountKey> = records.iter().map(AccountRecord::key).collect();
        stats.orphans_deleted = self
            .accounts
            .delete_orphans(conn, &candidate_ids, &live_keys)?;
        stats.timings.cleaning_orphans = t2.elapsed();

        enter(phase, RunPhase::Enriching);
        let t3 = Instant::now();
        let previous: HashMap<i64, EntitySummary> = self
            .summaries
            .get_by_ids(conn, &candidate_ids)?
            .into_iter()
            .map(|s| (s.client_id, s))
            .collect();
        let profiles = self.directory.fetch_profiles(&candidate_ids)?;
        stats.profiles_fetched = profiles.len();
        stats.zipcode_changes = Self::report_zipcode_changes(&candidates, &profiles, &previous);
        stats.timings.enriching = t3.elapsed();

        enter(phase, RunPhase::UpsertingSummaries);
        let t4 = Instant::now();
        let mut by_client: HashMap<i64, Vec<AccountRecord>> = HashMap::new();
        for account in self.accounts.list_by_clients(conn, &candidate_ids)? {
            by_client.entry(account.client_id).or_default().push(account);
        }
        let mut upserts: Vec<EntitySummary> = Vec::new();
        let mut deletions: Vec<i64> = Vec::new();
        for candidate in &candidates {
            let accounts = by_client.remove(&candidate.client_id).unwrap_or_default();
            match summarize_client(
                candidate.client_id,
                &accounts,
                profiles.get(&candidate.client_id),
                previous.get(&candidate.client_id),
            ) {
                Some(summary) => upserts.push(summary),
                None => deletions.push(candidate.client_id),
            }
        }
        stats.summaries_upserted = self.summaries.upsert(conn, &upserts)?;
        stats.summaries_deleted = self.summaries.delete_by_ids(conn, &deletions)?;
        stats.timings.upserting_summaries = t4.elapsed();

        enter(phase, RunPhase::CommittingWatermark);
        // Tie freshness to source data recency, not invocation time
        if let Some(max_last_updated) = records.iter().map(|r| r.last_updated).max() {
            self.watermarks.upsert(
                conn,
                &Watermark {
                    dataset: WATERMARK_DATASET.to_string(),
                    partition_key: WATERMARK_PARTITION_ALL.to_string(),
                    last_updated: max_last_updated,
                },
            )?;
            stats.watermark = Some(max_last_updated);
        }

        enter(phase, RunPhase::Done);
        stats.timings.total = run_start.elapsed();
        Ok(stats)
    }

    fn report_zipcode_changes(
        candidates: &[Candidate],
        profiles: &HashMap<i64, DirectoryProfile>,
        previous: &HashMap<i64, EntitySummary>,
    ) -> usize {
        let mut changes = 0;
        for candidate in candidates {
            let Some(profile) = profiles.get(&candidate.client_id) else {
                continue;
            };
            let Some(new_zipcode) = profile.zipcode.as_deref() else {
                continue;
            };
            let old_zipcode = previous
                .get(&candidate.client_id)
                .and_then(|p| p.zipcode.as_deref());
            if old_zipcode != Some(new_zipcode) {
                changes += 1;
                if changes <= ZIPCODE_CHANGE_LOG_LIMIT {
                    info!(
                        "Zipcode change: client_id={} old={:?} new={}",
                        candidate.client_id, old_zipcode, new_zipcode
                    );
                }
            }
        }
        changes
    }

    fn log_refresh_stats(&self, stats: &RefreshStats) {
        info!("Incremental refresh completed.");
        info!(
            "Candidates: {} | missing: {} | lag: {}",
            stats.candidates_total(),
            stats.candidates_missing,
            stats.candidates_lag
        );
        info!(
            "Accounts upserted: {} | orphans deleted: {}",
            stats.accounts_upserted, stats.orphans_deleted
        );
        info!(
            "Profiles fetched: {} | zipcode changes: {}",
            stats.profiles_fetched, stats.zipcode_changes
        );
        info!(
            "Summaries upserted: {} | removed: {}",
            stats.summaries_upserted, stats.summaries_deleted
        );
        if let Some(watermark) = stats.watermark {
            info!("Watermark advanced to {}", watermark);
        }
        let t = &stats.timings;
        info!(
            "Timings (s) => candidates: {:.2}, accounts: {:.2}, orphans: {:.2}, enrich: {:.2}, summaries: {:.2}, total: {:.2}",
            t.selecting_candidates.as_secs_f64(),
            t.upserting_accounts.as_secs_f64(),
            t.cleaning_orphans.as_secs_f64(),
            t.enriching.as_secs_f64(),
            t.upserting_summaries.as_secs_f64(),
            t.total.as_secs_f64()
        );
    }

    /// Rebuilds both aggregate tables from scratch. All-or-nothing: the
    /// truncate and the rebuild share one transaction, so a failed full load
    /// leaves the previous tables intact.
    pub fn run_full_load(&self) -> Result<FullLoadStats> {
        let run_start = Instant::now();
        let mut phase = RunPhase::Idle;
        info!("Starting full load for {}", WATERMARK_DATASET);

        let result = self.pool.execute(|conn| {
            let mut stats = FullLoadStats::default();

            enter(&mut phase, RunPhase::UpsertingAccounts);
            self.accounts.truncate(conn)?;
            self.summaries.truncate(conn)?;
            let rows = self.sources.all_rows(conn)?;
            let records = aggregate_accounts(&rows);
            self.accounts.upsert(conn, &records)?;
            stats.accounts = records.len();

            enter(&mut phase, RunPhase::Enriching);
            let mut by_client: HashMap<i64, Vec<AccountRecord>> = HashMap::new();
            for record in &records {
                by_client
                    .entry(record.client_id)
                    .or_default()
                    .push(record.clone());
            }
            let mut client_ids: Vec<i64> = by_client.keys().copied().collect();
            client_ids.sort_unstable();
            stats.clients = client_ids.len();
            let profiles = self.directory.fetch_profiles(&client_ids)?;

            enter(&mut phase, RunPhase::UpsertingSummaries);
            let mut upserts: Vec<EntitySummary> = Vec::new();
            for client_id in &client_ids {
                let accounts = &by_client[client_id];
                if let Some(summary) =
                    summarize_client(*client_id, accounts, profiles.get(client_id), None)
                {
                    upserts.push(summary);
                }
            }
            self.summaries.upsert(conn, &upserts)?;

            enter(&mut phase, RunPhase::CommittingWatermark);
            if let Some(max_last_updated) = records.iter().map(|r| r.last_updated).max() {
                self.watermarks.upsert(
                    conn,
                    &Watermark {
                        dataset: WATERMARK_DATASET.to_string(),
                        partition_key: WATERMARK_PARTITION_ALL.to_string(),
                        last_updated: max_last_updated,
                    },
                )?;
                stats.watermark = Some(max_last_updated);
            }

            enter(&mut phase, RunPhase::Done);
            stats.total = run_start.elapsed();
            Ok(stats)
        });

        match result {
            Ok(stats) => {
                info!("Full load completed.");
                info!("Clients: {}", stats.clients);
                info!("Accounts: {}", stats.accounts);
                if let Some(watermark) = stats.watermark {
                    info!("Max last_updated: {}", watermark);
                }
                info!("Elapsed: {:.2} s", stats.total.as_secs_f64());
                Ok(stats)
            }
            Err(e) => {
                error!(
                    "Full load failed during {}: {} (rolled back, previous tables intact)",
                    phase, e
                );
                Err(e)
            }
        }
    }

    /// Freshness/status surface for the invoking scheduler or report.
    pub fn refresh_status(&self) -> Result<RefreshStatus> {
        let mut conn = get_connection(&self.pool)?;
        let (total_clients, last_updated) = self.summaries.stats(&mut conn)?;
        let total_accounts = self.accounts.count(&mut conn)?;
        Ok(RefreshStatus {
            last_updated,
            total_clients,
            total_accounts,
        })
    }

    /// Drill-down: one entity's Account Records ordered by (server, login).
    pub fn client_accounts(&self, client_id: i64) -> Result<Vec<AccountRecord>> {
        self.accounts.list_by_client(client_id)
    }

    /// Compares every stored summary against a recomputation from its live
    /// Account Records and reports each diverging field. With `auto_fix` the
    /// recomputed rows are written back (descriptive fields retained).
    pub fn check_summaries(&self, auto_fix: bool) -> Result<Vec<SummaryDrift>> {
        self.pool.execute(|conn| {
            let mut by_client: HashMap<i64, Vec<AccountRecord>> = HashMap::new();
            for account in self.accounts.list_all(conn)? {
                by_client.entry(account.client_id).or_default().push(account);
            }
            let stored_summaries = self.summaries.list_all(conn)?;

            let mut drifts: Vec<SummaryDrift> = Vec::new();
            let mut fixes: Vec<EntitySummary> = Vec::new();
            let mut deletions: Vec<i64> = Vec::new();

            let mut seen: HashSet<i64> = HashSet::new();
            for stored in &stored_summaries {
                seen.insert(stored.client_id);
                let accounts = by_client.remove(&stored.client_id).unwrap_or_default();
                match summarize_client(stored.client_id, &accounts, None, Some(stored)) {
                    Some(expected) => {
                        let fields = Self::diff_summary(stored, &expected);
                        if !fields.is_empty() {
                            drifts.extend(fields);
                            fixes.push(expected);
                        }
                    }
                    None => {
                        drifts.push(SummaryDrift {
                            client_id: stored.client_id,
                            field: "account_count".to_string(),
                            stored: stored.account_count.to_string(),
                            expected: "0".to_string(),
                        });
                        deletions.push(stored.client_id);
                    }
                }
            }
            for (client_id, accounts) in by_client {
                if seen.contains(&client_id) {
                    continue;
                }
                drifts.push(SummaryDrift {
                    client_id,
                    field: "summary".to_string(),
                    stored: "absent".to_string(),
                    expected: format!("{} accounts", accounts.len()),
                });
                if let Some(expected) = summarize_client(client_id, &accounts, None, None) {
                    fixes.push(expected);
                }
            }

            drifts.sort_by(|a, b| (a.client_id, &a.field).cmp(&(b.client_id, &b.field)));
            if auto_fix {
                if !fixes.is_empty() {
                    self.summaries.upsert(conn, &fixes)?;
                }
                if !deletions.is_empty() {
                    self.summaries.delete_by_ids(conn, &deletions)?;
                }
            }
            Ok(drifts)
        })
    }

    fn diff_summary(stored: &EntitySummary, expected: &EntitySummary) -> Vec<SummaryDrift> {
        let mut fields: Vec<SummaryDrift> = Vec::new();
        let mut push = |field: &str, stored_value: String, expected_value: String| {
            if stored_value != expected_value {
                fields.push(SummaryDrift {
                    client_id: stored.client_id,
                    field: field.to_string(),
                    stored: stored_value,
                    expected: expected_value,
                });
            }
        };

        push(
            "account_count",
            stored.account_count.to_string(),
            expected.account_count.to_string(),
        );
        push(
            "total_balance",
            stored.total_balance.to_string(),
            expected.total_balance.to_string(),
        );
        push(
            "total_equity",
            stored.total_equity.to_string(),
            expected.total_equity.to_string(),
        );
        push(
            "total_floating_pnl",
            stored.total_floating_pnl.to_string(),
            expected.total_floating_pnl.to_string(),
        );
        push(
            "total_closed_profit",
            stored.total_closed_profit.to_string(),
            expected.total_closed_profit.to_string(),
        );
        push(
            "total_commission",
            stored.total_commission.to_string(),
            expected.total_commission.to_string(),
        );
        push(
            "total_deposit",
            stored.total_deposit.to_string(),
            expected.total_deposit.to_string(),
        );
        push(
            "total_withdrawal",
            stored.total_withdrawal.to_string(),
            expected.total_withdrawal.to_string(),
        );
        push(
            "total_volume_lots",
            stored.total_volume_lots.to_string(),
            expected.total_volume_lots.to_string(),
        );
        push(
            "total_overnight_volume_lots",
            stored.total_overnight_volume_lots.to_string(),
            expected.total_overnight_volume_lots.to_string(),
        );
        push(
            "swap_free_ratio",
            stored.swap_free_ratio.to_string(),
            expected.swap_free_ratio.to_string(),
        );
        push(
            "last_updated",
            stored.last_updated.to_string(),
            expected.last_updated.to_string(),
        );
        fields
    }
}
