use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Phases of one refresh run. The write path (UpsertingAccounts through
/// CommittingWatermark) is a single transactional unit; Failed is reachable
/// from any non-terminal phase and implies a full rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    SelectingCandidates,
    UpsertingAccounts,
    CleaningOrphans,
    Enriching,
    UpsertingSummaries,
    CommittingWatermark,
    Done,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Idle => "idle",
            RunPhase::SelectingCandidates => "selecting_candidates",
            RunPhase::UpsertingAccounts => "upserting_accounts",
            RunPhase::CleaningOrphans => "cleaning_orphans",
            RunPhase::Enriching => "enriching",
            RunPhase::UpsertingSummaries => "upserting_summaries",
            RunPhase::CommittingWatermark => "committing_watermark",
            RunPhase::Done => "done",
            RunPhase::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Why an entity was selected for recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateReason {
    /// Present in source, absent from the summary table
    Missing,
    /// Per-entity source max last_updated is ahead of the stored summary
    Lag,
}

impl fmt::Display for CandidateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateReason::Missing => write!(f, "missing"),
            CandidateReason::Lag => write!(f, "lag"),
        }
    }
}

/// One entity requiring recomputation in this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub client_id: i64,
    pub reason: CandidateReason,
}

/// Wall-clock spent per phase, for diagnosing slow phases (not correctness).
#[derive(Debug, Clone, Default)]
pub struct PhaseTimings {
    pub selecting_candidates: Duration,
    pub upserting_accounts: Duration,
    pub cleaning_orphans: Duration,
    pub enriching: Duration,
    pub upserting_summaries: Duration,
    pub total: Duration,
}

/// Run statistics emitted by the incremental refresher.
#[derive(Debug, Clone, Default)]
pub struct RefreshStats {
    pub candidates_missing: usize,
    pub candidates_lag: usize,
    pub accounts_upserted: usize,
    pub orphans_deleted: usize,
    pub profiles_fetched: usize,
    pub zipcode_changes: usize,
    pub summaries_upserted: usize,
    pub summaries_deleted: usize,
    /// Max account last_updated touched in this run; None when nothing moved
    pub watermark: Option<NaiveDateTime>,
    pub timings: PhaseTimings,
}

impl RefreshStats {
    pub fn candidates_total(&self) -> usize {
        self.candidates_missing + self.candidates_lag
    }
}

/// Run statistics emitted by the full loader.
#[derive(Debug, Clone, Default)]
pub struct FullLoadStats {
    pub clients: usize,
    pub accounts: usize,
    pub watermark: Option<NaiveDateTime>,
    pub total: Duration,
}

/// Freshness/status surface consumed by the invoking scheduler or report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshStatus {
    pub last_updated: Option<NaiveDateTime>,
    pub total_clients: i64,
    pub total_accounts: i64,
}

/// One field of one summary row that diverged from its live Account Records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDrift {
    pub client_id: i64,
    pub field: String,
    pub stored: String,
    pub expected: String,
}
