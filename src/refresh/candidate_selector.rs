use chrono::NaiveDateTime;
use std::collections::HashMap;

use crate::refresh::{Candidate, CandidateReason};

/// Selects the entities requiring recomputation.
///
/// The comparison is strictly per entity: each entity's source max
/// `last_updated` against its own stored summary row. A single global cursor
/// compared against a global source max would skip entities whose data is
/// stale relative to others that advanced.
pub fn select_candidates(
    source_max: &HashMap<i64, NaiveDateTime>,
    summary_last_updated: &HashMap<i64, NaiveDateTime>,
) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = Vec::new();

    for (client_id, src_last_updated) in source_max {
        match summary_last_updated.get(client_id) {
            None => candidates.push(Candidate {
                client_id: *client_id,
                reason: CandidateReason::Missing,
            }),
            Some(summary) if src_last_updated > summary => candidates.push(Candidate {
                client_id: *client_id,
                reason: CandidateReason::Lag,
            }),
            Some(_) => {}
        }
    }

    candidates.sort_by_key(|candidate| candidate.client_id);
    candidates
}
