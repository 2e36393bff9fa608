use std::time::Duration;

use tracing::{info, warn};

use crate::draw::DrawRecord;
use crate::fetcher::DrawSource;

/// Merges one freshly fetched draw into the history.
///
/// An absent or invalid fetch leaves the history untouched: an unavailable
/// upstream draw is a normal condition between drawings, not an error. A
/// valid fetch is authoritative for its round and supersedes any stored
/// record with the same round, including ones holding placeholder values.
/// The result is strictly descending and unique by round.
pub fn merge(history: &[DrawRecord], fetched: Option<DrawRecord>) -> Vec<DrawRecord> {
    let Some(fetched) = fetched else {
        return history.to_vec();
    };
    if let Err(err) = fetched.validate() {
        warn!("discarding invalid fetched record: {err}");
        return history.to_vec();
    }

    let mut merged: Vec<DrawRecord> = history
        .iter()
        .filter(|r| r.round != fetched.round)
        .cloned()
        .collect();
    let fetched_round = fetched.round;
    merged.push(fetched);
    sort_descending(&mut merged);

    // Invariant assertion: when the fetched round is the new maximum it must
    // sit at index 0. Numeric sorts used to fail silently here when rounds
    // were inconsistently typed across entries; the strict u32 typing removes
    // the root cause, but the check stays as a guard against regressions.
    let is_new_max = merged.iter().all(|r| r.round <= fetched_round);
    if is_new_max && merged[0].round != fetched_round {
        warn!(
            "history head {} does not match fetched round {fetched_round} after sort; relocating",
            merged[0].round
        );
        if let Some(pos) = merged.iter().position(|r| r.round == fetched_round) {
            let record = merged.remove(pos);
            merged.insert(0, record);
        }
    }
    merged
}

pub fn sort_descending(history: &mut [DrawRecord]) {
    history.sort_by(|a, b| b.round.cmp(&a.round));
}

/// A single surviving record whose round is past the plausible minimum is
/// treated as evidence the store was wiped: by that point in the draw
/// calendar the history should hold far more than one record. A lone record
/// with a small round is consistent with a genuinely young history and does
/// not trigger recovery.
pub fn needs_backfill(history: &[DrawRecord], min_plausible_round: u32) -> bool {
    history.len() == 1 && history[0].round > min_plausible_round
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfillOutcome {
    Recovered,
    Invalid,
    Unavailable,
}

/// Per-round outcomes of one backfill pass, for diagnostics.
#[derive(Debug, Default)]
pub struct BackfillReport {
    pub attempts: Vec<(u32, BackfillOutcome)>,
}

impl BackfillReport {
    pub fn recovered(&self) -> usize {
        self.attempts
            .iter()
            .filter(|(_, o)| *o == BackfillOutcome::Recovered)
            .count()
    }
}

/// Best-effort recovery of older rounds after suspected data loss.
///
/// Scans up to `window` rounds counting down from `from_round`, one request
/// at a time, spaced by `delay`. Failed or invalid rounds are skipped and
/// never retried. Fully decoupled from `merge`: skipping backfill entirely
/// never affects the correctness of the primary merge path.
pub async fn backfill(
    source: &dyn DrawSource,
    history: &mut Vec<DrawRecord>,
    from_round: u32,
    window: u32,
    delay: Duration,
) -> BackfillReport {
    let mut report = BackfillReport::default();
    let mut round = from_round;
    for step in 0..window {
        if round == 0 {
            break;
        }
        if step > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let outcome = match source.fetch_by_round(round).await {
            Some(record) if record.is_valid() => {
                if history.iter().all(|r| r.round != record.round) {
                    history.push(record);
                }
                BackfillOutcome::Recovered
            }
            Some(record) => {
                warn!("backfill: round {} failed validation, skipping", record.round);
                BackfillOutcome::Invalid
            }
            None => {
                info!("backfill: round {round} unavailable, skipping");
                BackfillOutcome::Unavailable
            }
        };
        report.attempts.push((round, outcome));
        round -= 1;
    }
    sort_descending(history);
    info!(
        "backfill recovered {}/{} rounds",
        report.recovered(),
        report.attempts.len()
    );
    report
}

/// Advisory loss check against the pre-mutation backup: true when the backup
/// holds more than `margin` records beyond the freshly saved history. Never
/// blocks the save and never triggers a restore.
pub fn loss_detected(backup_count: usize, new_count: usize, margin: usize) -> bool {
    backup_count > new_count + margin
}
