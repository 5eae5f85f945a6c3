//! Service layer tying the pure round/rank/normalize functions to storage.
//!
//! Every service receives its connection (and collaborators) at construction
//! rather than reaching for ambient state, so tests run against in-memory
//! databases and injected device identifiers.

use std::sync::Arc;

use chrono::Utc;
use rusqlite::Connection;
use tokio::sync::Mutex;
use tracing::info;

use crate::api::ResultFetcher;
use crate::database;
use crate::error::{AppError, AppResult};
use crate::rank::calculate_rank;
use crate::round;
use crate::types::{DrawResult, Participation, RankTally, WeeklyStats, canonical_numbers};

pub type SharedConnection = Arc<Mutex<Connection>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted { round: u32 },
    /// Identical `(device, round, numbers)` already stored. A normal rejected
    /// outcome, not an error.
    Duplicate { round: u32 },
}

impl SubmitOutcome {
    pub fn accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    pub fn round(&self) -> u32 {
        match self {
            Self::Accepted { round } | Self::Duplicate { round } => *round,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Accepted { round } => format!("joined round {round}"),
            Self::Duplicate { round } => {
                format!("this number set was already submitted for round {round}")
            }
        }
    }
}

pub struct ParticipationService {
    conn: SharedConnection,
}

impl ParticipationService {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// Records one number set for a device. Without an explicit round the
    /// entry is tagged with the round currently on sale.
    pub async fn submit(
        &self,
        device_id: &str,
        round: Option<u32>,
        numbers: Vec<u8>,
    ) -> AppResult<SubmitOutcome> {
        if device_id.trim().is_empty() {
            return Err(AppError::InvalidDevice);
        }
        let numbers = canonical_numbers(numbers).map_err(AppError::InvalidNumbers)?;
        let round = round.unwrap_or_else(|| round::current_round(Utc::now()));

        let participation = Participation {
            device_id: device_id.to_string(),
            round,
            numbers,
            created_at: Utc::now().to_rfc3339(),
        };

        let conn = self.conn.lock().await;
        if database::insert_participation(&conn, &participation)? {
            Ok(SubmitOutcome::Accepted { round })
        } else {
            Ok(SubmitOutcome::Duplicate { round })
        }
    }

    pub async fn list_own(&self, device_id: &str, limit: u32) -> AppResult<Vec<Participation>> {
        if device_id.trim().is_empty() {
            return Err(AppError::InvalidDevice);
        }
        let conn = self.conn.lock().await;
        Ok(database::participations_by_device(&conn, device_id, limit)?)
    }

    /// Irreversibly clears one device's whole history; returns the count.
    pub async fn delete_own(&self, device_id: &str) -> AppResult<usize> {
        if device_id.trim().is_empty() {
            return Err(AppError::InvalidDevice);
        }
        let conn = self.conn.lock().await;
        let deleted = database::delete_participations_by_device(&conn, device_id)?;
        info!(device_id, deleted, "participation history cleared");
        Ok(deleted)
    }

    /// Distinct devices joined for `round` (defaults to the round on sale).
    pub async fn participant_count(&self, round: Option<u32>) -> AppResult<(u32, u64)> {
        let round = round.unwrap_or_else(|| round::current_round(Utc::now()));
        let conn = self.conn.lock().await;
        let count = database::count_distinct_participants(&conn, round)?;
        Ok((round, count))
    }
}

pub struct ResultService {
    conn: SharedConnection,
    fetcher: Arc<ResultFetcher>,
}

impl ResultService {
    pub fn new(conn: SharedConnection, fetcher: Arc<ResultFetcher>) -> Self {
        Self { conn, fetcher }
    }

    pub async fn latest_round(&self) -> u32 {
        self.fetcher.latest_round().await
    }

    /// Resolves one round's result: local cache first, upstream fallback
    /// chain otherwise. Freshly fetched results are cached — a drawing's
    /// outcome never changes once published.
    pub async fn resolve(&self, round: Option<u32>) -> AppResult<DrawResult> {
        let round = match round {
            Some(round) => round,
            None => self.latest_round().await,
        };

        let cached = {
            let conn = self.conn.lock().await;
            database::get_draw_result(&conn, round)?
        };
        if let Some(result) = cached {
            return Ok(result);
        }

        // The lock is not held across the network fetch.
        let result = self.fetcher.fetch_round(round).await?;
        let conn = self.conn.lock().await;
        database::save_draw_result(&conn, &result)?;
        Ok(result)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed(WeeklyStats),
    /// The round was already closed; the stored snapshot is returned
    /// unchanged.
    AlreadyClosed(WeeklyStats),
    /// Nobody joined the round; nothing was persisted.
    NoParticipants { round: u32 },
}

pub struct StatsService {
    conn: SharedConnection,
    results: Arc<ResultService>,
}

impl StatsService {
    pub fn new(conn: SharedConnection, results: Arc<ResultService>) -> Self {
        Self { conn, results }
    }

    /// Closes out a round: ranks every participation against the official
    /// result and persists a single immutable snapshot. Idempotent — a round
    /// that is already closed returns its existing snapshot untouched.
    pub async fn close_round(&self, round: Option<u32>) -> AppResult<CloseOutcome> {
        let round = match round {
            Some(round) => round,
            None => self.results.latest_round().await,
        };

        if let Some(existing) = self.get_stats(round).await? {
            return Ok(CloseOutcome::AlreadyClosed(existing));
        }
        if round > round::latest_drawn_round(Utc::now()) {
            return Err(AppError::RoundNotDrawn(round));
        }

        // Unresolvable result fails the whole operation; nothing partial is
        // ever persisted.
        let result = self.results.resolve(Some(round)).await?;

        let conn = self.conn.lock().await;
        let entries = database::participations_for_round(&conn, round)?;
        if entries.is_empty() {
            return Ok(CloseOutcome::NoParticipants { round });
        }

        let mut tally = RankTally::default();
        for entry in &entries {
            tally.record(calculate_rank(
                &entry.numbers,
                &result.winning_numbers,
                result.bonus_number,
            ));
        }
        let total_participants = database::count_distinct_participants(&conn, round)?;

        let stats = WeeklyStats {
            round,
            winning_numbers: result.winning_numbers.clone(),
            bonus_number: result.bonus_number,
            total_participants,
            results: tally,
            prize_amounts: result.prize_amounts.clone(),
            calculated_at: Utc::now().to_rfc3339(),
        };

        if database::save_weekly_stats(&conn, &stats)? {
            info!(
                round,
                participants = total_participants,
                entries = entries.len(),
                "round closed"
            );
            Ok(CloseOutcome::Closed(stats))
        } else {
            // A concurrent closeout won the insert; its snapshot is the one
            // that counts.
            let existing = database::get_weekly_stats(&conn, round)?.ok_or_else(|| {
                AppError::Internal(format!("stats for round {round} vanished after insert race"))
            })?;
            Ok(CloseOutcome::AlreadyClosed(existing))
        }
    }

    pub async fn get_stats(&self, round: u32) -> AppResult<Option<WeeklyStats>> {
        let conn = self.conn.lock().await;
        Ok(database::get_weekly_stats(&conn, round)?)
    }

    pub async fn recent_stats(&self, limit: u32) -> AppResult<Vec<WeeklyStats>> {
        let conn = self.conn.lock().await;
        Ok(database::recent_weekly_stats(&conn, limit)?)
    }
}
