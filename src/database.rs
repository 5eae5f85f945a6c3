//! SQLite persistence for participations, cached draw results and weekly
//! stats snapshots. Free functions over an injected [`Connection`] — callers
//! own connection lifetime and locking, which keeps every function trivially
//! testable against an in-memory database.
//!
//! Both uniqueness guards are enforced by the schema (`INSERT OR IGNORE`
//! against UNIQUE constraints) rather than check-then-act reads, so duplicate
//! submissions and repeat aggregations are atomic at the storage layer.

use rusqlite::{Connection, OptionalExtension, Result, params};

use crate::types::{DrawResult, Participation, WeeklyStats, join_numbers, split_numbers};

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS participations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id TEXT NOT NULL,
            round INTEGER NOT NULL,
            numbers TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (device_id, round, numbers)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_participations_round
         ON participations (round)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS draw_results (
            round INTEGER PRIMARY KEY,
            draw_date TEXT NOT NULL,
            winning_numbers TEXT NOT NULL,
            bonus_number INTEGER NOT NULL,
            total_sales INTEGER NOT NULL DEFAULT 0,
            first_prize_amount INTEGER NOT NULL DEFAULT 0,
            first_prize_winner_count INTEGER NOT NULL DEFAULT 0,
            prize_amounts TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS weekly_stats (
            round INTEGER PRIMARY KEY,
            winning_numbers TEXT NOT NULL,
            bonus_number INTEGER NOT NULL,
            total_participants INTEGER NOT NULL,
            results TEXT NOT NULL,
            prize_amounts TEXT NOT NULL DEFAULT '{}',
            calculated_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

/// Inserts a participation unless an identical `(device_id, round, numbers)`
/// row already exists. Returns whether a row was actually inserted.
pub fn insert_participation(conn: &Connection, participation: &Participation) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO participations (device_id, round, numbers, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            participation.device_id,
            participation.round,
            join_numbers(&participation.numbers),
            participation.created_at,
        ],
    )?;
    Ok(inserted > 0)
}

pub fn participations_by_device(
    conn: &Connection,
    device_id: &str,
    limit: u32,
) -> Result<Vec<Participation>> {
    let mut stmt = conn.prepare(
        "SELECT device_id, round, numbers, created_at
         FROM participations
         WHERE device_id = ?1
         ORDER BY round DESC, created_at DESC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![device_id, limit], participation_from_row)?;
    rows.collect()
}

pub fn participations_for_round(conn: &Connection, round: u32) -> Result<Vec<Participation>> {
    let mut stmt = conn.prepare(
        "SELECT device_id, round, numbers, created_at
         FROM participations
         WHERE round = ?1
         ORDER BY id",
    )?;
    let rows = stmt.query_map([round], participation_from_row)?;
    rows.collect()
}

/// Unique devices for a round, not raw entry count.
pub fn count_distinct_participants(conn: &Connection, round: u32) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(DISTINCT device_id) FROM participations WHERE round = ?1",
        [round],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

/// Removes every participation owned by `device_id`; returns how many.
pub fn delete_participations_by_device(conn: &Connection, device_id: &str) -> Result<usize> {
    conn.execute("DELETE FROM participations WHERE device_id = ?1", [device_id])
}

fn participation_from_row(row: &rusqlite::Row<'_>) -> Result<Participation> {
    let raw_numbers: String = row.get(2)?;
    let numbers = split_numbers(&raw_numbers).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Participation {
        device_id: row.get(0)?,
        round: row.get(1)?,
        numbers,
        created_at: row.get(3)?,
    })
}

/// Caches a resolved draw result. Historical results never change, so an
/// existing row is left untouched.
pub fn save_draw_result(conn: &Connection, result: &DrawResult) -> Result<()> {
    let prize_amounts = serde_json::to_string(&result.prize_amounts)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    conn.execute(
        "INSERT OR IGNORE INTO draw_results (
            round, draw_date, winning_numbers, bonus_number,
            total_sales, first_prize_amount, first_prize_winner_count,
            prize_amounts, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            result.round,
            result.draw_date,
            join_numbers(&result.winning_numbers),
            result.bonus_number,
            result.total_sales as i64,
            result.first_prize_amount as i64,
            result.first_prize_winner_count as i64,
            prize_amounts,
            chrono::Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_draw_result(conn: &Connection, round: u32) -> Result<Option<DrawResult>> {
    let mut stmt = conn.prepare(
        "SELECT round, draw_date, winning_numbers, bonus_number,
                total_sales, first_prize_amount, first_prize_winner_count, prize_amounts
         FROM draw_results WHERE round = ?1",
    )?;
    stmt.query_row([round], |row| {
        let raw_numbers: String = row.get(2)?;
        let winning_numbers = split_numbers(&raw_numbers).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let raw_prizes: String = row.get(7)?;
        let prize_amounts = serde_json::from_str(&raw_prizes).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(DrawResult {
            round: row.get(0)?,
            draw_date: row.get(1)?,
            winning_numbers,
            bonus_number: row.get(3)?,
            total_sales: row.get::<_, i64>(4)? as u64,
            first_prize_amount: row.get::<_, i64>(5)? as u64,
            first_prize_winner_count: row.get::<_, i64>(6)? as u64,
            prize_amounts,
        })
    })
    .optional()
}

/// Persists a stats snapshot unless the round is already closed. Returns
/// whether this call created the row — the loser of a concurrent closeout
/// race sees `false` and must re-read the stored snapshot.
pub fn save_weekly_stats(conn: &Connection, stats: &WeeklyStats) -> Result<bool> {
    let results = serde_json::to_string(&stats.results)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    let prize_amounts = serde_json::to_string(&stats.prize_amounts)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO weekly_stats (
            round, winning_numbers, bonus_number, total_participants,
            results, prize_amounts, calculated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            stats.round,
            join_numbers(&stats.winning_numbers),
            stats.bonus_number,
            stats.total_participants as i64,
            results,
            prize_amounts,
            stats.calculated_at,
        ],
    )?;
    Ok(inserted > 0)
}

pub fn get_weekly_stats(conn: &Connection, round: u32) -> Result<Option<WeeklyStats>> {
    let mut stmt = conn.prepare(
        "SELECT round, winning_numbers, bonus_number, total_participants,
                results, prize_amounts, calculated_at
         FROM weekly_stats WHERE round = ?1",
    )?;
    stmt.query_row([round], weekly_stats_from_row).optional()
}

pub fn recent_weekly_stats(conn: &Connection, limit: u32) -> Result<Vec<WeeklyStats>> {
    let mut stmt = conn.prepare(
        "SELECT round, winning_numbers, bonus_number, total_participants,
                results, prize_amounts, calculated_at
         FROM weekly_stats
         ORDER BY round DESC
         LIMIT ?1",
    )?;
    let rows = stmt.query_map([limit], weekly_stats_from_row)?;
    rows.collect()
}

fn weekly_stats_from_row(row: &rusqlite::Row<'_>) -> Result<WeeklyStats> {
    let raw_numbers: String = row.get(1)?;
    let winning_numbers = split_numbers(&raw_numbers).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let raw_results: String = row.get(4)?;
    let results = serde_json::from_str(&raw_results).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let raw_prizes: String = row.get(5)?;
    let prize_amounts = serde_json::from_str(&raw_prizes).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(WeeklyStats {
        round: row.get(0)?,
        winning_numbers,
        bonus_number: row.get(2)?,
        total_participants: row.get::<_, i64>(3)? as u64,
        results,
        prize_amounts,
        calculated_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RankTally;
    use std::collections::BTreeMap;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn
    }

    fn participation(device_id: &str, round: u32, numbers: Vec<u8>) -> Participation {
        Participation {
            device_id: device_id.to_string(),
            round,
            numbers,
            created_at: "2025-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn duplicate_submission_keeps_one_row() {
        let conn = test_conn();
        let entry = participation("device_a", 1200, vec![3, 12, 25, 33, 40, 45]);

        assert!(insert_participation(&conn, &entry).unwrap());
        assert!(!insert_participation(&conn, &entry).unwrap());

        let stored = participations_by_device(&conn, "device_a", 10).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].numbers, vec![3, 12, 25, 33, 40, 45]);
    }

    #[test]
    fn same_numbers_allowed_across_rounds_and_devices() {
        let conn = test_conn();
        let numbers = vec![1, 2, 3, 4, 5, 6];

        assert!(insert_participation(&conn, &participation("a", 1200, numbers.clone())).unwrap());
        assert!(insert_participation(&conn, &participation("a", 1201, numbers.clone())).unwrap());
        assert!(insert_participation(&conn, &participation("b", 1200, numbers)).unwrap());
    }

    #[test]
    fn distinct_participant_count_ignores_extra_entries() {
        let conn = test_conn();
        // One device submits five different sets; another submits one.
        for offset in 0..5u8 {
            let entry = participation("busy", 1200, vec![1 + offset, 10, 20, 30, 40, 45]);
            assert!(insert_participation(&conn, &entry).unwrap());
        }
        insert_participation(&conn, &participation("quiet", 1200, vec![2, 4, 6, 8, 10, 12]))
            .unwrap();
        insert_participation(&conn, &participation("other_round", 1201, vec![2, 4, 6, 8, 10, 12]))
            .unwrap();

        assert_eq!(count_distinct_participants(&conn, 1200).unwrap(), 2);
        assert_eq!(participations_for_round(&conn, 1200).unwrap().len(), 6);
    }

    #[test]
    fn list_is_most_recent_round_first_and_capped() {
        let conn = test_conn();
        for round in [1198u32, 1200, 1199] {
            insert_participation(&conn, &participation("a", round, vec![1, 2, 3, 4, 5, 6]))
                .unwrap();
        }

        let listed = participations_by_device(&conn, "a", 2).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].round, 1200);
        assert_eq!(listed[1].round, 1199);
    }

    #[test]
    fn delete_own_removes_only_that_device() {
        let conn = test_conn();
        insert_participation(&conn, &participation("a", 1200, vec![1, 2, 3, 4, 5, 6])).unwrap();
        insert_participation(&conn, &participation("a", 1201, vec![1, 2, 3, 4, 5, 7])).unwrap();
        insert_participation(&conn, &participation("b", 1200, vec![1, 2, 3, 4, 5, 8])).unwrap();

        assert_eq!(delete_participations_by_device(&conn, "a").unwrap(), 2);
        assert!(participations_by_device(&conn, "a", 10).unwrap().is_empty());
        assert_eq!(participations_by_device(&conn, "b", 10).unwrap().len(), 1);
    }

    #[test]
    fn draw_result_cache_round_trips_and_never_overwrites() {
        let conn = test_conn();
        let result = DrawResult {
            round: 1153,
            draw_date: "2025-01-04".to_string(),
            winning_numbers: vec![3, 12, 25, 33, 40, 45],
            bonus_number: 7,
            total_sales: 118628568000,
            first_prize_amount: 2208128394,
            first_prize_winner_count: 12,
            prize_amounts: BTreeMap::from([(1, 2208128394), (2, 54372914)]),
        };

        assert!(get_draw_result(&conn, 1153).unwrap().is_none());
        save_draw_result(&conn, &result).unwrap();
        assert_eq!(get_draw_result(&conn, 1153).unwrap().unwrap(), result);

        let mut tampered = result.clone();
        tampered.bonus_number = 9;
        save_draw_result(&conn, &tampered).unwrap();
        assert_eq!(get_draw_result(&conn, 1153).unwrap().unwrap(), result);
    }

    #[test]
    fn weekly_stats_insert_is_once_only() {
        let conn = test_conn();
        let results = RankTally {
            fifth: 3,
            none: 40,
            ..RankTally::default()
        };
        let stats = WeeklyStats {
            round: 1153,
            winning_numbers: vec![3, 12, 25, 33, 40, 45],
            bonus_number: 7,
            total_participants: 41,
            results,
            prize_amounts: BTreeMap::new(),
            calculated_at: "2025-01-04T21:30:00+00:00".to_string(),
        };

        assert!(save_weekly_stats(&conn, &stats).unwrap());
        assert!(!save_weekly_stats(&conn, &stats).unwrap());
        assert_eq!(get_weekly_stats(&conn, 1153).unwrap().unwrap(), stats);
    }

    #[test]
    fn recent_stats_ordered_by_round_desc() {
        let conn = test_conn();
        for round in [1151u32, 1153, 1152] {
            let stats = WeeklyStats {
                round,
                winning_numbers: vec![1, 2, 3, 4, 5, 6],
                bonus_number: 7,
                total_participants: 1,
                results: RankTally::default(),
                prize_amounts: BTreeMap::new(),
                calculated_at: "2025-01-01T00:00:00+00:00".to_string(),
            };
            save_weekly_stats(&conn, &stats).unwrap();
        }

        let recent = recent_weekly_stats(&conn, 2).unwrap();
        assert_eq!(
            recent.iter().map(|s| s.round).collect::<Vec<_>>(),
            vec![1153, 1152]
        );
    }
}
