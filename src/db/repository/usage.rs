use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::UsageStats;

pub fn get_usage(conn: &Connection) -> Result<UsageStats, DatabaseError> {
    let stats = conn.query_row(
        "SELECT daily, monthly, yearly, budget FROM usage_stats WHERE id = 1",
        [],
        |row| {
            Ok(UsageStats {
                daily: row.get(0)?,
                monthly: row.get(1)?,
                yearly: row.get(2)?,
                budget: row.get(3)?,
            })
        },
    )?;
    Ok(stats)
}

/// Add `tokens` to the daily, monthly, and yearly counters.
///
/// One UPDATE moves all three together — the counters must never diverge.
pub fn record_usage(conn: &Connection, tokens: i64) -> Result<UsageStats, DatabaseError> {
    if tokens < 0 {
        return Err(DatabaseError::ConstraintViolation(
            "usage delta must be non-negative".into(),
        ));
    }
    conn.execute(
        "UPDATE usage_stats
         SET daily = daily + ?1, monthly = monthly + ?1, yearly = yearly + ?1
         WHERE id = 1",
        params![tokens],
    )?;
    get_usage(conn)
}

/// Replace the monthly budget ceiling. Deliberately unvalidated: setting it
/// below current monthly usage produces an immediately over-budget state.
pub fn set_budget(conn: &Connection, budget: i64) -> Result<UsageStats, DatabaseError> {
    conn.execute(
        "UPDATE usage_stats SET budget = ?1 WHERE id = 1",
        params![budget],
    )?;
    get_usage(conn)
}
