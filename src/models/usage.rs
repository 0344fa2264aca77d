use serde::{Deserialize, Serialize};

/// Single-row token ledger (id = 1 in the database).
///
/// The three counters always move together by the same delta;
/// `budget` is the ceiling applied to `monthly`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    pub daily: i64,
    pub monthly: i64,
    pub yearly: i64,
    pub budget: i64,
}

impl UsageStats {
    pub fn is_over_budget(&self) -> bool {
        self.monthly >= self.budget
    }
}
