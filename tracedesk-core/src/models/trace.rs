use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::category::Category;

/// One persisted chat exchange. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub id: Uuid,
    pub user_message: String,
    pub bot_response: String,
    pub category: Category,
    pub timestamp: DateTime<Utc>,
    pub response_time_ms: i64,
}

/// The fields of a trace known before it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrace {
    pub user_message: String,
    pub bot_response: String,
    pub category: Category,
    pub response_time_ms: i64,
}

impl Trace {
    /// Assigns a fresh id and creation timestamp. The timestamp is cut to
    /// microseconds, the precision PostgreSQL stores.
    pub fn new(new: NewTrace) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_message: new.user_message,
            bot_response: new.bot_response,
            category: new.category,
            timestamp: Utc::now().trunc_subsecs(6),
            response_time_ms: new.response_time_ms,
        }
    }
}
