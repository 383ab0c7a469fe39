use chrono::{DateTime, SubsecRound, Utc};

/// Current time truncated to microseconds, the resolution of a PostgreSQL timestamp.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
