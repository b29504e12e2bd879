use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default length of an access window when a course does not set one.
pub const DEFAULT_VALIDITY_DAYS: i32 = 30;

/// Effective access status of an allocation.
///
/// Never persisted: it is derived from the allocation's validity end date at read time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
pub enum AccessStatus {
    Active,
    Expired,
}

impl AccessStatus {
    /// Derive the status of an access window at `now`.
    ///
    /// The window is still active at the exact instant it ends; it expires strictly after.
    /// A missing end date means the window never closes.
    pub fn at(validity_end_date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        match validity_end_date {
            Some(end) if end < now => Self::Expired,
            _ => Self::Active,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Expired => "Expired",
        }
    }
}

impl fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// End of the access window opened at `granted_at` for `validity_days` days.
pub fn validity_end(granted_at: DateTime<Utc>, validity_days: i32) -> DateTime<Utc> {
    granted_at + Duration::days(i64::from(validity_days))
}
