use chrono::{DateTime, Utc};
use serde::Serialize;

/// A patient self-registration link. The `id` is the URL path segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationToken {
    pub id: String,
    pub doctor_uid: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
}

impl RegistrationToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Valid for consumption iff unexpired and unused.
    pub fn is_consumable_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired_at(now) && !self.used
    }
}
