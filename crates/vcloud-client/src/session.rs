//! Authenticated session state

use crate::entity::Link;
use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

/// Header carrying the session token
pub const AUTH_HEADER: &str = "x-vcloud-authorization";

#[derive(Debug, Clone)]
pub struct Session {
    pub token: Option<String>,
    pub cookies: Option<String>,
    pub org_link: Link,
    pub entity_resolver: Option<Link>,
    pub established_at: DateTime<Utc>,
}

impl Session {
    /// Whether the cookie is older than `timeout` at `now`
    pub fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        let timeout = TimeDelta::from_std(timeout).unwrap_or(TimeDelta::MAX);
        now.signed_duration_since(self.established_at) >= timeout
    }

    /// Headers identifying this session
    pub(crate) fn auth_headers(&self) -> Vec<(String, String)> {
        self.token
            .iter()
            .map(|token| (AUTH_HEADER.to_string(), token.clone()))
            .collect()
    }
}
