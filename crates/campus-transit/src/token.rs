use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// Refresh this long before the provider's stated expiry.
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// OAuth2 client-credentials token response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds from issue.
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// A bearer token together with the instant it stops being usable.
///
/// Owned by the client that needs it; never process-global.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCache {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenCache {
    /// Build a cache entry from a token response received at `now`.
    pub fn from_response(resp: TokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            value: resp.access_token,
            expires_at: now + Duration::seconds(resp.expires_in.max(0)),
        }
    }

    /// True when the token is expired or inside the refresh margin at `now`.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) >= self.expires_at
    }

    /// The cached value if it can still be used at `now`.
    pub fn fresh_value(cache: Option<&TokenCache>, now: DateTime<Utc>) -> Option<&str> {
        cache
            .filter(|c| !c.needs_refresh(now))
            .map(|c| c.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    fn issued(expires_in: i64) -> TokenCache {
        TokenCache::from_response(
            TokenResponse {
                access_token: "tok".into(),
                expires_in,
                token_type: Some("Bearer".into()),
            },
            t0(),
        )
    }

    #[test]
    fn fresh_token_is_reused() {
        let cache = issued(3600);
        assert!(!cache.needs_refresh(t0() + Duration::seconds(3000)));
        assert_eq!(
            TokenCache::fresh_value(Some(&cache), t0() + Duration::seconds(10)),
            Some("tok")
        );
    }

    #[test]
    fn token_inside_margin_is_refreshed() {
        let cache = issued(3600);
        assert!(cache.needs_refresh(t0() + Duration::seconds(3600 - REFRESH_MARGIN_SECS)));
        assert!(cache.needs_refresh(t0() + Duration::seconds(7200)));
    }

    #[test]
    fn empty_cache_has_no_value() {
        assert_eq!(TokenCache::fresh_value(None, t0()), None);
    }

    #[test]
    fn negative_lifetime_is_already_expired() {
        let cache = issued(-5);
        assert_eq!(cache.expires_at, t0());
        assert!(cache.needs_refresh(t0()));
    }
}
