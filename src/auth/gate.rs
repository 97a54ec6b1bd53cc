//! Per-request authentication state machine.
//!
//! The gate looks at the access and refresh cookies of one request and either
//! admits it, admits it after minting a new access token, or rejects it. It
//! owns no state across requests and never writes to the revocation store.

use std::time::Duration;

use axum::http::HeaderMap;
use tracing::{debug, error, info};

use super::cookie::{
    ACCESS_COOKIE_NAME, CookieSpec, REFRESH_COOKIE_NAME, build_cookie_at, get_cookie,
};
use super::errors::RejectReason;
use super::revocation::{RevocationError, RevocationStore};
use crate::jwt::{AccessIssuer, Claims, TokenIssuer};
use crate::timestamp::unix_now;

/// Upper bound on a single revocation lookup.
pub const DEFAULT_REVOCATION_TIMEOUT: Duration = Duration::from_millis(2000);

/// Deployment settings the gate needs beyond the issuer and store.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Set the `Secure` flag on renewed cookies
    pub secure_cookies: bool,
    /// A revocation lookup slower than this rejects the request
    pub revocation_timeout: Duration,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            secure_cookies: true,
            revocation_timeout: DEFAULT_REVOCATION_TIMEOUT,
        }
    }
}

/// The two token cookies presented with a request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Credentials<'a> {
    pub access: Option<&'a str>,
    pub refresh: Option<&'a str>,
}

impl<'a> Credentials<'a> {
    pub fn from_headers(headers: &'a HeaderMap) -> Self {
        Self {
            access: get_cookie(headers, ACCESS_COOKIE_NAME),
            refresh: get_cookie(headers, REFRESH_COOKIE_NAME),
        }
    }
}

/// Outcome of a successful evaluation.
#[derive(Debug, Clone)]
pub struct Admission {
    /// Verified claims of the access token the request now runs under
    pub claims: Claims,
    /// Set when a new access token was minted from the refresh token
    pub renewed_access_cookie: Option<CookieSpec>,
}

enum GateState<'c> {
    Start,
    AccessValid { claims: Claims, token: &'c str },
    AccessInvalidTryRefresh,
    RefreshValid { claims: Claims },
    Accepted(Admission),
    Rejected(RejectReason),
}

pub struct Gate<'a, R, I = TokenIssuer> {
    issuer: &'a I,
    store: &'a R,
    settings: &'a AuthSettings,
}

impl<'a, R: RevocationStore, I: AccessIssuer> Gate<'a, R, I> {
    pub fn new(issuer: &'a I, store: &'a R, settings: &'a AuthSettings) -> Self {
        Self {
            issuer,
            store,
            settings,
        }
    }

    pub async fn evaluate(
        &self,
        credentials: Credentials<'_>,
    ) -> Result<Admission, RejectReason> {
        self.evaluate_at(credentials, unix_now()).await
    }

    /// Run the state machine to a terminal state with `now` as the clock.
    pub async fn evaluate_at(
        &self,
        credentials: Credentials<'_>,
        now: u64,
    ) -> Result<Admission, RejectReason> {
        let mut state = GateState::Start;
        loop {
            state = match state {
                GateState::Start => self.read_access(credentials, now),
                GateState::AccessValid { claims, token } => {
                    self.check_revocation(claims, token).await
                }
                GateState::AccessInvalidTryRefresh => self.read_refresh(credentials, now),
                GateState::RefreshValid { claims } => self.renew_access(claims, now),
                GateState::Accepted(admission) => return Ok(admission),
                GateState::Rejected(reason) => return Err(reason),
            };
        }
    }

    fn read_access<'c>(&self, credentials: Credentials<'c>, now: u64) -> GateState<'c> {
        let Some(token) = credentials.access else {
            return GateState::AccessInvalidTryRefresh;
        };

        // Expired and forged tokens both fall through to the refresh attempt.
        match self.issuer.verify_at(token, now) {
            Ok(claims) => GateState::AccessValid { claims, token },
            Err(e) => {
                debug!(error = %e, "Access token not accepted, trying refresh token");
                GateState::AccessInvalidTryRefresh
            }
        }
    }

    async fn check_revocation<'c>(&self, claims: Claims, token: &str) -> GateState<'c> {
        match self.lookup(token).await {
            Ok(false) => GateState::Accepted(Admission {
                claims,
                renewed_access_cookie: None,
            }),
            Ok(true) => {
                info!(email = %claims.email, "Revoked access token presented");
                GateState::Rejected(RejectReason::TokenRevoked)
            }
            Err(e) => {
                error!(error = %e, "Revocation check failed, rejecting request");
                GateState::Rejected(RejectReason::RevocationCheckFailed)
            }
        }
    }

    async fn lookup(&self, token: &str) -> Result<bool, RevocationError> {
        let timeout = self.settings.revocation_timeout;
        match tokio::time::timeout(timeout, self.store.is_revoked(token)).await {
            Ok(result) => result,
            Err(_) => Err(RevocationError::Timeout(timeout)),
        }
    }

    fn read_refresh<'c>(&self, credentials: Credentials<'c>, now: u64) -> GateState<'c> {
        let Some(token) = credentials.refresh else {
            debug!("No usable credentials presented");
            return GateState::Rejected(RejectReason::MissingCredentials);
        };

        // Refresh tokens are not looked up in the revocation store.
        match self.issuer.verify_at(token, now) {
            Ok(claims) => GateState::RefreshValid { claims },
            Err(e) => {
                debug!(error = %e, "Refresh token not accepted");
                GateState::Rejected(RejectReason::InvalidRefreshCredentials)
            }
        }
    }

    fn renew_access<'c>(&self, claims: Claims, now: u64) -> GateState<'c> {
        let issued = match self.issuer.issue_access_only_at(
            now,
            &claims.email,
            &claims.name,
            &claims.role,
        ) {
            Ok(issued) => issued,
            Err(e) => {
                error!(error = %e, "Failed to issue access token from refresh token");
                return GateState::Rejected(RejectReason::IssuanceFailure);
            }
        };

        debug!(email = %issued.claims.email, "Access token renewed from refresh token");

        let cookie = build_cookie_at(
            now,
            ACCESS_COOKIE_NAME,
            &issued.token,
            issued.duration,
            self.settings.secure_cookies,
        );

        GateState::Accepted(Admission {
            claims: issued.claims,
            renewed_access_cookie: Some(cookie),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::{
        ACCESS_TOKEN_DURATION_SECS, AuthTokenPair, IssueError, IssuedToken, JwtConfig, TokenError,
    };
    use axum::http::{HeaderValue, header};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const NOW: u64 = 1_700_000_000;

    /// In-memory revocation set that counts lookups.
    #[derive(Default)]
    struct MemoryStore {
        revoked: HashSet<String>,
        lookups: AtomicUsize,
    }

    impl MemoryStore {
        fn with(tokens: &[&str]) -> Self {
            Self {
                revoked: tokens.iter().map(|t| t.to_string()).collect(),
                lookups: AtomicUsize::new(0),
            }
        }

        fn lookups(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }
    }

    impl RevocationStore for MemoryStore {
        async fn is_revoked(&self, token: &str) -> Result<bool, RevocationError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.revoked.contains(token))
        }
    }

    struct FailingStore;

    impl RevocationStore for FailingStore {
        async fn is_revoked(&self, _token: &str) -> Result<bool, RevocationError> {
            Err(RevocationError::Database(sqlx::Error::PoolClosed))
        }
    }

    struct StalledStore;

    impl RevocationStore for StalledStore {
        async fn is_revoked(&self, _token: &str) -> Result<bool, RevocationError> {
            std::future::pending().await
        }
    }

    /// Verifies like the real issuer but cannot mint tokens.
    struct BrokenIssuer(TokenIssuer);

    impl AccessIssuer for BrokenIssuer {
        fn verify_at(&self, token: &str, now: u64) -> Result<Claims, TokenError> {
            self.0.verify_at(token, now)
        }

        fn issue_access_only_at(
            &self,
            _now: u64,
            _email: &str,
            _name: &str,
            _role: &str,
        ) -> Result<IssuedToken, IssueError> {
            Err(IssueError::Access(TokenError::Config))
        }
    }

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(JwtConfig::new(b"test-secret-key-for-testing").unwrap())
    }

    fn insecure() -> AuthSettings {
        AuthSettings {
            secure_cookies: false,
            ..AuthSettings::default()
        }
    }

    fn login(issuer: &TokenIssuer, at: u64) -> AuthTokenPair {
        issuer
            .issue_pair_at(at, "alice@example.com", "Alice", "user")
            .unwrap()
    }

    /// A pair issued long enough ago that the access token has expired.
    fn stale_login(issuer: &TokenIssuer) -> AuthTokenPair {
        login(issuer, NOW - 2 * ACCESS_TOKEN_DURATION_SECS)
    }

    fn creds<'a>(access: Option<&'a str>, refresh: Option<&'a str>) -> Credentials<'a> {
        Credentials { access, refresh }
    }

    #[tokio::test]
    async fn test_valid_access_token_accepted_without_new_cookie() {
        let issuer = issuer();
        let store = MemoryStore::default();
        let settings = insecure();
        let pair = login(&issuer, NOW);

        let admission = Gate::new(&issuer, &store, &settings)
            .evaluate_at(
                creds(Some(&pair.access.token), Some(&pair.refresh.token)),
                NOW,
            )
            .await
            .unwrap();

        assert_eq!(admission.claims, pair.access.claims);
        assert!(admission.renewed_access_cookie.is_none());
        assert_eq!(store.lookups(), 1);
    }

    #[tokio::test]
    async fn test_expired_access_token_refreshed() {
        let issuer = issuer();
        let store = MemoryStore::default();
        let settings = insecure();
        let pair = stale_login(&issuer);

        let admission = Gate::new(&issuer, &store, &settings)
            .evaluate_at(
                creds(Some(&pair.access.token), Some(&pair.refresh.token)),
                NOW,
            )
            .await
            .unwrap();

        let cookie = admission.renewed_access_cookie.unwrap();
        assert_eq!(cookie.name, ACCESS_COOKIE_NAME);
        assert_eq!(cookie.max_age, ACCESS_TOKEN_DURATION_SECS);
        assert_eq!(cookie.expires, NOW + ACCESS_TOKEN_DURATION_SECS);
        assert!(cookie.http_only);
        assert!(!cookie.secure);

        // The renewed cookie carries a fresh, verifiable access token.
        let renewed = issuer.jwt().verify_at(&cookie.value, NOW).unwrap();
        assert_eq!(renewed, admission.claims);
        assert_eq!(renewed.exp, NOW + ACCESS_TOKEN_DURATION_SECS);
        assert_eq!(renewed.email, "alice@example.com");
        assert_eq!(renewed.name, "Alice");
        assert_eq!(renewed.role, "user");

        // No revocation lookup on the refresh path.
        assert_eq!(store.lookups(), 0);
    }

    #[tokio::test]
    async fn test_missing_access_token_refreshed() {
        let issuer = issuer();
        let store = MemoryStore::default();
        let settings = AuthSettings::default();
        let pair = login(&issuer, NOW);

        let admission = Gate::new(&issuer, &store, &settings)
            .evaluate_at(creds(None, Some(&pair.refresh.token)), NOW)
            .await
            .unwrap();

        let cookie = admission.renewed_access_cookie.unwrap();
        assert!(cookie.secure);
    }

    #[tokio::test]
    async fn test_forged_access_token_falls_through_to_refresh() {
        let issuer = issuer();
        let forger = TokenIssuer::new(JwtConfig::new(b"attacker-secret").unwrap());
        let store = MemoryStore::default();
        let settings = insecure();
        let forged = login(&forger, NOW);
        let genuine = login(&issuer, NOW);

        let admission = Gate::new(&issuer, &store, &settings)
            .evaluate_at(
                creds(Some(&forged.access.token), Some(&genuine.refresh.token)),
                NOW,
            )
            .await
            .unwrap();

        assert!(admission.renewed_access_cookie.is_some());
    }

    #[tokio::test]
    async fn test_expired_access_without_refresh_rejected() {
        let issuer = issuer();
        let store = MemoryStore::default();
        let settings = insecure();
        let pair = stale_login(&issuer);

        let result = Gate::new(&issuer, &store, &settings)
            .evaluate_at(creds(Some(&pair.access.token), None), NOW)
            .await;

        assert_eq!(result.unwrap_err(), RejectReason::MissingCredentials);
    }

    #[tokio::test]
    async fn test_no_cookies_rejected() {
        let issuer = issuer();
        let store = MemoryStore::default();
        let settings = insecure();

        let result = Gate::new(&issuer, &store, &settings)
            .evaluate_at(Credentials::default(), NOW)
            .await;

        assert_eq!(result.unwrap_err(), RejectReason::MissingCredentials);
        assert_eq!(store.lookups(), 0);
    }

    #[tokio::test]
    async fn test_invalid_refresh_token_rejected() {
        let issuer = issuer();
        let forger = TokenIssuer::new(JwtConfig::new(b"attacker-secret").unwrap());
        let store = MemoryStore::default();
        let settings = insecure();
        let forged = login(&forger, NOW);

        for refresh in ["garbage", forged.refresh.token.as_str()] {
            let result = Gate::new(&issuer, &store, &settings)
                .evaluate_at(creds(None, Some(refresh)), NOW)
                .await;
            assert_eq!(
                result.unwrap_err(),
                RejectReason::InvalidRefreshCredentials
            );
        }
    }

    #[tokio::test]
    async fn test_expired_refresh_token_rejected() {
        let issuer = TokenIssuer::with_durations(
            JwtConfig::new(b"test-secret-key-for-testing").unwrap(),
            10,
            20,
        );
        let store = MemoryStore::default();
        let settings = insecure();
        let pair = login(&issuer, NOW - 20);

        let result = Gate::new(&issuer, &store, &settings)
            .evaluate_at(
                creds(Some(&pair.access.token), Some(&pair.refresh.token)),
                NOW,
            )
            .await;

        assert_eq!(
            result.unwrap_err(),
            RejectReason::InvalidRefreshCredentials
        );
    }

    #[tokio::test]
    async fn test_revoked_access_token_rejected() {
        let issuer = issuer();
        let settings = insecure();
        let pair = login(&issuer, NOW);
        let store = MemoryStore::with(&[pair.access.token.as_str()]);

        let result = Gate::new(&issuer, &store, &settings)
            .evaluate_at(creds(Some(&pair.access.token), None), NOW)
            .await;

        assert_eq!(result.unwrap_err(), RejectReason::TokenRevoked);
    }

    #[tokio::test]
    async fn test_revoked_access_token_does_not_fall_back_to_refresh() {
        let issuer = issuer();
        let settings = insecure();
        let pair = login(&issuer, NOW);
        let store = MemoryStore::with(&[pair.access.token.as_str()]);

        let result = Gate::new(&issuer, &store, &settings)
            .evaluate_at(
                creds(Some(&pair.access.token), Some(&pair.refresh.token)),
                NOW,
            )
            .await;

        assert_eq!(result.unwrap_err(), RejectReason::TokenRevoked);
    }

    #[tokio::test]
    async fn test_revoked_refresh_token_still_mints_access_token() {
        // Current behavior: only access tokens are checked for revocation.
        let issuer = issuer();
        let settings = insecure();
        let pair = login(&issuer, NOW);
        let store =
            MemoryStore::with(&[pair.access.token.as_str(), pair.refresh.token.as_str()]);

        let admission = Gate::new(&issuer, &store, &settings)
            .evaluate_at(creds(None, Some(&pair.refresh.token)), NOW)
            .await
            .unwrap();

        assert!(admission.renewed_access_cookie.is_some());
        assert_eq!(store.lookups(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_fails_closed() {
        let issuer = issuer();
        let settings = insecure();
        let pair = login(&issuer, NOW);

        let result = Gate::new(&issuer, &FailingStore, &settings)
            .evaluate_at(
                creds(Some(&pair.access.token), Some(&pair.refresh.token)),
                NOW,
            )
            .await;

        assert_eq!(result.unwrap_err(), RejectReason::RevocationCheckFailed);
    }

    #[tokio::test]
    async fn test_store_timeout_fails_closed() {
        let issuer = issuer();
        let settings = AuthSettings {
            secure_cookies: false,
            revocation_timeout: Duration::from_millis(20),
        };
        let pair = login(&issuer, NOW);

        let result = Gate::new(&issuer, &StalledStore, &settings)
            .evaluate_at(creds(Some(&pair.access.token), None), NOW)
            .await;

        assert_eq!(result.unwrap_err(), RejectReason::RevocationCheckFailed);
    }

    #[tokio::test]
    async fn test_issuance_failure_rejects_refresh() {
        let broken = BrokenIssuer(issuer());
        let store = MemoryStore::default();
        let settings = insecure();
        let pair = stale_login(&broken.0);

        let result = Gate::new(&broken, &store, &settings)
            .evaluate_at(
                creds(Some(&pair.access.token), Some(&pair.refresh.token)),
                NOW,
            )
            .await;

        let reason = result.unwrap_err();
        assert_eq!(reason, RejectReason::IssuanceFailure);
        assert!(reason.is_server_fault());
        assert_eq!(reason.message(), "Server error");
        assert_eq!(store.lookups(), 0);
    }

    #[tokio::test]
    async fn test_issuance_failure_not_reached_with_valid_access() {
        let broken = BrokenIssuer(issuer());
        let store = MemoryStore::default();
        let settings = insecure();
        let pair = login(&broken.0, NOW);

        let admission = Gate::new(&broken, &store, &settings)
            .evaluate_at(creds(Some(&pair.access.token), None), NOW)
            .await
            .unwrap();

        assert!(admission.renewed_access_cookie.is_none());
    }

    #[tokio::test]
    async fn test_evaluate_uses_wall_clock() {
        let issuer = issuer();
        let store = MemoryStore::default();
        let settings = insecure();
        let pair = issuer
            .issue_pair("alice@example.com", "Alice", "user")
            .unwrap();

        let admission = Gate::new(&issuer, &store, &settings)
            .evaluate(creds(Some(&pair.access.token), None))
            .await
            .unwrap();

        assert_eq!(admission.claims.email, "alice@example.com");
    }

    #[test]
    fn test_credentials_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; refresh_token=r1; access_token=a1"),
        );

        let credentials = Credentials::from_headers(&headers);
        assert_eq!(credentials.access, Some("a1"));
        assert_eq!(credentials.refresh, Some("r1"));

        let empty = HeaderMap::new();
        let credentials = Credentials::from_headers(&empty);
        assert!(credentials.access.is_none());
        assert!(credentials.refresh.is_none());
    }
}
