//! Revoked access token storage.
//!
//! Entries are written on logout and only ever read by the authentication
//! gate. Each entry keeps the token's own expiry so it can be pruned once the
//! token could no longer verify anyway.

use sqlx::sqlite::SqlitePool;

use crate::auth::{RevocationError, RevocationStore};
use crate::timestamp::to_sqlite_datetime;

/// A revoked access token record.
#[derive(Debug, Clone)]
pub struct RevokedToken {
    pub token: String,
    pub reason: Option<String>,
    pub revoked_at: String,
    pub expires_at: String,
}

/// Store for revoked access tokens.
pub struct RevokedTokenStore {
    pool: SqlitePool,
}

impl RevokedTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Revoke a token until `expires_at` (Unix seconds).
    /// Returns false if the token was already revoked.
    pub async fn revoke(
        &self,
        token: &str,
        reason: Option<&str>,
        expires_at: u64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO revoked_tokens (token, reason, expires_at) VALUES (?, ?, ?)",
        )
        .bind(token)
        .bind(reason)
        .bind(to_sqlite_datetime(expires_at))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Check whether a token string has been revoked.
    pub async fn contains(&self, token: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM revoked_tokens WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Get a revocation entry by token string.
    pub async fn get(&self, token: &str) -> Result<Option<RevokedToken>, sqlx::Error> {
        let row: Option<(String, Option<String>, String, String)> = sqlx::query_as(
            "SELECT token, reason, revoked_at, expires_at FROM revoked_tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(token, reason, revoked_at, expires_at)| RevokedToken {
            token,
            reason,
            revoked_at,
            expires_at,
        }))
    }

    /// Delete entries whose token has expired.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < datetime('now')")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Number of entries currently held.
    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM revoked_tokens")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

impl RevocationStore for RevokedTokenStore {
    async fn is_revoked(&self, token: &str) -> Result<bool, RevocationError> {
        Ok(self.contains(token).await?)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;
    use crate::timestamp::{to_sqlite_datetime, unix_now};

    #[tokio::test]
    async fn test_revoke_and_lookup() {
        let db = Database::open(":memory:").await.unwrap();
        let store = db.revoked();
        let exp = unix_now() + 300;

        assert!(!store.contains("token-a").await.unwrap());
        assert!(store.revoke("token-a", Some("logout"), exp).await.unwrap());
        assert!(store.contains("token-a").await.unwrap());
        assert!(!store.contains("token-b").await.unwrap());

        let entry = store.get("token-a").await.unwrap().unwrap();
        assert_eq!(entry.token, "token-a");
        assert_eq!(entry.reason.as_deref(), Some("logout"));
        assert_eq!(entry.expires_at, to_sqlite_datetime(exp));
        // Both columns share the SQLite datetime text format, so they order lexically.
        assert_eq!(entry.revoked_at.len(), entry.expires_at.len());
        assert!(entry.revoked_at < entry.expires_at);
    }

    #[tokio::test]
    async fn test_revoke_twice() {
        let db = Database::open(":memory:").await.unwrap();
        let store = db.revoked();
        let exp = unix_now() + 300;

        assert!(store.revoke("token-a", None, exp).await.unwrap());
        assert!(!store.revoke("token-a", Some("again"), exp).await.unwrap());

        // The first entry is kept as written.
        let entry = store.get("token-a").await.unwrap().unwrap();
        assert_eq!(entry.reason, None);
    }

    #[tokio::test]
    async fn test_delete_expired() {
        let db = Database::open(":memory:").await.unwrap();
        let store = db.revoked();
        let now = unix_now();

        store.revoke("stale", None, now - 60).await.unwrap();
        store.revoke("live", None, now + 300).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(store.delete_expired().await.unwrap(), 1);
        assert!(!store.contains("stale").await.unwrap());
        assert!(store.contains("live").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_closed_pool_is_an_error() {
        use crate::auth::RevocationStore;

        let db = Database::open(":memory:").await.unwrap();
        db.close().await;

        assert!(db.revoked().is_revoked("token-a").await.is_err());
    }
}
