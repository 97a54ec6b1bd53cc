//! JWT token generation and validation.
//!
//! Access and refresh tokens share one claim layout and are told apart only by
//! their lifetime and the cookie that carries them.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::timestamp::unix_now;

/// Access token duration: 5 minutes
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 5 * 60;

/// Refresh token duration: 7 days
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Header algorithms accepted on verification. Anything outside the HMAC
/// family is refused before the signature is looked at.
const HMAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// JWT claims carried by both access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject email
    pub email: String,
    /// Display name
    pub name: String,
    /// Role label, carried but not interpreted here
    pub role: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

impl Claims {
    /// Build a claim set expiring `duration` seconds after `now`.
    pub fn new(email: &str, name: &str, role: &str, now: u64, duration: u64) -> Self {
        Self {
            email: email.to_string(),
            name: name.to_string(),
            role: role.to_string(),
            exp: now + duration,
        }
    }
}

/// Only the algorithm tag is read before verification.
#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

/// Signing and verification with the single server secret.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtConfig {
    /// Create a new JWT configuration with the given secret.
    /// An empty secret is a configuration error.
    pub fn new(secret: &[u8]) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::Config);
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        })
    }

    /// Sign a claim set with HS256.
    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(TokenError::Encoding)
    }

    /// Verify a token against the current time.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, unix_now())
    }

    /// Verify a token as of `now`. A token is expired from the second its
    /// `exp` is reached.
    pub fn verify_at(&self, token: &str, now: u64) -> Result<Claims, TokenError> {
        check_algorithm_family(token)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = HMAC_ALGORITHMS.to_vec();
        validation.leeway = 0;
        // Expiry is checked below so that `now == exp` counts as expired.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);

        let token_data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(TokenError::from_decode)?;

        if now >= token_data.claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(token_data.claims)
    }
}

/// Reject any token whose header does not name an HMAC algorithm.
/// Runs on the raw header so `none` and unknown names are caught as well.
fn check_algorithm_family(token: &str) -> Result<(), TokenError> {
    let mut segments = token.split('.');
    let (Some(header), Some(_), Some(_), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenError::Malformed);
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|_| TokenError::Malformed)?;
    let header: RawHeader = serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)?;

    match header.alg.as_str() {
        "HS256" | "HS384" | "HS512" => Ok(()),
        _ => Err(TokenError::AlgorithmMismatch),
    }
}

/// A signed token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The JWT token string
    pub token: String,
    /// Claims embedded in the token
    pub claims: Claims,
    /// Token duration in seconds
    pub duration: u64,
}

/// Access and refresh token minted together at login.
#[derive(Debug, Clone)]
pub struct AuthTokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// Mints access/refresh tokens for an identity.
#[derive(Clone)]
pub struct TokenIssuer {
    jwt: JwtConfig,
    access_duration: u64,
    refresh_duration: u64,
}

impl TokenIssuer {
    /// Issuer with the standard 5 minute / 7 day lifetimes.
    pub fn new(jwt: JwtConfig) -> Self {
        Self::with_durations(jwt, ACCESS_TOKEN_DURATION_SECS, REFRESH_TOKEN_DURATION_SECS)
    }

    pub fn with_durations(jwt: JwtConfig, access_duration: u64, refresh_duration: u64) -> Self {
        Self {
            jwt,
            access_duration,
            refresh_duration,
        }
    }

    pub fn jwt(&self) -> &JwtConfig {
        &self.jwt
    }

    pub fn access_duration(&self) -> u64 {
        self.access_duration
    }

    /// Issue a fresh access/refresh pair carrying identical identity claims.
    pub fn issue_pair(
        &self,
        email: &str,
        name: &str,
        role: &str,
    ) -> Result<AuthTokenPair, IssueError> {
        self.issue_pair_at(unix_now(), email, name, role)
    }

    pub fn issue_pair_at(
        &self,
        now: u64,
        email: &str,
        name: &str,
        role: &str,
    ) -> Result<AuthTokenPair, IssueError> {
        let access = self
            .issue(now, email, name, role, self.access_duration)
            .map_err(IssueError::Access)?;
        let refresh = self
            .issue(now, email, name, role, self.refresh_duration)
            .map_err(IssueError::Refresh)?;
        Ok(AuthTokenPair { access, refresh })
    }

    /// Issue only a new access token. The caller's refresh token is left as is.
    pub fn issue_access_only(
        &self,
        email: &str,
        name: &str,
        role: &str,
    ) -> Result<IssuedToken, IssueError> {
        self.issue_access_only_at(unix_now(), email, name, role)
    }

    pub fn issue_access_only_at(
        &self,
        now: u64,
        email: &str,
        name: &str,
        role: &str,
    ) -> Result<IssuedToken, IssueError> {
        self.issue(now, email, name, role, self.access_duration)
            .map_err(IssueError::Access)
    }

    fn issue(
        &self,
        now: u64,
        email: &str,
        name: &str,
        role: &str,
        duration: u64,
    ) -> Result<IssuedToken, TokenError> {
        let claims = Claims::new(email, name, role, now, duration);
        let token = self.jwt.sign(&claims)?;
        Ok(IssuedToken {
            token,
            claims,
            duration,
        })
    }
}

/// Token verification and access-token minting, as the authentication gate needs them.
pub trait AccessIssuer: Send + Sync {
    fn verify_at(&self, token: &str, now: u64) -> Result<Claims, TokenError>;

    fn issue_access_only_at(
        &self,
        now: u64,
        email: &str,
        name: &str,
        role: &str,
    ) -> Result<IssuedToken, IssueError>;
}

impl AccessIssuer for TokenIssuer {
    fn verify_at(&self, token: &str, now: u64) -> Result<Claims, TokenError> {
        self.jwt.verify_at(token, now)
    }

    fn issue_access_only_at(
        &self,
        now: u64,
        email: &str,
        name: &str,
        role: &str,
    ) -> Result<IssuedToken, IssueError> {
        TokenIssuer::issue_access_only_at(self, now, email, name, role)
    }
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum TokenError {
    /// Signing secret is missing
    Config,
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Token structure or claims could not be parsed
    Malformed,
    /// Header names an algorithm outside the HMAC family
    AlgorithmMismatch,
    /// Current time is at or past `exp`
    Expired,
    /// MAC does not verify under the server secret
    InvalidSignature,
}

impl TokenError {
    fn from_decode(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                TokenError::AlgorithmMismatch
            }
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        }
    }
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Config => write!(f, "Signing secret is not configured"),
            TokenError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            TokenError::Malformed => write!(f, "Malformed token"),
            TokenError::AlgorithmMismatch => write!(f, "Unexpected signing algorithm"),
            TokenError::Expired => write!(f, "Token has expired"),
            TokenError::InvalidSignature => write!(f, "Invalid token signature"),
        }
    }
}

impl std::error::Error for TokenError {}

/// Token issuance failed. The whole issuance is void; no partial pair is returned.
#[derive(Debug)]
pub enum IssueError {
    Access(TokenError),
    Refresh(TokenError),
}

impl std::fmt::Display for IssueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueError::Access(e) => write!(f, "Failed to create access token: {}", e),
            IssueError::Refresh(e) => write!(f, "Failed to create refresh token: {}", e),
        }
    }
}

impl std::error::Error for IssueError {}
