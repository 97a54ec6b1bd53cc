//! Authentication state trait.

use super::gate::AuthSettings;
use super::revocation::RevocationStore;
use crate::jwt::TokenIssuer;

/// Trait for state types that provide what the authentication gate needs.
pub trait HasAuthBackend {
    type Store: RevocationStore;

    fn issuer(&self) -> &TokenIssuer;
    fn revocations(&self) -> Self::Store;
    fn auth_settings(&self) -> &AuthSettings;
}
