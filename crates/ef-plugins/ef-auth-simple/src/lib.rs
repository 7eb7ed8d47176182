//! # ef-auth-simple
//!
//! Keyed-hash implementation of `IdentityProvider`. Tokens are
//! `"{user_id}.{hex(sha256(secret || user_id))}"`: self-contained,
//! verifiable without a session table, and invalidated wholesale by
//! rotating the secret. Account management lives outside this core.

use ef_core::traits::IdentityProvider;
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub struct SimpleIdentityProvider {
    /// Secret for signing tokens (e.g., from an environment variable).
    secret: String,
}

impl SimpleIdentityProvider {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.to_string(),
        }
    }

    fn signature(&self, user_id: Uuid) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(user_id.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl IdentityProvider for SimpleIdentityProvider {
    fn issue_token(&self, user_id: Uuid) -> String {
        format!("{}.{}", user_id, self.signature(user_id))
    }

    fn authenticate(&self, token: &str) -> Option<Uuid> {
        let (id_part, signature) = token.split_once('.')?;
        let user_id = Uuid::parse_str(id_part).ok()?;
        if signature == self.signature(user_id) {
            Some(user_id)
        } else {
            None
        }
    }
}
