//! Shared types for the API layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::core_state::CoreState;
use crate::models::{Identity, Role};
use uuid::Uuid;

/// Shared context for all API routes, middleware, and the WebSocket layer.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
    pub tokens: Arc<Mutex<TokenRegistry>>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self {
            core,
            tokens: Arc::new(Mutex::new(TokenRegistry::new())),
        }
    }

    /// Resolve a bearer token to the identity it asserts.
    pub fn resolve_token(&self, token: &str) -> Option<Identity> {
        self.tokens.lock().ok()?.resolve(token)
    }
}

/// In-memory registry of identity assertions.
///
/// Credential issuance lives outside this service; a token here is an
/// opaque string handed in by the identity provider, stored hashed and
/// mapped to `{user_id, role}`.
#[derive(Debug, Default)]
pub struct TokenRegistry {
    entries: HashMap<[u8; 32], Identity>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token for a user, returning it for distribution.
    pub fn issue(&mut self, user_id: Uuid, role: Role) -> String {
        let token = generate_token();
        self.entries
            .insert(hash_token(&token), Identity { user_id, role });
        token
    }

    pub fn resolve(&self, token: &str) -> Option<Identity> {
        self.entries.get(&hash_token(token)).copied()
    }

    pub fn revoke(&mut self, token: &str) {
        self.entries.remove(&hash_token(token));
    }
}

/// Hash a bearer token string using SHA-256.
pub fn hash_token(token: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

/// Generate a random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use rand::RngCore;

    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
