//! Client identity.
//!
//! A [`ClientId`] is never stored or transmitted; it is recomputed from the
//! request on every hit. Credentials and network origins are hashed under
//! different prefixes so a token that happens to equal an IP address cannot
//! share a session with that address.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stable, opaque key a client's session is tracked under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Derive an identity from the credential the client presented.
    pub fn from_credential(credential: &str) -> Self {
        Self::digest("credential", credential)
    }

    /// Derive an identity from the client's network origin.
    pub fn from_origin(origin: &str) -> Self {
        Self::digest("origin", origin)
    }

    fn digest(kind: &str, value: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(kind.as_bytes());
        hasher.update(b":");
        hasher.update(value.as_bytes());
        let hash = hasher.finalize();
        // 128 bits is plenty for a process-local map key.
        Self(hex::encode(&hash[..16]))
    }

    /// Hex form of the identity.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
