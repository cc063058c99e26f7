//! Request authorization.
//!
//! The stream engine only asks one question: may this credential fetch this
//! resource? The answer comes from an [`AuthorizationChecker`], wrapped in an
//! [`AuthPolicy`] that decides what happens when no credential is presented.
//!
//! Two checkers ship with the server:
//!
//! - [`ApiKeyChecker`]: static keys from config, valid for every resource.
//! - [`SignedTokenChecker`]: `<expires>.<hex hmac-sha256>` tokens bound to a
//!   single resource, suitable for embedding in a `?token=` URL.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::config::AuthConfig;

type HmacSha256 = Hmac<Sha256>;

/// A bearer token or signed URL token presented by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw token. Empty tokens are treated as absent.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

/// Verifies a credential for a resource.
pub trait AuthorizationChecker: Send + Sync {
    fn verify(&self, credential: &Credential, resource: &str) -> bool;
}

/// Accepts any of a fixed set of API keys.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyChecker {
    /// SHA-256 digests of the keys; comparing digests keeps the comparison
    /// length-independent.
    digests: Vec<[u8; 32]>,
}

impl ApiKeyChecker {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let digests = keys
            .into_iter()
            .filter(|k| !k.as_ref().is_empty())
            .map(|k| sha256(k.as_ref()))
            .collect();
        Self { digests }
    }
}

impl AuthorizationChecker for ApiKeyChecker {
    fn verify(&self, credential: &Credential, _resource: &str) -> bool {
        let presented = sha256(credential.token());
        // Fold over every key so timing does not reveal which one matched.
        self.digests
            .iter()
            .fold(false, |found, key| found | constant_time_eq(key, &presented))
    }
}

fn sha256(value: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(value.as_bytes()));
    out
}

fn constant_time_eq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Verifies and issues resource-scoped, expiring HMAC tokens.
///
/// Token format: `<expires_unix_secs>.<hex hmac-sha256("<resource>:<expires>")>`.
#[derive(Clone)]
pub struct SignedTokenChecker {
    secret: Vec<u8>,
}

impl SignedTokenChecker {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self, resource: &str, expires: u64) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC-SHA256 accepts keys of any length");
        mac.update(resource.as_bytes());
        mac.update(b":");
        mac.update(expires.to_string().as_bytes());
        mac
    }

    /// Issue a token for `resource` valid until `expires` (unix seconds).
    pub fn sign(&self, resource: &str, expires: u64) -> String {
        let signature = self.mac(resource, expires).finalize().into_bytes();
        format!("{expires}.{}", hex::encode(signature))
    }

    fn verify_at(&self, token: &str, resource: &str, now: u64) -> bool {
        let Some((expires, signature)) = token.split_once('.') else {
            return false;
        };
        let Ok(expires) = expires.parse::<u64>() else {
            return false;
        };
        if expires <= now {
            return false;
        }
        let Ok(signature) = hex::decode(signature) else {
            return false;
        };
        self.mac(resource, expires).verify_slice(&signature).is_ok()
    }
}

impl AuthorizationChecker for SignedTokenChecker {
    fn verify(&self, credential: &Credential, resource: &str) -> bool {
        self.verify_at(credential.token(), resource, unix_now())
    }
}

/// Accepts a credential if any inner checker does. Empty = accepts nothing.
#[derive(Default, Clone)]
pub struct AnyOf(Vec<Arc<dyn AuthorizationChecker>>);

impl AnyOf {
    pub fn new(checkers: Vec<Arc<dyn AuthorizationChecker>>) -> Self {
        Self(checkers)
    }
}

impl AuthorizationChecker for AnyOf {
    fn verify(&self, credential: &Credential, resource: &str) -> bool {
        self.0.iter().any(|c| c.verify(credential, resource))
    }
}

/// Authorization decision for a request.
///
/// A credential that is presented is always verified, even when credentials
/// are optional: a bad token is rejected rather than silently downgraded to
/// anonymous access.
#[derive(Clone)]
pub struct AuthPolicy {
    required: bool,
    checker: Arc<dyn AuthorizationChecker>,
}

impl AuthPolicy {
    pub fn new(required: bool, checker: Arc<dyn AuthorizationChecker>) -> Self {
        Self { required, checker }
    }

    /// Build the policy described by the `[auth]` config section.
    pub fn from_config(config: &AuthConfig) -> Self {
        let mut checkers: Vec<Arc<dyn AuthorizationChecker>> = Vec::new();
        if !config.api_keys.is_empty() {
            checkers.push(Arc::new(ApiKeyChecker::new(&config.api_keys)));
        }
        if let Some(secret) = config.signing_secret.as_deref().filter(|s| !s.is_empty()) {
            checkers.push(Arc::new(SignedTokenChecker::new(secret)));
        }
        Self::new(config.required, Arc::new(AnyOf::new(checkers)))
    }

    /// Policy that lets everything through when no credential is presented.
    pub fn open() -> Self {
        Self::new(false, Arc::new(AnyOf::default()))
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn permits(&self, credential: Option<&Credential>, resource: &str) -> bool {
        match credential {
            Some(credential) => self.checker.verify(credential, resource),
            None => !self.required,
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Unix timestamp `ttl_secs` from now, for issuing tokens.
pub fn expiry_from_now(ttl_secs: u64) -> u64 {
    unix_now().saturating_add(ttl_secs)
}

/// Generate a random signing secret.
pub fn generate_secret() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}

/// Generate a random API key for programmatic access.
pub fn generate_api_key() -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cred(token: &str) -> Credential {
        Credential::new(token).unwrap()
    }

    #[test]
    fn test_empty_credential_is_absent() {
        assert!(Credential::new("").is_none());
        assert!(Credential::new("   ").is_none());
    }

    #[test]
    fn test_api_key_checker() {
        let checker = ApiKeyChecker::new(["alpha", "beta"]);
        assert!(checker.verify(&cred("alpha"), "any.mp4"));
        assert!(checker.verify(&cred("beta"), "other.mp4"));
        assert!(!checker.verify(&cred("gamma"), "any.mp4"));
        assert!(!checker.verify(&cred("alph"), "any.mp4"));
    }

    #[test]
    fn test_api_key_checker_ignores_empty_keys() {
        let checker = ApiKeyChecker::new([""]);
        assert!(!checker.verify(&cred("x"), "a.mp4"));
    }

    #[test]
    fn test_signed_token_round_trip() {
        let checker = SignedTokenChecker::new("s3cret");
        let token = checker.sign("clip.mp4", expiry_from_now(60));
        assert!(checker.verify(&cred(&token), "clip.mp4"));
    }

    #[test]
    fn test_signed_token_bound_to_resource() {
        let checker = SignedTokenChecker::new("s3cret");
        let token = checker.sign("clip.mp4", expiry_from_now(60));
        assert!(!checker.verify(&cred(&token), "other.mp4"));
    }

    #[test]
    fn test_signed_token_expiry() {
        let checker = SignedTokenChecker::new("s3cret");
        let token = checker.sign("clip.mp4", 1_000);
        assert!(checker.verify_at(&token, "clip.mp4", 999));
        assert!(!checker.verify_at(&token, "clip.mp4", 1_000));
        assert!(!checker.verify(&cred(&token), "clip.mp4"));
    }

    #[test]
    fn test_signed_token_wrong_secret() {
        let token = SignedTokenChecker::new("one").sign("clip.mp4", expiry_from_now(60));
        assert!(!SignedTokenChecker::new("two").verify(&cred(&token), "clip.mp4"));
    }

    #[test]
    fn test_signed_token_malformed() {
        let checker = SignedTokenChecker::new("s3cret");
        for token in ["", "abc", "123", "123.", "x.deadbeef", "99999999999.zz"] {
            assert!(!checker.verify_at(token, "clip.mp4", 0), "{token:?}");
        }
    }

    #[test]
    fn test_signed_token_tampered_expiry() {
        let checker = SignedTokenChecker::new("s3cret");
        let token = checker.sign("clip.mp4", 1_000);
        let (_, sig) = token.split_once('.').unwrap();
        let forged = format!("9999999999.{sig}");
        assert!(!checker.verify_at(&forged, "clip.mp4", 0));
    }

    #[test]
    fn test_policy_required() {
        let policy = AuthPolicy::new(true, Arc::new(ApiKeyChecker::new(["k"])));
        assert!(!policy.permits(None, "a.mp4"));
        assert!(policy.permits(Some(&cred("k")), "a.mp4"));
        assert!(!policy.permits(Some(&cred("bad")), "a.mp4"));
    }

    #[test]
    fn test_policy_optional_still_verifies_presented_credentials() {
        let policy = AuthPolicy::new(false, Arc::new(ApiKeyChecker::new(["k"])));
        assert!(policy.permits(None, "a.mp4"));
        assert!(policy.permits(Some(&cred("k")), "a.mp4"));
        assert!(!policy.permits(Some(&cred("anything-non-empty")), "a.mp4"));
    }

    #[test]
    fn test_policy_from_config() {
        let config = AuthConfig {
            required: true,
            api_keys: vec!["key-1".into()],
            signing_secret: Some("secret".into()),
        };
        let policy = AuthPolicy::from_config(&config);
        let token = SignedTokenChecker::new("secret").sign("a.mp4", expiry_from_now(60));

        assert!(policy.is_required());
        assert!(policy.permits(Some(&cred("key-1")), "a.mp4"));
        assert!(policy.permits(Some(&cred(&token)), "a.mp4"));
        assert!(!policy.permits(Some(&cred(&token)), "b.mp4"));
        assert!(!policy.permits(None, "a.mp4"));
    }

    #[test]
    fn test_required_policy_without_checkers_rejects_everything() {
        let policy = AuthPolicy::from_config(&AuthConfig::default());
        assert!(!policy.permits(Some(&cred("x")), "a.mp4"));
        assert!(!policy.permits(None, "a.mp4"));
    }

    #[test]
    fn test_generated_secrets() {
        assert_eq!(generate_secret().len(), 64);
        assert_ne!(generate_secret(), generate_secret());
        assert_eq!(generate_api_key().len(), 43);
    }
}
