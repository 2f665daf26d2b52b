//! Connection authentication, spec §6: the collaboration router is
//! mounted behind an external gateway's own auth middleware, so this
//! port exists only to let a deployment plug in verification of the
//! `token` query parameter the gateway forwards — it never implements
//! a particular auth scheme itself.

use async_trait::async_trait;

use gridbase_domain::error::{Error, Result};

/// Resolves a connection's `token` query parameter to a user id.
/// Implementations that need request-scoped state (JWKS cache, session
/// store) hold it behind their own `Arc` internals.
#[async_trait]
pub trait AuthVerifier: Send + Sync {
    async fn verify(&self, token: Option<&str>) -> Result<String>;
}

/// Default: accepts any connection, treating the raw token (or
/// `"anonymous"` if absent) as the user id. Safe only when the external
/// gateway has already authenticated the request.
#[derive(Debug, Default)]
pub struct NoopAuthVerifier;

#[async_trait]
impl AuthVerifier for NoopAuthVerifier {
    async fn verify(&self, token: Option<&str>) -> Result<String> {
        Ok(token.map(str::to_owned).unwrap_or_else(|| "anonymous".to_owned()))
    }
}

/// Rejects every connection; useful for deployments that forgot to
/// inject a real verifier.
#[derive(Debug, Default)]
pub struct DenyAllAuthVerifier;

#[async_trait]
impl AuthVerifier for DenyAllAuthVerifier {
    async fn verify(&self, _token: Option<&str>) -> Result<String> {
        Err(Error::validation("no auth verifier configured"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_defaults_to_anonymous() {
        let verifier = NoopAuthVerifier;
        assert_eq!(verifier.verify(None).await.unwrap(), "anonymous");
        assert_eq!(verifier.verify(Some("u1")).await.unwrap(), "u1");
    }

    #[tokio::test]
    async fn deny_all_rejects() {
        let verifier = DenyAllAuthVerifier;
        assert!(verifier.verify(Some("u1")).await.is_err());
    }
}
