use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("credential sign-in rejected: {0}")]
    Rejected(String),
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Seam for the external identity provider. The gate never signs anyone in;
/// it only answers when the redirect flow is safe to use at all
/// (`GateController::safe_for_redirect_sign_in`). Hosts blocked inside an
/// embedded context fall back to the credential operation after escaping.
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn sign_in_with_credential(&self, email: &str, id_token: &str)
        -> Result<(), IdentityError>;

    /// Triggers a full-page navigation away; nothing after it runs in this
    /// context.
    fn sign_in_with_redirect(&self);
}
