//! Bearer-token authenticator backed by a configured credential

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::sync::RwLock;
use whiff_domain::{AuthError, Authenticator};

/// Authenticator that hands out a pre-provisioned access token.
///
/// The interactive OAuth dance is out of scope for a command-line tool; a
/// token created in the server's development settings is supplied instead.
/// Logging out forgets the active token while keeping the credential, so a
/// later login succeeds again.
pub struct StaticAuthenticator {
    credential: Option<SecretString>,
    active: RwLock<Option<SecretString>>,
}

impl StaticAuthenticator {
    /// Logged in from the start when `credential` is present
    pub fn new(credential: Option<SecretString>) -> Self {
        Self {
            active: RwLock::new(credential.clone()),
            credential,
        }
    }

    /// Logged out, but able to log in with `credential`
    pub fn logged_out(credential: Option<SecretString>) -> Self {
        Self {
            credential,
            active: RwLock::new(None),
        }
    }

    /// Read the credential from the environment variable `var`
    pub fn from_env(var: &str) -> Self {
        let credential = std::env::var(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| SecretString::from(v.trim().to_string()));
        Self::new(credential)
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    fn existing_token(&self) -> Option<String> {
        self.active
            .read()
            .ok()?
            .as_ref()
            .map(|t| t.expose_secret().to_string())
    }

    async fn obtain_token(&self, host: &str) -> Result<String, AuthError> {
        let credential = self
            .credential
            .clone()
            .ok_or_else(|| AuthError::NoCredentials(host.to_string()))?;

        let mut active = self
            .active
            .write()
            .map_err(|e| AuthError::Failed(e.to_string()))?;
        let token = credential.expose_secret().to_string();
        *active = Some(credential);

        tracing::info!(host = %host, "Authenticated with configured token");
        Ok(token)
    }

    fn logout(&self) {
        if let Ok(mut active) = self.active.write() {
            *active = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_login_logout_cycle() {
        let auth = StaticAuthenticator::logged_out(Some(SecretString::from("token".to_string())));
        assert!(!auth.logged_in());

        assert_eq!(auth.obtain_token("example.com").await.unwrap(), "token");
        assert_eq!(auth.existing_token().as_deref(), Some("token"));

        auth.logout();
        assert!(auth.existing_token().is_none());

        auth.obtain_token("example.com").await.unwrap();
        assert!(auth.logged_in());
    }

    #[tokio::test]
    async fn test_without_credentials() {
        let auth = StaticAuthenticator::new(None);
        assert!(!auth.logged_in());
        assert_eq!(
            auth.obtain_token("example.com").await,
            Err(AuthError::NoCredentials("example.com".to_string()))
        );
    }

    #[test]
    fn test_new_with_credential_is_logged_in() {
        let auth = StaticAuthenticator::new(Some(SecretString::from("token".to_string())));
        assert_eq!(auth.existing_token().as_deref(), Some("token"));
    }
}
