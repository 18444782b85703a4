//! Privileged-credential verification against a token introspection
//! endpoint.

use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::domain::ports::ServiceCredentialVerifier;

use super::support::DEFAULT_REQUEST_TIMEOUT;

/// Verifies bearer credentials by probing an introspection endpoint: a
/// successful status means the credential is privileged, anything else
/// (including transport failure) is a rejection.
pub struct IntrospectionVerifier {
    client: Client,
    introspect_url: Url,
}

impl IntrospectionVerifier {
    /// Build a verifier with the default bounded request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(introspect_url: Url) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(DEFAULT_REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            introspect_url,
        })
    }
}

#[async_trait]
impl ServiceCredentialVerifier for IntrospectionVerifier {
    async fn verify(&self, bearer: &str) -> bool {
        let probe = self
            .client
            .get(self.introspect_url.clone())
            .bearer_auth(bearer)
            .send()
            .await;
        match probe {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                tracing::warn!(%error, "credential introspection probe failed");
                false
            }
        }
    }
}
