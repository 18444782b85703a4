//! Authorization helpers used by HTTP handlers.
//!
//! Keep the HTTP modules focused on request/response mapping by
//! concentrating credential checks here. Two credentials are accepted: a
//! shared secret in `x-sync-secret`, compared against the configured value,
//! or a bearer token verified against the privileged introspection probe.

use std::sync::Arc;

use actix_web::HttpRequest;

use crate::domain::ports::ServiceCredentialVerifier;

/// Shared-secret header name.
pub const SYNC_SECRET_HEADER: &str = "x-sync-secret";

/// Credential configuration shared by all handlers.
pub struct AuthState {
    /// Value matched against [`SYNC_SECRET_HEADER`]. `None` disables the
    /// shared-secret path entirely.
    pub shared_secret: Option<String>,
    pub verifier: Arc<dyn ServiceCredentialVerifier>,
}

/// True when the request carries a valid credential.
///
/// The cheap shared-secret comparison runs first; the bearer probe costs a
/// network round trip and only runs when a bearer token is present.
pub async fn authorize(request: &HttpRequest, auth: &AuthState) -> bool {
    if let Some(expected) = auth.shared_secret.as_deref() {
        let presented = request
            .headers()
            .get(SYNC_SECRET_HEADER)
            .and_then(|value| value.to_str().ok());
        if presented == Some(expected) {
            return true;
        }
    }

    if let Some(bearer) = bearer_token(request) {
        return auth.verifier.verify(bearer).await;
    }

    false
}

/// Extract the token from an `Authorization: Bearer ...` header.
fn bearer_token(request: &HttpRequest) -> Option<&str> {
    request
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use async_trait::async_trait;
    use rstest::rstest;

    struct StaticVerifier(bool);

    #[async_trait]
    impl ServiceCredentialVerifier for StaticVerifier {
        async fn verify(&self, _bearer: &str) -> bool {
            self.0
        }
    }

    fn auth_state(secret: Option<&str>, verdict: bool) -> AuthState {
        AuthState {
            shared_secret: secret.map(str::to_owned),
            verifier: Arc::new(StaticVerifier(verdict)),
        }
    }

    #[actix_rt::test]
    async fn shared_secret_match_authorizes() {
        let request = TestRequest::post()
            .insert_header((SYNC_SECRET_HEADER, "s3cret"))
            .to_http_request();

        assert!(authorize(&request, &auth_state(Some("s3cret"), false)).await);
    }

    #[actix_rt::test]
    async fn shared_secret_mismatch_falls_through_to_rejection() {
        let request = TestRequest::post()
            .insert_header((SYNC_SECRET_HEADER, "wrong"))
            .to_http_request();

        assert!(!authorize(&request, &auth_state(Some("s3cret"), false)).await);
    }

    #[actix_rt::test]
    async fn bearer_token_defers_to_verifier() {
        let request = TestRequest::post()
            .insert_header(("Authorization", "Bearer svc-token"))
            .to_http_request();

        assert!(authorize(&request, &auth_state(Some("s3cret"), true)).await);
        assert!(!authorize(&request, &auth_state(Some("s3cret"), false)).await);
    }

    #[actix_rt::test]
    async fn absent_credentials_are_rejected() {
        let request = TestRequest::post().to_http_request();

        assert!(!authorize(&request, &auth_state(Some("s3cret"), true)).await);
    }

    #[rstest]
    #[case("Bearer svc-token", Some("svc-token"))]
    #[case("Bearer ", None)]
    #[case("Basic dXNlcg==", None)]
    fn bearer_extraction(#[case] header: &str, #[case] expected: Option<&str>) {
        let request = TestRequest::post()
            .insert_header(("Authorization", header))
            .to_http_request();

        assert_eq!(bearer_token(&request), expected);
    }
}
