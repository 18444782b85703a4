//! Sync trigger HTTP handler.
//!
//! ```text
//! POST /api/v1/sync
//! ```
//!
//! Authorization runs before the body is even parsed, so unauthorized
//! callers learn nothing about payload validation. Once a request is
//! authorized and well-shaped, the response status is 200 regardless of the
//! sync outcome; failure is communicated through the `success` field so the
//! invoking scheduler never has to interpret HTTP errors. The one exception
//! is an unknown account, which is a 404.

use std::str::FromStr;

use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::domain::model::SyncTrigger;
use crate::domain::sync_service::{SyncOutcome, SyncRequest};
use crate::inbound::http::auth::authorize;
use crate::inbound::http::state::HttpState;

/// Request payload for triggering a sync.
#[derive(Debug, Deserialize)]
pub struct SyncRequestBody {
    pub ad_account_id: String,
    pub triggered_by: Option<String>,
}

/// Register the sync resource. A single-route resource lets actix answer
/// 405 for non-POST methods on the path.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/v1/sync").route(web::post().to(trigger_sync)));
}

async fn trigger_sync(
    request: HttpRequest,
    state: web::Data<HttpState>,
    body: web::Bytes,
) -> HttpResponse {
    if !authorize(&request, &state.auth).await {
        return HttpResponse::Unauthorized().json(json!({
            "success": false,
            "error": "Unauthorized",
        }));
    }

    let sync_request = match parse_body(&body) {
        Ok(parsed) => parsed,
        Err(message) => {
            return HttpResponse::BadRequest().json(json!({
                "success": false,
                "error": message,
            }));
        }
    };

    match state.sync_service.run(sync_request).await {
        SyncOutcome::Completed {
            sync_log_id,
            campaigns_synced,
        } => HttpResponse::Ok().json(json!({
            "success": true,
            "sync_log_id": sync_log_id,
            "campaigns_synced": campaigns_synced,
        })),
        SyncOutcome::Failed { sync_log_id, error } => HttpResponse::Ok().json(json!({
            "success": false,
            "error": error,
            "sync_log_id": sync_log_id,
        })),
        SyncOutcome::AccountNotFound => HttpResponse::NotFound().json(json!({
            "success": false,
            "error": "Ad account not found",
        })),
    }
}

/// Decode and validate the request payload.
fn parse_body(bytes: &[u8]) -> Result<SyncRequest, &'static str> {
    let body: SyncRequestBody =
        serde_json::from_slice(bytes).map_err(|_| "request body must be valid JSON")?;
    let ad_account_id = Uuid::from_str(&body.ad_account_id)
        .map_err(|_| "ad_account_id must be a valid UUID")?;
    let triggered_by = match body.triggered_by.as_deref() {
        None => SyncTrigger::Manual,
        Some(raw) => SyncTrigger::from_str(raw)
            .map_err(|_| "triggered_by must be \"manual\" or \"scheduled\"")?,
    };
    Ok(SyncRequest {
        ad_account_id,
        triggered_by,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn body_parses_with_default_trigger() {
        let body = br#"{"ad_account_id": "3fa85f64-5717-4562-b3fc-2c963f66afa6"}"#;
        let request = parse_body(body).expect("valid body");

        assert_eq!(request.triggered_by, SyncTrigger::Manual);
    }

    #[rstest]
    #[case(br#"{}"#.as_slice())]
    #[case(br#"{"ad_account_id": "not-a-uuid"}"#.as_slice())]
    #[case(b"not json".as_slice())]
    #[case(
        br#"{"ad_account_id": "3fa85f64-5717-4562-b3fc-2c963f66afa6", "triggered_by": "cron"}"#
            .as_slice()
    )]
    fn malformed_bodies_are_rejected(#[case] body: &[u8]) {
        assert!(parse_body(body).is_err());
    }

    #[test]
    fn scheduled_trigger_is_accepted() {
        let body =
            br#"{"ad_account_id": "3fa85f64-5717-4562-b3fc-2c963f66afa6", "triggered_by": "scheduled"}"#;
        let request = parse_body(body).expect("valid body");

        assert_eq!(request.triggered_by, SyncTrigger::Scheduled);
    }
}
