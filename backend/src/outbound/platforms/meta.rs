//! Reqwest-backed Meta (Facebook) Marketing API adapter.
//!
//! Graph API with cursor pagination; the access token travels as a query
//! parameter. Budget semantics are the subtle part: `daily_budget` and
//! `lifetime_budget` are mutually exclusive per campaign and arrive in
//! cents. Lifetime-budget campaigns derive `budget_used` from
//! `budget_remaining`; daily-budget campaigns report usage through the
//! insights stream instead, so their `budget_used` stays zero.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::domain::model::{
    AccessToken, AudienceDraft, CampaignDraft, DailyMetricDraft, HourlyMetricDraft, Platform,
    SyncResult,
};
use crate::domain::normalize::{self, META_AUDIENCE_KIND, META_CAMPAIGN_STATUS};
use crate::domain::ports::{PlatformAdapter, PlatformSyncError};

use super::support::{
    DEFAULT_REQUEST_TIMEOUT, body_preview, daily_window, hourly_window, map_transport_error,
    non_fatal,
};

/// Graph API version this adapter is pinned to.
const GRAPH_API_VERSION: &str = "v23.0";

/// Page size for campaign and audience listings.
const PAGE_LIMIT: u32 = 100;

/// OAuth error code the Graph API uses for invalid/expired tokens.
const OAUTH_ERROR_CODE: i64 = 190;

/// Meta Marketing API adapter.
pub struct MetaAdsAdapter {
    client: Client,
    base_url: Url,
}

impl MetaAdsAdapter {
    /// Build an adapter with the default bounded request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(base_url: Url) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(DEFAULT_REQUEST_TIMEOUT).build()?;
        Ok(Self { client, base_url })
    }

    /// One GET against the Graph API with error-envelope mapping.
    async fn get_json<T: DeserializeOwned>(
        &self,
        token: &AccessToken,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, PlatformSyncError> {
        let mut url = self
            .base_url
            .join(&format!("{GRAPH_API_VERSION}/{path}"))
            .map_err(|error| PlatformSyncError::decode(format!("invalid Graph API URL: {error}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("access_token", token.as_str());
            for (name, value) in params {
                pairs.append_pair(name, value);
            }
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|error| map_transport_error(&error))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|error| map_transport_error(&error))?;

        if !status.is_success() {
            return Err(map_graph_error(status, &bytes));
        }

        serde_json::from_slice(&bytes).map_err(|error| {
            PlatformSyncError::decode(format!("invalid Graph API payload: {error}"))
        })
    }

    /// Walk a cursor-paginated edge to exhaustion.
    async fn get_paged<T: DeserializeOwned>(
        &self,
        token: &AccessToken,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, PlatformSyncError> {
        let mut rows = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let mut page_params = params.to_vec();
            page_params.push(("limit", PAGE_LIMIT.to_string()));
            if let Some(cursor) = &after {
                page_params.push(("after", cursor.clone()));
            }
            let page: GraphPage<T> = self.get_json(token, path, &page_params).await?;
            rows.extend(page.data);
            after = page
                .paging
                .as_ref()
                .filter(|paging| paging.next.is_some())
                .and_then(|paging| paging.cursors.as_ref())
                .and_then(|cursors| cursors.after.clone());
            if after.is_none() {
                return Ok(rows);
            }
        }
    }

    /// Account currency; best effort, never fatal.
    async fn fetch_currency(&self, token: &AccessToken, account_path: &str) -> String {
        let result: Result<AccountFieldsDto, _> = self
            .get_json(token, account_path, &[("fields", "currency".to_owned())])
            .await;
        match result {
            Ok(fields) => fields.currency.unwrap_or_else(|| "USD".to_owned()),
            Err(error) => {
                tracing::warn!(%error, "Meta currency lookup failed; using fallback");
                "USD".to_owned()
            }
        }
    }

    async fn fetch_campaigns(
        &self,
        token: &AccessToken,
        account_path: &str,
        currency: &str,
    ) -> Result<Vec<CampaignDraft>, PlatformSyncError> {
        let fields = "id,name,status,daily_budget,lifetime_budget,budget_remaining";
        let rows: Vec<GraphCampaignDto> = self
            .get_paged(
                token,
                &format!("{account_path}/campaigns"),
                &[("fields", fields.to_owned())],
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let (budget_limit, budget_used) = meta_budget(
                    parse_graph_i64(row.daily_budget.as_deref()),
                    parse_graph_i64(row.lifetime_budget.as_deref()),
                    parse_graph_i64(row.budget_remaining.as_deref()),
                );
                CampaignDraft {
                    external_id: row.id,
                    name: row.name.unwrap_or_default(),
                    status: normalize::campaign_status(
                        META_CAMPAIGN_STATUS,
                        row.status.as_deref().unwrap_or_default(),
                    ),
                    budget_limit,
                    budget_used,
                    currency: currency.to_owned(),
                }
            })
            .collect())
    }

    async fn fetch_daily_metrics(
        &self,
        token: &AccessToken,
        account_path: &str,
    ) -> Result<BTreeMap<String, Vec<DailyMetricDraft>>, PlatformSyncError> {
        let (since, until) = daily_window(Utc::now().date_naive());
        let rows: Vec<InsightsRowDto> = self
            .get_paged(
                token,
                &format!("{account_path}/insights"),
                &[
                    ("level", "campaign".to_owned()),
                    ("time_increment", "1".to_owned()),
                    (
                        "fields",
                        "campaign_id,spend,impressions,clicks,actions,action_values".to_owned(),
                    ),
                    (
                        "time_range",
                        format!("{{\"since\":\"{since}\",\"until\":\"{until}\"}}"),
                    ),
                ],
            )
            .await?;

        let mut metrics: BTreeMap<String, Vec<DailyMetricDraft>> = BTreeMap::new();
        for row in rows {
            let Some(campaign_id) = row.campaign_id.clone() else {
                continue;
            };
            let Some(date) = row.date_start.as_deref().and_then(|d| d.parse().ok()) else {
                continue;
            };
            metrics.entry(campaign_id).or_default().push(DailyMetricDraft {
                date,
                spend: parse_graph_f64(row.spend.as_deref()),
                impressions: parse_graph_i64(row.impressions.as_deref()),
                clicks: parse_graph_i64(row.clicks.as_deref()),
                conversions: conversion_total(row.actions.as_deref()),
                revenue: conversion_total(row.action_values.as_deref()),
            });
        }
        Ok(metrics)
    }

    async fn fetch_hourly_metrics(
        &self,
        token: &AccessToken,
        account_path: &str,
    ) -> Result<BTreeMap<String, Vec<HourlyMetricDraft>>, PlatformSyncError> {
        let (since, until) = hourly_window(Utc::now().date_naive());
        let rows: Vec<InsightsRowDto> = self
            .get_paged(
                token,
                &format!("{account_path}/insights"),
                &[
                    ("level", "campaign".to_owned()),
                    ("time_increment", "1".to_owned()),
                    (
                        "breakdowns",
                        "hourly_stats_aggregated_by_advertiser_time_zone".to_owned(),
                    ),
                    (
                        "fields",
                        "campaign_id,spend,impressions,clicks,actions".to_owned(),
                    ),
                    (
                        "time_range",
                        format!("{{\"since\":\"{since}\",\"until\":\"{until}\"}}"),
                    ),
                ],
            )
            .await?;

        let mut metrics: BTreeMap<String, Vec<HourlyMetricDraft>> = BTreeMap::new();
        for row in rows {
            let Some(campaign_id) = row.campaign_id.clone() else {
                continue;
            };
            let Some(date) = row
                .date_start
                .as_deref()
                .and_then(|d| d.parse::<NaiveDate>().ok())
            else {
                continue;
            };
            let Some(hour) = row
                .hourly_stats_aggregated_by_advertiser_time_zone
                .as_deref()
                .and_then(parse_hour_bucket)
            else {
                continue;
            };
            let Some(bucket) = date.and_hms_opt(hour, 0, 0).map(|dt| dt.and_utc()) else {
                continue;
            };
            metrics.entry(campaign_id).or_default().push(HourlyMetricDraft {
                hour: bucket,
                spend: parse_graph_f64(row.spend.as_deref()),
                impressions: parse_graph_i64(row.impressions.as_deref()),
                clicks: parse_graph_i64(row.clicks.as_deref()),
                conversions: conversion_total(row.actions.as_deref()),
            });
        }
        Ok(metrics)
    }

    async fn fetch_audiences(
        &self,
        token: &AccessToken,
        account_path: &str,
    ) -> Result<Vec<AudienceDraft>, PlatformSyncError> {
        let rows: Vec<CustomAudienceDto> = self
            .get_paged(
                token,
                &format!("{account_path}/customaudiences"),
                &[(
                    "fields",
                    "id,name,subtype,approximate_count_lower_bound".to_owned(),
                )],
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| AudienceDraft {
                external_id: row.id,
                name: row.name.unwrap_or_default(),
                kind: normalize::audience_kind(
                    META_AUDIENCE_KIND,
                    row.subtype.as_deref().unwrap_or_default(),
                ),
                size: row.approximate_count_lower_bound,
            })
            .collect())
    }
}

#[async_trait]
impl PlatformAdapter for MetaAdsAdapter {
    fn platform(&self) -> Platform {
        Platform::Meta
    }

    async fn sync(
        &self,
        token: &AccessToken,
        external_account_id: &str,
        _selected_child_id: Option<&str>,
    ) -> Result<SyncResult, PlatformSyncError> {
        let account_path = act_account_path(external_account_id);

        let currency = self.fetch_currency(token, &account_path).await;
        let campaigns = self.fetch_campaigns(token, &account_path, &currency).await?;
        let daily_metrics = self.fetch_daily_metrics(token, &account_path).await?;
        let hourly_metrics = self.fetch_hourly_metrics(token, &account_path).await?;
        let audiences = non_fatal(
            "meta",
            "audiences",
            self.fetch_audiences(token, &account_path),
        )
        .await;

        // Custom audiences have no per-day reporting on this surface, so the
        // audience metric map stays empty; keywords are a search concept.
        Ok(SyncResult {
            campaigns,
            daily_metrics,
            hourly_metrics,
            audiences,
            ..SyncResult::default()
        })
    }
}

/// Graph API ad-account node path, tolerating both stored forms.
fn act_account_path(external_account_id: &str) -> String {
    if external_account_id.starts_with("act_") {
        external_account_id.to_owned()
    } else {
        format!("act_{external_account_id}")
    }
}

/// The Meta budget law. Inputs in cents; outputs in currency units.
///
/// Lifetime budgets carry their own usage: `used = limit - remaining`,
/// clamped at zero because remaining can briefly exceed the limit after a
/// budget edit. Daily budgets report zero here; spend flows through the
/// insights stream.
fn meta_budget(daily_cents: i64, lifetime_cents: i64, remaining_cents: i64) -> (f64, f64) {
    if lifetime_cents > 0 {
        let limit = normalize::cents_to_units(lifetime_cents);
        let used = (limit - normalize::cents_to_units(remaining_cents)).max(0.0);
        (limit, used)
    } else {
        (normalize::cents_to_units(daily_cents), 0.0)
    }
}

/// Sum the purchase-like entries of an `actions`/`action_values` array.
fn conversion_total(actions: Option<&[ActionDto]>) -> f64 {
    actions
        .unwrap_or_default()
        .iter()
        .filter(|action| {
            action
                .action_type
                .as_deref()
                .is_some_and(|t| t.contains("purchase") || t.starts_with("offsite_conversion"))
        })
        .map(|action| parse_graph_f64(action.value.as_deref()))
        .sum()
}

/// Start hour of an insights bucket label like `"06:00:00 - 06:59:59"`.
fn parse_hour_bucket(label: &str) -> Option<u32> {
    let hour: u32 = label.split(':').next()?.trim().parse().ok()?;
    (hour < 24).then_some(hour)
}

/// Graph numerics arrive as strings.
fn parse_graph_i64(value: Option<&str>) -> i64 {
    value.and_then(|v| v.parse().ok()).unwrap_or_default()
}

fn parse_graph_f64(value: Option<&str>) -> f64 {
    value.and_then(|v| v.parse().ok()).unwrap_or_default()
}

fn map_graph_error(status: StatusCode, body: &[u8]) -> PlatformSyncError {
    if let Ok(envelope) = serde_json::from_slice::<GraphErrorEnvelope>(body) {
        let message = envelope.error.message.unwrap_or_default();
        if envelope.error.code == Some(OAUTH_ERROR_CODE) {
            return PlatformSyncError::auth(format!("Meta access token rejected: {message}"));
        }
        return PlatformSyncError::provider(format!(
            "Meta Marketing API error: {}",
            body_preview(message.as_bytes())
        ));
    }
    PlatformSyncError::provider(format!(
        "Meta Marketing API error: status {}: {}",
        status.as_u16(),
        body_preview(body)
    ))
}

#[derive(Debug, Deserialize)]
struct GraphPage<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    paging: Option<PagingDto>,
}

#[derive(Debug, Deserialize)]
struct PagingDto {
    cursors: Option<CursorsDto>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CursorsDto {
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountFieldsDto {
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphCampaignDto {
    id: String,
    name: Option<String>,
    status: Option<String>,
    daily_budget: Option<String>,
    lifetime_budget: Option<String>,
    budget_remaining: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InsightsRowDto {
    campaign_id: Option<String>,
    date_start: Option<String>,
    spend: Option<String>,
    impressions: Option<String>,
    clicks: Option<String>,
    actions: Option<Vec<ActionDto>>,
    action_values: Option<Vec<ActionDto>>,
    hourly_stats_aggregated_by_advertiser_time_zone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActionDto {
    action_type: Option<String>,
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CustomAudienceDto {
    id: String,
    name: Option<String>,
    subtype: Option<String>,
    approximate_count_lower_bound: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct GraphErrorEnvelope {
    error: GraphErrorDto,
}

#[derive(Debug, Deserialize)]
struct GraphErrorDto {
    message: Option<String>,
    code: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn lifetime_budget_derives_usage_from_remaining() {
        let (limit, used) = meta_budget(0, 100_000, 40_000);
        assert_eq!(limit, 1000.0);
        assert_eq!(used, 600.0);
    }

    #[test]
    fn daily_budget_reports_zero_usage() {
        let (limit, used) = meta_budget(5000, 0, 0);
        assert_eq!(limit, 50.0);
        assert_eq!(used, 0.0);
    }

    #[test]
    fn lifetime_budget_usage_clamps_at_zero() {
        let (limit, used) = meta_budget(0, 100_000, 120_000);
        assert_eq!(limit, 1000.0);
        assert_eq!(used, 0.0);
    }

    #[rstest]
    #[case("06:00:00 - 06:59:59", Some(6))]
    #[case("23:00:00 - 23:59:59", Some(23))]
    #[case("not-a-bucket", None)]
    #[case("25:00:00 - 25:59:59", None)]
    fn hour_bucket_labels_parse_to_start_hour(#[case] label: &str, #[case] expected: Option<u32>) {
        assert_eq!(parse_hour_bucket(label), expected);
    }

    #[test]
    fn conversion_total_sums_purchase_like_actions() {
        let actions = vec![
            ActionDto {
                action_type: Some("link_click".to_owned()),
                value: Some("12".to_owned()),
            },
            ActionDto {
                action_type: Some("offsite_conversion.fb_pixel_purchase".to_owned()),
                value: Some("2".to_owned()),
            },
            ActionDto {
                action_type: Some("omni_purchase".to_owned()),
                value: Some("1.5".to_owned()),
            },
        ];
        assert_eq!(conversion_total(Some(&actions)), 3.5);
    }

    #[test]
    fn account_path_tolerates_both_stored_forms() {
        assert_eq!(act_account_path("1234"), "act_1234");
        assert_eq!(act_account_path("act_1234"), "act_1234");
    }

    #[test]
    fn oauth_envelope_maps_to_auth_error() {
        let body = br#"{"error":{"message":"Error validating access token","type":"OAuthException","code":190}}"#;
        let error = map_graph_error(StatusCode::BAD_REQUEST, body);
        assert!(
            matches!(error, PlatformSyncError::Auth { .. }),
            "code 190 should map to Auth, got {error:?}"
        );
    }
}
