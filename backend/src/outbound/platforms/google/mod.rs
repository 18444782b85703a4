//! Reqwest-backed Google Ads adapter.
//!
//! Talks GAQL to `googleAds:search` with `pageToken` pagination. The adapter
//! owns three Google-specific concerns: the descending API-version fallback
//! (a version answering "not found" or "deprecated" is transient, anything
//! else is fatal), the ordered rewrite table that turns well-known provider
//! error codes into actionable operator messages, and the account-hierarchy
//! resolution in [`hierarchy`].

mod hierarchy;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;

use crate::domain::model::{
    AccessToken, AudienceDraft, CampaignDraft, DailyMetricDraft, HourlyMetricDraft, KeywordDraft,
    Platform, SyncResult,
};
use crate::domain::normalize::{
    self, GOOGLE_AUDIENCE_KIND, GOOGLE_CAMPAIGN_STATUS, GOOGLE_KEYWORD_MATCH_TYPE,
    GOOGLE_KEYWORD_STATUS,
};
use crate::domain::ports::{PlatformAdapter, PlatformSyncError};

use super::support::{
    DEFAULT_REQUEST_TIMEOUT, body_preview, daily_window, hourly_window, map_transport_error,
    non_fatal,
};
use hierarchy::ReportingScope;

/// Descending list of report-capable API versions. The first version that
/// answers is used; "unsupported" or "not found" advances to the next.
const SUPPORTED_API_VERSIONS: &[&str] = &["v21", "v20", "v19"];

/// Ordered `(needle, rewrite)` pairs for well-known Google Ads error codes.
/// Evaluated top to bottom; the first match wins.
const ERROR_REWRITES: &[(&str, &str)] = &[
    (
        "DEVELOPER_TOKEN_NOT_APPROVED",
        "Google Ads developer token is not approved for production accounts; request basic access in the API Center",
    ),
    (
        "DEVELOPER_TOKEN_PROHIBITED",
        "Google Ads developer token is prohibited from accessing this account",
    ),
    (
        "DEVELOPER_TOKEN_INVALID",
        "Google Ads developer token is invalid; check the configured token",
    ),
    (
        "NOT_ADS_USER",
        "the authorized Google login has no Google Ads account; reconnect with an Ads-enabled user",
    ),
];

/// Rewrite a raw provider error body into an operator-facing message.
fn rewrite_provider_error(raw: &str) -> String {
    for (needle, rewrite) in ERROR_REWRITES {
        if raw.contains(needle) {
            return (*rewrite).to_owned();
        }
    }
    format!("Google Ads API error: {}", body_preview(raw.as_bytes()))
}

/// True when a failed response should advance the version fallback instead
/// of failing the sync.
fn is_version_fallback(status: StatusCode, body: &str) -> bool {
    status == StatusCode::NOT_FOUND
        || body.contains("UNSUPPORTED_VERSION")
        || body.to_ascii_lowercase().contains("deprecated")
}

/// Outcome of one search attempt against one API version.
enum SearchAttemptError {
    /// This version is gone; try the next one.
    VersionUnsupported(String),
    /// Real failure; surface it.
    Fatal(PlatformSyncError),
}

/// Google Ads reporting adapter.
pub struct GoogleAdsAdapter {
    client: Client,
    base_url: Url,
    developer_token: String,
}

impl GoogleAdsAdapter {
    /// Build an adapter with the default bounded request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(base_url: Url, developer_token: String) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(DEFAULT_REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url,
            developer_token,
        })
    }

    /// Run a GAQL query with pagination and version fallback; returns all
    /// result rows across pages.
    async fn search(
        &self,
        token: &AccessToken,
        scope: &ReportingScope,
        query: &str,
    ) -> Result<Vec<SearchRow>, PlatformSyncError> {
        self.search_customer(
            token,
            &scope.customer_id,
            scope.login_customer_id.as_deref(),
            query,
        )
        .await
    }

    /// Like [`Self::search`] but with an explicit customer scope, used by the
    /// hierarchy resolver before a [`ReportingScope`] exists.
    async fn search_customer(
        &self,
        token: &AccessToken,
        customer_id: &str,
        login_customer_id: Option<&str>,
        query: &str,
    ) -> Result<Vec<SearchRow>, PlatformSyncError> {
        let mut last_version_error = None;
        for version in SUPPORTED_API_VERSIONS {
            let mut rows = Vec::new();
            let mut page_token: Option<String> = None;
            // The paging loop either finishes this version (returning its
            // rows or a fatal error) or breaks out with the unsupported-
            // version message, in which case the next version is tried.
            let version_error = loop {
                match self
                    .search_page(
                        token,
                        version,
                        customer_id,
                        login_customer_id,
                        query,
                        page_token.as_deref(),
                    )
                    .await
                {
                    Ok(page) => {
                        rows.extend(page.results);
                        match page.next_page_token {
                            Some(next) if !next.is_empty() => page_token = Some(next),
                            _ => return Ok(rows),
                        }
                    }
                    Err(SearchAttemptError::VersionUnsupported(message)) => {
                        tracing::debug!(version, message, "API version unavailable; falling back");
                        break message;
                    }
                    Err(SearchAttemptError::Fatal(error)) => return Err(error),
                }
            };
            last_version_error = Some(version_error);
        }
        Err(PlatformSyncError::provider(format!(
            "no supported Google Ads API version available: {}",
            last_version_error.unwrap_or_else(|| "all versions exhausted".to_owned())
        )))
    }

    async fn search_page(
        &self,
        token: &AccessToken,
        version: &str,
        customer_id: &str,
        login_customer_id: Option<&str>,
        query: &str,
        page_token: Option<&str>,
    ) -> Result<SearchResponse, SearchAttemptError> {
        let url = self
            .base_url
            .join(&format!("{version}/customers/{customer_id}/googleAds:search"))
            .map_err(|error| {
                SearchAttemptError::Fatal(PlatformSyncError::decode(format!(
                    "invalid Google Ads URL: {error}"
                )))
            })?;

        let mut body = json!({ "query": query });
        if let Some(page_token) = page_token {
            body["pageToken"] = json!(page_token);
        }

        let mut request = self
            .client
            .post(url)
            .bearer_auth(token.as_str())
            .header("developer-token", self.developer_token.as_str())
            .json(&body);
        if let Some(login) = login_customer_id {
            request = request.header("login-customer-id", login);
        }

        let response = request
            .send()
            .await
            .map_err(|error| SearchAttemptError::Fatal(map_transport_error(&error)))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|error| SearchAttemptError::Fatal(map_transport_error(&error)))?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            if is_version_fallback(status, &text) {
                return Err(SearchAttemptError::VersionUnsupported(body_preview(&bytes)));
            }
            if status == StatusCode::UNAUTHORIZED {
                return Err(SearchAttemptError::Fatal(PlatformSyncError::auth(
                    body_preview(&bytes),
                )));
            }
            return Err(SearchAttemptError::Fatal(PlatformSyncError::provider(
                rewrite_provider_error(&text),
            )));
        }

        serde_json::from_slice(&bytes).map_err(|error| {
            SearchAttemptError::Fatal(PlatformSyncError::decode(format!(
                "invalid Google Ads search payload: {error}"
            )))
        })
    }

    /// `customers:listAccessibleCustomers`, with the same version fallback.
    async fn list_accessible_customers(
        &self,
        token: &AccessToken,
    ) -> Result<Vec<String>, PlatformSyncError> {
        let mut last_version_error = None;
        for version in SUPPORTED_API_VERSIONS {
            let url = self
                .base_url
                .join(&format!("{version}/customers:listAccessibleCustomers"))
                .map_err(|error| {
                    PlatformSyncError::decode(format!("invalid Google Ads URL: {error}"))
                })?;

            let response = self
                .client
                .get(url)
                .bearer_auth(token.as_str())
                .header("developer-token", self.developer_token.as_str())
                .send()
                .await
                .map_err(|error| map_transport_error(&error))?;

            let status = response.status();
            let bytes = response
                .bytes()
                .await
                .map_err(|error| map_transport_error(&error))?;

            if !status.is_success() {
                let text = String::from_utf8_lossy(&bytes).into_owned();
                if is_version_fallback(status, &text) {
                    last_version_error = Some(body_preview(&bytes));
                    continue;
                }
                return Err(PlatformSyncError::provider(rewrite_provider_error(&text)));
            }

            let decoded: ListAccessibleCustomersResponse =
                serde_json::from_slice(&bytes).map_err(|error| {
                    PlatformSyncError::decode(format!(
                        "invalid listAccessibleCustomers payload: {error}"
                    ))
                })?;
            return Ok(decoded
                .resource_names
                .iter()
                .filter_map(|name| name.strip_prefix("customers/"))
                .map(str::to_owned)
                .collect());
        }
        Err(PlatformSyncError::provider(format!(
            "no supported Google Ads API version available: {}",
            last_version_error.unwrap_or_else(|| "all versions exhausted".to_owned())
        )))
    }

    async fn fetch_campaigns(
        &self,
        token: &AccessToken,
        scope: &ReportingScope,
    ) -> Result<Vec<CampaignDraft>, PlatformSyncError> {
        let query = "SELECT campaign.id, campaign.name, campaign.status, \
                     campaign_budget.amount_micros, metrics.cost_micros \
                     FROM campaign";
        let rows = self.search(token, scope, query).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let campaign = row.campaign?;
                let external_id = campaign.id?;
                Some(CampaignDraft {
                    external_id,
                    name: campaign.name.unwrap_or_default(),
                    status: normalize::campaign_status(
                        GOOGLE_CAMPAIGN_STATUS,
                        campaign.status.as_deref().unwrap_or_default(),
                    ),
                    budget_limit: normalize::micros_to_units(parse_string_i64(
                        row.campaign_budget.and_then(|b| b.amount_micros).as_deref(),
                    )),
                    budget_used: normalize::micros_to_units(parse_string_i64(
                        row.metrics.and_then(|m| m.cost_micros).as_deref(),
                    )),
                    currency: scope.currency.clone(),
                })
            })
            .collect())
    }

    async fn fetch_daily_metrics(
        &self,
        token: &AccessToken,
        scope: &ReportingScope,
    ) -> Result<BTreeMap<String, Vec<DailyMetricDraft>>, PlatformSyncError> {
        let (start, end) = daily_window(Utc::now().date_naive());
        let query = format!(
            "SELECT campaign.id, segments.date, metrics.cost_micros, \
             metrics.impressions, metrics.clicks, metrics.conversions, \
             metrics.conversions_value \
             FROM campaign WHERE segments.date BETWEEN '{start}' AND '{end}'"
        );
        let rows = self.search(token, scope, &query).await?;
        let mut metrics: BTreeMap<String, Vec<DailyMetricDraft>> = BTreeMap::new();
        for row in rows {
            let Some(campaign_id) = row.campaign.as_ref().and_then(|c| c.id.clone()) else {
                continue;
            };
            let Some(date) = row
                .segments
                .as_ref()
                .and_then(|s| s.date.as_deref())
                .and_then(|d| d.parse().ok())
            else {
                continue;
            };
            metrics
                .entry(campaign_id)
                .or_default()
                .push(daily_metric_from_row(row.metrics.as_ref(), date));
        }
        Ok(metrics)
    }

    async fn fetch_hourly_metrics(
        &self,
        token: &AccessToken,
        scope: &ReportingScope,
    ) -> Result<BTreeMap<String, Vec<HourlyMetricDraft>>, PlatformSyncError> {
        let (start, end) = hourly_window(Utc::now().date_naive());
        let query = format!(
            "SELECT campaign.id, segments.date, segments.hour, \
             metrics.cost_micros, metrics.impressions, metrics.clicks, \
             metrics.conversions \
             FROM campaign WHERE segments.date BETWEEN '{start}' AND '{end}'"
        );
        let rows = self.search(token, scope, &query).await?;
        let mut metrics: BTreeMap<String, Vec<HourlyMetricDraft>> = BTreeMap::new();
        for row in rows {
            let Some(campaign_id) = row.campaign.as_ref().and_then(|c| c.id.clone()) else {
                continue;
            };
            let Some(hour) = hour_bucket(row.segments.as_ref()) else {
                continue;
            };
            let m = row.metrics.as_ref();
            metrics.entry(campaign_id).or_default().push(HourlyMetricDraft {
                hour,
                spend: normalize::micros_to_units(parse_string_i64(
                    m.and_then(|m| m.cost_micros.as_deref()),
                )),
                impressions: parse_string_i64(m.and_then(|m| m.impressions.as_deref())),
                clicks: parse_string_i64(m.and_then(|m| m.clicks.as_deref())),
                conversions: m.and_then(|m| m.conversions).unwrap_or_default(),
            });
        }
        Ok(metrics)
    }

    async fn fetch_keywords(
        &self,
        token: &AccessToken,
        scope: &ReportingScope,
    ) -> Result<Vec<KeywordDraft>, PlatformSyncError> {
        let query = "SELECT ad_group_criterion.criterion_id, \
                     ad_group_criterion.keyword.text, \
                     ad_group_criterion.keyword.match_type, \
                     ad_group_criterion.status, \
                     ad_group_criterion.quality_info.quality_score, \
                     campaign.id \
                     FROM keyword_view";
        let rows = self.search(token, scope, query).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let criterion = row.ad_group_criterion?;
                let keyword = criterion.keyword?;
                Some(KeywordDraft {
                    external_id: criterion.criterion_id?,
                    campaign_external_id: row.campaign.and_then(|c| c.id).unwrap_or_default(),
                    text: keyword.text.unwrap_or_default(),
                    match_type: normalize::keyword_match_type(
                        GOOGLE_KEYWORD_MATCH_TYPE,
                        keyword.match_type.as_deref().unwrap_or_default(),
                    ),
                    status: normalize::keyword_status(
                        GOOGLE_KEYWORD_STATUS,
                        criterion.status.as_deref().unwrap_or_default(),
                    ),
                    quality_score: criterion.quality_info.and_then(|q| q.quality_score),
                })
            })
            .collect())
    }

    async fn fetch_keyword_metrics(
        &self,
        token: &AccessToken,
        scope: &ReportingScope,
    ) -> Result<BTreeMap<String, Vec<DailyMetricDraft>>, PlatformSyncError> {
        let (start, end) = daily_window(Utc::now().date_naive());
        let query = format!(
            "SELECT ad_group_criterion.criterion_id, segments.date, \
             metrics.cost_micros, metrics.impressions, metrics.clicks, \
             metrics.conversions, metrics.conversions_value \
             FROM keyword_view WHERE segments.date BETWEEN '{start}' AND '{end}'"
        );
        let rows = self.search(token, scope, &query).await?;
        let mut metrics: BTreeMap<String, Vec<DailyMetricDraft>> = BTreeMap::new();
        for row in rows {
            let Some(criterion_id) = row
                .ad_group_criterion
                .as_ref()
                .and_then(|c| c.criterion_id.clone())
            else {
                continue;
            };
            let Some(date) = row
                .segments
                .as_ref()
                .and_then(|s| s.date.as_deref())
                .and_then(|d| d.parse().ok())
            else {
                continue;
            };
            metrics
                .entry(criterion_id)
                .or_default()
                .push(daily_metric_from_row(row.metrics.as_ref(), date));
        }
        Ok(metrics)
    }

    async fn fetch_audiences(
        &self,
        token: &AccessToken,
        scope: &ReportingScope,
    ) -> Result<Vec<AudienceDraft>, PlatformSyncError> {
        let query = "SELECT user_list.id, user_list.name, user_list.type, \
                     user_list.size_for_display \
                     FROM user_list";
        let rows = self.search(token, scope, query).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let list = row.user_list?;
                Some(AudienceDraft {
                    external_id: list.id?,
                    name: list.name.unwrap_or_default(),
                    kind: normalize::audience_kind(
                        GOOGLE_AUDIENCE_KIND,
                        list.kind.as_deref().unwrap_or_default(),
                    ),
                    size: list
                        .size_for_display
                        .as_deref()
                        .and_then(|s| s.parse().ok()),
                })
            })
            .collect())
    }

    /// Raw per-(ad group, audience, date) rows; the caller sums them per
    /// (audience, date) before they reach the writer.
    async fn fetch_audience_metric_rows(
        &self,
        token: &AccessToken,
        scope: &ReportingScope,
    ) -> Result<Vec<(String, DailyMetricDraft)>, PlatformSyncError> {
        let (start, end) = daily_window(Utc::now().date_naive());
        let query = format!(
            "SELECT ad_group_criterion.user_list.user_list, segments.date, \
             metrics.cost_micros, metrics.impressions, metrics.clicks, \
             metrics.conversions, metrics.conversions_value \
             FROM ad_group_audience_view \
             WHERE segments.date BETWEEN '{start}' AND '{end}'"
        );
        let rows = self.search(token, scope, &query).await?;
        let mut raw = Vec::new();
        for row in rows {
            let Some(audience_id) = row
                .ad_group_criterion
                .as_ref()
                .and_then(|c| c.user_list.as_ref())
                .and_then(|l| l.user_list.as_deref())
                .and_then(user_list_id_from_resource)
            else {
                continue;
            };
            let Some(date) = row
                .segments
                .as_ref()
                .and_then(|s| s.date.as_deref())
                .and_then(|d| d.parse().ok())
            else {
                continue;
            };
            raw.push((audience_id, daily_metric_from_row(row.metrics.as_ref(), date)));
        }
        Ok(raw)
    }
}

#[async_trait]
impl PlatformAdapter for GoogleAdsAdapter {
    fn platform(&self) -> Platform {
        Platform::Google
    }

    async fn sync(
        &self,
        token: &AccessToken,
        external_account_id: &str,
        selected_child_id: Option<&str>,
    ) -> Result<SyncResult, PlatformSyncError> {
        let scope =
            hierarchy::resolve_scope(self, token, external_account_id, selected_child_id).await?;

        let campaigns = self.fetch_campaigns(token, &scope).await?;
        let daily_metrics = self.fetch_daily_metrics(token, &scope).await?;
        let hourly_metrics = self.fetch_hourly_metrics(token, &scope).await?;

        let keywords = non_fatal("google", "keywords", self.fetch_keywords(token, &scope)).await;
        let keyword_metrics = non_fatal(
            "google",
            "keyword metrics",
            self.fetch_keyword_metrics(token, &scope),
        )
        .await;
        let audiences = non_fatal("google", "audiences", self.fetch_audiences(token, &scope)).await;
        let audience_rows = non_fatal(
            "google",
            "audience metrics",
            self.fetch_audience_metric_rows(token, &scope),
        )
        .await;
        let audience_metrics = normalize::sum_audience_metrics(audience_rows);

        Ok(SyncResult {
            campaigns,
            daily_metrics,
            hourly_metrics,
            keywords,
            keyword_metrics,
            audiences,
            audience_metrics,
        })
    }
}

/// Extract the numeric list id from `customers/{cid}/userLists/{id}`.
fn user_list_id_from_resource(resource: &str) -> Option<String> {
    resource.rsplit('/').next().map(str::to_owned)
}

/// Google's REST mapping serializes int64 metrics as JSON strings.
fn parse_string_i64(value: Option<&str>) -> i64 {
    value.and_then(|v| v.parse().ok()).unwrap_or_default()
}

fn daily_metric_from_row(
    metrics: Option<&MetricsDto>,
    date: chrono::NaiveDate,
) -> DailyMetricDraft {
    DailyMetricDraft {
        date,
        spend: normalize::micros_to_units(parse_string_i64(
            metrics.and_then(|m| m.cost_micros.as_deref()),
        )),
        impressions: parse_string_i64(metrics.and_then(|m| m.impressions.as_deref())),
        clicks: parse_string_i64(metrics.and_then(|m| m.clicks.as_deref())),
        conversions: metrics.and_then(|m| m.conversions).unwrap_or_default(),
        revenue: metrics.and_then(|m| m.conversions_value).unwrap_or_default(),
    }
}

/// Hour bucket start from a segmented row (`segments.date` + `segments.hour`).
fn hour_bucket(segments: Option<&SegmentsDto>) -> Option<chrono::DateTime<Utc>> {
    let segments = segments?;
    let date: chrono::NaiveDate = segments.date.as_deref()?.parse().ok()?;
    let hour = segments.hour?;
    Some(date.and_hms_opt(hour, 0, 0)?.and_utc())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SearchResponse {
    results: Vec<SearchRow>,
    next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SearchRow {
    campaign: Option<CampaignDto>,
    campaign_budget: Option<CampaignBudgetDto>,
    metrics: Option<MetricsDto>,
    segments: Option<SegmentsDto>,
    ad_group_criterion: Option<AdGroupCriterionDto>,
    user_list: Option<UserListDto>,
    customer: Option<CustomerDto>,
    customer_client: Option<CustomerClientDto>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CampaignDto {
    id: Option<String>,
    name: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CampaignBudgetDto {
    amount_micros: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct MetricsDto {
    cost_micros: Option<String>,
    impressions: Option<String>,
    clicks: Option<String>,
    conversions: Option<f64>,
    conversions_value: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SegmentsDto {
    date: Option<String>,
    hour: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AdGroupCriterionDto {
    criterion_id: Option<String>,
    status: Option<String>,
    keyword: Option<KeywordInfoDto>,
    quality_info: Option<QualityInfoDto>,
    user_list: Option<CriterionUserListDto>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct KeywordInfoDto {
    text: Option<String>,
    match_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct QualityInfoDto {
    quality_score: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CriterionUserListDto {
    user_list: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UserListDto {
    id: Option<String>,
    name: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    size_for_display: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CustomerDto {
    manager: Option<bool>,
    currency_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CustomerClientDto {
    id: Option<String>,
    level: Option<String>,
    manager: Option<bool>,
    status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListAccessibleCustomersResponse {
    resource_names: Vec<String>,
}
