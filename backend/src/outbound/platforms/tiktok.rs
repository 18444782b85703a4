//! Reqwest-backed TikTok Business API adapter.
//!
//! The token travels in an `Access-Token` header and every response is
//! wrapped in a `{code, message, data}` envelope where a non-zero `code` is
//! an application error even under HTTP 200. Listings paginate with
//! `page`/`page_size` and a `page_info.total_page` count. The surface has
//! no hourly reporting, keywords, or audience listings.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::domain::model::{AccessToken, CampaignDraft, DailyMetricDraft, Platform, SyncResult};
use crate::domain::normalize::{self, TIKTOK_CAMPAIGN_STATUS};
use crate::domain::ports::{PlatformAdapter, PlatformSyncError};

use super::support::{DEFAULT_REQUEST_TIMEOUT, daily_window, map_transport_error};

/// Business API version segment.
const API_VERSION: &str = "v1.3";

const PAGE_SIZE: u32 = 200;

/// Envelope code meaning success.
const CODE_OK: i64 = 0;

/// Envelope code for a revoked or malformed access token.
const CODE_TOKEN_INVALID: i64 = 40105;

/// TikTok Business API adapter.
pub struct TikTokAdsAdapter {
    client: Client,
    base_url: Url,
}

impl TikTokAdsAdapter {
    /// Build an adapter with the default bounded request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(base_url: Url) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(DEFAULT_REQUEST_TIMEOUT).build()?;
        Ok(Self { client, base_url })
    }

    /// One GET with envelope unwrapping.
    async fn get_data<T: DeserializeOwned>(
        &self,
        token: &AccessToken,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, PlatformSyncError> {
        let url = self
            .base_url
            .join(&format!("{API_VERSION}/{path}"))
            .map_err(|error| {
                PlatformSyncError::decode(format!("invalid Business API URL: {error}"))
            })?;
        let response = self
            .client
            .get(url)
            .header("Access-Token", token.as_str())
            .query(params)
            .send()
            .await
            .map_err(|error| map_transport_error(&error))?;
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|error| map_envelope_decode_error(&error))?;
        unwrap_envelope(envelope)
    }

    /// Advertiser currency; best effort, never fatal.
    async fn fetch_currency(&self, token: &AccessToken, advertiser_id: &str) -> String {
        let result: Result<AdvertiserInfoData, _> = self
            .get_data(
                token,
                "advertiser/info/",
                &[
                    ("advertiser_ids", format!("[\"{advertiser_id}\"]")),
                    ("fields", "[\"currency\"]".to_owned()),
                ],
            )
            .await;
        match result {
            Ok(data) => data
                .list
                .into_iter()
                .next()
                .and_then(|info| info.currency)
                .unwrap_or_else(|| "USD".to_owned()),
            Err(error) => {
                tracing::warn!(%error, "TikTok currency lookup failed; using fallback");
                "USD".to_owned()
            }
        }
    }

    async fn fetch_campaigns(
        &self,
        token: &AccessToken,
        advertiser_id: &str,
        currency: &str,
    ) -> Result<Vec<CampaignDraft>, PlatformSyncError> {
        let mut campaigns = Vec::new();
        let mut page = 1u32;
        loop {
            let data: ListData<TikTokCampaignDto> = self
                .get_data(
                    token,
                    "campaign/get/",
                    &[
                        ("advertiser_id", advertiser_id.to_owned()),
                        ("page", page.to_string()),
                        ("page_size", PAGE_SIZE.to_string()),
                    ],
                )
                .await?;
            campaigns.extend(data.list.into_iter().map(|row| CampaignDraft {
                external_id: row.campaign_id,
                name: row.campaign_name.unwrap_or_default(),
                status: normalize::campaign_status(
                    TIKTOK_CAMPAIGN_STATUS,
                    row.operation_status.as_deref().unwrap_or_default(),
                ),
                // Budgets arrive in currency units; spend is read from the
                // reporting stream, never the campaign object.
                budget_limit: row.budget.unwrap_or_default(),
                budget_used: 0.0,
                currency: currency.to_owned(),
            }));
            if !data.page_info.has_more(page) {
                return Ok(campaigns);
            }
            page += 1;
        }
    }

    async fn fetch_daily_metrics(
        &self,
        token: &AccessToken,
        advertiser_id: &str,
    ) -> Result<BTreeMap<String, Vec<DailyMetricDraft>>, PlatformSyncError> {
        let (since, until) = daily_window(Utc::now().date_naive());
        let mut metrics: BTreeMap<String, Vec<DailyMetricDraft>> = BTreeMap::new();
        let mut page = 1u32;
        loop {
            let data: ListData<ReportRowDto> = self
                .get_data(
                    token,
                    "report/integrated/get/",
                    &[
                        ("advertiser_id", advertiser_id.to_owned()),
                        ("report_type", "BASIC".to_owned()),
                        ("data_level", "AUCTION_CAMPAIGN".to_owned()),
                        (
                            "dimensions",
                            "[\"campaign_id\",\"stat_time_day\"]".to_owned(),
                        ),
                        (
                            "metrics",
                            "[\"spend\",\"impressions\",\"clicks\",\"conversion\",\"total_purchase_value\"]"
                                .to_owned(),
                        ),
                        ("start_date", since.to_string()),
                        ("end_date", until.to_string()),
                        ("page", page.to_string()),
                        ("page_size", PAGE_SIZE.to_string()),
                    ],
                )
                .await?;
            for row in data.list {
                let Some(campaign_id) = row.dimensions.campaign_id.clone() else {
                    continue;
                };
                let Some(date) = row
                    .dimensions
                    .stat_time_day
                    .as_deref()
                    .and_then(parse_stat_day)
                else {
                    continue;
                };
                metrics.entry(campaign_id).or_default().push(DailyMetricDraft {
                    date,
                    spend: parse_metric_f64(row.metrics.spend.as_deref()),
                    impressions: parse_metric_i64(row.metrics.impressions.as_deref()),
                    clicks: parse_metric_i64(row.metrics.clicks.as_deref()),
                    conversions: parse_metric_f64(row.metrics.conversion.as_deref()),
                    revenue: parse_metric_f64(row.metrics.total_purchase_value.as_deref()),
                });
            }
            if !data.page_info.has_more(page) {
                return Ok(metrics);
            }
            page += 1;
        }
    }
}

#[async_trait]
impl PlatformAdapter for TikTokAdsAdapter {
    fn platform(&self) -> Platform {
        Platform::Tiktok
    }

    async fn sync(
        &self,
        token: &AccessToken,
        external_account_id: &str,
        _selected_child_id: Option<&str>,
    ) -> Result<SyncResult, PlatformSyncError> {
        let currency = self.fetch_currency(token, external_account_id).await;
        let campaigns = self
            .fetch_campaigns(token, external_account_id, &currency)
            .await?;
        let daily_metrics = self.fetch_daily_metrics(token, external_account_id).await?;

        Ok(SyncResult {
            campaigns,
            daily_metrics,
            ..SyncResult::default()
        })
    }
}

fn unwrap_envelope<T>(envelope: Envelope<T>) -> Result<T, PlatformSyncError> {
    if envelope.code != CODE_OK {
        let message = envelope.message.unwrap_or_default();
        if envelope.code == CODE_TOKEN_INVALID
            || message.to_ascii_lowercase().contains("access token")
        {
            return Err(PlatformSyncError::auth(format!(
                "TikTok access token rejected: {message}"
            )));
        }
        return Err(PlatformSyncError::provider(format!(
            "TikTok Business API error {}: {message}",
            envelope.code
        )));
    }
    envelope.data.ok_or_else(|| {
        PlatformSyncError::decode("TikTok Business API success envelope carried no data")
    })
}

fn map_envelope_decode_error(error: &reqwest::Error) -> PlatformSyncError {
    if error.is_timeout() || error.is_connect() || error.is_request() {
        map_transport_error(error)
    } else {
        PlatformSyncError::decode(format!("invalid Business API payload: {error}"))
    }
}

/// `stat_time_day` arrives as `"2026-08-01 00:00:00"`.
fn parse_stat_day(value: &str) -> Option<chrono::NaiveDate> {
    value.get(..10)?.parse().ok()
}

fn parse_metric_i64(value: Option<&str>) -> i64 {
    // Count metrics occasionally arrive with a decimal point.
    value
        .and_then(|v| v.parse::<f64>().ok())
        .map(|v| v.round() as i64)
        .unwrap_or_default()
}

fn parse_metric_f64(value: Option<&str>) -> f64 {
    value.and_then(|v| v.parse().ok()).unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ListData<T> {
    #[serde(default = "Vec::new")]
    list: Vec<T>,
    #[serde(default)]
    page_info: PageInfoDto,
}

#[derive(Debug, Default, Deserialize)]
struct PageInfoDto {
    total_page: Option<u32>,
}

impl PageInfoDto {
    fn has_more(&self, current_page: u32) -> bool {
        self.total_page.is_some_and(|total| current_page < total)
    }
}

#[derive(Debug, Deserialize)]
struct AdvertiserInfoData {
    #[serde(default = "Vec::new")]
    list: Vec<AdvertiserInfoDto>,
}

#[derive(Debug, Deserialize)]
struct AdvertiserInfoDto {
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TikTokCampaignDto {
    campaign_id: String,
    campaign_name: Option<String>,
    operation_status: Option<String>,
    budget: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ReportRowDto {
    #[serde(default)]
    dimensions: ReportDimensionsDto,
    #[serde(default)]
    metrics: ReportMetricsDto,
}

#[derive(Debug, Default, Deserialize)]
struct ReportDimensionsDto {
    campaign_id: Option<String>,
    stat_time_day: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ReportMetricsDto {
    spend: Option<String>,
    impressions: Option<String>,
    clicks: Option<String>,
    conversion: Option<String>,
    total_purchase_value: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn nonzero_code_maps_to_provider_error() {
        let envelope: Envelope<ListData<TikTokCampaignDto>> = serde_json::from_str(
            r#"{"code":40002,"message":"Advertiser not found","data":null}"#,
        )
        .expect("envelope should decode");
        let error = unwrap_envelope(envelope).expect_err("code 40002 is an error");
        assert!(matches!(error, PlatformSyncError::Provider { .. }));
    }

    #[test]
    fn token_code_maps_to_auth_error() {
        let envelope: Envelope<ListData<TikTokCampaignDto>> = serde_json::from_str(
            r#"{"code":40105,"message":"Access token is incorrect or has been revoked","data":null}"#,
        )
        .expect("envelope should decode");
        let error = unwrap_envelope(envelope).expect_err("code 40105 is an error");
        assert!(matches!(error, PlatformSyncError::Auth { .. }));
    }

    #[test]
    fn report_rows_decode_with_string_metrics() {
        let data: ListData<ReportRowDto> = serde_json::from_str(
            r#"{
                "list": [{
                    "dimensions": {"campaign_id": "123", "stat_time_day": "2026-08-01 00:00:00"},
                    "metrics": {"spend": "12.34", "impressions": "1000", "clicks": "40", "conversion": "3", "total_purchase_value": "99.5"}
                }],
                "page_info": {"page": 1, "total_page": 1}
            }"#,
        )
        .expect("report page should decode");
        let row = &data.list[0];
        assert_eq!(row.dimensions.campaign_id.as_deref(), Some("123"));
        assert_eq!(
            row.dimensions.stat_time_day.as_deref().and_then(parse_stat_day),
            Some(chrono::NaiveDate::from_ymd_opt(2026, 8, 1).expect("valid date"))
        );
        assert_eq!(parse_metric_i64(row.metrics.impressions.as_deref()), 1000);
        assert!(!data.page_info.has_more(1));
    }

    #[rstest]
    #[case(1, Some(3), true)]
    #[case(3, Some(3), false)]
    #[case(1, None, false)]
    fn pagination_stops_on_last_page(
        #[case] page: u32,
        #[case] total: Option<u32>,
        #[case] expected: bool,
    ) {
        let info = PageInfoDto { total_page: total };
        assert_eq!(info.has_more(page), expected);
    }

    #[test]
    fn fractional_count_metrics_round_to_integers() {
        assert_eq!(parse_metric_i64(Some("12.0")), 12);
        assert_eq!(parse_metric_i64(Some("not-a-number")), 0);
    }
}
