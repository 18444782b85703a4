//! Reqwest-backed Pinterest Ads API adapter.
//!
//! Plain bearer auth against the v5 REST surface. Listings paginate with an
//! opaque `bookmark` token; analytics is a one-shot call per chunk of
//! campaign ids with SCREAMING_SNAKE column names. Spend caps arrive in
//! micro-currency. The surface has no hourly reporting, keywords, or
//! audience listings.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::domain::model::{AccessToken, CampaignDraft, DailyMetricDraft, Platform, SyncResult};
use crate::domain::normalize::{self, PINTEREST_CAMPAIGN_STATUS, micros_to_units};
use crate::domain::ports::{PlatformAdapter, PlatformSyncError};

use super::support::{DEFAULT_REQUEST_TIMEOUT, body_preview, daily_window, map_transport_error};

const PAGE_SIZE: u32 = 100;

/// Analytics accepts at most this many campaign ids per call.
const ANALYTICS_CHUNK: usize = 100;

const ANALYTICS_COLUMNS: &str =
    "SPEND_IN_DOLLAR,IMPRESSION_2,CLICKTHROUGH_2,TOTAL_CONVERSIONS,TOTAL_CHECKOUT_VALUE_IN_MICRO_DOLLAR";

/// Pinterest Ads API adapter.
pub struct PinterestAdsAdapter {
    client: Client,
    base_url: Url,
}

impl PinterestAdsAdapter {
    /// Build an adapter with the default bounded request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(base_url: Url) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(DEFAULT_REQUEST_TIMEOUT).build()?;
        Ok(Self { client, base_url })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        token: &AccessToken,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, PlatformSyncError> {
        let url = self.base_url.join(path).map_err(|error| {
            PlatformSyncError::decode(format!("invalid Pinterest API URL: {error}"))
        })?;
        let response = self
            .client
            .get(url)
            .bearer_auth(token.as_str())
            .query(params)
            .send()
            .await
            .map_err(|error| map_transport_error(&error))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|error| map_transport_error(&error))?;

        if !status.is_success() {
            return Err(map_api_error(status, &bytes));
        }
        serde_json::from_slice(&bytes).map_err(|error| {
            PlatformSyncError::decode(format!("invalid Pinterest API payload: {error}"))
        })
    }

    /// Ad-account currency; best effort, never fatal.
    async fn fetch_currency(&self, token: &AccessToken, ad_account_id: &str) -> String {
        let result: Result<AdAccountDto, _> = self
            .get_json(token, &format!("v5/ad_accounts/{ad_account_id}"), &[])
            .await;
        match result {
            Ok(account) => account.currency.unwrap_or_else(|| "USD".to_owned()),
            Err(error) => {
                tracing::warn!(%error, "Pinterest currency lookup failed; using fallback");
                "USD".to_owned()
            }
        }
    }

    async fn fetch_campaigns(
        &self,
        token: &AccessToken,
        ad_account_id: &str,
        currency: &str,
    ) -> Result<Vec<CampaignDraft>, PlatformSyncError> {
        let path = format!("v5/ad_accounts/{ad_account_id}/campaigns");
        let mut campaigns = Vec::new();
        let mut bookmark: Option<String> = None;
        loop {
            let mut params = vec![("page_size", PAGE_SIZE.to_string())];
            if let Some(cursor) = &bookmark {
                params.push(("bookmark", cursor.clone()));
            }
            let page: PageDto<PinterestCampaignDto> =
                self.get_json(token, &path, &params).await?;
            campaigns.extend(page.items.into_iter().map(|row| {
                let budget_limit = micros_to_units(spend_cap(&row));
                CampaignDraft {
                    external_id: row.id,
                    name: row.name.unwrap_or_default(),
                    status: normalize::campaign_status(
                        PINTEREST_CAMPAIGN_STATUS,
                        row.status.as_deref().unwrap_or_default(),
                    ),
                    budget_limit,
                    // Spend comes from analytics, never the campaign object.
                    budget_used: 0.0,
                    currency: currency.to_owned(),
                }
            }));
            bookmark = page.bookmark.filter(|b| !b.is_empty());
            if bookmark.is_none() {
                return Ok(campaigns);
            }
        }
    }

    async fn fetch_daily_metrics(
        &self,
        token: &AccessToken,
        ad_account_id: &str,
        campaign_ids: &[String],
    ) -> Result<BTreeMap<String, Vec<DailyMetricDraft>>, PlatformSyncError> {
        let (since, until) = daily_window(Utc::now().date_naive());
        let path = format!("v5/ad_accounts/{ad_account_id}/campaigns/analytics");
        let mut metrics: BTreeMap<String, Vec<DailyMetricDraft>> = BTreeMap::new();
        for chunk in campaign_ids.chunks(ANALYTICS_CHUNK) {
            let rows: Vec<AnalyticsRowDto> = self
                .get_json(
                    token,
                    &path,
                    &[
                        ("campaign_ids", chunk.join(",")),
                        ("start_date", since.to_string()),
                        ("end_date", until.to_string()),
                        ("granularity", "DAY".to_owned()),
                        ("columns", ANALYTICS_COLUMNS.to_owned()),
                    ],
                )
                .await?;
            for row in rows {
                let Some(campaign_id) = row.campaign_id.as_ref().map(IdDto::canonical) else {
                    continue;
                };
                let Some(date) = row.date.as_deref().and_then(|d| d.parse().ok()) else {
                    continue;
                };
                metrics.entry(campaign_id).or_default().push(DailyMetricDraft {
                    date,
                    spend: row.spend_in_dollar.unwrap_or_default(),
                    impressions: row.impression_2.unwrap_or_default(),
                    clicks: row.clickthrough_2.unwrap_or_default(),
                    conversions: row.total_conversions.unwrap_or_default(),
                    revenue: micros_to_units(
                        row.total_checkout_value_in_micro_dollar.unwrap_or_default(),
                    ),
                });
            }
        }
        Ok(metrics)
    }
}

#[async_trait]
impl PlatformAdapter for PinterestAdsAdapter {
    fn platform(&self) -> Platform {
        Platform::Pinterest
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
        let campaign_ids: Vec<String> = campaigns
            .iter()
            .map(|campaign| campaign.external_id.clone())
            .collect();
        let daily_metrics = self
            .fetch_daily_metrics(token, external_account_id, &campaign_ids)
            .await?;

        Ok(SyncResult {
            campaigns,
            daily_metrics,
            ..SyncResult::default()
        })
    }
}

/// Lifetime cap wins when both caps are set, mirroring how Pinterest
/// enforces them.
fn spend_cap(row: &PinterestCampaignDto) -> i64 {
    row.lifetime_spend_cap
        .filter(|cap| *cap > 0)
        .or(row.daily_spend_cap)
        .unwrap_or_default()
}

fn map_api_error(status: reqwest::StatusCode, body: &[u8]) -> PlatformSyncError {
    let message = serde_json::from_slice::<ApiErrorDto>(body)
        .ok()
        .and_then(|error| error.message)
        .unwrap_or_else(|| body_preview(body));
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return PlatformSyncError::auth(format!("Pinterest access token rejected: {message}"));
    }
    PlatformSyncError::provider(format!(
        "Pinterest Ads API error: status {}: {message}",
        status.as_u16()
    ))
}

#[derive(Debug, Deserialize)]
struct PageDto<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    bookmark: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdAccountDto {
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PinterestCampaignDto {
    id: String,
    name: Option<String>,
    status: Option<String>,
    daily_spend_cap: Option<i64>,
    lifetime_spend_cap: Option<i64>,
}

/// Analytics echoes campaign ids as either strings or numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdDto {
    Text(String),
    Number(i64),
}

impl IdDto {
    fn canonical(&self) -> String {
        match self {
            Self::Text(id) => id.clone(),
            Self::Number(id) => id.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnalyticsRowDto {
    #[serde(rename = "CAMPAIGN_ID")]
    campaign_id: Option<IdDto>,
    #[serde(rename = "DATE")]
    date: Option<String>,
    #[serde(rename = "SPEND_IN_DOLLAR")]
    spend_in_dollar: Option<f64>,
    #[serde(rename = "IMPRESSION_2")]
    impression_2: Option<i64>,
    #[serde(rename = "CLICKTHROUGH_2")]
    clickthrough_2: Option<i64>,
    #[serde(rename = "TOTAL_CONVERSIONS")]
    total_conversions: Option<f64>,
    #[serde(rename = "TOTAL_CHECKOUT_VALUE_IN_MICRO_DOLLAR")]
    total_checkout_value_in_micro_dollar: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDto {
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some(500_000_000), Some(2_000_000_000), 2000.0)]
    #[case(Some(500_000_000), None, 500.0)]
    #[case(Some(500_000_000), Some(0), 500.0)]
    #[case(None, None, 0.0)]
    fn spend_cap_prefers_lifetime(
        #[case] daily: Option<i64>,
        #[case] lifetime: Option<i64>,
        #[case] expected_units: f64,
    ) {
        let row = PinterestCampaignDto {
            id: "1".to_owned(),
            name: None,
            status: None,
            daily_spend_cap: daily,
            lifetime_spend_cap: lifetime,
        };
        assert_eq!(micros_to_units(spend_cap(&row)), expected_units);
    }

    #[test]
    fn analytics_rows_decode_screaming_snake_columns() {
        let rows: Vec<AnalyticsRowDto> = serde_json::from_str(
            r#"[{
                "CAMPAIGN_ID": 549755885175,
                "DATE": "2026-08-01",
                "SPEND_IN_DOLLAR": 12.5,
                "IMPRESSION_2": 1000,
                "CLICKTHROUGH_2": 40,
                "TOTAL_CONVERSIONS": 3.0,
                "TOTAL_CHECKOUT_VALUE_IN_MICRO_DOLLAR": 99500000
            }]"#,
        )
        .expect("analytics rows should decode");
        let row = &rows[0];
        assert_eq!(
            row.campaign_id.as_ref().map(IdDto::canonical).as_deref(),
            Some("549755885175")
        );
        assert_eq!(
            micros_to_units(row.total_checkout_value_in_micro_dollar.unwrap_or_default()),
            99.5
        );
    }

    #[test]
    fn unauthorized_maps_to_auth_error() {
        let body = br#"{"code":2,"message":"Authentication failed."}"#;
        let error = map_api_error(reqwest::StatusCode::UNAUTHORIZED, body);
        assert!(matches!(error, PlatformSyncError::Auth { .. }));
    }

    #[test]
    fn empty_bookmark_ends_pagination() {
        let page: PageDto<PinterestCampaignDto> =
            serde_json::from_str(r#"{"items": [], "bookmark": ""}"#).expect("page should decode");
        assert!(page.bookmark.filter(|b| !b.is_empty()).is_none());
    }
}
