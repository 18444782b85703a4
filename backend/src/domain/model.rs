//! Canonical model for synced advertising data.
//!
//! Platform adapters translate provider-native payloads into these types at
//! the edge; everything inside the domain and the persistence layer speaks
//! this vocabulary only. Monetary fields are decimal currency units.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroizing;

/// Supported advertising platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Google,
    Meta,
    Tiktok,
    Pinterest,
}

impl Platform {
    /// Lowercase storage form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Meta => "meta",
            Self::Tiktok => "tiktok",
            Self::Pinterest => "pinterest",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an enum from its storage form fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized {kind} value: {value}")]
pub struct EnumParseError {
    kind: &'static str,
    value: String,
}

impl EnumParseError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

impl FromStr for Platform {
    type Err = EnumParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "google" => Ok(Self::Google),
            "meta" => Ok(Self::Meta),
            "tiktok" => Ok(Self::Tiktok),
            "pinterest" => Ok(Self::Pinterest),
            other => Err(EnumParseError::new("platform", other)),
        }
    }
}

/// Canonical campaign delivery status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Active,
    Paused,
    Stopped,
    Archived,
}

impl CampaignStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Archived => "archived",
        }
    }
}

/// Canonical keyword match type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordMatchType {
    Exact,
    Phrase,
    Broad,
}

impl KeywordMatchType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Phrase => "phrase",
            Self::Broad => "broad",
        }
    }
}

/// Canonical keyword serving status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordStatus {
    Enabled,
    Paused,
    Removed,
}

impl KeywordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Paused => "paused",
            Self::Removed => "removed",
        }
    }
}

/// Canonical audience classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudienceKind {
    Lookalike,
    Remarketing,
    Interest,
    Custom,
}

impl AudienceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lookalike => "lookalike",
            Self::Remarketing => "remarketing",
            Self::Interest => "interest",
            Self::Custom => "custom",
        }
    }
}

/// Lifecycle status of one synchronization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    InProgress,
    Completed,
    Failed,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for SyncStatus {
    type Err = EnumParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(EnumParseError::new("sync status", other)),
        }
    }
}

/// How a synchronization run was initiated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncTrigger {
    #[default]
    Manual,
    Scheduled,
}

impl SyncTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
        }
    }
}

impl FromStr for SyncTrigger {
    type Err = EnumParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "manual" => Ok(Self::Manual),
            "scheduled" => Ok(Self::Scheduled),
            other => Err(EnumParseError::new("sync trigger", other)),
        }
    }
}

/// A connected advertising account.
///
/// `external_account_id` is the platform-native identifier and may refer to a
/// manager (MCC) account; `selected_child_account_id`, when present, pins the
/// reporting scope to one child of that manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdAccount {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub platform: Platform,
    pub external_account_id: String,
    pub selected_child_account_id: Option<String>,
    pub is_active: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// A decrypted platform bearer credential.
///
/// The inner buffer is zeroized on drop so token material does not linger in
/// freed memory. The token never appears in `Debug` output or error text.
pub struct AccessToken(Zeroizing<String>);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Zeroizing::new(token.into()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(redacted)")
    }
}

/// A campaign as reported by a platform, already normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignDraft {
    pub external_id: String,
    pub name: String,
    pub status: CampaignStatus,
    pub budget_limit: f64,
    pub budget_used: f64,
    pub currency: String,
}

/// One day of performance for a campaign, keyword, or audience.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DailyMetricDraft {
    pub date: NaiveDate,
    pub spend: f64,
    pub impressions: i64,
    pub clicks: i64,
    pub conversions: f64,
    pub revenue: f64,
}

/// One hour of campaign performance.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyMetricDraft {
    pub hour: DateTime<Utc>,
    pub spend: f64,
    pub impressions: i64,
    pub clicks: i64,
    pub conversions: f64,
}

/// A keyword as reported by a platform, already normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordDraft {
    pub external_id: String,
    pub campaign_external_id: String,
    pub text: String,
    pub match_type: KeywordMatchType,
    pub status: KeywordStatus,
    pub quality_score: Option<i32>,
}

/// An audience as reported by a platform, already normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct AudienceDraft {
    pub external_id: String,
    pub name: String,
    pub kind: AudienceKind,
    pub size: Option<i64>,
}

/// Everything one adapter invocation produced for one account.
///
/// Metric maps are keyed by the provider-native entity id. `BTreeMap` keeps
/// iteration deterministic, which the writer relies on for stable logs and
/// the tests rely on for stable assertions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncResult {
    pub campaigns: Vec<CampaignDraft>,
    pub daily_metrics: BTreeMap<String, Vec<DailyMetricDraft>>,
    pub hourly_metrics: BTreeMap<String, Vec<HourlyMetricDraft>>,
    pub keywords: Vec<KeywordDraft>,
    pub keyword_metrics: BTreeMap<String, Vec<DailyMetricDraft>>,
    pub audiences: Vec<AudienceDraft>,
    pub audience_metrics: BTreeMap<String, Vec<DailyMetricDraft>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("google", Platform::Google)]
    #[case("meta", Platform::Meta)]
    #[case("tiktok", Platform::Tiktok)]
    #[case("pinterest", Platform::Pinterest)]
    fn platform_round_trips_through_storage_form(#[case] text: &str, #[case] platform: Platform) {
        assert_eq!(text.parse::<Platform>().expect("known platform"), platform);
        assert_eq!(platform.as_str(), text);
    }

    #[test]
    fn unknown_platform_is_rejected() {
        let err = "bing".parse::<Platform>().expect_err("unknown platform");
        assert_eq!(err.to_string(), "unrecognized platform value: bing");
    }

    #[test]
    fn access_token_debug_never_prints_the_token() {
        let token = AccessToken::new("ya29.secret-material");
        assert_eq!(format!("{token:?}"), "AccessToken(redacted)");
    }

    #[rstest]
    #[case("in_progress", SyncStatus::InProgress)]
    #[case("completed", SyncStatus::Completed)]
    #[case("failed", SyncStatus::Failed)]
    fn sync_status_round_trips(#[case] text: &str, #[case] status: SyncStatus) {
        assert_eq!(text.parse::<SyncStatus>().expect("known status"), status);
        assert_eq!(status.as_str(), text);
    }

    #[rstest]
    #[case("manual", SyncTrigger::Manual)]
    #[case("scheduled", SyncTrigger::Scheduled)]
    fn sync_trigger_round_trips(#[case] text: &str, #[case] trigger: SyncTrigger) {
        assert_eq!(text.parse::<SyncTrigger>().expect("known trigger"), trigger);
        assert_eq!(trigger.as_str(), text);
    }

    #[test]
    fn unknown_sync_trigger_is_rejected() {
        let err = "cron".parse::<SyncTrigger>().expect_err("unknown trigger");
        assert_eq!(err.to_string(), "unrecognized sync trigger value: cron");
    }
}
