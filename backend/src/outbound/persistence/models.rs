//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. They exist solely to satisfy Diesel's
//! type requirements for queries and mutations.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::schema::{
    ad_accounts, audience_metrics, audiences, campaign_metrics, campaigns, hourly_metrics,
    keyword_metrics, keywords, sync_logs,
};

/// Row struct for reading from the ad_accounts table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = ad_accounts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct AdAccountRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub platform: String,
    pub external_account_id: String,
    pub selected_child_account_id: Option<String>,
    pub is_active: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Insertable struct for opening a new sync log.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = sync_logs)]
pub(crate) struct NewSyncLogRow<'a> {
    pub organization_id: Uuid,
    pub ad_account_id: Uuid,
    pub status: &'a str,
    pub triggered_by: &'a str,
}

/// Insertable/changeset struct for the campaign upsert.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = campaigns)]
pub(crate) struct CampaignUpsert<'a> {
    pub ad_account_id: Uuid,
    pub organization_id: Uuid,
    pub platform: &'a str,
    pub external_campaign_id: &'a str,
    pub name: &'a str,
    pub status: &'a str,
    pub budget_limit: f64,
    pub budget_used: f64,
    pub currency: &'a str,
}

/// Insertable/changeset struct for the daily campaign metric upsert.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = campaign_metrics)]
pub(crate) struct CampaignMetricUpsert {
    pub campaign_id: Uuid,
    pub date: NaiveDate,
    pub spend: f64,
    pub impressions: i64,
    pub clicks: i64,
    pub conversions: f64,
    pub revenue: f64,
}

/// Insertable/changeset struct for the hourly campaign metric upsert.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = hourly_metrics)]
pub(crate) struct HourlyMetricUpsert {
    pub campaign_id: Uuid,
    pub hour: DateTime<Utc>,
    pub spend: f64,
    pub impressions: i64,
    pub clicks: i64,
    pub conversions: f64,
}

/// Insertable/changeset struct for the keyword upsert.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = keywords)]
pub(crate) struct KeywordUpsert<'a> {
    pub ad_account_id: Uuid,
    pub organization_id: Uuid,
    pub campaign_id: Uuid,
    pub platform: &'a str,
    pub external_keyword_id: &'a str,
    pub text: &'a str,
    pub match_type: &'a str,
    pub status: &'a str,
    pub quality_score: Option<i32>,
}

/// Insertable/changeset struct for the daily keyword metric upsert.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = keyword_metrics)]
pub(crate) struct KeywordMetricUpsert {
    pub keyword_id: Uuid,
    pub date: NaiveDate,
    pub spend: f64,
    pub impressions: i64,
    pub clicks: i64,
    pub conversions: f64,
    pub revenue: f64,
}

/// Insertable/changeset struct for the audience upsert.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = audiences)]
pub(crate) struct AudienceUpsert<'a> {
    pub ad_account_id: Uuid,
    pub organization_id: Uuid,
    pub platform: &'a str,
    pub external_audience_id: &'a str,
    pub name: &'a str,
    pub audience_type: &'a str,
    pub size: Option<i64>,
}

/// Insertable/changeset struct for the daily audience metric upsert.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = audience_metrics)]
pub(crate) struct AudienceMetricUpsert {
    pub audience_id: Uuid,
    pub date: NaiveDate,
    pub spend: f64,
    pub impressions: i64,
    pub clicks: i64,
    pub conversions: f64,
    pub revenue: f64,
}
