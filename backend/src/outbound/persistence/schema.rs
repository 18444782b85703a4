//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match the database migrations exactly. They are
//! used by Diesel for compile-time query validation and type-safe SQL
//! generation. Regenerate with `diesel print-schema` when migrations change.

diesel::table! {
    /// Connected advertising accounts, one row per platform account.
    ad_accounts (id) {
        id -> Uuid,
        organization_id -> Uuid,
        platform -> Varchar,
        external_account_id -> Varchar,
        selected_child_account_id -> Nullable<Varchar>,
        is_active -> Bool,
        last_synced_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Encrypted platform credentials, one row per account.
    ad_account_credentials (id) {
        id -> Uuid,
        ad_account_id -> Uuid,
        encrypted_access_token -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Audit record of synchronization attempts.
    sync_logs (id) {
        id -> Uuid,
        organization_id -> Uuid,
        ad_account_id -> Uuid,
        status -> Varchar,
        error_message -> Nullable<Text>,
        triggered_by -> Varchar,
        started_at -> Timestamptz,
        completed_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Campaigns, upsert-keyed by (ad_account_id, external_campaign_id).
    campaigns (id) {
        id -> Uuid,
        ad_account_id -> Uuid,
        organization_id -> Uuid,
        platform -> Varchar,
        external_campaign_id -> Varchar,
        name -> Varchar,
        status -> Varchar,
        budget_limit -> Double,
        budget_used -> Double,
        currency -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Daily campaign performance, upsert-keyed by (campaign_id, date).
    campaign_metrics (id) {
        id -> Uuid,
        campaign_id -> Uuid,
        date -> Date,
        spend -> Double,
        impressions -> Int8,
        clicks -> Int8,
        conversions -> Double,
        revenue -> Double,
    }
}

diesel::table! {
    /// Hourly campaign performance, upsert-keyed by (campaign_id, hour).
    hourly_metrics (id) {
        id -> Uuid,
        campaign_id -> Uuid,
        hour -> Timestamptz,
        spend -> Double,
        impressions -> Int8,
        clicks -> Int8,
        conversions -> Double,
    }
}

diesel::table! {
    /// Keywords, upsert-keyed by (ad_account_id, external_keyword_id).
    keywords (id) {
        id -> Uuid,
        ad_account_id -> Uuid,
        organization_id -> Uuid,
        campaign_id -> Uuid,
        platform -> Varchar,
        external_keyword_id -> Varchar,
        text -> Varchar,
        match_type -> Varchar,
        status -> Varchar,
        quality_score -> Nullable<Int4>,
    }
}

diesel::table! {
    /// Daily keyword performance, upsert-keyed by (keyword_id, date).
    keyword_metrics (id) {
        id -> Uuid,
        keyword_id -> Uuid,
        date -> Date,
        spend -> Double,
        impressions -> Int8,
        clicks -> Int8,
        conversions -> Double,
        revenue -> Double,
    }
}

diesel::table! {
    /// Audiences, upsert-keyed by (ad_account_id, external_audience_id).
    audiences (id) {
        id -> Uuid,
        ad_account_id -> Uuid,
        organization_id -> Uuid,
        platform -> Varchar,
        external_audience_id -> Varchar,
        name -> Varchar,
        audience_type -> Varchar,
        size -> Nullable<Int8>,
    }
}

diesel::table! {
    /// Daily audience performance, upsert-keyed by (audience_id, date).
    audience_metrics (id) {
        id -> Uuid,
        audience_id -> Uuid,
        date -> Date,
        spend -> Double,
        impressions -> Int8,
        clicks -> Int8,
        conversions -> Double,
        revenue -> Double,
    }
}

diesel::joinable!(ad_account_credentials -> ad_accounts (ad_account_id));
diesel::joinable!(sync_logs -> ad_accounts (ad_account_id));
diesel::joinable!(campaigns -> ad_accounts (ad_account_id));
diesel::joinable!(campaign_metrics -> campaigns (campaign_id));
diesel::joinable!(hourly_metrics -> campaigns (campaign_id));
diesel::joinable!(keywords -> campaigns (campaign_id));
diesel::joinable!(keyword_metrics -> keywords (keyword_id));
diesel::joinable!(audience_metrics -> audiences (audience_id));

diesel::allow_tables_to_appear_in_same_query!(
    ad_accounts,
    ad_account_credentials,
    sync_logs,
    campaigns,
    campaign_metrics,
    hourly_metrics,
    keywords,
    keyword_metrics,
    audiences,
    audience_metrics,
);
