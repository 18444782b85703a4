//! Provider-to-canonical normalization tables and metric aggregation.
//!
//! Every platform ships its own status and type vocabularies; the fixed
//! tables here are the single place those vocabularies meet the canonical
//! model. Unmapped values fall back to a safe default instead of being
//! dropped: `paused` for statuses, `broad` for match types, `interest` for
//! audience kinds.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::model::{
    AudienceKind, CampaignStatus, DailyMetricDraft, KeywordMatchType, KeywordStatus,
};

/// Google Ads `campaign.status` values.
pub const GOOGLE_CAMPAIGN_STATUS: &[(&str, CampaignStatus)] = &[
    ("ENABLED", CampaignStatus::Active),
    ("PAUSED", CampaignStatus::Paused),
    ("REMOVED", CampaignStatus::Stopped),
];

/// Meta Graph API campaign `status`/`effective_status` values.
pub const META_CAMPAIGN_STATUS: &[(&str, CampaignStatus)] = &[
    ("ACTIVE", CampaignStatus::Active),
    ("PAUSED", CampaignStatus::Paused),
    ("DELETED", CampaignStatus::Stopped),
    ("ARCHIVED", CampaignStatus::Archived),
];

/// TikTok `operation_status` values.
pub const TIKTOK_CAMPAIGN_STATUS: &[(&str, CampaignStatus)] = &[
    ("ENABLE", CampaignStatus::Active),
    ("DISABLE", CampaignStatus::Paused),
    ("DELETE", CampaignStatus::Stopped),
];

/// Pinterest campaign `status` values.
pub const PINTEREST_CAMPAIGN_STATUS: &[(&str, CampaignStatus)] = &[
    ("ACTIVE", CampaignStatus::Active),
    ("PAUSED", CampaignStatus::Paused),
    ("ARCHIVED", CampaignStatus::Archived),
];

/// Google Ads `ad_group_criterion.keyword.match_type` values.
pub const GOOGLE_KEYWORD_MATCH_TYPE: &[(&str, KeywordMatchType)] = &[
    ("EXACT", KeywordMatchType::Exact),
    ("PHRASE", KeywordMatchType::Phrase),
    ("BROAD", KeywordMatchType::Broad),
];

/// Google Ads `ad_group_criterion.status` values.
pub const GOOGLE_KEYWORD_STATUS: &[(&str, KeywordStatus)] = &[
    ("ENABLED", KeywordStatus::Enabled),
    ("PAUSED", KeywordStatus::Paused),
    ("REMOVED", KeywordStatus::Removed),
];

/// Google Ads `user_list.type` values.
pub const GOOGLE_AUDIENCE_KIND: &[(&str, AudienceKind)] = &[
    ("SIMILAR", AudienceKind::Lookalike),
    ("REMARKETING", AudienceKind::Remarketing),
    ("RULE_BASED", AudienceKind::Remarketing),
    ("CRM_BASED", AudienceKind::Custom),
];

/// Meta custom-audience `subtype` values.
pub const META_AUDIENCE_KIND: &[(&str, AudienceKind)] = &[
    ("LOOKALIKE", AudienceKind::Lookalike),
    ("WEBSITE", AudienceKind::Remarketing),
    ("ENGAGEMENT", AudienceKind::Remarketing),
    ("APP", AudienceKind::Remarketing),
    ("CUSTOM", AudienceKind::Custom),
];

/// Look up a campaign status; unrecognized values become `paused`.
pub fn campaign_status(table: &[(&str, CampaignStatus)], raw: &str) -> CampaignStatus {
    lookup(table, raw).unwrap_or(CampaignStatus::Paused)
}

/// Look up a keyword match type; unrecognized values become `broad`.
pub fn keyword_match_type(table: &[(&str, KeywordMatchType)], raw: &str) -> KeywordMatchType {
    lookup(table, raw).unwrap_or(KeywordMatchType::Broad)
}

/// Look up a keyword status; unrecognized values become `paused`.
pub fn keyword_status(table: &[(&str, KeywordStatus)], raw: &str) -> KeywordStatus {
    lookup(table, raw).unwrap_or(KeywordStatus::Paused)
}

/// Look up an audience kind; unrecognized values become `interest`.
pub fn audience_kind(table: &[(&str, AudienceKind)], raw: &str) -> AudienceKind {
    lookup(table, raw).unwrap_or(AudienceKind::Interest)
}

fn lookup<T: Copy>(table: &[(&str, T)], raw: &str) -> Option<T> {
    table
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(raw))
        .map(|(_, value)| *value)
}

/// Convert provider micros (Google, Pinterest analytics) into currency units.
pub fn micros_to_units(micros: i64) -> f64 {
    micros as f64 / 1_000_000.0
}

/// Convert provider cents (Meta budgets) into currency units.
pub fn cents_to_units(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Collapse raw audience metric rows into one row per (audience, date).
///
/// An audience may be targeted by several ad groups, so the reporting API
/// yields one row per (ad group, audience, date). Upserting those rows
/// individually would overwrite within one run instead of accumulating;
/// summing before the writer is the only place in the pipeline where input
/// cardinality exceeds output cardinality.
pub fn sum_audience_metrics(
    rows: impl IntoIterator<Item = (String, DailyMetricDraft)>,
) -> BTreeMap<String, Vec<DailyMetricDraft>> {
    let mut totals: BTreeMap<(String, NaiveDate), DailyMetricDraft> = BTreeMap::new();
    for (audience_id, row) in rows {
        let entry = totals
            .entry((audience_id, row.date))
            .or_insert_with(|| DailyMetricDraft {
                date: row.date,
                ..DailyMetricDraft::default()
            });
        entry.spend += row.spend;
        entry.impressions += row.impressions;
        entry.clicks += row.clicks;
        entry.conversions += row.conversions;
        entry.revenue += row.revenue;
    }

    let mut grouped: BTreeMap<String, Vec<DailyMetricDraft>> = BTreeMap::new();
    for ((audience_id, _), metric) in totals {
        grouped.entry(audience_id).or_default().push(metric);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn metric(date: &str, spend: f64, clicks: i64) -> DailyMetricDraft {
        DailyMetricDraft {
            date: date.parse().expect("valid date"),
            spend,
            impressions: clicks * 10,
            clicks,
            conversions: 1.0,
            revenue: spend * 2.0,
        }
    }

    #[rstest]
    #[case("ENABLED", CampaignStatus::Active)]
    #[case("enabled", CampaignStatus::Active)]
    #[case("REMOVED", CampaignStatus::Stopped)]
    #[case("EXPERIMENTAL_NEW_STATE", CampaignStatus::Paused)]
    fn google_campaign_status_falls_back_to_paused(
        #[case] raw: &str,
        #[case] expected: CampaignStatus,
    ) {
        assert_eq!(campaign_status(GOOGLE_CAMPAIGN_STATUS, raw), expected);
    }

    #[rstest]
    #[case("ARCHIVED", CampaignStatus::Archived)]
    #[case("WITH_ISSUES", CampaignStatus::Paused)]
    fn meta_campaign_status_maps(#[case] raw: &str, #[case] expected: CampaignStatus) {
        assert_eq!(campaign_status(META_CAMPAIGN_STATUS, raw), expected);
    }

    #[test]
    fn unknown_match_type_defaults_to_broad() {
        assert_eq!(
            keyword_match_type(GOOGLE_KEYWORD_MATCH_TYPE, "BROAD_MODIFIED"),
            KeywordMatchType::Broad
        );
    }

    #[test]
    fn unknown_audience_kind_defaults_to_interest() {
        assert_eq!(
            audience_kind(META_AUDIENCE_KIND, "BAG_OF_ACCOUNTS"),
            AudienceKind::Interest
        );
    }

    #[test]
    fn money_units_convert_from_micros_and_cents() {
        assert_eq!(micros_to_units(12_340_000), 12.34);
        assert_eq!(cents_to_units(5000), 50.0);
    }

    #[test]
    fn audience_rows_sum_per_audience_and_date() {
        let rows = vec![
            ("audA".to_owned(), metric("2024-01-01", 5.0, 3)),
            ("audA".to_owned(), metric("2024-01-01", 3.0, 2)),
            ("audA".to_owned(), metric("2024-01-02", 1.0, 1)),
            ("audB".to_owned(), metric("2024-01-01", 7.0, 4)),
        ];

        let grouped = sum_audience_metrics(rows);

        let aud_a = grouped.get("audA").expect("audA present");
        assert_eq!(aud_a.len(), 2, "one row per date after summing");
        assert_eq!(aud_a[0].spend, 8.0);
        assert_eq!(aud_a[0].clicks, 5);
        assert_eq!(aud_a[0].impressions, 50);
        assert_eq!(aud_a[0].conversions, 2.0);
        assert_eq!(aud_a[0].revenue, 16.0);
        assert_eq!(aud_a[1].spend, 1.0);

        let aud_b = grouped.get("audB").expect("audB present");
        assert_eq!(aud_b.len(), 1);
        assert_eq!(aud_b[0].spend, 7.0);
    }
}
