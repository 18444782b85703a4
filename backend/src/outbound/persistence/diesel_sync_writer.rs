//! PostgreSQL-backed `SyncWriter` implementation using Diesel ORM.
//!
//! Persists one adapter result in upsert-keyed batches so repeated runs over
//! the same reporting window converge to identical rows. Campaign and
//! campaign-metric writes are fatal; keyword and audience writes degrade to
//! a warning and skip their dependent metric rows, mirroring how those
//! fetches are non-fatal upstream.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::model::{AdAccount, SyncResult};
use crate::domain::ports::{SyncWriteError, SyncWriteSummary, SyncWriter};

use super::models::{
    AudienceMetricUpsert, AudienceUpsert, CampaignMetricUpsert, CampaignUpsert, HourlyMetricUpsert,
    KeywordMetricUpsert, KeywordUpsert,
};
use super::pool::{DbPool, PoolError};
use super::schema::{
    ad_accounts, audience_metrics, audiences, campaign_metrics, campaigns, hourly_metrics,
    keyword_metrics, keywords,
};

/// Hourly rows older than this are never written.
const HOURLY_RETENTION_DAYS: i64 = 7;

/// Diesel-backed implementation of the `SyncWriter` port.
#[derive(Clone)]
pub struct DieselSyncWriter {
    pool: DbPool,
}

impl DieselSyncWriter {
    /// Create a new writer with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> SyncWriteError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            SyncWriteError::connection(message)
        }
    }
}

fn map_diesel_error(error: diesel::result::Error) -> SyncWriteError {
    debug!(%error, "metrics store write failed");
    match error {
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::ClosedConnection,
            _,
        ) => SyncWriteError::connection("database connection error"),
        _ => SyncWriteError::write("database error"),
    }
}

/// Upsert one campaign and return its internal id.
async fn upsert_campaign(
    conn: &mut AsyncPgConnection,
    upsert: &CampaignUpsert<'_>,
) -> Result<Uuid, diesel::result::Error> {
    diesel::insert_into(campaigns::table)
        .values(upsert)
        .on_conflict((campaigns::ad_account_id, campaigns::external_campaign_id))
        .do_update()
        .set((upsert, campaigns::updated_at.eq(Utc::now())))
        .returning(campaigns::id)
        .get_result(conn)
        .await
}

#[async_trait]
impl SyncWriter for DieselSyncWriter {
    async fn write(
        &self,
        account: &AdAccount,
        result: &SyncResult,
    ) -> Result<SyncWriteSummary, SyncWriteError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let platform = account.platform.as_str();

        // Campaigns first; everything else hangs off the returned ids.
        let mut campaign_ids: BTreeMap<&str, Uuid> = BTreeMap::new();
        for campaign in &result.campaigns {
            let upsert = CampaignUpsert {
                ad_account_id: account.id,
                organization_id: account.organization_id,
                platform,
                external_campaign_id: &campaign.external_id,
                name: &campaign.name,
                status: campaign.status.as_str(),
                budget_limit: campaign.budget_limit,
                budget_used: campaign.budget_used,
                currency: &campaign.currency,
            };
            let id = upsert_campaign(&mut conn, &upsert)
                .await
                .map_err(map_diesel_error)?;
            campaign_ids.insert(campaign.external_id.as_str(), id);
        }

        for (external_id, drafts) in &result.daily_metrics {
            let Some(&campaign_id) = campaign_ids.get(external_id.as_str()) else {
                debug!(external_id, "daily metrics for unknown campaign; skipped");
                continue;
            };
            for draft in drafts {
                let upsert = CampaignMetricUpsert {
                    campaign_id,
                    date: draft.date,
                    spend: draft.spend,
                    impressions: draft.impressions,
                    clicks: draft.clicks,
                    conversions: draft.conversions,
                    revenue: draft.revenue,
                };
                diesel::insert_into(campaign_metrics::table)
                    .values(&upsert)
                    .on_conflict((campaign_metrics::campaign_id, campaign_metrics::date))
                    .do_update()
                    .set(&upsert)
                    .execute(&mut conn)
                    .await
                    .map_err(map_diesel_error)?;
            }
        }

        let hourly_cutoff = Utc::now() - Duration::days(HOURLY_RETENTION_DAYS);
        for (external_id, drafts) in &result.hourly_metrics {
            let Some(&campaign_id) = campaign_ids.get(external_id.as_str()) else {
                debug!(external_id, "hourly metrics for unknown campaign; skipped");
                continue;
            };
            for draft in drafts.iter().filter(|draft| draft.hour >= hourly_cutoff) {
                let upsert = HourlyMetricUpsert {
                    campaign_id,
                    hour: draft.hour,
                    spend: draft.spend,
                    impressions: draft.impressions,
                    clicks: draft.clicks,
                    conversions: draft.conversions,
                };
                diesel::insert_into(hourly_metrics::table)
                    .values(&upsert)
                    .on_conflict((hourly_metrics::campaign_id, hourly_metrics::hour))
                    .do_update()
                    .set(&upsert)
                    .execute(&mut conn)
                    .await
                    .map_err(map_diesel_error)?;
            }
        }

        // Keywords and audiences degrade per entity rather than failing the
        // run; a skipped entity also skips its metric rows.
        let mut keyword_ids: BTreeMap<&str, Uuid> = BTreeMap::new();
        let mut keywords_synced = 0usize;
        for keyword in &result.keywords {
            let Some(&campaign_id) = campaign_ids.get(keyword.campaign_external_id.as_str())
            else {
                warn!(
                    external_keyword_id = %keyword.external_id,
                    campaign_external_id = %keyword.campaign_external_id,
                    "keyword references unknown campaign; skipped"
                );
                continue;
            };
            let upsert = KeywordUpsert {
                ad_account_id: account.id,
                organization_id: account.organization_id,
                campaign_id,
                platform,
                external_keyword_id: &keyword.external_id,
                text: &keyword.text,
                match_type: keyword.match_type.as_str(),
                status: keyword.status.as_str(),
                quality_score: keyword.quality_score,
            };
            let stored: Result<Uuid, _> = diesel::insert_into(keywords::table)
                .values(&upsert)
                .on_conflict((keywords::ad_account_id, keywords::external_keyword_id))
                .do_update()
                .set(&upsert)
                .returning(keywords::id)
                .get_result(&mut conn)
                .await;
            match stored {
                Ok(id) => {
                    keyword_ids.insert(keyword.external_id.as_str(), id);
                    keywords_synced += 1;
                }
                Err(error) => {
                    warn!(
                        external_keyword_id = %keyword.external_id,
                        %error,
                        "keyword upsert failed; skipped"
                    );
                }
            }
        }

        for (external_id, drafts) in &result.keyword_metrics {
            let Some(&keyword_id) = keyword_ids.get(external_id.as_str()) else {
                continue;
            };
            for draft in drafts {
                let upsert = KeywordMetricUpsert {
                    keyword_id,
                    date: draft.date,
                    spend: draft.spend,
                    impressions: draft.impressions,
                    clicks: draft.clicks,
                    conversions: draft.conversions,
                    revenue: draft.revenue,
                };
                let written = diesel::insert_into(keyword_metrics::table)
                    .values(&upsert)
                    .on_conflict((keyword_metrics::keyword_id, keyword_metrics::date))
                    .do_update()
                    .set(&upsert)
                    .execute(&mut conn)
                    .await;
                if let Err(error) = written {
                    warn!(external_id, %error, "keyword metric upsert failed; skipped");
                }
            }
        }

        let mut audience_ids: BTreeMap<&str, Uuid> = BTreeMap::new();
        let mut audiences_synced = 0usize;
        for audience in &result.audiences {
            let upsert = AudienceUpsert {
                ad_account_id: account.id,
                organization_id: account.organization_id,
                platform,
                external_audience_id: &audience.external_id,
                name: &audience.name,
                audience_type: audience.kind.as_str(),
                size: audience.size,
            };
            let stored: Result<Uuid, _> = diesel::insert_into(audiences::table)
                .values(&upsert)
                .on_conflict((audiences::ad_account_id, audiences::external_audience_id))
                .do_update()
                .set(&upsert)
                .returning(audiences::id)
                .get_result(&mut conn)
                .await;
            match stored {
                Ok(id) => {
                    audience_ids.insert(audience.external_id.as_str(), id);
                    audiences_synced += 1;
                }
                Err(error) => {
                    warn!(
                        external_audience_id = %audience.external_id,
                        %error,
                        "audience upsert failed; skipped"
                    );
                }
            }
        }

        for (external_id, drafts) in &result.audience_metrics {
            let Some(&audience_id) = audience_ids.get(external_id.as_str()) else {
                continue;
            };
            for draft in drafts {
                let upsert = AudienceMetricUpsert {
                    audience_id,
                    date: draft.date,
                    spend: draft.spend,
                    impressions: draft.impressions,
                    clicks: draft.clicks,
                    conversions: draft.conversions,
                    revenue: draft.revenue,
                };
                let written = diesel::insert_into(audience_metrics::table)
                    .values(&upsert)
                    .on_conflict((audience_metrics::audience_id, audience_metrics::date))
                    .do_update()
                    .set(&upsert)
                    .execute(&mut conn)
                    .await;
                if let Err(error) = written {
                    warn!(external_id, %error, "audience metric upsert failed; skipped");
                }
            }
        }

        // The stamp marks the run visible to operators even when nothing
        // changed upstream.
        let now = Utc::now();
        diesel::update(ad_accounts::table.filter(ad_accounts::id.eq(account.id)))
            .set((
                ad_accounts::last_synced_at.eq(Some(now)),
                ad_accounts::updated_at.eq(now),
            ))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(SyncWriteSummary {
            campaigns_synced: result.campaigns.len(),
            keywords_synced,
            audiences_synced,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn pool_error_maps_to_connection_error() {
        let err = map_pool_error(PoolError::checkout("connection refused"));

        assert!(matches!(err, SyncWriteError::Connection { .. }));
        assert!(err.to_string().contains("connection refused"));
    }

    #[rstest]
    fn generic_diesel_error_maps_to_write_error() {
        let err = map_diesel_error(diesel::result::Error::NotFound);

        assert!(matches!(err, SyncWriteError::Write { .. }));
    }
}
