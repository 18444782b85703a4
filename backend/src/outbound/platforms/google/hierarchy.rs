//! Account-hierarchy resolution for Google Ads.
//!
//! A stored external account id may point at a manager (MCC) account, which
//! runs no campaigns of its own. Reporting queries need a concrete child
//! customer id, with the manager id passed as the `login-customer-id`
//! header. Resolution is deliberately lenient at the edges: a failed manager
//! probe degrades to the direct-account assumption and a failed currency
//! lookup falls back to the base currency, because neither should sink an
//! otherwise healthy sync.

use tracing::warn;

use crate::domain::model::AccessToken;
use crate::domain::ports::PlatformSyncError;

use super::{CustomerClientDto, GoogleAdsAdapter, SearchRow};

/// Currency used when detection fails.
const FALLBACK_CURRENCY: &str = "USD";

/// A fully resolved reporting scope for one sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct ReportingScope {
    /// Concrete, non-manager customer id all reporting queries target.
    pub customer_id: String,
    /// Manager id sent as `login-customer-id` when acting on behalf of one.
    pub login_customer_id: Option<String>,
    /// Detected account currency.
    pub currency: String,
}

/// Resolve the stored account id into a concrete reporting scope.
pub(super) async fn resolve_scope(
    adapter: &GoogleAdsAdapter,
    token: &AccessToken,
    external_account_id: &str,
    selected_child_id: Option<&str>,
) -> Result<ReportingScope, PlatformSyncError> {
    let base_id = match normalize_customer_id(external_account_id) {
        Some(id) => id,
        None => {
            // Stale local state: the stored id is not a customer id at all.
            warn!(
                external_account_id,
                "stored id is not a Google Ads customer id; falling back to first accessible account"
            );
            adapter
                .list_accessible_customers(token)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    PlatformSyncError::provider(
                        "the authorized Google login has no accessible Google Ads accounts",
                    )
                })?
        }
    };

    // An explicit child selection skips auto-resolution entirely; the base
    // id becomes the acting-as manager.
    if let Some(child) = selected_child_id {
        let child_id = normalize_customer_id(child).unwrap_or_else(|| child.to_owned());
        let mut scope = ReportingScope {
            customer_id: child_id,
            login_customer_id: Some(base_id),
            currency: FALLBACK_CURRENCY.to_owned(),
        };
        scope.currency = detect_currency(adapter, token, &scope).await;
        return Ok(scope);
    }

    let mut scope = match probe_manager(adapter, token, &base_id).await {
        Some(true) => {
            let child = first_enabled_child(adapter, token, &base_id).await?;
            ReportingScope {
                customer_id: child,
                login_customer_id: Some(base_id),
                currency: FALLBACK_CURRENCY.to_owned(),
            }
        }
        // Probe said "not a manager", or the probe itself failed and we
        // assume a direct account rather than hard-failing the sync.
        _ => ReportingScope {
            customer_id: base_id,
            login_customer_id: None,
            currency: FALLBACK_CURRENCY.to_owned(),
        },
    };
    scope.currency = detect_currency(adapter, token, &scope).await;
    Ok(scope)
}

/// Is the base account a manager? `None` when the probe itself failed.
async fn probe_manager(
    adapter: &GoogleAdsAdapter,
    token: &AccessToken,
    customer_id: &str,
) -> Option<bool> {
    let query = "SELECT customer.manager FROM customer";
    match adapter
        .search_customer(token, customer_id, None, query)
        .await
    {
        Ok(rows) => Some(
            rows.first()
                .and_then(|row| row.customer.as_ref())
                .and_then(|customer| customer.manager)
                .unwrap_or(false),
        ),
        Err(error) => {
            warn!(customer_id, %error, "manager probe failed; assuming direct account");
            None
        }
    }
}

/// First `ENABLED`, non-manager, level-1 child of a manager account.
async fn first_enabled_child(
    adapter: &GoogleAdsAdapter,
    token: &AccessToken,
    manager_id: &str,
) -> Result<String, PlatformSyncError> {
    let query = "SELECT customer_client.id, customer_client.level, \
                 customer_client.manager, customer_client.status \
                 FROM customer_client WHERE customer_client.level = 1";
    let rows = adapter
        .search_customer(token, manager_id, None, query)
        .await?;
    pick_enabled_child(&rows).ok_or_else(|| {
        PlatformSyncError::provider(format!(
            "manager account {manager_id} has no active client accounts to report on"
        ))
    })
}

fn pick_enabled_child(rows: &[SearchRow]) -> Option<String> {
    rows.iter()
        .filter_map(|row| row.customer_client.as_ref())
        .filter(|client| is_reportable_child(client))
        .find_map(|client| client.id.clone())
}

fn is_reportable_child(client: &CustomerClientDto) -> bool {
    let enabled = client.status.as_deref() == Some("ENABLED");
    let manager = client.manager.unwrap_or(false);
    enabled && !manager
}

/// Best-effort currency detection; never fatal.
async fn detect_currency(
    adapter: &GoogleAdsAdapter,
    token: &AccessToken,
    scope: &ReportingScope,
) -> String {
    let query = "SELECT customer.currency_code FROM customer";
    match adapter
        .search_customer(
            token,
            &scope.customer_id,
            scope.login_customer_id.as_deref(),
            query,
        )
        .await
    {
        Ok(rows) => rows
            .first()
            .and_then(|row| row.customer.as_ref())
            .and_then(|customer| customer.currency_code.clone())
            .unwrap_or_else(|| FALLBACK_CURRENCY.to_owned()),
        Err(error) => {
            warn!(customer_id = %scope.customer_id, %error, "currency lookup failed; using fallback");
            FALLBACK_CURRENCY.to_owned()
        }
    }
}

/// Strip dashes and validate the ten-digit customer id format.
fn normalize_customer_id(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| *c != '-').collect();
    (digits.len() == 10 && digits.chars().all(|c| c.is_ascii_digit())).then_some(digits)
}
