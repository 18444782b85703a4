//! Shared transport helpers for the platform adapters.
//!
//! Each adapter owns its provider's auth convention, pagination, and payload
//! shapes, but timeout handling, reporting windows, error previews, and the
//! non-fatal sub-fetch wrapper are identical across all four.

use std::future::Future;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::warn;

use crate::domain::ports::PlatformSyncError;

/// Bounded timeout applied to every outbound platform request.
pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Daily metrics cover today plus this many preceding days.
pub(crate) const DAILY_WINDOW_DAYS: i64 = 30;

/// Hourly metrics cover today plus this many preceding days (where the
/// platform supports hourly reporting at all).
pub(crate) const HOURLY_WINDOW_DAYS: i64 = 7;

/// Inclusive (start, end) dates for the daily reporting window. Both ends
/// count, so the window holds `DAILY_WINDOW_DAYS + 1` dates including today.
pub(crate) fn daily_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    (today - chrono::Duration::days(DAILY_WINDOW_DAYS), today)
}

/// Inclusive (start, end) dates for the hourly reporting window.
pub(crate) fn hourly_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    (today - chrono::Duration::days(HOURLY_WINDOW_DAYS), today)
}

/// Map a reqwest failure into the adapter error taxonomy.
pub(crate) fn map_transport_error(error: &reqwest::Error) -> PlatformSyncError {
    if error.is_timeout() {
        PlatformSyncError::timeout(error.to_string())
    } else {
        PlatformSyncError::transport(error.to_string())
    }
}

/// Compact, bounded preview of a provider error body for messages and logs.
pub(crate) fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

/// Run a sub-fetch whose failure must not abort the sync.
///
/// Keywords, audiences, and their metrics are enrichment: when such a fetch
/// fails the adapter logs a warning and carries on with an empty value, so
/// campaigns and their daily/hourly metrics still land.
pub(crate) async fn non_fatal<T, F>(platform: &'static str, what: &'static str, fetch: F) -> T
where
    T: Default,
    F: Future<Output = Result<T, PlatformSyncError>>,
{
    match fetch.await {
        Ok(value) => value,
        Err(error) => {
            warn!(platform, what, %error, "non-fatal sub-fetch failed; continuing with empty result");
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn non_fatal_substitutes_default_on_error() {
        let fetched: Vec<u8> = non_fatal("meta", "audiences", async {
            Err(PlatformSyncError::transport("connection reset"))
        })
        .await;
        assert!(fetched.is_empty());
    }

    #[tokio::test]
    async fn non_fatal_passes_through_success() {
        let fetched: Vec<u8> = non_fatal("meta", "audiences", async { Ok(vec![1, 2]) }).await;
        assert_eq!(fetched, vec![1, 2]);
    }

    #[test]
    fn body_preview_is_bounded_and_whitespace_collapsed() {
        let long = format!("{{\"error\": \"{}\"}}", "x ".repeat(400));
        let preview = body_preview(long.as_bytes());
        assert!(preview.chars().count() <= 163);
        assert!(preview.ends_with("..."));
        assert!(!preview.contains("  "));
    }

    #[test]
    fn daily_window_includes_today_and_thirty_preceding_days() {
        let today: NaiveDate = "2024-03-31".parse().expect("valid date");
        let (start, end) = daily_window(today);
        assert_eq!(start, "2024-03-01".parse::<NaiveDate>().expect("valid date"));
        assert_eq!(end, today);
        assert_eq!((end - start).num_days(), DAILY_WINDOW_DAYS);
    }
}
