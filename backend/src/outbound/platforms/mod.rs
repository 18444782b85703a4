//! Outbound adapters for the four advertising platforms.
//!
//! Each adapter owns its own HTTP client and implements
//! [`PlatformAdapter`](crate::domain::ports::PlatformAdapter) for one
//! provider. [`build_adapters`] assembles the full registry from resolved
//! endpoints.

pub mod google;
pub mod meta;
pub mod pinterest;
mod support;
pub mod tiktok;
pub mod verifier;

use std::sync::Arc;

use url::Url;

use crate::domain::ports::PlatformAdapter;

use self::google::GoogleAdsAdapter;
use self::meta::MetaAdsAdapter;
use self::pinterest::PinterestAdsAdapter;
use self::tiktok::TikTokAdsAdapter;

/// Resolved base URLs plus per-platform credentials for the adapter set.
#[derive(Debug, Clone)]
pub struct PlatformEndpoints {
    pub google_base: Url,
    pub google_developer_token: String,
    pub meta_base: Url,
    pub tiktok_base: Url,
    pub pinterest_base: Url,
}

/// Construct one adapter per supported platform.
///
/// # Errors
///
/// Returns an error when any underlying HTTP client cannot be constructed.
pub fn build_adapters(
    endpoints: PlatformEndpoints,
) -> Result<Vec<Arc<dyn PlatformAdapter>>, reqwest::Error> {
    Ok(vec![
        Arc::new(GoogleAdsAdapter::new(
            endpoints.google_base,
            endpoints.google_developer_token,
        )?),
        Arc::new(MetaAdsAdapter::new(endpoints.meta_base)?),
        Arc::new(TikTokAdsAdapter::new(endpoints.tiktok_base)?),
        Arc::new(PinterestAdsAdapter::new(endpoints.pinterest_base)?),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Platform;

    #[test]
    fn registry_covers_every_platform() {
        let endpoints = PlatformEndpoints {
            google_base: Url::parse("https://googleads.googleapis.com/").expect("valid URL"),
            google_developer_token: "dev-token".to_owned(),
            meta_base: Url::parse("https://graph.facebook.com/").expect("valid URL"),
            tiktok_base: Url::parse("https://business-api.tiktok.com/open_api/")
                .expect("valid URL"),
            pinterest_base: Url::parse("https://api.pinterest.com/").expect("valid URL"),
        };
        let adapters = build_adapters(endpoints).expect("adapters should build");
        let platforms: Vec<Platform> = adapters.iter().map(|a| a.platform()).collect();
        assert_eq!(
            platforms,
            vec![
                Platform::Google,
                Platform::Meta,
                Platform::Tiktok,
                Platform::Pinterest
            ]
        );
    }
}
