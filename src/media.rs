// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

//! Read-URL issuance for post media. Object storage lives elsewhere; this
//! crate only decides whether a viewer may receive a URL.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::MediaConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedRead {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

pub trait MediaSigner: Send + Sync + 'static {
    fn presign_read(&self, media_key: &str) -> anyhow::Result<PresignedRead>;
}

/// Issues URLs under a fixed base with an `expires` query parameter. The
/// storage gateway in front of the bucket enforces the expiry.
#[derive(Debug, Clone)]
pub struct UrlPrefixSigner {
    base_url: String,
    ttl: Duration,
}

impl UrlPrefixSigner {
    pub fn new(base_url: impl Into<String>, ttl_secs: u64) -> Self {
        let ttl = i64::try_from(ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ttl,
        }
    }

    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(config.read_base_url.clone(), config.read_ttl_secs)
    }
}

impl MediaSigner for UrlPrefixSigner {
    fn presign_read(&self, media_key: &str) -> anyhow::Result<PresignedRead> {
        let key = media_key.trim_start_matches('/');
        if key.is_empty() {
            anyhow::bail!("empty media key");
        }
        let expires_at = crate::models::now()
            .checked_add_signed(self.ttl)
            .ok_or_else(|| anyhow::anyhow!("read URL lifetime out of range"))?;
        Ok(PresignedRead {
            url: format!(
                "{}/{}?expires={}",
                self.base_url,
                key,
                expires_at.timestamp()
            ),
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_built_under_base() {
        let signer = UrlPrefixSigner::new("http://cdn.local/media/", 60);
        let read = signer.presign_read("/posts/1/a.png").unwrap();
        assert!(read.url.starts_with("http://cdn.local/media/posts/1/a.png?expires="));
        assert!(read.expires_at > Utc::now());
        assert!(signer.presign_read("").is_err());
    }

    #[test]
    fn oversized_ttl_saturates_instead_of_panicking() {
        let signer = UrlPrefixSigner::new("http://cdn.local", u64::MAX);
        assert_eq!(signer.ttl, Duration::MAX);
        // No instant lies that far ahead.
        assert!(signer.presign_read("a.png").is_err());
    }
}
