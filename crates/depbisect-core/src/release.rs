//! Release window fetching and range clipping.
//!
//! The provider returns releases in ascending order (oldest first) so that
//! index order matches recency, which is what the bisection recurrence
//! assumes. The GitHub API serves newest first; the page is reversed after
//! decoding.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::error::{BisectError, Result};

/// A published release of the dependency under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Tag name, e.g. `v14.2.3`.
    pub tag: String,

    /// Publication timestamp, when the API provides one.
    pub published_at: Option<DateTime<Utc>>,
}

impl Release {
    /// Create a release with just a tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Release {
            tag: tag.into(),
            published_at: None,
        }
    }
}

impl std::fmt::Display for Release {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag)
    }
}

/// Query for a window of releases.
#[derive(Debug, Clone)]
pub struct ReleaseQuery {
    /// Number of most recent releases to fetch.
    pub per_page: u32,

    /// Inclusive oldest bound tag, if any.
    pub from: Option<String>,

    /// Inclusive newest bound tag, if any.
    pub to: Option<String>,
}

/// Source of the ordered release sequence.
#[async_trait]
pub trait ReleaseProvider: Send + Sync {
    /// Fetch releases in ascending order, clipped to the query bounds.
    ///
    /// A bound tag named in the query but absent from the fetched window is
    /// a hard error, never silently ignored.
    async fn releases(&self, query: &ReleaseQuery) -> Result<Vec<Release>>;
}

/// GitHub Releases API provider.
pub struct GithubReleases {
    repo: String,
    client: reqwest::Client,
}

impl GithubReleases {
    /// Create a provider for `owner/repo`.
    pub fn new(repo: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("depbisect/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create HTTP client");

        GithubReleases {
            repo: repo.into(),
            client,
        }
    }
}

#[async_trait]
impl ReleaseProvider for GithubReleases {
    async fn releases(&self, query: &ReleaseQuery) -> Result<Vec<Release>> {
        let url = format!(
            "https://api.github.com/repos/{}/releases?per_page={}",
            self.repo, query.per_page
        );
        debug!(url = %url, "fetching release window");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(BisectError::Fetch(format!(
                "GitHub API returned {} for {}",
                response.status(),
                self.repo
            )));
        }

        let body = response.bytes().await?;
        let releases = parse_release_page(&body)?;
        debug!(count = releases.len(), repo = %self.repo, "release window fetched");

        clip_to_bounds(releases, query.from.as_deref(), query.to.as_deref())
    }
}

/// Shape of one release object in the GitHub API payload.
#[derive(Debug, Deserialize)]
struct ReleaseDto {
    tag_name: String,
    published_at: Option<DateTime<Utc>>,
}

/// Decode a GitHub releases payload into ascending tag order.
pub fn parse_release_page(body: &[u8]) -> Result<Vec<Release>> {
    let page: Vec<ReleaseDto> = serde_json::from_slice(body)
        .map_err(|e| BisectError::Fetch(format!("invalid release payload: {e}")))?;

    let mut releases: Vec<Release> = page
        .into_iter()
        .map(|dto| Release {
            tag: dto.tag_name,
            published_at: dto.published_at,
        })
        .collect();
    releases.reverse();
    Ok(releases)
}

/// Clip an ascending release sequence to the inclusive `[from, to]` range.
///
/// Bounds that are both present but inverted yield an empty sequence.
pub fn clip_to_bounds(
    releases: Vec<Release>,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<Vec<Release>> {
    let start = match from {
        Some(tag) => locate(&releases, tag)?,
        None => 0,
    };
    let end = match to {
        Some(tag) => locate(&releases, tag)? + 1,
        None => releases.len(),
    };

    if start >= end {
        return Ok(Vec::new());
    }
    Ok(releases[start..end].to_vec())
}

fn locate(releases: &[Release], tag: &str) -> Result<usize> {
    releases
        .iter()
        .position(|r| r.tag == tag)
        .ok_or_else(|| BisectError::BoundNotFound(tag.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(tags: &[&str]) -> Vec<Release> {
        tags.iter().map(|t| Release::new(*t)).collect()
    }

    #[test]
    fn test_parse_release_page_reverses_to_ascending() {
        let body = br#"[
            {"tag_name": "v3.0.0", "published_at": "2026-03-01T00:00:00Z"},
            {"tag_name": "v2.0.0", "published_at": "2026-02-01T00:00:00Z"},
            {"tag_name": "v1.0.0", "published_at": null}
        ]"#;

        let releases = parse_release_page(body).expect("parse failed");
        let tags: Vec<&str> = releases.iter().map(|r| r.tag.as_str()).collect();
        assert_eq!(tags, vec!["v1.0.0", "v2.0.0", "v3.0.0"]);
        assert!(releases[0].published_at.is_none());
        assert!(releases[2].published_at.is_some());
    }

    #[test]
    fn test_parse_release_page_rejects_garbage() {
        let err = parse_release_page(b"not json").unwrap_err();
        assert!(matches!(err, BisectError::Fetch(_)));
    }

    #[test]
    fn test_clip_without_bounds_is_identity() {
        let releases = seq(&["v1", "v2", "v3"]);
        let clipped = clip_to_bounds(releases.clone(), None, None).unwrap();
        assert_eq!(clipped, releases);
    }

    #[test]
    fn test_clip_to_inclusive_bounds() {
        let releases = seq(&["v1", "v2", "v3", "v4", "v5"]);
        let clipped = clip_to_bounds(releases, Some("v2"), Some("v4")).unwrap();
        let tags: Vec<&str> = clipped.iter().map(|r| r.tag.as_str()).collect();
        assert_eq!(tags, vec!["v2", "v3", "v4"]);
    }

    #[test]
    fn test_clip_missing_bound_is_hard_error() {
        let releases = seq(&["v1", "v2", "v3"]);
        let err = clip_to_bounds(releases, Some("v9"), None).unwrap_err();
        match err {
            BisectError::BoundNotFound(tag) => assert_eq!(tag, "v9"),
            other => panic!("expected BoundNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_clip_inverted_bounds_is_empty() {
        let releases = seq(&["v1", "v2", "v3"]);
        let clipped = clip_to_bounds(releases, Some("v3"), Some("v1")).unwrap();
        assert!(clipped.is_empty());
    }
}
