use std::io::Write;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use client::{YouTubeClient, APPLICATION_NAME};
pub use config::{ApiKey, Config};
pub use error::{ConfigError, YouTubeError};
pub use types::{ChannelItem, ChannelListResponse, ItemType, SearchItem, Thumbnail, Video};

pub const MISSING_KEY_MESSAGE: &str = "Error fetching api key";
pub const INVALID_ITEMS_MESSAGE: &str = "Invalid items found";

/// How a report finished when it did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// No usable `API_KEY`; nothing was requested.
    MissingApiKey,
    /// The API answered without an item collection.
    InvalidItems,
    /// `lines` subscriber counts were printed.
    Reported { lines: usize },
}

/// Writes one line per item that carries a subscriber count and returns how
/// many were written. Items without statistics are skipped.
pub fn write_subscriber_lines<W: Write>(items: &[ChannelItem], out: &mut W) -> Result<usize> {
    let mut lines = 0;
    for item in items {
        match item.subscriber_count() {
            Some(count) => {
                writeln!(out, "Channel has {} subscribers", count)?;
                lines += 1;
            }
            None => debug!(
                "skipping channel {} without subscriber count",
                item.id.as_deref().unwrap_or("<unknown>")
            ),
        }
    }
    Ok(lines)
}

/// Looks up `username` and prints its subscriber count to `out`.
///
/// A missing key and a response without items are reported on `out` and
/// returned as outcomes. Transport, status and decode failures are returned
/// as errors; nothing is retried.
pub async fn report<W: Write>(config: &Config, username: &str, out: &mut W) -> Result<ReportOutcome> {
    let Some(api_key) = config.api_key.clone() else {
        writeln!(out, "{}", MISSING_KEY_MESSAGE)?;
        return Ok(ReportOutcome::MissingApiKey);
    };

    if config.echo_api_key {
        warn!("API key is echoed to stdout, set ECHO_API_KEY=false to mask it");
        writeln!(out, "API key: {}", api_key.as_str())?;
    } else {
        writeln!(out, "API key: {}", api_key.masked())?;
    }

    let client = YouTubeClient::new(api_key, config.api_base.clone())?;
    let response = client
        .channels_by_username(username)
        .await
        .with_context(|| format!("fetching channel {}", username))?;

    let Some(items) = response.items else {
        writeln!(out, "{}", INVALID_ITEMS_MESSAGE)?;
        return Ok(ReportOutcome::InvalidItems);
    };

    let lines = write_subscriber_lines(&items, out)?;
    info!("{} of {} channels reported a subscriber count", lines, items.len());
    Ok(ReportOutcome::Reported { lines })
}

/// Reports on the configured channel to stdout.
pub async fn run(config: &Config) -> Result<ReportOutcome> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let outcome = report(config, &config.channel, &mut out).await?;
    out.flush()?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, MockServer};
    use url::Url;

    fn config_for(server: &MockServer, key: Option<&str>) -> Config {
        Config {
            api_key: key.and_then(ApiKey::new),
            api_base: Url::parse(&server.url("/youtube/v3")).unwrap(),
            ..Config::default()
        }
    }

    async fn report_to_string(config: &Config, username: &str) -> (Result<ReportOutcome>, String) {
        let mut out = Vec::new();
        let res = report(config, username, &mut out).await;
        (res, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_missing_key_makes_no_request() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/youtube/v3/channels");
            then.status(200).json_body(serde_json::json!({"items": []}));
        });

        for key in [None, Some("")] {
            let (res, out) = report_to_string(&config_for(&server, key), "mindriot101").await;
            assert_eq!(res.unwrap(), ReportOutcome::MissingApiKey);
            assert_eq!(out, "Error fetching api key\n");
        }
        mock.assert_hits(0);
    }

    #[tokio::test]
    async fn test_reports_subscriber_count() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/youtube/v3/channels")
                .query_param("part", "contentDetails")
                .query_param("forUsername", "mindriot101")
                .query_param("key", "abc123");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::json!({
                    "items": [{"id": "UC1", "statistics": {"subscriberCount": "42"}}]
                }));
        });

        let (res, out) = report_to_string(&config_for(&server, Some("abc123")), "mindriot101").await;
        mock.assert_hits(1);
        assert_eq!(res.unwrap(), ReportOutcome::Reported { lines: 1 });
        assert_eq!(out, "API key: abc123\nChannel has 42 subscribers\n");
    }

    #[tokio::test]
    async fn test_whitespace_key_is_echoed_and_sent() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/youtube/v3/channels")
                .query_param("key", "   ");
            then.status(200).json_body(serde_json::json!({"items": []}));
        });

        let (res, out) = report_to_string(&config_for(&server, Some("   ")), "mindriot101").await;
        mock.assert_hits(1);
        assert_eq!(res.unwrap(), ReportOutcome::Reported { lines: 0 });
        assert_eq!(out, "API key:    \n");
    }

    #[tokio::test]
    async fn test_null_items() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/youtube/v3/channels");
            then.status(200).json_body(serde_json::json!({"items": null}));
        });

        let (res, out) = report_to_string(&config_for(&server, Some("abc123")), "mindriot101").await;
        assert_eq!(res.unwrap(), ReportOutcome::InvalidItems);
        assert_eq!(out, "API key: abc123\nInvalid items found\n");
    }

    #[tokio::test]
    async fn test_empty_items_print_nothing_more() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/youtube/v3/channels");
            then.status(200).json_body(serde_json::json!({"items": []}));
        });

        let (res, out) = report_to_string(&config_for(&server, Some("abc123")), "nobody").await;
        assert_eq!(res.unwrap(), ReportOutcome::Reported { lines: 0 });
        assert_eq!(out, "API key: abc123\n");
    }

    #[tokio::test]
    async fn test_only_items_with_statistics_are_printed() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/youtube/v3/channels");
            then.status(200).json_body(serde_json::json!({
                "items": [
                    {"id": "a", "statistics": {"subscriberCount": "10"}},
                    {"id": "b", "contentDetails": {"relatedPlaylists": {"uploads": "UUb"}}},
                    {"id": "c", "statistics": {"hiddenSubscriberCount": true}},
                    {"id": "d", "statistics": {"subscriberCount": "3"}}
                ]
            }));
        });

        let config = config_for(&server, Some("abc123"));
        let (res, first) = report_to_string(&config, "mindriot101").await;
        assert_eq!(res.unwrap(), ReportOutcome::Reported { lines: 2 });
        assert_eq!(
            first,
            "API key: abc123\nChannel has 10 subscribers\nChannel has 3 subscribers\n"
        );

        let (_, second) = report_to_string(&config, "mindriot101").await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_masked_key() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/youtube/v3/channels");
            then.status(200).json_body(serde_json::json!({"items": []}));
        });

        let config = Config {
            echo_api_key: false,
            ..config_for(&server, Some("abc123"))
        };
        let (_, out) = report_to_string(&config, "mindriot101").await;
        assert_eq!(out, "API key: ab****\n");
    }

    #[tokio::test]
    async fn test_upstream_failure_is_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/youtube/v3/channels");
            then.status(403).json_body(serde_json::json!({
                "error": {"code": 403, "message": "quota", "errors": [{"reason": "quotaExceeded"}]}
            }));
        });

        let (res, out) = report_to_string(&config_for(&server, Some("abc123")), "mindriot101").await;
        let err = res.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<YouTubeError>(),
            Some(YouTubeError::QuotaExceeded(_))
        ));
        assert_eq!(out, "API key: abc123\n");
    }

    #[tokio::test]
    async fn test_connection_failure_is_an_error() {
        // nothing listens on port 1
        let config = Config {
            api_key: ApiKey::new("abc123"),
            api_base: Url::parse("http://127.0.0.1:1/youtube/v3").unwrap(),
            ..Config::default()
        };

        let (res, out) = report_to_string(&config, "mindriot101").await;
        let err = res.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<YouTubeError>(),
            Some(YouTubeError::Http(e)) if e.is_connect()
        ));
        assert_eq!(out, "API key: abc123\n");
    }
}
