use reqwest::Client;
use serde::de::DeserializeOwned;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ApiKey;
use crate::error::YouTubeError;
use crate::types::{
    ChannelListResponse, ItemType, PlaylistItemsPage, PlaylistSnippetPage, SearchItem,
    SearchListResponse, Thumbnail, Video,
};

/// Sent as the `User-Agent` of every request.
pub const APPLICATION_NAME: &str = "My Youtube Video Deck";

const MAX_RESULTS: &str = "50";
const VIDEO_KIND: &str = "youtube#video";

/// `publishedAfter` wants second precision in UTC.
fn published_after(since: OffsetDateTime) -> Result<String, YouTubeError> {
    let utc = since.to_offset(UtcOffset::UTC);
    Ok(utc.format(format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second]Z"
    ))?)
}

fn parse_published(raw: Option<&str>) -> Result<OffsetDateTime, YouTubeError> {
    let raw = raw.unwrap_or_default();
    OffsetDateTime::parse(raw, &Rfc3339).map_err(|_| YouTubeError::InvalidTimestamp(raw.to_string()))
}

/// Thin wrapper over the YouTube Data API v3, scoped to one API key.
pub struct YouTubeClient {
    http: Client,
    base: Url,
    api_key: ApiKey,
}

impl YouTubeClient {
    pub fn new(api_key: ApiKey, base: Url) -> Result<Self, YouTubeError> {
        let http = Client::builder().user_agent(APPLICATION_NAME).build()?;
        Ok(Self {
            http,
            base,
            api_key,
        })
    }

    fn endpoint(&self, resource: &str) -> Result<Url, YouTubeError> {
        // Url::join drops the last segment unless the base ends with a slash.
        let mut base = self.base.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base.join(resource)?)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        resource: &str,
        params: &[(&str, &str)],
    ) -> Result<T, YouTubeError> {
        let url = self.endpoint(resource)?;
        debug!("GET {} {:?}", url, params);

        let resp = self
            .http
            .get(url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            warn!("{} returned {}", resource, status);
            return Err(YouTubeError::from_response(status, &body));
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// `channels.list` with `part=contentDetails`, filtered by a channel username.
    pub async fn channels_by_username(
        &self,
        username: &str,
    ) -> Result<ChannelListResponse, YouTubeError> {
        info!("fetching channel details for {}", username);
        self.fetch(
            "channels",
            &[("part", "contentDetails"), ("forUsername", username)],
        )
        .await
    }

    /// The id of the channel's uploads playlist, if it has one.
    pub async fn uploads_playlist_id(&self, username: &str) -> Result<Option<String>, YouTubeError> {
        let channels = self.channels_by_username(username).await?;
        Ok(channels.uploads_id().map(str::to_string))
    }

    /// A single page of a playlist's items; `next_page_token` is not followed.
    pub async fn playlist_items(&self, playlist_id: &str) -> Result<PlaylistItemsPage, YouTubeError> {
        info!("fetching playlist items for {}", playlist_id);
        let page: PlaylistItemsPage = self
            .fetch(
                "playlistItems",
                &[
                    ("part", "contentDetails"),
                    ("maxResults", MAX_RESULTS),
                    ("playlistId", playlist_id),
                ],
            )
            .await?;
        if page.next_page_token.is_some() {
            debug!("playlist {} has more pages", playlist_id);
        }
        Ok(page)
    }

    /// Searches channels and playlists matching `term`.
    pub async fn search(&self, term: &str) -> Result<Vec<SearchItem>, YouTubeError> {
        info!("searching for {:?}", term);
        let data: SearchListResponse = self
            .fetch(
                "search",
                &[
                    ("part", "snippet"),
                    ("q", term),
                    ("type", "channel,playlist"),
                    ("maxResults", MAX_RESULTS),
                ],
            )
            .await?;

        data.items
            .into_iter()
            .map(|item| {
                let item_type = ItemType::from_kind(&item.id.kind)
                    .ok_or_else(|| YouTubeError::UnexpectedKind(item.id.kind.clone()))?;
                let id = match item_type {
                    ItemType::Channel => item.id.channel_id,
                    ItemType::Playlist => item.id.playlist_id,
                }
                .ok_or_else(|| YouTubeError::UnexpectedKind(item.id.kind.clone()))?;

                let snippet = item.snippet;
                let thumbnail = snippet.thumbnails.and_then(|t| t.high).map(|t| Thumbnail {
                    url: t.url,
                    width: t.width,
                    height: t.height,
                });
                Ok(SearchItem {
                    id,
                    item_type,
                    title: snippet.title,
                    description: snippet.description,
                    channel_title: snippet.channel_title,
                    thumbnail,
                })
            })
            .collect()
    }

    /// Videos a channel published after `since`, from one page of search
    /// results.
    pub async fn latest_from_channel(
        &self,
        channel_id: &str,
        since: OffsetDateTime,
    ) -> Result<Vec<Video>, YouTubeError> {
        info!("fetching videos for channel {} since {}", channel_id, since);
        let after = published_after(since)?;
        let data: SearchListResponse = self
            .fetch(
                "search",
                &[
                    ("part", "snippet"),
                    ("maxResults", MAX_RESULTS),
                    ("channelId", channel_id),
                    ("type", "video"),
                    ("publishedAfter", after.as_str()),
                ],
            )
            .await?;

        let mut videos = Vec::with_capacity(data.items.len());
        for item in data.items {
            if item.id.kind != VIDEO_KIND {
                warn!("unexpected item {} in channel search, expected {}", item.id.kind, VIDEO_KIND);
                continue;
            }
            let Some(youtube_id) = item.id.video_id else {
                warn!("video search result without a videoId");
                continue;
            };

            let snippet = item.snippet;
            let published_at = parse_published(snippet.published_at.as_deref())?;
            if published_at <= since {
                // the API filters on publishedAfter already
                warn!("search returned {} published at {}, not after {}", youtube_id, published_at, since);
                continue;
            }

            videos.push(Video {
                youtube_id,
                name: snippet.title,
                description: snippet.description,
                published_at,
                thumbnail_url: snippet.thumbnails.and_then(|t| t.high_url()),
            });
        }
        Ok(videos)
    }

    /// Videos added to a playlist after `since`, from one page of items.
    pub async fn latest_from_playlist(
        &self,
        playlist_id: &str,
        since: OffsetDateTime,
    ) -> Result<Vec<Video>, YouTubeError> {
        info!("fetching videos for playlist {} since {}", playlist_id, since);
        let page: PlaylistSnippetPage = self
            .fetch(
                "playlistItems",
                &[
                    ("part", "snippet"),
                    ("maxResults", MAX_RESULTS),
                    ("playlistId", playlist_id),
                ],
            )
            .await?;

        let mut videos = Vec::new();
        for item in page.items {
            let snippet = item.snippet;
            if snippet.resource_id.kind != VIDEO_KIND {
                warn!(
                    "unexpected item {} in playlist {}, expected {}",
                    snippet.resource_id.kind, playlist_id, VIDEO_KIND
                );
                continue;
            }
            let Some(youtube_id) = snippet.resource_id.video_id else {
                warn!("playlist item without a videoId in {}", playlist_id);
                continue;
            };

            let published_at = parse_published(snippet.published_at.as_deref())?;
            if published_at <= since {
                continue;
            }

            videos.push(Video {
                youtube_id,
                name: snippet.title,
                description: snippet.description,
                published_at,
                thumbnail_url: snippet.thumbnails.and_then(|t| t.high_url()),
            });
        }
        Ok(videos)
    }
}
