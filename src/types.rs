use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use time::OffsetDateTime;

/// `channels.list` response. `items` is `None` when the field is absent or
/// `null`, which is distinct from an empty list.
#[derive(Debug, Deserialize)]
pub struct ChannelListResponse {
    #[serde(default)]
    pub items: Option<Vec<ChannelItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub content_details: Option<ChannelContentDetails>,
    #[serde(default)]
    pub statistics: Option<ChannelStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelContentDetails {
    #[serde(default)]
    pub related_playlists: Option<RelatedPlaylists>,
}

#[derive(Debug, Deserialize)]
pub struct RelatedPlaylists {
    #[serde(default)]
    pub uploads: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatistics {
    #[serde(default, deserialize_with = "count")]
    pub subscriber_count: Option<u64>,
}

impl ChannelListResponse {
    pub fn uploads_id(&self) -> Option<&str> {
        self.items
            .as_deref()?
            .first()?
            .content_details
            .as_ref()?
            .related_playlists
            .as_ref()?
            .uploads
            .as_deref()
    }
}

impl ChannelItem {
    pub fn subscriber_count(&self) -> Option<u64> {
        self.statistics.as_ref()?.subscriber_count
    }
}

/// The API encodes 64-bit counts as decimal strings; accept plain numbers too.
fn count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid count {:?}", s))),
    }
}

/// One page of `playlistItems.list`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemsPage {
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub page_info: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItem {
    pub id: String,
    #[serde(default)]
    pub etag: Option<String>,
    pub content_details: PlaylistItemDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemDetails {
    pub video_id: String,
    #[serde(default)]
    pub video_published_at: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub total_results: u64,
    pub results_per_page: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    Channel,
    Playlist,
}

impl ItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemType::Channel => "channel",
            ItemType::Playlist => "playlist",
        }
    }

    /// Maps a search result `id.kind` such as `youtube#channel`.
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "youtube#channel" => Some(ItemType::Channel),
            "youtube#playlist" => Some(ItemType::Playlist),
            _ => None,
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidItemType(pub String);

impl fmt::Display for InvalidItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid item type: {}", self.0)
    }
}

impl std::error::Error for InvalidItemType {}

impl FromStr for ItemType {
    type Err = InvalidItemType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "channel" | "ItemType.CHANNEL" => Ok(ItemType::Channel),
            "playlist" | "ItemType.PLAYLIST" => Ok(ItemType::Playlist),
            other => Err(InvalidItemType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchItem {
    pub id: String,
    pub item_type: ItemType,
    pub title: String,
    pub description: String,
    pub channel_title: String,
    pub thumbnail: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchListResponse {
    #[serde(default)]
    pub items: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResult {
    pub id: SearchResultId,
    pub snippet: SearchSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchResultId {
    pub kind: String,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub playlist_id: Option<String>,
    #[serde(default)]
    pub video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchSnippet {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub channel_title: String,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub thumbnails: Option<SnippetThumbnails>,
}

/// A video published after some point in time, from a channel search or a
/// playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Video {
    pub youtube_id: String,
    pub name: String,
    pub description: String,
    pub published_at: OffsetDateTime,
    pub thumbnail_url: Option<String>,
}

/// `playlistItems.list` with `part=snippet`.
#[derive(Debug, Deserialize)]
pub(crate) struct PlaylistSnippetPage {
    #[serde(default)]
    pub items: Vec<PlaylistSnippetItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlaylistSnippetItem {
    pub snippet: PlaylistSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PlaylistSnippet {
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumbnails: Option<SnippetThumbnails>,
    pub resource_id: ResourceId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResourceId {
    pub kind: String,
    #[serde(default)]
    pub video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SnippetThumbnails {
    #[serde(default)]
    pub high: Option<RawThumbnail>,
}

impl SnippetThumbnails {
    pub fn high_url(self) -> Option<String> {
        self.high.map(|t| t.url)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawThumbnail {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}
