use chrono::{DateTime, Utc};
use serde::Deserialize;

// --- Wire types (Twitter v1.1 statuses) ---

/// A user object as delivered by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct RawUser {
    pub id: u64,
    pub id_str: String,
    pub screen_name: Option<String>,
    pub name: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub protected: Option<bool>,
    pub verified: Option<bool>,
    pub followers_count: Option<u32>,
    pub friends_count: Option<u32>,
    pub listed_count: Option<u32>,
    pub favourites_count: Option<u32>,
    pub statuses_count: Option<u32>,
    pub created_at: Option<String>,
    pub profile_image_url_https: Option<String>,
    pub profile_banner_url: Option<String>,
    pub default_profile: Option<bool>,
    pub default_profile_image: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawHashtag {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawUrl {
    pub url: String,
    pub expanded_url: String,
    pub display_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMention {
    pub id: u64,
    pub id_str: String,
    pub screen_name: String,
    pub name: Option<String>,
}

/// Entity annotations attached to a status. Absent groups default to empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEntities {
    #[serde(default)]
    pub hashtags: Vec<RawHashtag>,
    #[serde(default)]
    pub urls: Vec<RawUrl>,
    #[serde(default)]
    pub user_mentions: Vec<RawMention>,
}

/// Carrier of the untruncated text on compatibility-mode streams.
#[derive(Debug, Clone, Deserialize)]
pub struct RawExtendedTweet {
    pub full_text: String,
    #[serde(default)]
    pub entities: Option<RawEntities>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCoordinates {
    /// [longitude, latitude] per GeoJSON.
    pub coordinates: [f64; 2],
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPlace {
    pub name: Option<String>,
    pub full_name: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
}

/// A status object, possibly carrying embedded retweeted/quoted statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct RawStatus {
    pub id: u64,
    pub id_str: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub full_text: Option<String>,
    pub extended_tweet: Option<RawExtendedTweet>,
    pub created_at: Option<String>,
    /// HTML anchor naming the posting application.
    pub source: Option<String>,
    #[serde(default)]
    pub truncated: bool,
    pub user: RawUser,
    #[serde(default)]
    pub entities: RawEntities,
    pub in_reply_to_status_id: Option<u64>,
    pub in_reply_to_user_id: Option<u64>,
    pub in_reply_to_screen_name: Option<String>,
    pub quoted_status_id: Option<u64>,
    pub quoted_status: Option<Box<RawStatus>>,
    pub retweeted_status: Option<Box<RawStatus>>,
    pub reply_count: Option<u32>,
    pub retweet_count: Option<u32>,
    pub quote_count: Option<u32>,
    pub favorite_count: Option<u32>,
    pub lang: Option<String>,
    pub coordinates: Option<RawCoordinates>,
    pub place: Option<RawPlace>,
}

impl RawStatus {
    /// The untruncated text, wherever the API put it.
    pub fn full_text(&self) -> &str {
        if let Some(ext) = &self.extended_tweet {
            return &ext.full_text;
        }
        if let Some(t) = &self.full_text {
            return t;
        }
        self.text.as_deref().unwrap_or("")
    }

    /// Entities from the extended payload when present, base otherwise.
    pub fn all_entities(&self) -> &RawEntities {
        self.extended_tweet
            .as_ref()
            .and_then(|e| e.entities.as_ref())
            .unwrap_or(&self.entities)
    }

    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        let raw = self.created_at.as_deref()?;
        parse_twitter_time(raw)
    }

    /// Display name of the posting application, stripped of its anchor tag.
    pub fn source_app(&self) -> Option<String> {
        let source = self.source.as_deref()?;
        let inner = match (source.find('>'), source.rfind('<')) {
            (Some(start), Some(end)) if start + 1 < end => &source[start + 1..end],
            _ => source,
        };
        let inner = inner.trim();
        (!inner.is_empty()).then(|| inner.to_string())
    }
}

impl RawUser {
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        parse_twitter_time(self.created_at.as_deref()?)
    }
}

/// Parse the API's legacy timestamp format, e.g.
/// `Wed Oct 10 20:19:24 +0000 2018`.
pub fn parse_twitter_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw, "%a %b %d %H:%M:%S %z %Y")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

// --- Cursored id pages (followers/ids, friends/ids) ---

#[derive(Debug, Clone, Deserialize)]
pub struct IdsPage {
    #[serde(default)]
    pub ids: Vec<u64>,
    #[serde(default)]
    pub next_cursor: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS_JSON: &str = r#"{
        "id": 1050118621198921728,
        "id_str": "1050118621198921728",
        "text": "To make room for more expression, we will now count all emojis as equal",
        "created_at": "Wed Oct 10 20:19:24 +0000 2018",
        "source": "<a href=\"http://twitter.com\" rel=\"nofollow\">Twitter Web Client</a>",
        "truncated": false,
        "user": {
            "id": 6253282,
            "id_str": "6253282",
            "screen_name": "TwitterAPI",
            "name": "Twitter API"
        },
        "entities": {
            "hashtags": [{"text": "emoji"}],
            "urls": [{"url": "https://t.co/x", "expanded_url": "https://example.com/a?b=1", "display_url": "example.com/a"}],
            "user_mentions": [{"id": 11, "id_str": "11", "screen_name": "someone"}]
        },
        "in_reply_to_status_id": null,
        "lang": "en"
    }"#;

    #[test]
    fn status_parses_from_wire_json() {
        let status: RawStatus = serde_json::from_str(STATUS_JSON).unwrap();
        assert_eq!(status.id, 1050118621198921728);
        assert_eq!(status.user.screen_name.as_deref(), Some("TwitterAPI"));
        assert_eq!(status.entities.hashtags[0].text, "emoji");
        assert_eq!(status.entities.user_mentions[0].screen_name, "someone");
        assert!(status.retweeted_status.is_none());
    }

    #[test]
    fn created_at_parses_legacy_format() {
        let status: RawStatus = serde_json::from_str(STATUS_JSON).unwrap();
        let ts = status.created_at_utc().unwrap();
        assert_eq!(ts.timestamp(), 1_539_202_764);
    }

    #[test]
    fn source_app_strips_anchor_tag() {
        let status: RawStatus = serde_json::from_str(STATUS_JSON).unwrap();
        assert_eq!(status.source_app().as_deref(), Some("Twitter Web Client"));
    }

    #[test]
    fn extended_tweet_wins_for_full_text() {
        let json = r#"{
            "id": 1, "id_str": "1",
            "text": "truncated…",
            "extended_tweet": {"full_text": "the whole thing"},
            "user": {"id": 2, "id_str": "2"}
        }"#;
        let status: RawStatus = serde_json::from_str(json).unwrap();
        assert_eq!(status.full_text(), "the whole thing");
    }

    #[test]
    fn missing_entity_groups_default_to_empty() {
        let json = r#"{"id": 1, "id_str": "1", "user": {"id": 2, "id_str": "2"}}"#;
        let status: RawStatus = serde_json::from_str(json).unwrap();
        assert!(status.entities.hashtags.is_empty());
        assert!(status.entities.urls.is_empty());
        assert_eq!(status.full_text(), "");
    }
}
