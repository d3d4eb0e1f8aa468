use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable numeric key of an actor on the external platform.
pub type ActorId = u64;
/// Stable numeric key of a post on the external platform.
pub type PostId = u64;

/// Millisecond epoch of the external platform's snowflake ids.
const SNOWFLAKE_EPOCH_MS: i64 = 1_288_834_974_657;

// --- Derived id fields ---

/// Fields packed into a post's snowflake id: creation timestamp plus the
/// datacenter/worker/sequence shards. A pure function of the id, decoded
/// once at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnowflakeParts {
    pub timestamp: DateTime<Utc>,
    pub datacenter: u8,
    pub worker: u8,
    pub sequence: u16,
}

impl SnowflakeParts {
    pub fn decode(id: PostId) -> Self {
        let ms = (id >> 22) as i64 + SNOWFLAKE_EPOCH_MS;
        let timestamp = Utc
            .timestamp_millis_opt(ms)
            .single()
            .unwrap_or_else(|| Utc.timestamp_millis_opt(0).unwrap());
        Self {
            timestamp,
            datacenter: ((id >> 17) & 0x1f) as u8,
            worker: ((id >> 12) & 0x1f) as u8,
            sequence: (id & 0xfff) as u16,
        }
    }
}

// --- Entities extracted from post text ---

/// A URL entity attached to a post. `hostname` is derived from the
/// expanded form at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UrlEntity {
    pub url: String,
    pub expanded_url: String,
    pub display_url: String,
    pub hostname: Option<String>,
}

impl UrlEntity {
    pub fn new(url: impl Into<String>, expanded_url: impl Into<String>, display_url: impl Into<String>) -> Self {
        let expanded_url = expanded_url.into();
        let hostname = url::Url::parse(&expanded_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));
        Self {
            url: url.into(),
            expanded_url,
            display_url: display_url.into(),
            hostname,
        }
    }
}

// --- Geo (optional post coordinates) ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoTag {
    pub lat: f64,
    pub lng: f64,
    pub place_name: Option<String>,
}

// --- Actor ---

/// A social-media account. `filled = false` marks a stub created only to
/// satisfy a reference; stubs are upgraded in place once the full profile
/// is seen. Exactly one row exists per external id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub handle: Option<String>,
    pub display_name: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
    pub bio: Option<String>,
    pub protected: Option<bool>,
    pub verified: Option<bool>,
    pub followers_count: Option<u32>,
    pub friends_count: Option<u32>,
    pub listed_count: Option<u32>,
    pub favourites_count: Option<u32>,
    pub statuses_count: Option<u32>,
    pub created_at: Option<DateTime<Utc>>,
    pub profile_image_url: Option<String>,
    pub filled: bool,
    pub inserted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub followers_filled_at: Option<DateTime<Utc>>,
    pub friends_filled_at: Option<DateTime<Utc>>,
    pub timeline_filled_at: Option<DateTime<Utc>>,
    pub matched_rules: Vec<String>,
    pub campaigns: Vec<String>,
}

impl Actor {
    /// A minimally-populated record carrying only what a reference knows.
    pub fn stub(id: ActorId, handle: Option<String>, display_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            handle,
            display_name,
            location: None,
            url: None,
            bio: None,
            protected: None,
            verified: None,
            followers_count: None,
            friends_count: None,
            listed_count: None,
            favourites_count: None,
            statuses_count: None,
            created_at: None,
            profile_image_url: None,
            filled: false,
            inserted_at: now,
            updated_at: now,
            followers_filled_at: None,
            friends_filled_at: None,
            timeline_filled_at: None,
            matched_rules: Vec::new(),
            campaigns: Vec::new(),
        }
    }
}

// --- Post ---

/// A single social-media message with its conversational references and
/// extracted entities. The id is globally unique and immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub author: ActorId,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub lang: Option<String>,
    pub source_app: Option<String>,
    pub truncated: bool,
    pub in_reply_to_post: Option<PostId>,
    pub in_reply_to_actor: Option<ActorId>,
    pub quoted_post: Option<PostId>,
    pub retweeted_post: Option<PostId>,
    pub reply_count: Option<u32>,
    pub retweet_count: Option<u32>,
    pub quote_count: Option<u32>,
    pub favorite_count: Option<u32>,
    pub mentioned_actors: Vec<ActorId>,
    pub hashtags: Vec<String>,
    pub urls: Vec<UrlEntity>,
    pub matched_rules: Vec<String>,
    pub campaigns: Vec<String>,
    pub geo: Option<GeoTag>,
    pub snowflake: SnowflakeParts,
    pub inserted_at: DateTime<Utc>,
}

// --- Facts ---

/// What a fact is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactSubject {
    Actor(ActorId),
    Post(PostId),
    Community(Uuid),
}

/// An audit record of a detected change in a stored entity's field.
/// Facts are appended, never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    pub subject: FactSubject,
    pub text: String,
    pub description: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl Fact {
    pub fn field_changed(subject: FactSubject, field: &str, old: &str, new: &str) -> Self {
        Self {
            subject,
            text: format!("{field} changed"),
            description: Some(format!("{field} changed from {old} to {new}")),
            recorded_at: Utc::now(),
        }
    }
}

// --- Social relations and fill bookkeeping ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocialRelation {
    Followers,
    Friends,
}

impl std::fmt::Display for SocialRelation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SocialRelation::Followers => write!(f, "followers"),
            SocialRelation::Friends => write!(f, "friends"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillKind {
    Followers,
    Friends,
    Timeline,
}

impl std::fmt::Display for FillKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FillKind::Followers => write!(f, "followers"),
            FillKind::Friends => write!(f, "friends"),
            FillKind::Timeline => write!(f, "timeline"),
        }
    }
}

// --- Communities ---

/// A cluster of actors assigned by the external block-model routine.
/// Persisted back through the store after a graph build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Community {
    pub id: Uuid,
    pub block_id: u32,
    pub name: String,
    pub description: String,
    pub members: Vec<ActorId>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snowflake_decode_known_id() {
        // 1212092628029698048 created 2019-12-31T19:26:16.771Z
        let parts = SnowflakeParts::decode(1_212_092_628_029_698_048);
        assert_eq!(parts.timestamp.timestamp_millis(), 1_577_820_376_771);
        assert_eq!(parts.datacenter, 10);
        assert_eq!(parts.worker, 7);
        assert_eq!(parts.sequence, 0);
    }

    #[test]
    fn snowflake_shards_extracted() {
        // Hand-packed id: timestamp 1000ms after epoch, dc 3, worker 7, seq 42
        let id: u64 = (1000 << 22) | (3 << 17) | (7 << 12) | 42;
        let parts = SnowflakeParts::decode(id);
        assert_eq!(parts.datacenter, 3);
        assert_eq!(parts.worker, 7);
        assert_eq!(parts.sequence, 42);
        assert_eq!(
            parts.timestamp.timestamp_millis(),
            SNOWFLAKE_EPOCH_MS + 1000
        );
    }

    #[test]
    fn url_entity_derives_hostname() {
        let u = UrlEntity::new(
            "https://t.co/abc",
            "https://www.example.com/page?x=1",
            "example.com/page",
        );
        assert_eq!(u.hostname.as_deref(), Some("www.example.com"));
    }

    #[test]
    fn url_entity_tolerates_unparseable_url() {
        let u = UrlEntity::new("x", "not a url", "not a url");
        assert_eq!(u.hostname, None);
    }
}
