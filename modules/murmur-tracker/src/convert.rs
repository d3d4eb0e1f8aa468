//! Wire-to-domain conversions. Derived id fields are computed once here,
//! at creation.

use chrono::Utc;

use murmur_common::{Actor, GeoTag, Post, SnowflakeParts, UrlEntity};
use twitter_client::{RawStatus, RawUser};

/// Build a domain post from a wire status. Conversational references are
/// carried as ids; relationship linking happens at the store.
pub fn post_from_status(status: &RawStatus) -> Post {
    let snowflake = SnowflakeParts::decode(status.id);
    let entities = status.all_entities();

    let geo = status
        .coordinates
        .as_ref()
        .map(|c| GeoTag {
            // GeoJSON order: [longitude, latitude]
            lat: c.coordinates[1],
            lng: c.coordinates[0],
            place_name: status.place.as_ref().and_then(|p| p.full_name.clone()),
        })
        .or_else(|| {
            status.place.as_ref().and_then(|p| {
                p.full_name.clone().map(|name| GeoTag {
                    lat: 0.0,
                    lng: 0.0,
                    place_name: Some(name),
                })
            })
        });

    Post {
        id: status.id,
        author: status.user.id,
        text: status.full_text().to_string(),
        created_at: status.created_at_utc().unwrap_or(snowflake.timestamp),
        lang: status.lang.clone(),
        source_app: status.source_app(),
        truncated: status.truncated,
        in_reply_to_post: status.in_reply_to_status_id,
        in_reply_to_actor: status.in_reply_to_user_id,
        quoted_post: status
            .quoted_status
            .as_ref()
            .map(|s| s.id)
            .or(status.quoted_status_id),
        retweeted_post: status.retweeted_status.as_ref().map(|s| s.id),
        reply_count: status.reply_count,
        retweet_count: status.retweet_count,
        quote_count: status.quote_count,
        favorite_count: status.favorite_count,
        mentioned_actors: entities.user_mentions.iter().map(|m| m.id).collect(),
        hashtags: entities.hashtags.iter().map(|h| h.text.clone()).collect(),
        urls: entities
            .urls
            .iter()
            .map(|u| UrlEntity::new(&u.url, &u.expanded_url, &u.display_url))
            .collect(),
        matched_rules: Vec::new(),
        campaigns: Vec::new(),
        geo,
        snowflake,
        inserted_at: Utc::now(),
    }
}

/// Build a filled actor profile from a wire user object.
pub fn actor_from_user(user: &RawUser) -> Actor {
    let mut actor = Actor::stub(user.id, user.screen_name.clone(), user.name.clone());
    actor.location = user.location.clone();
    actor.url = user.url.clone();
    actor.bio = user.description.clone();
    actor.protected = user.protected;
    actor.verified = user.verified;
    actor.followers_count = user.followers_count;
    actor.friends_count = user.friends_count;
    actor.listed_count = user.listed_count;
    actor.favourites_count = user.favourites_count;
    actor.statuses_count = user.statuses_count;
    actor.created_at = user.created_at_utc();
    actor.profile_image_url = user.profile_image_url_https.clone();
    actor.filled = true;
    actor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_carries_entities_and_references() {
        let status: RawStatus = serde_json::from_value(serde_json::json!({
            "id": 99, "id_str": "99",
            "text": "hello #tag https://t.co/x @friend",
            "created_at": "Wed Oct 10 20:19:24 +0000 2018",
            "source": "<a href=\"http://x\">App</a>",
            "in_reply_to_status_id": 42u64,
            "in_reply_to_user_id": 7u64,
            "user": {"id": 10, "id_str": "10", "screen_name": "poster"},
            "entities": {
                "hashtags": [{"text": "tag"}],
                "urls": [{"url": "https://t.co/x", "expanded_url": "https://example.com/p", "display_url": "example.com/p"}],
                "user_mentions": [{"id": 3, "id_str": "3", "screen_name": "friend"}]
            }
        }))
        .unwrap();

        let post = post_from_status(&status);
        assert_eq!(post.id, 99);
        assert_eq!(post.author, 10);
        assert_eq!(post.in_reply_to_post, Some(42));
        assert_eq!(post.in_reply_to_actor, Some(7));
        assert_eq!(post.mentioned_actors, vec![3]);
        assert_eq!(post.hashtags, vec!["tag"]);
        assert_eq!(post.urls[0].hostname.as_deref(), Some("example.com"));
        assert_eq!(post.source_app.as_deref(), Some("App"));
    }

    #[test]
    fn filled_profile_from_user() {
        let user: RawUser = serde_json::from_value(serde_json::json!({
            "id": 5, "id_str": "5",
            "screen_name": "alice",
            "name": "Alice",
            "location": "Roma",
            "followers_count": 12
        }))
        .unwrap();
        let actor = actor_from_user(&user);
        assert!(actor.filled);
        assert_eq!(actor.handle.as_deref(), Some("alice"));
        assert_eq!(actor.followers_count, Some(12));
    }
}
