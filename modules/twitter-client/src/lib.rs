pub mod error;
pub mod stream;
pub mod types;

pub use error::{Result, TwitterError};
pub use stream::PostStream;
pub use types::{
    IdsPage, RawEntities, RawHashtag, RawMention, RawStatus, RawUrl, RawUser,
};

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;

const BASE_URL: &str = "https://api.twitter.com/1.1";
const STREAM_URL: &str = "https://stream.twitter.com/1.1";

/// Fallback sleep when the provider omits the reset header.
const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

/// Upper bound on a single rate-limit sleep (one full window).
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(15 * 60);

/// Rate-limit-aware client for the external platform API. All backoff and
/// authorization-error classification is centralized here: callers observe
/// either data or a classified error, never a raw 429.
pub struct TwitterClient {
    http: reqwest::Client,
    bearer_token: String,
}

impl TwitterClient {
    pub fn new(bearer_token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            bearer_token,
        }
    }

    /// Fetch a single post by id, with the untruncated text form.
    pub async fn get_status(&self, id: u64) -> Result<RawStatus> {
        let url = format!("{BASE_URL}/statuses/show.json");
        self.get_json(
            &url,
            &[("id", id.to_string()), ("tweet_mode", "extended".into())],
        )
        .await
    }

    /// Fetch a single actor profile by id.
    pub async fn get_user(&self, id: u64) -> Result<RawUser> {
        let url = format!("{BASE_URL}/users/show.json");
        self.get_json(&url, &[("user_id", id.to_string())]).await
    }

    /// Page through an actor's follower ids, accumulating up to `cap`
    /// (0 = no cap). Rate limits are absorbed between pages.
    pub async fn followers_ids(&self, user_id: u64, cap: usize) -> Result<Vec<u64>> {
        self.cursored_ids("followers/ids.json", user_id, cap).await
    }

    /// Page through an actor's friend ids, accumulating up to `cap`.
    pub async fn friends_ids(&self, user_id: u64, cap: usize) -> Result<Vec<u64>> {
        self.cursored_ids("friends/ids.json", user_id, cap).await
    }

    async fn cursored_ids(&self, path: &str, user_id: u64, cap: usize) -> Result<Vec<u64>> {
        let url = format!("{BASE_URL}/{path}");
        let mut ids = Vec::new();
        let mut cursor: i64 = -1;
        loop {
            let page: IdsPage = self
                .get_json(
                    &url,
                    &[
                        ("user_id", user_id.to_string()),
                        ("cursor", cursor.to_string()),
                    ],
                )
                .await?;
            ids.extend(page.ids);
            if cap > 0 && ids.len() >= cap {
                ids.truncate(cap);
                tracing::debug!(user_id, cap, "Id paging stopped at cap");
                break;
            }
            if page.next_cursor == 0 {
                break;
            }
            cursor = page.next_cursor;
        }
        Ok(ids)
    }

    /// Fetch an actor's recent posts, newest first, up to `max` items.
    pub async fn user_timeline(&self, user_id: u64, max: usize) -> Result<Vec<RawStatus>> {
        let url = format!("{BASE_URL}/statuses/user_timeline.json");
        let mut statuses: Vec<RawStatus> = Vec::new();
        let mut max_id: Option<u64> = None;
        while statuses.len() < max {
            let mut query = vec![
                ("user_id", user_id.to_string()),
                ("count", "200".to_string()),
                ("tweet_mode", "extended".to_string()),
            ];
            if let Some(m) = max_id {
                query.push(("max_id", m.to_string()));
            }
            let page: Vec<RawStatus> = self.get_json(&url, &query).await?;
            if page.is_empty() {
                break;
            }
            max_id = page.last().map(|s| s.id.saturating_sub(1));
            statuses.extend(page);
        }
        statuses.truncate(max);
        Ok(statuses)
    }

    /// Open the long-lived filtered firehose connection for the given
    /// track terms. See [`stream`] for delivery semantics.
    pub async fn open_stream(&self, track_terms: &[String]) -> Result<PostStream> {
        let url = format!("{STREAM_URL}/statuses/filter.json");
        loop {
            let resp = self
                .http
                .post(&url)
                .bearer_auth(&self.bearer_token)
                .form(&[("track", track_terms.join(","))])
                .send()
                .await?;

            let status = resp.status().as_u16();
            match status {
                420 | 429 => {
                    let wait = wait_for_reset(resp.headers());
                    tracing::warn!(
                        wait_secs = wait.as_secs(),
                        "Stream connect rate limited, sleeping until window reset"
                    );
                    tokio::time::sleep(wait).await;
                }
                401 | 403 => {
                    return Err(TwitterError::Unauthorized(
                        "stream connection rejected".to_string(),
                    ))
                }
                s if !resp.status().is_success() => {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(TwitterError::Api {
                        status: s,
                        message: body,
                    });
                }
                _ => {
                    tracing::info!(terms = track_terms.len(), "Firehose connection open");
                    return Ok(stream::decode_post_stream(resp.bytes_stream()));
                }
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        loop {
            let resp = self
                .http
                .get(url)
                .query(query)
                .bearer_auth(&self.bearer_token)
                .send()
                .await?;

            let status = resp.status();
            match status.as_u16() {
                420 | 429 => {
                    let wait = wait_for_reset(resp.headers());
                    tracing::warn!(
                        url,
                        wait_secs = wait.as_secs(),
                        "Rate limited, sleeping until window reset"
                    );
                    tokio::time::sleep(wait).await;
                }
                401 | 403 => {
                    return Err(TwitterError::Unauthorized(format!(
                        "{url} (account may be private or suspended)"
                    )))
                }
                404 => return Err(TwitterError::NotFound(url.to_string())),
                s if !status.is_success() => {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(TwitterError::Api {
                        status: s,
                        message: body,
                    });
                }
                _ => return Ok(resp.json::<T>().await?),
            }
        }
    }
}

/// How long to sleep for the window announced in the rate-limit headers.
/// Clamped to one full window; short floor so a skewed clock can't spin.
fn wait_for_reset(headers: &HeaderMap) -> Duration {
    let reset_at = headers
        .get("x-rate-limit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

    match reset_at {
        Some(at) => duration_until(at, Utc::now()),
        None => DEFAULT_RATE_LIMIT_WAIT,
    }
}

fn duration_until(reset_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    let secs = (reset_at - now).num_seconds().max(1) as u64;
    Duration::from_secs(secs).min(MAX_RATE_LIMIT_WAIT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn wait_clamps_to_one_window() {
        let now = Utc::now();
        let far = now + ChronoDuration::hours(3);
        assert_eq!(duration_until(far, now), MAX_RATE_LIMIT_WAIT);
    }

    #[test]
    fn wait_has_a_floor_for_skewed_clocks() {
        let now = Utc::now();
        let past = now - ChronoDuration::minutes(5);
        assert_eq!(duration_until(past, now), Duration::from_secs(1));
    }

    #[test]
    fn wait_defaults_when_header_missing() {
        assert_eq!(wait_for_reset(&HeaderMap::new()), DEFAULT_RATE_LIMIT_WAIT);
    }
}
