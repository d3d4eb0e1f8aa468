//! Test mocks for the tracker: an in-memory platform API and a recording
//! job scheduler, plus status builders. Paired with the store's
//! MemoryStore these make every pipeline test deterministic — no network,
//! no database.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use murmur_common::{JobScheduler, MurmurError, ScheduledJob};
use twitter_client::{PostStream, RawStatus, RawUser, Result, TwitterError};

use crate::traits::PlatformApi;

/// HashMap-backed platform API. Unregistered ids return `NotFound`, the
/// same soft-skip shape the real client produces for deleted entities.
#[derive(Default)]
pub struct MockPlatformApi {
    statuses: HashMap<u64, RawStatus>,
    users: HashMap<u64, RawUser>,
    followers: HashMap<u64, Vec<u64>>,
    friends: HashMap<u64, Vec<u64>>,
    timelines: HashMap<u64, Vec<RawStatus>>,
    stream_items: Mutex<Vec<RawStatus>>,
    status_fetches: Mutex<Vec<u64>>,
}

impl MockPlatformApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_status(mut self, status: RawStatus) -> Self {
        self.statuses.insert(status.id, status);
        self
    }

    pub fn on_user(mut self, user: RawUser) -> Self {
        self.users.insert(user.id, user);
        self
    }

    pub fn on_followers(mut self, user_id: u64, ids: Vec<u64>) -> Self {
        self.followers.insert(user_id, ids);
        self
    }

    pub fn on_friends(mut self, user_id: u64, ids: Vec<u64>) -> Self {
        self.friends.insert(user_id, ids);
        self
    }

    pub fn on_timeline(mut self, user_id: u64, statuses: Vec<RawStatus>) -> Self {
        self.timelines.insert(user_id, statuses);
        self
    }

    /// Items the next `open_stream` call will deliver, then end the stream.
    pub fn with_stream(self, items: Vec<RawStatus>) -> Self {
        *self.stream_items.lock().unwrap() = items;
        self
    }

    /// Ids fetched through `get_status`, in order.
    pub fn status_fetches(&self) -> Vec<u64> {
        self.status_fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformApi for MockPlatformApi {
    async fn get_status(&self, id: u64) -> Result<RawStatus> {
        self.status_fetches.lock().unwrap().push(id);
        self.statuses
            .get(&id)
            .cloned()
            .ok_or_else(|| TwitterError::NotFound(format!("status {id}")))
    }

    async fn get_user(&self, id: u64) -> Result<RawUser> {
        self.users
            .get(&id)
            .cloned()
            .ok_or_else(|| TwitterError::NotFound(format!("user {id}")))
    }

    async fn followers_ids(&self, user_id: u64, cap: usize) -> Result<Vec<u64>> {
        let mut ids = self.followers.get(&user_id).cloned().unwrap_or_default();
        if cap > 0 && ids.len() > cap {
            ids.truncate(cap);
        }
        Ok(ids)
    }

    async fn friends_ids(&self, user_id: u64, cap: usize) -> Result<Vec<u64>> {
        let mut ids = self.friends.get(&user_id).cloned().unwrap_or_default();
        if cap > 0 && ids.len() > cap {
            ids.truncate(cap);
        }
        Ok(ids)
    }

    async fn user_timeline(&self, user_id: u64, max: usize) -> Result<Vec<RawStatus>> {
        let mut statuses = self.timelines.get(&user_id).cloned().unwrap_or_default();
        statuses.truncate(max);
        Ok(statuses)
    }

    async fn open_stream(&self, _track_terms: &[String]) -> Result<PostStream> {
        let items: Vec<Result<RawStatus>> = self
            .stream_items
            .lock()
            .unwrap()
            .drain(..)
            .map(Ok)
            .collect();
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

// ---------------------------------------------------------------------------
// MockScheduler
// ---------------------------------------------------------------------------

/// Records submissions and cancellations instead of queueing anything.
#[derive(Default)]
pub struct MockScheduler {
    submitted: Mutex<Vec<ScheduledJob>>,
    cancelled: Mutex<Vec<String>>,
}

impl MockScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> Vec<ScheduledJob> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobScheduler for MockScheduler {
    async fn submit(&self, job: ScheduledJob) -> std::result::Result<(), MurmurError> {
        self.submitted.lock().unwrap().push(job);
        Ok(())
    }

    async fn cancel_named(&self, name: &str) -> std::result::Result<(), MurmurError> {
        self.cancelled.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Status builders
// ---------------------------------------------------------------------------

pub fn make_status(id: u64, author_id: u64, handle: &str, text: &str) -> RawStatus {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "id_str": id.to_string(),
        "text": text,
        "user": {
            "id": author_id,
            "id_str": author_id.to_string(),
            "screen_name": handle,
            "name": handle,
        },
    }))
    .expect("valid status json")
}

pub fn make_reply(
    id: u64,
    author_id: u64,
    handle: &str,
    text: &str,
    parent_id: u64,
    parent_author: u64,
    parent_handle: &str,
) -> RawStatus {
    let mut status = make_status(id, author_id, handle, text);
    status.in_reply_to_status_id = Some(parent_id);
    status.in_reply_to_user_id = Some(parent_author);
    status.in_reply_to_screen_name = Some(parent_handle.to_string());
    status
}

pub fn make_retweet(id: u64, author_id: u64, handle: &str, original: RawStatus) -> RawStatus {
    let mut status = make_status(
        id,
        author_id,
        handle,
        &format!("RT @{}: {}", original.user.screen_name.as_deref().unwrap_or(""), original.full_text()),
    );
    status.retweeted_status = Some(Box::new(original));
    status
}

pub fn with_mention(mut status: RawStatus, id: u64, handle: &str) -> RawStatus {
    status.entities.user_mentions.push(
        serde_json::from_value(serde_json::json!({
            "id": id,
            "id_str": id.to_string(),
            "screen_name": handle,
        }))
        .expect("valid mention json"),
    );
    status
}

pub fn with_hashtag(mut status: RawStatus, tag: &str) -> RawStatus {
    status.entities.hashtags.push(
        serde_json::from_value(serde_json::json!({"text": tag})).expect("valid hashtag json"),
    );
    status
}
