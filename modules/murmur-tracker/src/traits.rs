//! Trait abstraction over the external platform API. The real
//! implementation is [`twitter_client::TwitterClient`]; tests use the
//! in-memory mock from [`crate::testing`] — no network.

use async_trait::async_trait;

use twitter_client::{PostStream, RawStatus, RawUser, Result};

#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Fetch a single post by id.
    async fn get_status(&self, id: u64) -> Result<RawStatus>;

    /// Fetch a single actor profile by id.
    async fn get_user(&self, id: u64) -> Result<RawUser>;

    /// Follower ids, rate-limit-aware, up to `cap` (0 = no cap).
    async fn followers_ids(&self, user_id: u64, cap: usize) -> Result<Vec<u64>>;

    /// Friend ids, rate-limit-aware, up to `cap`.
    async fn friends_ids(&self, user_id: u64, cap: usize) -> Result<Vec<u64>>;

    /// Recent posts of an actor, newest first, up to `max`.
    async fn user_timeline(&self, user_id: u64, max: usize) -> Result<Vec<RawStatus>>;

    /// Open the long-lived filtered firehose connection.
    async fn open_stream(&self, track_terms: &[String]) -> Result<PostStream>;
}

#[async_trait]
impl PlatformApi for twitter_client::TwitterClient {
    async fn get_status(&self, id: u64) -> Result<RawStatus> {
        self.get_status(id).await
    }

    async fn get_user(&self, id: u64) -> Result<RawUser> {
        self.get_user(id).await
    }

    async fn followers_ids(&self, user_id: u64, cap: usize) -> Result<Vec<u64>> {
        self.followers_ids(user_id, cap).await
    }

    async fn friends_ids(&self, user_id: u64, cap: usize) -> Result<Vec<u64>> {
        self.friends_ids(user_id, cap).await
    }

    async fn user_timeline(&self, user_id: u64, max: usize) -> Result<Vec<RawStatus>> {
        self.user_timeline(user_id, max).await
    }

    async fn open_stream(&self, track_terms: &[String]) -> Result<PostStream> {
        self.open_stream(track_terms).await
    }
}
