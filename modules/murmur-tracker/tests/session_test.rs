//! Session lifecycle against the mock stream.

use std::sync::{Arc, OnceLock};

use chrono::{Duration, Utc};

use murmur_common::{Rule, RuleKind};
use murmur_store::memory::MemoryStore;
use murmur_tracker::session::{SessionConfig, SessionManager, SessionState, TrackSession};
use murmur_tracker::testing::{make_status, MockPlatformApi, MockScheduler};

fn config(id: i64) -> SessionConfig {
    SessionConfig {
        id,
        campaign: Some("camp".to_string()),
        rules: vec![Rule::new("r", RuleKind::TextAny, "alpha")],
        expires_at: None,
        max_nested_level: 0,
    }
}

#[tokio::test]
async fn session_ingests_stream_and_counts_matches() {
    let store = Arc::new(MemoryStore::new());
    let api = Arc::new(MockPlatformApi::new().with_stream(vec![
        make_status(1, 10, "alice", "alpha one"),
        make_status(2, 11, "bob", "irrelevant"),
        make_status(3, 12, "carol", "alpha two"),
    ]));

    let session = TrackSession::new(config(1), store.clone(), api);
    let handle = session.handle();
    session.run().await.unwrap();

    assert_eq!(handle.state(), SessionState::Stopped);
    assert_eq!(handle.post_count(), 2);
    assert_eq!(store.post_count(), 2);
    assert!(handle.last_heartbeat().is_some());
}

#[tokio::test]
async fn session_with_no_rules_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let api = Arc::new(MockPlatformApi::new());
    let mut cfg = config(1);
    cfg.rules.clear();

    let session = TrackSession::new(cfg, store, api);
    assert!(session.run().await.is_err());
}

/// Delivers one post, requests a stop, then delivers another. The stop
/// must be observed at the next inbound event.
struct StopMidStreamApi {
    handle: Arc<OnceLock<murmur_tracker::SessionHandle>>,
}

#[async_trait::async_trait]
impl murmur_tracker::PlatformApi for StopMidStreamApi {
    async fn get_status(&self, id: u64) -> twitter_client::Result<twitter_client::RawStatus> {
        Err(twitter_client::TwitterError::NotFound(id.to_string()))
    }

    async fn get_user(&self, id: u64) -> twitter_client::Result<twitter_client::RawUser> {
        Err(twitter_client::TwitterError::NotFound(id.to_string()))
    }

    async fn followers_ids(&self, _: u64, _: usize) -> twitter_client::Result<Vec<u64>> {
        Ok(Vec::new())
    }

    async fn friends_ids(&self, _: u64, _: usize) -> twitter_client::Result<Vec<u64>> {
        Ok(Vec::new())
    }

    async fn user_timeline(
        &self,
        _: u64,
        _: usize,
    ) -> twitter_client::Result<Vec<twitter_client::RawStatus>> {
        Ok(Vec::new())
    }

    async fn open_stream(
        &self,
        _: &[String],
    ) -> twitter_client::Result<twitter_client::PostStream> {
        let handle = self.handle.clone();
        let stream = async_stream::stream! {
            yield Ok::<_, twitter_client::TwitterError>(make_status(1, 10, "alice", "alpha one"));
            if let Some(h) = handle.get() {
                h.request_stop();
            }
            yield Ok(make_status(2, 11, "bob", "alpha two"));
        };
        Ok(Box::pin(stream))
    }
}

#[tokio::test]
async fn stop_request_is_observed_at_next_event() {
    let store = Arc::new(MemoryStore::new());
    let slot = Arc::new(OnceLock::new());
    let api = Arc::new(StopMidStreamApi {
        handle: slot.clone(),
    });

    let session = TrackSession::new(config(1), store.clone(), api);
    let handle = session.handle();
    slot.set(handle.clone()).ok();
    session.run().await.unwrap();

    assert_eq!(handle.state(), SessionState::Stopped);
    assert_eq!(store.post_count(), 1, "second post arrives after the stop");
}

#[tokio::test]
async fn expired_session_terminates_lazily() {
    let store = Arc::new(MemoryStore::new());
    let api = Arc::new(MockPlatformApi::new().with_stream(vec![
        make_status(1, 10, "alice", "alpha one"),
    ]));

    let mut cfg = config(1);
    cfg.expires_at = Some(Utc::now() - Duration::minutes(1));
    let session = TrackSession::new(cfg, store.clone(), api);
    let handle = session.handle();
    session.run().await.unwrap();

    assert_eq!(store.post_count(), 0, "expired before any event processed");
    assert_eq!(handle.state(), SessionState::Stopped);
}

#[tokio::test]
async fn manager_stop_cancels_scheduled_resumption_jobs() {
    let store = Arc::new(MemoryStore::new());
    let api = Arc::new(MockPlatformApi::new());
    let session = TrackSession::new(config(7), store, api);

    let manager = SessionManager::new();
    manager.register(session.handle());

    let scheduler = MockScheduler::new();
    manager.stop(7, &scheduler).await.unwrap();

    assert_eq!(scheduler.cancelled(), vec!["tracker-7"]);
    assert_eq!(session.handle().state(), SessionState::Stopping);
    manager.deregister(7);
    assert!(manager.get(7).is_none());
}
