//! Stream session lifecycle. One session owns one long-lived firehose
//! connection and dispatches inbound statuses into the ingestion pipeline
//! synchronously — a slow persist backpressures the receive loop, which is
//! acceptable because duplicate delivery on reconnect is tolerated by the
//! idempotent upserts underneath.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tracing::{debug, error, info, warn};

use murmur_common::{JobScheduler, MurmurError, Rule};
use murmur_store::{ActorStore, PostStore};

use crate::pipeline::{IngestOutcome, IngestionPipeline};
use crate::track::compile_track_terms;
use crate::traits::PlatformApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Starting,
    Active,
    Stopping,
    Expired,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub id: i64,
    pub campaign: Option<String>,
    pub rules: Vec<Rule>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Max reply-chain depth to resolve per post (-1 = unbounded).
    pub max_nested_level: i32,
}

#[derive(Debug)]
struct Shared {
    state: SessionState,
    termination: bool,
    started_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
    last_heartbeat: Option<DateTime<Utc>>,
    memory_usage: Option<String>,
    post_counter: u64,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: SessionState::Created,
            termination: false,
            started_at: None,
            stopped_at: None,
            last_heartbeat: None,
            memory_usage: None,
            post_counter: 0,
        }
    }
}

/// Cheap cloneable view onto a running session, held by the manager.
#[derive(Clone)]
pub struct SessionHandle {
    id: i64,
    shared: Arc<Mutex<Shared>>,
}

impl SessionHandle {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().unwrap().state
    }

    pub fn post_count(&self) -> u64 {
        self.shared.lock().unwrap().post_counter
    }

    pub fn last_heartbeat(&self) -> Option<DateTime<Utc>> {
        self.shared.lock().unwrap().last_heartbeat
    }

    /// Process memory snapshot taken at the last heartbeat.
    pub fn memory_usage(&self) -> Option<String> {
        self.shared.lock().unwrap().memory_usage.clone()
    }

    /// Request cooperative termination. Observed at the next inbound
    /// event, not preemptively.
    pub fn request_stop(&self) {
        let mut shared = self.shared.lock().unwrap();
        shared.termination = true;
        if shared.state == SessionState::Active || shared.state == SessionState::Starting {
            shared.state = SessionState::Stopping;
        }
        shared.stopped_at = Some(Utc::now());
    }
}

/// Explicit registry of live sessions. Injected wherever session control
/// is needed; register/deregister bound the lifecycle.
#[derive(Default)]
pub struct SessionManager {
    sessions: Mutex<HashMap<i64, SessionHandle>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handle: SessionHandle) {
        self.sessions.lock().unwrap().insert(handle.id(), handle);
    }

    pub fn deregister(&self, id: i64) {
        self.sessions.lock().unwrap().remove(&id);
    }

    pub fn get(&self, id: i64) -> Option<SessionHandle> {
        self.sessions.lock().unwrap().get(&id).cloned()
    }

    /// Stop a session: set its termination flag and cancel any scheduled
    /// resumption jobs tied to its process name.
    pub async fn stop(&self, id: i64, scheduler: &dyn JobScheduler) -> Result<(), MurmurError> {
        let handle = self
            .get(id)
            .ok_or_else(|| MurmurError::Validation(format!("unknown session {id}")))?;
        info!(session = id, "Stopping session");
        scheduler.cancel_named(&process_name(id)).await?;
        handle.request_stop();
        Ok(())
    }
}

pub fn process_name(id: i64) -> String {
    format!("tracker-{id}")
}

pub struct TrackSession<S, A> {
    config: SessionConfig,
    pipeline: IngestionPipeline<S, A>,
    api: Arc<A>,
    shared: Arc<Mutex<Shared>>,
}

impl<S, A> TrackSession<S, A>
where
    S: ActorStore + PostStore,
    A: PlatformApi,
{
    pub fn new(config: SessionConfig, store: Arc<S>, api: Arc<A>) -> Self {
        let pipeline = IngestionPipeline::new(
            store,
            api.clone(),
            config.max_nested_level,
            config.campaign.clone(),
        );
        Self {
            config,
            pipeline,
            api,
            shared: Arc::new(Mutex::new(Shared::new())),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            id: self.config.id,
            shared: self.shared.clone(),
        }
    }

    pub fn process_name(&self) -> String {
        process_name(self.config.id)
    }

    /// Run the session to completion: open the connection, dispatch every
    /// inbound status, observe stop/expiry cooperatively.
    pub async fn run(&self) -> Result<()> {
        {
            let mut shared = self.shared.lock().unwrap();
            if shared.state == SessionState::Active {
                warn!(session = self.config.id, "Session already running");
                return Ok(());
            }
            if self.config.rules.is_empty() {
                return Err(
                    MurmurError::Validation("session has no tracking rules".to_string()).into(),
                );
            }
            shared.state = SessionState::Starting;
            shared.termination = false;
        }

        let terms = compile_track_terms(&self.config.rules);
        info!(session = self.config.id, terms = ?terms, "Starting session");
        let mut stream = self.api.open_stream(&terms).await?;

        {
            let mut shared = self.shared.lock().unwrap();
            shared.state = SessionState::Active;
            shared.started_at = Some(Utc::now());
        }
        self.heartbeat();

        while let Some(item) = stream.next().await {
            if self.check_termination() {
                break;
            }
            match item {
                Ok(status) => {
                    match self.pipeline.ingest(&status, &self.config.rules).await {
                        Ok(IngestOutcome::Persisted { post_id, matched }) => {
                            debug!(session = self.config.id, post_id, matched, "Ingested");
                            self.inc_counter();
                        }
                        Ok(IngestOutcome::Discarded) => {}
                        Err(err) => {
                            // One bad post never terminates the session.
                            error!(session = self.config.id, %err, "Error ingesting status");
                        }
                    }
                }
                Err(err) => {
                    warn!(session = self.config.id, %err, "Stream error, closing session");
                    break;
                }
            }
            self.heartbeat();
        }

        self.deactivate();
        Ok(())
    }

    /// Exclusive read of the termination flag. Sessions past their
    /// `expires_at` are terminated lazily here rather than by a timer.
    fn check_termination(&self) -> bool {
        let mut shared = self.shared.lock().unwrap();
        if let Some(expires_at) = self.config.expires_at {
            if expires_at <= Utc::now() {
                debug!(session = self.config.id, "Session expired");
                shared.state = SessionState::Expired;
                shared.termination = true;
                return true;
            }
        }
        shared.termination
    }

    fn inc_counter(&self) {
        self.shared.lock().unwrap().post_counter += 1;
    }

    /// Liveness timestamp plus a process memory snapshot.
    fn heartbeat(&self) {
        let mut shared = self.shared.lock().unwrap();
        shared.last_heartbeat = Some(Utc::now());
        shared.memory_usage = Some(memory_usage());
    }

    fn deactivate(&self) {
        let mut shared = self.shared.lock().unwrap();
        info!(
            session = self.config.id,
            posts = shared.post_counter,
            "Deactivating session"
        );
        shared.state = SessionState::Stopped;
        if shared.stopped_at.is_none() {
            shared.stopped_at = Some(Utc::now());
        }
    }
}

impl<S, A> Drop for TrackSession<S, A> {
    // Best-effort termination on abnormal exit. If the session was already
    // deactivated by another path this is a no-op.
    fn drop(&mut self) {
        if let Ok(mut shared) = self.shared.lock() {
            if shared.state != SessionState::Stopped {
                debug!(session = self.config.id, "Session dropped while live");
                shared.termination = true;
                shared.state = SessionState::Stopped;
            }
        }
    }
}

/// Resident set size of this process, formatted for the heartbeat.
/// "Unknown" where procfs is unavailable.
fn memory_usage() -> String {
    match std::fs::read_to_string("/proc/self/status") {
        Ok(status) => status
            .lines()
            .find(|l| l.starts_with("VmRSS:"))
            .and_then(|l| l.split_whitespace().nth(1))
            .and_then(|kb| kb.parse::<f64>().ok())
            .map(|kb| format!("{:.1} MB", kb / 1024.0))
            .unwrap_or_else(|| "Unknown".to_string()),
        Err(_) => "Unknown".to_string(),
    }
}
