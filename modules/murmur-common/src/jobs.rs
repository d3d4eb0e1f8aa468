//! Job boundary. The task queue/scheduler underneath is an external
//! collaborator; sessions and operations talk to it through this seam.
//! Rescheduling is cooperative: a pending dependent re-submits itself with
//! a delay instead of blocking a worker.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::MurmurError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobKind {
    /// Restart a stream session worker after a crash or deploy.
    ResumeSession { session_id: i64 },
    /// Re-check an operation's completion and re-run the dependent work.
    RetryOperationPoll { operation_id: Uuid },
}

/// A named, delayed job submission. Names are stable per logical process
/// (e.g. `tracker-3`) so outstanding submissions can be cancelled by name.
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub name: String,
    pub kind: JobKind,
    pub run_after: DateTime<Utc>,
}

#[async_trait]
pub trait JobScheduler: Send + Sync {
    async fn submit(&self, job: ScheduledJob) -> Result<(), MurmurError>;

    /// Cancel every outstanding job carrying this name.
    async fn cancel_named(&self, name: &str) -> Result<(), MurmurError>;
}
