//! Long-running bulk fetches (followers, friends, timelines) as
//! restartable background jobs. Work fans out over the target actor set on
//! a bounded worker pool; completion is tracked per sub-kind under an
//! exclusive lock; dependent callers poll and reschedule themselves with a
//! fixed backoff instead of blocking a worker.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use murmur_common::{
    ActorId, Config, FillKind, JobKind, JobScheduler, MurmurError, ScheduledJob, SocialRelation,
};
use murmur_store::{ActorStore, PostStore};
use murmur_tracker::{IngestionPipeline, PlatformApi};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Fill follower and friend edges for the target set.
    ConstructNetwork,
    /// Fill recent timelines for the target set.
    RetrieveTimelines,
}

impl OperationKind {
    pub fn sub_kinds(&self) -> &'static [FillKind] {
        match self {
            OperationKind::ConstructNetwork => &[FillKind::Followers, FillKind::Friends],
            OperationKind::RetrieveTimelines => &[FillKind::Timeline],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationHandle(pub Uuid);

#[derive(Debug)]
struct OperationState {
    #[allow(dead_code)] // retained for operator inspection
    kind: OperationKind,
    flags: HashMap<FillKind, bool>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

/// Cost and freshness controls for bulk fetches.
#[derive(Debug, Clone)]
pub struct OpsConfig {
    pub max_target_actors: usize,
    /// Skip actors whose declared follower count exceeds this ceiling.
    pub max_followers: u32,
    pub max_friends: u32,
    pub max_timeline_posts: u32,
    /// Don't refetch an actor filled within this window.
    pub fill_freshness_days: i64,
    pub retry_minutes: i64,
    pub max_concurrency: usize,
}

impl From<&Config> for OpsConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_target_actors: config.max_target_actors,
            max_followers: config.max_followers,
            max_friends: config.max_friends,
            max_timeline_posts: config.max_timeline_posts,
            fill_freshness_days: config.fill_freshness_days,
            retry_minutes: config.ops_retry_minutes,
            max_concurrency: config.ops_max_concurrency,
        }
    }
}

pub struct OperationOrchestrator<S, A> {
    store: Arc<S>,
    api: Arc<A>,
    config: OpsConfig,
    semaphore: Arc<Semaphore>,
    ops: Arc<Mutex<HashMap<Uuid, OperationState>>>,
    campaign: Option<String>,
}

impl<S, A> OperationOrchestrator<S, A>
where
    S: ActorStore + PostStore + 'static,
    A: PlatformApi + 'static,
{
    pub fn new(store: Arc<S>, api: Arc<A>, config: OpsConfig, campaign: Option<String>) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self {
            store,
            api,
            config,
            semaphore,
            ops: Arc::new(Mutex::new(HashMap::new())),
            campaign,
        }
    }

    /// Validate and launch an operation. Rejections (empty target set,
    /// capacity exceeded) surface to the caller and nothing is started.
    pub fn submit(
        &self,
        kind: OperationKind,
        targets: &[ActorId],
    ) -> Result<OperationHandle, MurmurError> {
        if targets.is_empty() {
            return Err(MurmurError::Validation(
                "operation target set is empty".to_string(),
            ));
        }
        if targets.len() > self.config.max_target_actors {
            return Err(MurmurError::CapacityExceeded {
                count: targets.len(),
                max: self.config.max_target_actors,
            });
        }

        let id = Uuid::new_v4();
        let flags = kind.sub_kinds().iter().map(|k| (*k, false)).collect();
        self.ops.lock().unwrap().insert(
            id,
            OperationState {
                kind,
                flags,
                started_at: Utc::now(),
                finished_at: None,
            },
        );
        info!(operation = %id, ?kind, targets = targets.len(), "Operation started");

        for sub_kind in kind.sub_kinds() {
            let store = self.store.clone();
            let api = self.api.clone();
            let config = self.config.clone();
            let semaphore = self.semaphore.clone();
            let ops = self.ops.clone();
            let campaign = self.campaign.clone();
            let targets = targets.to_vec();
            let sub_kind = *sub_kind;
            tokio::spawn(async move {
                run_sub_kind(store, api, config, semaphore, campaign, targets, sub_kind).await;
                mark_sub_kind_done(&ops, id, sub_kind);
            });
        }

        Ok(OperationHandle(id))
    }

    /// True only when every configured sub-kind has completed. Read under
    /// the same exclusive lock the workers write under.
    pub fn is_finished(&self, handle: OperationHandle) -> bool {
        let ops = self.ops.lock().unwrap();
        ops.get(&handle.0)
            .map(|state| state.flags.values().all(|f| *f))
            .unwrap_or(false)
    }

    /// Poll an operation. Unknown handles are a caller error.
    pub fn poll(&self, handle: OperationHandle) -> Result<bool, MurmurError> {
        let ops = self.ops.lock().unwrap();
        let state = ops
            .get(&handle.0)
            .ok_or_else(|| MurmurError::Validation(format!("unknown operation {}", handle.0)))?;
        Ok(state.flags.values().all(|f| *f))
    }

    pub fn started_at(&self, handle: OperationHandle) -> Option<DateTime<Utc>> {
        self.ops.lock().unwrap().get(&handle.0).map(|s| s.started_at)
    }

    pub fn finished_at(&self, handle: OperationHandle) -> Option<DateTime<Utc>> {
        self.ops
            .lock()
            .unwrap()
            .get(&handle.0)
            .and_then(|s| s.finished_at)
    }

    /// Cooperative retry for dependents: if the operation is still
    /// pending, re-submit the named job with the configured backoff and
    /// return false. Never blocks.
    pub async fn reschedule_if_pending(
        &self,
        handle: OperationHandle,
        scheduler: &dyn JobScheduler,
        job_name: &str,
    ) -> Result<bool, MurmurError> {
        if self.poll(handle)? {
            return Ok(true);
        }
        let backoff = Duration::minutes(self.config.retry_minutes);
        debug!(
            operation = %handle.0,
            job = job_name,
            minutes = self.config.retry_minutes,
            "Operation pending, rescheduling dependent"
        );
        scheduler
            .submit(ScheduledJob {
                name: job_name.to_string(),
                kind: JobKind::RetryOperationPoll {
                    operation_id: handle.0,
                },
                run_after: Utc::now() + backoff,
            })
            .await?;
        Ok(false)
    }
}

fn mark_sub_kind_done(
    ops: &Arc<Mutex<HashMap<Uuid, OperationState>>>,
    id: Uuid,
    sub_kind: FillKind,
) {
    let mut ops = ops.lock().unwrap();
    if let Some(state) = ops.get_mut(&id) {
        state.flags.insert(sub_kind, true);
        if state.flags.values().all(|f| *f) {
            state.finished_at = Some(Utc::now());
            info!(operation = %id, "Operation finished");
        }
    }
}

async fn run_sub_kind<S, A>(
    store: Arc<S>,
    api: Arc<A>,
    config: OpsConfig,
    semaphore: Arc<Semaphore>,
    campaign: Option<String>,
    targets: Vec<ActorId>,
    sub_kind: FillKind,
) where
    S: ActorStore + PostStore + 'static,
    A: PlatformApi + 'static,
{
    let mut tasks: JoinSet<()> = JoinSet::new();
    for actor_id in targets {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(p) => p,
            Err(_) => return,
        };
        let store = store.clone();
        let api = api.clone();
        let config = config.clone();
        let campaign = campaign.clone();
        tasks.spawn(async move {
            let _permit = permit;
            let result = match sub_kind {
                FillKind::Followers => {
                    fill_social_edges(&*store, &*api, &config, actor_id, SocialRelation::Followers)
                        .await
                }
                FillKind::Friends => {
                    fill_social_edges(&*store, &*api, &config, actor_id, SocialRelation::Friends)
                        .await
                }
                FillKind::Timeline => {
                    fill_timeline(store.clone(), api.clone(), &config, campaign, actor_id).await
                }
            };
            if let Err(err) = result {
                // One failed actor never fails the batch.
                warn!(actor = actor_id, %sub_kind, %err, "Fill failed for actor");
            }
        });
    }
    while tasks.join_next().await.is_some() {}
}

async fn fill_social_edges<S, A>(
    store: &S,
    api: &A,
    config: &OpsConfig,
    actor_id: ActorId,
    relation: SocialRelation,
) -> anyhow::Result<()>
where
    S: ActorStore + PostStore,
    A: PlatformApi,
{
    let Some(actor) = store.get_actor(actor_id).await? else {
        warn!(actor = actor_id, "Target actor not stored, skipping");
        return Ok(());
    };

    let (declared, ceiling, fill_kind) = match relation {
        SocialRelation::Followers => (
            actor.followers_count,
            config.max_followers,
            FillKind::Followers,
        ),
        SocialRelation::Friends => (actor.friends_count, config.max_friends, FillKind::Friends),
    };

    if let Some(count) = declared {
        if count == 0 {
            debug!(actor = actor_id, %relation, "Nothing to fetch");
            return Ok(());
        }
        if count > ceiling {
            warn!(
                actor = actor_id,
                %relation,
                count,
                ceiling,
                "Skipping high-degree actor"
            );
            return Ok(());
        }
    }

    let filled_at = match fill_kind {
        FillKind::Followers => actor.followers_filled_at,
        FillKind::Friends => actor.friends_filled_at,
        FillKind::Timeline => actor.timeline_filled_at,
    };
    if let Some(at) = filled_at {
        if Utc::now() - at < Duration::days(config.fill_freshness_days) {
            debug!(actor = actor_id, %relation, "Filled recently, skipping");
            return Ok(());
        }
    }

    let ids = match relation {
        SocialRelation::Followers => api.followers_ids(actor_id, ceiling as usize).await,
        SocialRelation::Friends => api.friends_ids(actor_id, ceiling as usize).await,
    };
    let ids = match ids {
        Ok(ids) => ids,
        Err(err) if err.is_soft_skip() => {
            warn!(actor = actor_id, %relation, %err, "Actor unavailable, skipping");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    debug!(actor = actor_id, %relation, count = ids.len(), "Fetched edges");
    store.set_social_edges(actor_id, relation, &ids).await?;
    store.stamp_filled(actor_id, fill_kind, Utc::now()).await?;
    Ok(())
}

async fn fill_timeline<S, A>(
    store: Arc<S>,
    api: Arc<A>,
    config: &OpsConfig,
    campaign: Option<String>,
    actor_id: ActorId,
) -> anyhow::Result<()>
where
    S: ActorStore + PostStore,
    A: PlatformApi,
{
    if let Some(actor) = store.get_actor(actor_id).await? {
        if let Some(at) = actor.timeline_filled_at {
            if Utc::now() - at < Duration::days(config.fill_freshness_days) {
                debug!(actor = actor_id, "Timeline filled recently, skipping");
                return Ok(());
            }
        }
    }

    let statuses = match api
        .user_timeline(actor_id, config.max_timeline_posts as usize)
        .await
    {
        Ok(statuses) => statuses,
        Err(err) if err.is_soft_skip() => {
            warn!(actor = actor_id, %err, "Timeline unavailable, skipping");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    // Timeline posts persist without rule evaluation; campaign linkage only.
    let pipeline = IngestionPipeline::new(store.clone(), api, 0, campaign);
    let mut stored = 0usize;
    for status in &statuses {
        match pipeline.persist_status(status).await {
            Ok(_) => stored += 1,
            Err(err) => warn!(actor = actor_id, post = status.id, %err, "Timeline post failed"),
        }
    }
    debug!(actor = actor_id, stored, "Timeline filled");
    store
        .stamp_filled(actor_id, FillKind::Timeline, Utc::now())
        .await?;
    Ok(())
}
