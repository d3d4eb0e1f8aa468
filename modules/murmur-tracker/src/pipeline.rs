//! Ingestion pipeline: raw status in, durable deduplicated entities out.
//!
//! Persistence is parent-first (ancestors before children) so relational
//! references are always valid, and every step is an idempotent upsert —
//! duplicate delivery from the firehose is tolerated by design. A
//! per-ingestion seen-set guarantees termination even on pathological
//! reply/quote cycles.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use murmur_common::{PostId, Rule};
use murmur_store::{ActorStore, PostStore};
use twitter_client::RawStatus;

use crate::convert::{actor_from_user, post_from_status};
use crate::rules::matching_rules;
use crate::traits::PlatformApi;

/// What happened to one inbound status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Persisted, with the number of rules the primary status matched.
    Persisted { post_id: PostId, matched: usize },
    /// No rule matched any candidate; nothing was persisted.
    Discarded,
}

pub struct IngestionPipeline<S, A> {
    store: Arc<S>,
    api: Arc<A>,
    /// Max reply-chain depth to resolve (-1 = unbounded).
    max_nested_level: i32,
    campaign: Option<String>,
}

impl<S, A> IngestionPipeline<S, A>
where
    S: ActorStore + PostStore,
    A: PlatformApi,
{
    pub fn new(
        store: Arc<S>,
        api: Arc<A>,
        max_nested_level: i32,
        campaign: Option<String>,
    ) -> Self {
        Self {
            store,
            api,
            max_nested_level,
            campaign,
        }
    }

    /// Ingest one inbound status against the active rule set.
    ///
    /// Failures local to one node (deleted or protected ancestors) are
    /// absorbed; an error return means this status alone failed, never the
    /// session.
    pub async fn ingest(&self, status: &RawStatus, rules: &[Rule]) -> Result<IngestOutcome> {
        // The status plus its embedded sources are the match candidates.
        let mut candidates: Vec<&RawStatus> = vec![status];
        if let Some(rt) = &status.retweeted_status {
            candidates.push(rt);
        }
        if let Some(q) = &status.quoted_status {
            candidates.push(q);
        }

        let matched_primary = matching_rules(rules, status).len();
        let matched_any = matched_primary > 0
            || candidates[1..]
                .iter()
                .any(|s| !matching_rules(rules, s).is_empty());
        if !matched_any {
            debug!(id = status.id, "No rule matched, discarding");
            return Ok(IngestOutcome::Discarded);
        }

        let ancestors = self.resolve_ancestors(status).await;

        let mut seen: HashSet<PostId> = HashSet::new();
        for ancestor in ancestors.iter().rev() {
            self.persist_tree(ancestor, rules, &mut seen).await?;
        }
        self.persist_tree(status, rules, &mut seen).await?;

        Ok(IngestOutcome::Persisted {
            post_id: status.id,
            matched: matched_primary,
        })
    }

    /// Persist a status fetched outside the firehose (timeline fills).
    /// No rule evaluation; campaign linkage only.
    pub async fn persist_status(&self, status: &RawStatus) -> Result<PostId> {
        let mut seen = HashSet::new();
        self.persist_tree(status, &[], &mut seen).await?;
        Ok(status.id)
    }

    /// Walk up the reply chain, fetching ancestors not yet stored, until
    /// the configured depth is exceeded or the chain ends. A missing
    /// ancestor (deleted, private, suspended) truncates the chain there
    /// without failing the ingestion.
    async fn resolve_ancestors(&self, status: &RawStatus) -> Vec<RawStatus> {
        let mut chain: Vec<RawStatus> = Vec::new();
        let mut cursor = status.in_reply_to_status_id;
        let mut fetched: HashSet<u64> = HashSet::new();
        let mut level: i32 = 0;

        while let Some(parent_id) = cursor {
            if self.max_nested_level >= 0 && level > self.max_nested_level {
                debug!(
                    max = self.max_nested_level,
                    "Max nesting level reached, chain truncated"
                );
                break;
            }
            if !fetched.insert(parent_id) {
                warn!(parent_id, "Reply chain cycle detected, stopping");
                break;
            }
            match self.store.contains_post(parent_id).await {
                Ok(true) => break,
                Ok(false) => {}
                Err(err) => {
                    warn!(parent_id, %err, "Ancestor lookup failed, chain truncated");
                    break;
                }
            }
            match self.api.get_status(parent_id).await {
                Ok(parent) => {
                    cursor = parent.in_reply_to_status_id;
                    chain.push(parent);
                }
                Err(err) if err.is_soft_skip() => {
                    warn!(parent_id, %err, "Cannot retrieve ancestor, chain truncated");
                    break;
                }
                Err(err) => {
                    warn!(parent_id, %err, "Ancestor fetch failed, chain truncated");
                    break;
                }
            }
            level += 1;
        }
        chain
    }

    /// Persist a status and its embedded sources, parents first. The seen
    /// set spans one ingestion call and makes re-entry a no-op.
    async fn persist_tree(
        &self,
        status: &RawStatus,
        rules: &[Rule],
        seen: &mut HashSet<PostId>,
    ) -> Result<()> {
        // Breadth-first over the embedded tree, then persist in reverse so
        // referenced posts exist before their referrers.
        let mut queue: VecDeque<&RawStatus> = VecDeque::from([status]);
        let mut ordered: Vec<&RawStatus> = Vec::new();
        while let Some(s) = queue.pop_front() {
            ordered.push(s);
            if let Some(rt) = &s.retweeted_status {
                queue.push_back(rt);
            }
            if let Some(q) = &s.quoted_status {
                queue.push_back(q);
            }
        }
        for s in ordered.iter().rev() {
            self.persist_one(s, rules, seen).await?;
        }
        Ok(())
    }

    async fn persist_one(
        &self,
        status: &RawStatus,
        rules: &[Rule],
        seen: &mut HashSet<PostId>,
    ) -> Result<()> {
        if !seen.insert(status.id) {
            return Ok(());
        }

        // Author first: the post row references it.
        let author = actor_from_user(&status.user);
        let facts = self.store.upsert_full(&author).await?;
        for fact in &facts {
            info!(actor = author.id, fact = %fact.text, "Profile change recorded");
        }

        if let Some(uid) = status.in_reply_to_user_id {
            self.store
                .upsert_stub(uid, status.in_reply_to_screen_name.as_deref(), None)
                .await?;
        }
        for mention in &status.all_entities().user_mentions {
            self.store
                .upsert_stub(mention.id, Some(&mention.screen_name), mention.name.as_deref())
                .await?;
        }

        let post = post_from_status(status);
        self.store.create_post(&post).await?;

        // Rule linkage: rules this status matches, plus the ones inherited
        // from a stored reply parent (thread membership).
        let mut slugs: Vec<String> = matching_rules(rules, status)
            .iter()
            .map(|r| r.slug.clone())
            .collect();
        if let Some(parent_id) = post.in_reply_to_post {
            if let Some(parent) = self.store.get_post(parent_id).await? {
                for slug in parent.matched_rules {
                    if !slugs.contains(&slug) {
                        slugs.push(slug);
                    }
                }
            }
        }

        if !slugs.is_empty() || self.campaign.is_some() {
            self.store
                .link_post_rules(post.id, &slugs, self.campaign.as_deref())
                .await?;
            self.store
                .link_actor_rules(post.author, &slugs, self.campaign.as_deref())
                .await?;
        }

        debug!(id = post.id, matched = slugs.len(), "Status persisted");
        Ok(())
    }
}
