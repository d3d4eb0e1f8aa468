//! Store trait seams. The persistence engine underneath is an external
//! collaborator; everything above it talks to these traits. Two
//! implementations ship: [`crate::GraphStore`] (Neo4j) and
//! [`crate::memory::MemoryStore`] (deterministic tests — no network, no
//! database, no Docker).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use murmur_common::{Actor, ActorId, Community, Fact, FillKind, Post, PostId, SocialRelation};

use crate::error::Result;

/// Outcome of an idempotent create. A second concurrent creator for the
/// same external id observes `AlreadyExists`, never a duplicate row and
/// never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

#[async_trait]
pub trait ActorStore: Send + Sync {
    async fn get_actor(&self, id: ActorId) -> Result<Option<Actor>>;

    async fn actors_by_ids(&self, ids: &[ActorId]) -> Result<Vec<Actor>>;

    /// Get-or-create a minimally-populated row for a referenced actor.
    /// Never downgrades an existing full record; fills in handle/name on a
    /// stub when the reference knows them.
    async fn upsert_stub(
        &self,
        id: ActorId,
        handle: Option<&str>,
        display_name: Option<&str>,
    ) -> Result<Actor>;

    /// Upsert a full profile. Detected changes to name, handle, or
    /// location on an already-filled record are recorded as facts (an
    /// audit trail, not a behavioral branch) and returned.
    async fn upsert_full(&self, profile: &Actor) -> Result<Vec<Fact>>;

    /// Attach rule linkage (and optional campaign linkage) to an actor.
    /// Idempotent: re-linking an already-linked rule is a no-op.
    async fn link_actor_rules(
        &self,
        id: ActorId,
        rule_slugs: &[String],
        campaign: Option<&str>,
    ) -> Result<()>;

    /// Replace an actor's follower or friend edge set. Referenced actors
    /// unknown to the store are created as stubs.
    async fn set_social_edges(
        &self,
        id: ActorId,
        relation: SocialRelation,
        edges: &[ActorId],
    ) -> Result<()>;

    async fn social_edges(&self, id: ActorId, relation: SocialRelation) -> Result<Vec<ActorId>>;

    /// Stamp the "filled at" timestamp for a bulk-fetch kind. Monotonic
    /// with respect to this actor's own writers only.
    async fn stamp_filled(&self, id: ActorId, kind: FillKind, at: DateTime<Utc>) -> Result<()>;

    async fn add_fact(&self, fact: &Fact) -> Result<()>;

    async fn create_community(&self, community: &Community) -> Result<()>;
}

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn get_post(&self, id: PostId) -> Result<Option<Post>>;

    async fn contains_post(&self, id: PostId) -> Result<bool>;

    async fn posts_by_ids(&self, ids: &[PostId]) -> Result<Vec<Post>>;

    /// All posts linked to any of the given rules.
    async fn posts_matching_rules(&self, rule_slugs: &[String]) -> Result<Vec<Post>>;

    /// Idempotent get-or-create keyed by the post's external id. The
    /// create race is resolved inside the store: losers observe
    /// `AlreadyExists` and attach linkage only.
    async fn create_post(&self, post: &Post) -> Result<CreateOutcome>;

    /// Attach rule linkage (and optional campaign linkage) to a post, and
    /// propagate the same linkage to the post's extracted hashtag and URL
    /// entities. Idempotent under duplicate delivery.
    async fn link_post_rules(
        &self,
        id: PostId,
        rule_slugs: &[String],
        campaign: Option<&str>,
    ) -> Result<()>;
}
