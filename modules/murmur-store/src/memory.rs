//! In-memory store for deterministic tests. Same contracts as the Neo4j
//! store, including the at-most-one-create discipline: all mutations go
//! through one mutex, so racing writers serialize per call and converge on
//! the same row.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use murmur_common::{
    Actor, ActorId, Community, Fact, FillKind, Post, PostId, SocialRelation,
};

use crate::error::Result;
use crate::graph::detect_profile_facts;
use crate::traits::{ActorStore, CreateOutcome, PostStore};

#[derive(Default)]
struct Inner {
    actors: HashMap<ActorId, Actor>,
    posts: HashMap<PostId, Post>,
    edges: HashMap<(ActorId, SocialRelation), Vec<ActorId>>,
    facts: Vec<Fact>,
    communities: Vec<Community>,
    hashtag_rules: HashMap<String, Vec<String>>,
    url_rules: HashMap<String, Vec<String>>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post_count(&self) -> usize {
        self.inner.lock().unwrap().posts.len()
    }

    pub fn actor_count(&self) -> usize {
        self.inner.lock().unwrap().actors.len()
    }

    pub fn facts(&self) -> Vec<Fact> {
        self.inner.lock().unwrap().facts.clone()
    }

    pub fn communities(&self) -> Vec<Community> {
        self.inner.lock().unwrap().communities.clone()
    }

    /// Rules linked to a hashtag entity through its posts.
    pub fn hashtag_rules(&self, tag: &str) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .hashtag_rules
            .get(tag)
            .cloned()
            .unwrap_or_default()
    }

    /// Rules linked to a URL entity through its posts.
    pub fn url_rules(&self, expanded_url: &str) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .url_rules
            .get(expanded_url)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ActorStore for MemoryStore {
    async fn get_actor(&self, id: ActorId) -> Result<Option<Actor>> {
        Ok(self.inner.lock().unwrap().actors.get(&id).cloned())
    }

    async fn actors_by_ids(&self, ids: &[ActorId]) -> Result<Vec<Actor>> {
        let inner = self.inner.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| inner.actors.get(id).cloned())
            .collect())
    }

    async fn upsert_stub(
        &self,
        id: ActorId,
        handle: Option<&str>,
        display_name: Option<&str>,
    ) -> Result<Actor> {
        let mut inner = self.inner.lock().unwrap();
        let actor = inner
            .actors
            .entry(id)
            .or_insert_with(|| Actor::stub(id, None, None));
        if let Some(h) = handle {
            actor.handle = Some(h.to_string());
        }
        if let Some(n) = display_name {
            actor.display_name = Some(n.to_string());
        }
        Ok(actor.clone())
    }

    async fn upsert_full(&self, profile: &Actor) -> Result<Vec<Fact>> {
        let mut inner = self.inner.lock().unwrap();
        let existing = inner.actors.get(&profile.id);

        let mut facts = Vec::new();
        if let Some(old) = existing {
            if old.filled {
                facts = detect_profile_facts(
                    profile,
                    old.handle.as_deref(),
                    old.display_name.as_deref(),
                    old.location.as_deref(),
                );
            }
        }

        let mut updated = profile.clone();
        updated.filled = true;
        updated.updated_at = Utc::now();
        if let Some(old) = existing {
            updated.inserted_at = old.inserted_at;
            updated.matched_rules = old.matched_rules.clone();
            updated.campaigns = old.campaigns.clone();
            updated.followers_filled_at = old.followers_filled_at;
            updated.friends_filled_at = old.friends_filled_at;
            updated.timeline_filled_at = old.timeline_filled_at;
        }
        inner.actors.insert(profile.id, updated);
        inner.facts.extend(facts.clone());
        Ok(facts)
    }

    async fn link_actor_rules(
        &self,
        id: ActorId,
        rule_slugs: &[String],
        campaign: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let actor = inner
            .actors
            .entry(id)
            .or_insert_with(|| Actor::stub(id, None, None));
        for slug in rule_slugs {
            if !actor.matched_rules.contains(slug) {
                actor.matched_rules.push(slug.clone());
            }
        }
        if let Some(c) = campaign {
            if !actor.campaigns.iter().any(|x| x == c) {
                actor.campaigns.push(c.to_string());
            }
        }
        Ok(())
    }

    async fn set_social_edges(
        &self,
        id: ActorId,
        relation: SocialRelation,
        edges: &[ActorId],
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        for eid in edges {
            inner
                .actors
                .entry(*eid)
                .or_insert_with(|| Actor::stub(*eid, None, None));
        }
        inner.edges.insert((id, relation), edges.to_vec());
        Ok(())
    }

    async fn social_edges(&self, id: ActorId, relation: SocialRelation) -> Result<Vec<ActorId>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .edges
            .get(&(id, relation))
            .cloned()
            .unwrap_or_default())
    }

    async fn stamp_filled(&self, id: ActorId, kind: FillKind, at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(actor) = inner.actors.get_mut(&id) {
            match kind {
                FillKind::Followers => actor.followers_filled_at = Some(at),
                FillKind::Friends => actor.friends_filled_at = Some(at),
                FillKind::Timeline => actor.timeline_filled_at = Some(at),
            }
        }
        Ok(())
    }

    async fn add_fact(&self, fact: &Fact) -> Result<()> {
        self.inner.lock().unwrap().facts.push(fact.clone());
        Ok(())
    }

    async fn create_community(&self, community: &Community) -> Result<()> {
        self.inner.lock().unwrap().communities.push(community.clone());
        Ok(())
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn get_post(&self, id: PostId) -> Result<Option<Post>> {
        Ok(self.inner.lock().unwrap().posts.get(&id).cloned())
    }

    async fn contains_post(&self, id: PostId) -> Result<bool> {
        Ok(self.inner.lock().unwrap().posts.contains_key(&id))
    }

    async fn posts_by_ids(&self, ids: &[PostId]) -> Result<Vec<Post>> {
        let inner = self.inner.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| inner.posts.get(id).cloned())
            .collect())
    }

    async fn posts_matching_rules(&self, rule_slugs: &[String]) -> Result<Vec<Post>> {
        let inner = self.inner.lock().unwrap();
        let mut posts: Vec<Post> = inner
            .posts
            .values()
            .filter(|p| p.matched_rules.iter().any(|r| rule_slugs.contains(r)))
            .cloned()
            .collect();
        posts.sort_by_key(|p| p.id);
        Ok(posts)
    }

    async fn create_post(&self, post: &Post) -> Result<CreateOutcome> {
        let mut inner = self.inner.lock().unwrap();
        if inner.posts.contains_key(&post.id) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        inner.posts.insert(post.id, post.clone());
        Ok(CreateOutcome::Created)
    }

    async fn link_post_rules(
        &self,
        id: PostId,
        rule_slugs: &[String],
        campaign: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let (hashtags, urls) = match inner.posts.get_mut(&id) {
            Some(post) => {
                for slug in rule_slugs {
                    if !post.matched_rules.contains(slug) {
                        post.matched_rules.push(slug.clone());
                    }
                }
                if let Some(c) = campaign {
                    if !post.campaigns.iter().any(|x| x == c) {
                        post.campaigns.push(c.to_string());
                    }
                }
                (
                    post.hashtags.clone(),
                    post.urls.iter().map(|u| u.expanded_url.clone()).collect::<Vec<_>>(),
                )
            }
            None => return Ok(()),
        };

        for tag in hashtags {
            let linked = inner.hashtag_rules.entry(tag).or_default();
            for slug in rule_slugs {
                if !linked.contains(slug) {
                    linked.push(slug.clone());
                }
            }
        }
        for u in urls {
            let linked = inner.url_rules.entry(u).or_default();
            for slug in rule_slugs {
                if !linked.contains(slug) {
                    linked.push(slug.clone());
                }
            }
        }
        Ok(())
    }
}
