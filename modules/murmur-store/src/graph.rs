//! Neo4j-backed store. Idempotency comes from MERGE on external ids: two
//! writers racing on the same id converge to one node, and relationship
//! MERGE keeps rule linkage free of duplicates under repeated delivery.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use neo4rs::query;
use tracing::debug;

use murmur_common::{
    Actor, ActorId, Community, Fact, FactSubject, FillKind, GeoTag, Post, PostId, SnowflakeParts,
    SocialRelation, UrlEntity,
};

use crate::error::{Result, StoreError};
use crate::traits::{ActorStore, CreateOutcome, PostStore};
use crate::GraphClient;

pub struct GraphStore {
    client: GraphClient,
}

impl GraphStore {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    async fn run(&self, q: neo4rs::Query) -> Result<()> {
        let mut stream = self.client.graph.execute(q).await?;
        while stream.next().await?.is_some() {}
        Ok(())
    }
}

#[async_trait]
impl ActorStore for GraphStore {
    async fn get_actor(&self, id: ActorId) -> Result<Option<Actor>> {
        let q = query(
            "MATCH (a:Actor {id: $id})
             OPTIONAL MATCH (a)-[:MATCHED_RULE]->(r:Rule)
             OPTIONAL MATCH (a)-[:IN_CAMPAIGN]->(c:Campaign)
             RETURN a AS n,
                    [x IN collect(DISTINCT r.slug) WHERE x IS NOT NULL] AS rules,
                    [x IN collect(DISTINCT c.slug) WHERE x IS NOT NULL] AS campaigns",
        )
        .param("id", id as i64);

        let mut stream = self.client.graph.execute(q).await?;
        match stream.next().await? {
            Some(row) => Ok(Some(actor_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn actors_by_ids(&self, ids: &[ActorId]) -> Result<Vec<Actor>> {
        let q = query(
            "MATCH (a:Actor) WHERE a.id IN $ids
             OPTIONAL MATCH (a)-[:MATCHED_RULE]->(r:Rule)
             OPTIONAL MATCH (a)-[:IN_CAMPAIGN]->(c:Campaign)
             RETURN a AS n,
                    [x IN collect(DISTINCT r.slug) WHERE x IS NOT NULL] AS rules,
                    [x IN collect(DISTINCT c.slug) WHERE x IS NOT NULL] AS campaigns",
        )
        .param("ids", ids.iter().map(|i| *i as i64).collect::<Vec<i64>>());

        let mut stream = self.client.graph.execute(q).await?;
        let mut actors = Vec::new();
        while let Some(row) = stream.next().await? {
            actors.push(actor_from_row(&row)?);
        }
        Ok(actors)
    }

    async fn upsert_stub(
        &self,
        id: ActorId,
        handle: Option<&str>,
        display_name: Option<&str>,
    ) -> Result<Actor> {
        let q = query(
            "MERGE (a:Actor {id: $id})
             ON CREATE SET a.filled = false,
                           a.inserted_at = datetime($now),
                           a.updated_at = datetime($now)
             SET a.handle = coalesce($handle, a.handle),
                 a.display_name = coalesce($display_name, a.display_name)
             RETURN a AS n, [] AS rules, [] AS campaigns",
        )
        .param("id", id as i64)
        .param("handle", handle.map(str::to_string))
        .param("display_name", display_name.map(str::to_string))
        .param("now", format_datetime(&Utc::now()));

        let mut stream = self.client.graph.execute(q).await?;
        let row = stream
            .next()
            .await?
            .ok_or_else(|| StoreError::Database("stub upsert returned no row".to_string()))?;
        actor_from_row(&row)
    }

    async fn upsert_full(&self, profile: &Actor) -> Result<Vec<Fact>> {
        let q = query(
            "MERGE (a:Actor {id: $id})
             WITH a,
                  a.handle AS old_handle,
                  a.display_name AS old_name,
                  a.location AS old_location,
                  coalesce(a.filled, false) AS was_filled,
                  a.inserted_at AS old_inserted
             SET a.handle = $handle,
                 a.display_name = $display_name,
                 a.location = $location,
                 a.url = $url,
                 a.bio = $bio,
                 a.protected = $protected,
                 a.verified = $verified,
                 a.followers_count = $followers_count,
                 a.friends_count = $friends_count,
                 a.listed_count = $listed_count,
                 a.favourites_count = $favourites_count,
                 a.statuses_count = $statuses_count,
                 a.created_at = $created_at,
                 a.profile_image_url = $profile_image_url,
                 a.filled = true,
                 a.inserted_at = coalesce(old_inserted, datetime($now)),
                 a.updated_at = datetime($now)
             RETURN old_handle, old_name, old_location, was_filled",
        )
        .param("id", profile.id as i64)
        .param("handle", profile.handle.clone())
        .param("display_name", profile.display_name.clone())
        .param("location", profile.location.clone())
        .param("url", profile.url.clone())
        .param("bio", profile.bio.clone())
        .param("protected", profile.protected)
        .param("verified", profile.verified)
        .param("followers_count", profile.followers_count.map(|c| c as i64))
        .param("friends_count", profile.friends_count.map(|c| c as i64))
        .param("listed_count", profile.listed_count.map(|c| c as i64))
        .param(
            "favourites_count",
            profile.favourites_count.map(|c| c as i64),
        )
        .param("statuses_count", profile.statuses_count.map(|c| c as i64))
        .param("created_at", profile.created_at.map(|t| format_datetime(&t)))
        .param("profile_image_url", profile.profile_image_url.clone())
        .param("now", format_datetime(&Utc::now()));

        let mut stream = self.client.graph.execute(q).await?;
        let row = stream
            .next()
            .await?
            .ok_or_else(|| StoreError::Database("profile upsert returned no row".to_string()))?;

        let was_filled: bool = row.get("was_filled").unwrap_or(false);
        let mut facts = Vec::new();
        if was_filled {
            let old_handle: Option<String> = row.get("old_handle").ok();
            let old_name: Option<String> = row.get("old_name").ok();
            let old_location: Option<String> = row.get("old_location").ok();
            facts = detect_profile_facts(
                profile,
                old_handle.as_deref(),
                old_name.as_deref(),
                old_location.as_deref(),
            );
        }
        for fact in &facts {
            self.add_fact(fact).await?;
        }
        Ok(facts)
    }

    async fn link_actor_rules(
        &self,
        id: ActorId,
        rule_slugs: &[String],
        campaign: Option<&str>,
    ) -> Result<()> {
        let q = query(
            "MATCH (a:Actor {id: $id})
             FOREACH (slug IN $slugs |
                 MERGE (r:Rule {slug: slug})
                 MERGE (a)-[:MATCHED_RULE]->(r))
             FOREACH (c IN $campaigns |
                 MERGE (k:Campaign {slug: c})
                 MERGE (a)-[:IN_CAMPAIGN]->(k))",
        )
        .param("id", id as i64)
        .param("slugs", rule_slugs.to_vec())
        .param(
            "campaigns",
            campaign.map(|c| vec![c.to_string()]).unwrap_or_default(),
        );
        self.run(q).await
    }

    async fn set_social_edges(
        &self,
        id: ActorId,
        relation: SocialRelation,
        edges: &[ActorId],
    ) -> Result<()> {
        let rel = relation_label(relation);
        let q = query(&format!(
            "MATCH (a:Actor {{id: $id}})
             OPTIONAL MATCH (a)-[e:{rel}]->()
             DELETE e
             WITH DISTINCT a
             UNWIND $edges AS eid
             MERGE (f:Actor {{id: eid}})
             ON CREATE SET f.filled = false,
                           f.inserted_at = datetime($now),
                           f.updated_at = datetime($now)
             MERGE (a)-[:{rel}]->(f)"
        ))
        .param("id", id as i64)
        .param("edges", edges.iter().map(|i| *i as i64).collect::<Vec<i64>>())
        .param("now", format_datetime(&Utc::now()));
        debug!(actor = id, %relation, count = edges.len(), "Replacing social edges");
        self.run(q).await
    }

    async fn social_edges(&self, id: ActorId, relation: SocialRelation) -> Result<Vec<ActorId>> {
        let rel = relation_label(relation);
        let q = query(&format!(
            "MATCH (a:Actor {{id: $id}})-[:{rel}]->(f:Actor) RETURN f.id AS fid"
        ))
        .param("id", id as i64);

        let mut stream = self.client.graph.execute(q).await?;
        let mut ids = Vec::new();
        while let Some(row) = stream.next().await? {
            let fid: i64 = row
                .get("fid")
                .map_err(|e| StoreError::Database(e.to_string()))?;
            ids.push(fid as ActorId);
        }
        Ok(ids)
    }

    async fn stamp_filled(&self, id: ActorId, kind: FillKind, at: DateTime<Utc>) -> Result<()> {
        let prop = match kind {
            FillKind::Followers => "followers_filled_at",
            FillKind::Friends => "friends_filled_at",
            FillKind::Timeline => "timeline_filled_at",
        };
        let q = query(&format!(
            "MATCH (a:Actor {{id: $id}}) SET a.{prop} = datetime($at)"
        ))
        .param("id", id as i64)
        .param("at", format_datetime(&at));
        self.run(q).await
    }

    async fn add_fact(&self, fact: &Fact) -> Result<()> {
        let (kind, subject_id) = match fact.subject {
            FactSubject::Actor(id) => ("actor", id.to_string()),
            FactSubject::Post(id) => ("post", id.to_string()),
            FactSubject::Community(id) => ("community", id.to_string()),
        };
        let q = query(
            "CREATE (f:Fact {
                 subject_kind: $kind,
                 subject_id: $subject_id,
                 text: $text,
                 description: $description,
                 recorded_at: datetime($recorded_at)
             })",
        )
        .param("kind", kind)
        .param("subject_id", subject_id)
        .param("text", fact.text.clone())
        .param("description", fact.description.clone())
        .param("recorded_at", format_datetime(&fact.recorded_at));
        self.run(q).await
    }

    async fn create_community(&self, community: &Community) -> Result<()> {
        let q = query(
            "MERGE (c:Community {id: $id})
             SET c.block_id = $block_id,
                 c.name = $name,
                 c.description = $description,
                 c.created_at = datetime($created_at)
             WITH c
             UNWIND $members AS mid
             MERGE (a:Actor {id: mid})
             ON CREATE SET a.filled = false,
                           a.inserted_at = datetime($created_at),
                           a.updated_at = datetime($created_at)
             MERGE (a)-[:IN_COMMUNITY]->(c)",
        )
        .param("id", community.id.to_string())
        .param("block_id", community.block_id as i64)
        .param("name", community.name.clone())
        .param("description", community.description.clone())
        .param("created_at", format_datetime(&community.created_at))
        .param(
            "members",
            community
                .members
                .iter()
                .map(|i| *i as i64)
                .collect::<Vec<i64>>(),
        );
        self.run(q).await
    }
}

#[async_trait]
impl PostStore for GraphStore {
    async fn get_post(&self, id: PostId) -> Result<Option<Post>> {
        let q = query(
            "MATCH (p:Post {id: $id})
             OPTIONAL MATCH (p)-[:MATCHED_RULE]->(r:Rule)
             OPTIONAL MATCH (p)-[:IN_CAMPAIGN]->(c:Campaign)
             RETURN p AS n,
                    [x IN collect(DISTINCT r.slug) WHERE x IS NOT NULL] AS rules,
                    [x IN collect(DISTINCT c.slug) WHERE x IS NOT NULL] AS campaigns",
        )
        .param("id", id as i64);

        let mut stream = self.client.graph.execute(q).await?;
        match stream.next().await? {
            Some(row) => Ok(Some(post_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn contains_post(&self, id: PostId) -> Result<bool> {
        let q = query("MATCH (p:Post {id: $id}) RETURN count(p) AS c").param("id", id as i64);
        let mut stream = self.client.graph.execute(q).await?;
        let count: i64 = match stream.next().await? {
            Some(row) => row.get("c").unwrap_or(0),
            None => 0,
        };
        Ok(count > 0)
    }

    async fn posts_by_ids(&self, ids: &[PostId]) -> Result<Vec<Post>> {
        let q = query(
            "MATCH (p:Post) WHERE p.id IN $ids
             OPTIONAL MATCH (p)-[:MATCHED_RULE]->(r:Rule)
             OPTIONAL MATCH (p)-[:IN_CAMPAIGN]->(c:Campaign)
             RETURN p AS n,
                    [x IN collect(DISTINCT r.slug) WHERE x IS NOT NULL] AS rules,
                    [x IN collect(DISTINCT c.slug) WHERE x IS NOT NULL] AS campaigns",
        )
        .param("ids", ids.iter().map(|i| *i as i64).collect::<Vec<i64>>());

        let mut stream = self.client.graph.execute(q).await?;
        let mut posts = Vec::new();
        while let Some(row) = stream.next().await? {
            posts.push(post_from_row(&row)?);
        }
        Ok(posts)
    }

    async fn posts_matching_rules(&self, rule_slugs: &[String]) -> Result<Vec<Post>> {
        let q = query(
            "MATCH (p:Post)-[:MATCHED_RULE]->(m:Rule) WHERE m.slug IN $slugs
             WITH DISTINCT p
             OPTIONAL MATCH (p)-[:MATCHED_RULE]->(r:Rule)
             OPTIONAL MATCH (p)-[:IN_CAMPAIGN]->(c:Campaign)
             RETURN p AS n,
                    [x IN collect(DISTINCT r.slug) WHERE x IS NOT NULL] AS rules,
                    [x IN collect(DISTINCT c.slug) WHERE x IS NOT NULL] AS campaigns",
        )
        .param("slugs", rule_slugs.to_vec());

        let mut stream = self.client.graph.execute(q).await?;
        let mut posts = Vec::new();
        while let Some(row) = stream.next().await? {
            posts.push(post_from_row(&row)?);
        }
        Ok(posts)
    }

    async fn create_post(&self, post: &Post) -> Result<CreateOutcome> {
        let urls_json = serde_json::to_string(&post.urls)?;
        let q = query(
            "MERGE (p:Post {id: $id})
             ON CREATE SET p.created_now = true,
                 p.author_id = $author,
                 p.text = $text,
                 p.created_at = datetime($created_at),
                 p.lang = $lang,
                 p.source_app = $source_app,
                 p.truncated = $truncated,
                 p.in_reply_to_post = $in_reply_to_post,
                 p.in_reply_to_actor = $in_reply_to_actor,
                 p.quoted_post = $quoted_post,
                 p.retweeted_post = $retweeted_post,
                 p.reply_count = $reply_count,
                 p.retweet_count = $retweet_count,
                 p.quote_count = $quote_count,
                 p.favorite_count = $favorite_count,
                 p.mentioned_ids = $mentioned_ids,
                 p.hashtags = $hashtags,
                 p.urls_json = $urls_json,
                 p.geo_lat = $geo_lat,
                 p.geo_lng = $geo_lng,
                 p.geo_place = $geo_place,
                 p.sf_timestamp = datetime($sf_timestamp),
                 p.sf_datacenter = $sf_datacenter,
                 p.sf_worker = $sf_worker,
                 p.sf_sequence = $sf_sequence,
                 p.inserted_at = datetime($now)
             WITH p, coalesce(p.created_now, false) AS created
             REMOVE p.created_now
             RETURN created",
        )
        .param("id", post.id as i64)
        .param("author", post.author as i64)
        .param("text", post.text.clone())
        .param("created_at", format_datetime(&post.created_at))
        .param("lang", post.lang.clone())
        .param("source_app", post.source_app.clone())
        .param("truncated", post.truncated)
        .param("in_reply_to_post", post.in_reply_to_post.map(|i| i as i64))
        .param("in_reply_to_actor", post.in_reply_to_actor.map(|i| i as i64))
        .param("quoted_post", post.quoted_post.map(|i| i as i64))
        .param("retweeted_post", post.retweeted_post.map(|i| i as i64))
        .param("reply_count", post.reply_count.map(|c| c as i64))
        .param("retweet_count", post.retweet_count.map(|c| c as i64))
        .param("quote_count", post.quote_count.map(|c| c as i64))
        .param("favorite_count", post.favorite_count.map(|c| c as i64))
        .param(
            "mentioned_ids",
            post.mentioned_actors
                .iter()
                .map(|i| *i as i64)
                .collect::<Vec<i64>>(),
        )
        .param("hashtags", post.hashtags.clone())
        .param("urls_json", urls_json)
        .param("geo_lat", post.geo.as_ref().map(|g| g.lat))
        .param("geo_lng", post.geo.as_ref().map(|g| g.lng))
        .param("geo_place", post.geo.as_ref().and_then(|g| g.place_name.clone()))
        .param("sf_timestamp", format_datetime(&post.snowflake.timestamp))
        .param("sf_datacenter", post.snowflake.datacenter as i64)
        .param("sf_worker", post.snowflake.worker as i64)
        .param("sf_sequence", post.snowflake.sequence as i64)
        .param("now", format_datetime(&Utc::now()));

        let mut stream = self.client.graph.execute(q).await?;
        let row = stream
            .next()
            .await?
            .ok_or_else(|| StoreError::Database("post merge returned no row".to_string()))?;
        let created: bool = row.get("created").unwrap_or(false);
        if !created {
            return Ok(CreateOutcome::AlreadyExists);
        }

        // Conversational and mention relationships; reference targets are
        // only linked when their node already exists (parents persist
        // first, truncated ancestors stay id-only properties).
        let q = query(
            "MATCH (p:Post {id: $id})
             MERGE (a:Actor {id: $author})
             ON CREATE SET a.filled = false,
                           a.inserted_at = datetime($now),
                           a.updated_at = datetime($now)
             MERGE (a)-[:POSTED]->(p)
             WITH p
             FOREACH (mid IN $mentions |
                 MERGE (m:Actor {id: mid})
                 ON CREATE SET m.filled = false,
                               m.inserted_at = datetime($now2),
                               m.updated_at = datetime($now2)
                 MERGE (p)-[:MENTIONS]->(m))
             WITH p
             OPTIONAL MATCH (reply:Post) WHERE reply.id = $reply_id
             FOREACH (t IN CASE WHEN reply IS NULL THEN [] ELSE [reply] END |
                 MERGE (p)-[:REPLIES_TO]->(t))
             WITH p
             OPTIONAL MATCH (quoted:Post) WHERE quoted.id = $quoted_id
             FOREACH (t IN CASE WHEN quoted IS NULL THEN [] ELSE [quoted] END |
                 MERGE (p)-[:QUOTES]->(t))
             WITH p
             OPTIONAL MATCH (rt:Post) WHERE rt.id = $retweeted_id
             FOREACH (t IN CASE WHEN rt IS NULL THEN [] ELSE [rt] END |
                 MERGE (p)-[:RETWEETS]->(t))
             WITH p
             FOREACH (tag IN $hashtags |
                 MERGE (h:Hashtag {text: tag})
                 MERGE (p)-[:HAS_TAG]->(h))
             FOREACH (u IN $url_keys |
                 MERGE (l:Url {expanded_url: u})
                 MERGE (p)-[:LINKS_TO]->(l))",
        )
        .param("id", post.id as i64)
        .param("author", post.author as i64)
        .param(
            "mentions",
            post.mentioned_actors
                .iter()
                .map(|i| *i as i64)
                .collect::<Vec<i64>>(),
        )
        .param("reply_id", post.in_reply_to_post.map(|i| i as i64))
        .param("quoted_id", post.quoted_post.map(|i| i as i64))
        .param("retweeted_id", post.retweeted_post.map(|i| i as i64))
        .param("hashtags", post.hashtags.clone())
        .param(
            "url_keys",
            post.urls
                .iter()
                .map(|u| u.expanded_url.clone())
                .collect::<Vec<String>>(),
        )
        .param("now", format_datetime(&Utc::now()))
        .param("now2", format_datetime(&Utc::now()));
        self.run(q).await?;

        Ok(CreateOutcome::Created)
    }

    async fn link_post_rules(
        &self,
        id: PostId,
        rule_slugs: &[String],
        campaign: Option<&str>,
    ) -> Result<()> {
        let q = query(
            "MATCH (p:Post {id: $id})
             FOREACH (slug IN $slugs |
                 MERGE (r:Rule {slug: slug})
                 MERGE (p)-[:MATCHED_RULE]->(r))
             FOREACH (c IN $campaigns |
                 MERGE (k:Campaign {slug: c})
                 MERGE (p)-[:IN_CAMPAIGN]->(k))
             WITH p
             OPTIONAL MATCH (p)-[:HAS_TAG]->(h:Hashtag)
             WITH p, [x IN collect(h) WHERE x IS NOT NULL] AS tags
             OPTIONAL MATCH (p)-[:LINKS_TO]->(l:Url)
             WITH p, tags, [x IN collect(l) WHERE x IS NOT NULL] AS links
             UNWIND $slugs AS slug
             MERGE (r:Rule {slug: slug})
             FOREACH (t IN tags | MERGE (t)-[:MATCHED_RULE]->(r))
             FOREACH (l IN links | MERGE (l)-[:MATCHED_RULE]->(r))",
        )
        .param("id", id as i64)
        .param("slugs", rule_slugs.to_vec())
        .param(
            "campaigns",
            campaign.map(|c| vec![c.to_string()]).unwrap_or_default(),
        );
        self.run(q).await
    }
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

fn actor_from_row(row: &neo4rs::Row) -> Result<Actor> {
    let n: neo4rs::Node = row
        .get("n")
        .map_err(|e| StoreError::Database(e.to_string()))?;
    let rules: Vec<String> = row.get("rules").unwrap_or_default();
    let campaigns: Vec<String> = row.get("campaigns").unwrap_or_default();

    let id: i64 = n
        .get("id")
        .map_err(|e| StoreError::Database(e.to_string()))?;
    Ok(Actor {
        id: id as ActorId,
        handle: n.get("handle").ok(),
        display_name: n.get("display_name").ok(),
        location: n.get("location").ok(),
        url: n.get("url").ok(),
        bio: n.get("bio").ok(),
        protected: n.get("protected").ok(),
        verified: n.get("verified").ok(),
        followers_count: int_prop(&n, "followers_count"),
        friends_count: int_prop(&n, "friends_count"),
        listed_count: int_prop(&n, "listed_count"),
        favourites_count: int_prop(&n, "favourites_count"),
        statuses_count: int_prop(&n, "statuses_count"),
        created_at: datetime_prop(&n, "created_at"),
        profile_image_url: n.get("profile_image_url").ok(),
        filled: n.get("filled").unwrap_or(false),
        inserted_at: datetime_prop(&n, "inserted_at").unwrap_or_else(Utc::now),
        updated_at: datetime_prop(&n, "updated_at").unwrap_or_else(Utc::now),
        followers_filled_at: datetime_prop(&n, "followers_filled_at"),
        friends_filled_at: datetime_prop(&n, "friends_filled_at"),
        timeline_filled_at: datetime_prop(&n, "timeline_filled_at"),
        matched_rules: rules,
        campaigns,
    })
}

fn post_from_row(row: &neo4rs::Row) -> Result<Post> {
    let n: neo4rs::Node = row
        .get("n")
        .map_err(|e| StoreError::Database(e.to_string()))?;
    let rules: Vec<String> = row.get("rules").unwrap_or_default();
    let campaigns: Vec<String> = row.get("campaigns").unwrap_or_default();

    let id: i64 = n
        .get("id")
        .map_err(|e| StoreError::Database(e.to_string()))?;
    let author: i64 = n
        .get("author_id")
        .map_err(|e| StoreError::Database(e.to_string()))?;
    let urls: Vec<UrlEntity> = match n.get::<String>("urls_json") {
        Ok(raw) => serde_json::from_str(&raw)?,
        Err(_) => Vec::new(),
    };
    let mentioned: Vec<i64> = n.get("mentioned_ids").unwrap_or_default();
    let geo = match (n.get::<f64>("geo_lat").ok(), n.get::<f64>("geo_lng").ok()) {
        (Some(lat), Some(lng)) => Some(GeoTag {
            lat,
            lng,
            place_name: n.get("geo_place").ok(),
        }),
        _ => None,
    };

    let id = id as PostId;
    Ok(Post {
        id,
        author: author as ActorId,
        text: n.get("text").unwrap_or_default(),
        created_at: datetime_prop(&n, "created_at").unwrap_or_else(Utc::now),
        lang: n.get("lang").ok(),
        source_app: n.get("source_app").ok(),
        truncated: n.get("truncated").unwrap_or(false),
        in_reply_to_post: long_prop(&n, "in_reply_to_post"),
        in_reply_to_actor: long_prop(&n, "in_reply_to_actor"),
        quoted_post: long_prop(&n, "quoted_post"),
        retweeted_post: long_prop(&n, "retweeted_post"),
        reply_count: int_prop(&n, "reply_count"),
        retweet_count: int_prop(&n, "retweet_count"),
        quote_count: int_prop(&n, "quote_count"),
        favorite_count: int_prop(&n, "favorite_count"),
        mentioned_actors: mentioned.into_iter().map(|i| i as ActorId).collect(),
        hashtags: n.get("hashtags").unwrap_or_default(),
        urls,
        matched_rules: rules,
        campaigns,
        geo,
        snowflake: SnowflakeParts::decode(id),
        inserted_at: datetime_prop(&n, "inserted_at").unwrap_or_else(Utc::now),
    })
}

fn int_prop(n: &neo4rs::Node, prop: &str) -> Option<u32> {
    n.get::<i64>(prop).ok().map(|v| v as u32)
}

fn long_prop(n: &neo4rs::Node, prop: &str) -> Option<u64> {
    n.get::<i64>(prop).ok().map(|v| v as u64)
}

fn datetime_prop(n: &neo4rs::Node, prop: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = n.get::<DateTime<chrono::FixedOffset>>(prop) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(s) = n.get::<String>(prop) {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
        }
    }
    None
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

fn relation_label(relation: SocialRelation) -> &'static str {
    match relation {
        SocialRelation::Followers => "HAS_FOLLOWER",
        SocialRelation::Friends => "HAS_FRIEND",
    }
}

/// Compare the incoming profile against the previously stored fields and
/// build facts for the ones that changed.
pub(crate) fn detect_profile_facts(
    profile: &Actor,
    old_handle: Option<&str>,
    old_name: Option<&str>,
    old_location: Option<&str>,
) -> Vec<Fact> {
    let subject = FactSubject::Actor(profile.id);
    let mut facts = Vec::new();

    if let (Some(old), Some(new)) = (old_name, profile.display_name.as_deref()) {
        if old != new {
            facts.push(Fact::field_changed(subject, "name", old, new));
        }
    }
    if let (Some(old), Some(new)) = (old_handle, profile.handle.as_deref()) {
        if old != new {
            facts.push(Fact::field_changed(subject, "handle", old, new));
        }
    }
    if let (Some(old), Some(new)) = (old_location, profile.location.as_deref()) {
        if old != new {
            facts.push(Fact::field_changed(subject, "location", old, new));
        }
    }
    facts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_actor(id: ActorId) -> Actor {
        let mut a = Actor::stub(id, Some("new_handle".into()), Some("New Name".into()));
        a.location = Some("Berlin".to_string());
        a.filled = true;
        a
    }

    #[test]
    fn changed_fields_become_facts() {
        let profile = filled_actor(42);
        let facts = detect_profile_facts(&profile, Some("old_handle"), Some("New Name"), None);
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].text, "handle changed");
        assert!(facts[0]
            .description
            .as_deref()
            .unwrap()
            .contains("old_handle"));
    }

    #[test]
    fn unchanged_profile_emits_no_facts() {
        let profile = filled_actor(42);
        let facts = detect_profile_facts(
            &profile,
            Some("new_handle"),
            Some("New Name"),
            Some("Berlin"),
        );
        assert!(facts.is_empty());
    }
}
