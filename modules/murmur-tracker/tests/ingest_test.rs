//! Pipeline behavior against the in-memory store and mock API.

use std::sync::Arc;

use murmur_common::{Rule, RuleKind};
use murmur_store::memory::MemoryStore;
use murmur_store::{ActorStore, PostStore};
use murmur_tracker::pipeline::{IngestOutcome, IngestionPipeline};
use murmur_tracker::testing::{
    make_reply, make_retweet, make_status, with_hashtag, with_mention, MockPlatformApi,
};

fn pipeline(
    store: Arc<MemoryStore>,
    api: Arc<MockPlatformApi>,
    max_nested_level: i32,
) -> IngestionPipeline<MemoryStore, MockPlatformApi> {
    IngestionPipeline::new(store, api, max_nested_level, Some("camp".to_string()))
}

#[tokio::test]
async fn unmatched_post_is_discarded_without_persistence() {
    let store = Arc::new(MemoryStore::new());
    let api = Arc::new(MockPlatformApi::new());
    let p = pipeline(store.clone(), api, 0);

    let rules = vec![Rule::new("r", RuleKind::TextAny, "missing")];
    let outcome = p
        .ingest(&make_status(1, 10, "alice", "nothing relevant"), &rules)
        .await
        .unwrap();

    assert_eq!(outcome, IngestOutcome::Discarded);
    assert_eq!(store.post_count(), 0);
    assert_eq!(store.actor_count(), 0);
}

#[tokio::test]
async fn matched_post_persists_author_mentions_and_linkage() {
    let store = Arc::new(MemoryStore::new());
    let api = Arc::new(MockPlatformApi::new());
    let p = pipeline(store.clone(), api, 0);

    let status = with_mention(
        with_hashtag(make_status(1, 10, "alice", "hello #protest @bob"), "protest"),
        20,
        "bob",
    );
    let rules = vec![Rule::new("tag", RuleKind::Hashtag, "protest")];
    let outcome = p.ingest(&status, &rules).await.unwrap();

    assert!(matches!(outcome, IngestOutcome::Persisted { matched: 1, .. }));
    let post = store.get_post(1).await.unwrap().unwrap();
    assert_eq!(post.matched_rules, vec!["tag"]);
    assert_eq!(post.campaigns, vec!["camp"]);

    let author = store.get_actor(10).await.unwrap().unwrap();
    assert!(author.filled);
    assert_eq!(author.matched_rules, vec!["tag"]);

    // Mentioned actor exists only as a stub.
    let bob = store.get_actor(20).await.unwrap().unwrap();
    assert!(!bob.filled);
    assert_eq!(bob.handle.as_deref(), Some("bob"));

    // Rule linkage propagated to the extracted hashtag.
    assert_eq!(store.hashtag_rules("protest"), vec!["tag"]);
}

#[tokio::test]
async fn duplicate_delivery_keeps_one_row_and_one_linkage() {
    let store = Arc::new(MemoryStore::new());
    let api = Arc::new(MockPlatformApi::new());
    let p = pipeline(store.clone(), api, 0);

    let status = make_status(1, 10, "alice", "alpha");
    let rules = vec![Rule::new("r", RuleKind::TextAny, "alpha")];
    p.ingest(&status, &rules).await.unwrap();
    p.ingest(&status, &rules).await.unwrap();

    assert_eq!(store.post_count(), 1);
    let post = store.get_post(1).await.unwrap().unwrap();
    assert_eq!(post.matched_rules, vec!["r"]);
    assert_eq!(post.campaigns, vec!["camp"]);
}

#[tokio::test]
async fn retweet_match_persists_source_before_retweet() {
    let store = Arc::new(MemoryStore::new());
    let api = Arc::new(MockPlatformApi::new());
    let p = pipeline(store.clone(), api, 0);

    // Only the embedded original matches.
    let original = make_status(5, 30, "carol", "the alpha word");
    let rt = make_retweet(6, 10, "alice", original);
    let rules = vec![Rule::new("r", RuleKind::TextAny, "alpha")];
    let outcome = p.ingest(&rt, &rules).await.unwrap();

    assert!(matches!(outcome, IngestOutcome::Persisted { .. }));
    assert_eq!(store.post_count(), 2);
    let stored_rt = store.get_post(6).await.unwrap().unwrap();
    assert_eq!(stored_rt.retweeted_post, Some(5));
    assert!(store.get_post(5).await.unwrap().is_some());
}

#[tokio::test]
async fn reply_chain_resolves_to_configured_depth() {
    // Chain A(1) <- B(2) <- C(3) <- D(4), max_nested_level = 1:
    // ingesting D persists C and B but not A, and no error is raised.
    let store = Arc::new(MemoryStore::new());
    let a = make_status(1, 11, "ua", "root alpha");
    let b = make_reply(2, 12, "ub", "reply b alpha", 1, 11, "ua");
    let c = make_reply(3, 13, "uc", "reply c alpha", 2, 12, "ub");
    let d = make_reply(4, 14, "ud", "reply d alpha", 3, 13, "uc");
    let api = Arc::new(MockPlatformApi::new().on_status(a).on_status(b).on_status(c.clone()));
    let p = pipeline(store.clone(), api.clone(), 1);

    let rules = vec![Rule::new("r", RuleKind::TextAny, "alpha")];
    p.ingest(&d, &rules).await.unwrap();

    assert!(store.get_post(4).await.unwrap().is_some());
    assert!(store.get_post(3).await.unwrap().is_some());
    assert!(store.get_post(2).await.unwrap().is_some());
    assert!(store.get_post(1).await.unwrap().is_none(), "depth exceeded");
    assert_eq!(api.status_fetches(), vec![3, 2]);
}

#[tokio::test]
async fn unbounded_depth_resolves_whole_chain() {
    let store = Arc::new(MemoryStore::new());
    let a = make_status(1, 11, "ua", "root alpha");
    let b = make_reply(2, 12, "ub", "reply alpha", 1, 11, "ua");
    let c = make_reply(3, 13, "uc", "reply alpha", 2, 12, "ub");
    let api = Arc::new(MockPlatformApi::new().on_status(a).on_status(b));
    let p = pipeline(store.clone(), api, -1);

    let rules = vec![Rule::new("r", RuleKind::TextAny, "alpha")];
    p.ingest(&c, &rules).await.unwrap();

    assert_eq!(store.post_count(), 3);
}

#[tokio::test]
async fn deleted_ancestor_truncates_chain_without_error() {
    let store = Arc::new(MemoryStore::new());
    // Parent id 2 is not registered with the API: NotFound, a soft skip.
    let d = make_reply(4, 14, "ud", "reply alpha", 2, 12, "ub");
    let api = Arc::new(MockPlatformApi::new());
    let p = pipeline(store.clone(), api, -1);

    let rules = vec![Rule::new("r", RuleKind::TextAny, "alpha")];
    let outcome = p.ingest(&d, &rules).await.unwrap();

    assert!(matches!(outcome, IngestOutcome::Persisted { .. }));
    assert_eq!(store.post_count(), 1);
    // The dangling reference survives as an id.
    let post = store.get_post(4).await.unwrap().unwrap();
    assert_eq!(post.in_reply_to_post, Some(2));
}

#[tokio::test]
async fn reply_inherits_rule_linkage_from_stored_parent() {
    let store = Arc::new(MemoryStore::new());
    let api = Arc::new(MockPlatformApi::new());
    let p = pipeline(store.clone(), api, 0);

    let rules = vec![
        Rule::new("r", RuleKind::TextAny, "alpha"),
        Rule::new("s", RuleKind::TextAny, "beta"),
    ];
    p.ingest(&make_status(1, 11, "ua", "root alpha"), &rules)
        .await
        .unwrap();

    // The reply matches only "s" directly, and inherits "r" from its
    // stored parent (thread membership).
    let reply = make_reply(2, 12, "ub", "a beta reply", 1, 11, "ua");
    p.ingest(&reply, &rules).await.unwrap();

    let post = store.get_post(2).await.unwrap().unwrap();
    assert!(post.matched_rules.contains(&"s".to_string()));
    assert!(post.matched_rules.contains(&"r".to_string()));
}

#[tokio::test]
async fn profile_change_on_refill_emits_fact() {
    let store = Arc::new(MemoryStore::new());
    let api = Arc::new(MockPlatformApi::new());
    let p = pipeline(store.clone(), api, 0);

    let rules = vec![Rule::new("r", RuleKind::TextAny, "alpha")];
    p.ingest(&make_status(1, 10, "alice", "alpha"), &rules)
        .await
        .unwrap();

    let mut renamed = make_status(2, 10, "alice_renamed", "more alpha");
    renamed.user.name = Some("alice_renamed".to_string());
    p.ingest(&renamed, &rules).await.unwrap();

    let facts = store.facts();
    assert!(
        facts.iter().any(|f| f.text == "handle changed"),
        "expected a handle-change fact, got {facts:?}"
    );
}

#[tokio::test]
async fn timeline_persist_skips_rule_matching() {
    let store = Arc::new(MemoryStore::new());
    let api = Arc::new(MockPlatformApi::new());
    let p = pipeline(store.clone(), api, 0);

    let status = make_status(9, 10, "alice", "no rules apply");
    p.persist_status(&status).await.unwrap();

    let post = store.get_post(9).await.unwrap().unwrap();
    assert!(post.matched_rules.is_empty());
    assert_eq!(post.campaigns, vec!["camp"]);
}
