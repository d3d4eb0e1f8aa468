//! Rule evaluation over raw statuses. Pure predicates, no I/O, safe to
//! call concurrently and repeatedly.
//!
//! The term universe for text-style matching follows the provider's
//! server-side tracking semantics: author handle, whitespace tokens of the
//! full text (with leading/trailing punctuation split off as separate
//! tokens), hashtag texts, URL display and expanded forms, and mention
//! handles — unioned across the status and its embedded retweeted/quoted
//! sources.

use murmur_common::{Rule, RuleKind};
use twitter_client::RawStatus;

const CLOSING_PUNCTUATION: &[char] =
    &['.', '!', '?', ',', ';', ':', '\r', '\n', ')', ']', '}'];
const OPENING_PUNCTUATION: &[char] =
    &['.', '!', '?', ',', ';', ':', '\r', '\n', '(', '[', '{'];

/// All terms a text rule can match against, for one status (embedded
/// sources not included — callers union them).
pub fn terms_from_status(status: &RawStatus, split_punctuation: bool) -> Vec<String> {
    let mut text = status.full_text().to_string();
    if split_punctuation {
        for c in CLOSING_PUNCTUATION {
            text = text.replace(*c, &format!(" {c}"));
        }
        for c in OPENING_PUNCTUATION {
            text = text.replace(*c, &format!("{c} "));
        }
    }

    let mut terms: Vec<String> = Vec::new();
    if let Some(handle) = &status.user.screen_name {
        terms.push(handle.clone());
    }
    terms.extend(text.split_whitespace().map(str::to_string));
    let entities = status.all_entities();
    terms.extend(entities.hashtags.iter().map(|h| h.text.clone()));
    terms.extend(entities.urls.iter().map(|u| u.display_url.clone()));
    terms.extend(entities.urls.iter().map(|u| u.expanded_url.clone()));
    terms.extend(entities.user_mentions.iter().map(|m| m.screen_name.clone()));
    terms
}

fn term_universe(status: &RawStatus) -> Vec<String> {
    let mut terms = terms_from_status(status, true);
    if let Some(rt) = &status.retweeted_status {
        terms.extend(terms_from_status(rt, true));
    }
    if let Some(q) = &status.quoted_status {
        terms.extend(terms_from_status(q, true));
    }
    terms
}

fn contains_term(universe: &[String], term: &str) -> bool {
    universe.iter().any(|t| t.eq_ignore_ascii_case(term))
}

/// Normalize a URL for lax comparison: drop fragment, query string,
/// scheme, and a single leading `www.`.
pub fn clean_url(url: &str) -> String {
    let url = url.split('#').next().unwrap_or(url);
    let url = url.split('?').next().unwrap_or(url);
    let url = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .unwrap_or(url);
    let url = url.strip_prefix("www.").unwrap_or(url);
    url.to_string()
}

fn strip_mention(handle: &str) -> &str {
    handle.strip_prefix('@').unwrap_or(handle)
}

/// Collect URL entity values across the status and its embedded sources.
fn urls_from<F>(status: &RawStatus, extract: F) -> Vec<String>
where
    F: Fn(&twitter_client::RawUrl) -> String + Copy,
{
    let mut urls: Vec<String> = status.all_entities().urls.iter().map(extract).collect();
    if let Some(rt) = &status.retweeted_status {
        urls.extend(rt.all_entities().urls.iter().map(extract));
    }
    if let Some(q) = &status.quoted_status {
        urls.extend(q.all_entities().urls.iter().map(extract));
    }
    urls
}

/// The leading run of `@mention` tokens at the start of the text. The
/// provider does not expose a thread root, so lax reply matching inspects
/// this run as a heuristic for thread membership.
fn leading_mention_run(status: &RawStatus) -> Vec<String> {
    let mut run = Vec::new();
    for token in status.full_text().split_whitespace() {
        if let Some(handle) = token.strip_prefix('@') {
            run.push(handle.to_string());
        } else {
            break;
        }
    }
    run
}

pub trait RuleMatch {
    /// Return `Some(self)` if the rule matches the status, `None`
    /// otherwise, so callers collect the matching subset in one pass.
    fn matches<'r>(&'r self, status: &RawStatus) -> Option<&'r Rule>;
}

impl RuleMatch for Rule {
    fn matches<'r>(&'r self, status: &RawStatus) -> Option<&'r Rule> {
        let hit = match self.kind {
            RuleKind::Hashtag | RuleKind::TextAny => matches_text_any(self, status),
            RuleKind::TextAll => matches_text_all(self, status),
            RuleKind::Url => matches_url(self, status),
            RuleKind::UrlPartial => matches_url_partial(self, status),
            RuleKind::Domain => matches_domain(self, status),
            RuleKind::UserDirectReplies => matches_direct_reply(self, status),
            RuleKind::UserReplies => matches_reply(self, status),
            RuleKind::UserRetweets => matches_retweets(self, status),
            RuleKind::UserDirectReplyRetweets => {
                matches_retweets(self, status) || matches_direct_reply(self, status)
            }
            RuleKind::UserReplyRetweets => {
                matches_retweets(self, status) || matches_reply(self, status)
            }
            RuleKind::UserMentions => matches_mention(self, status),
        };
        hit.then_some(self)
    }
}

/// Evaluate every rule against one status, collecting the matching subset.
pub fn matching_rules<'r>(rules: &'r [Rule], status: &RawStatus) -> Vec<&'r Rule> {
    rules.iter().filter_map(|r| r.matches(status)).collect()
}

fn matches_text_any(rule: &Rule, status: &RawStatus) -> bool {
    let universe = term_universe(status);
    rule.content
        .split_whitespace()
        .any(|term| contains_term(&universe, term))
}

fn matches_text_all(rule: &Rule, status: &RawStatus) -> bool {
    let universe = term_universe(status);
    rule.content
        .split_whitespace()
        .all(|term| contains_term(&universe, term))
}

fn matches_url(rule: &Rule, status: &RawStatus) -> bool {
    let urls = urls_from(status, |u| u.expanded_url.clone());
    urls.iter().any(|u| u.eq_ignore_ascii_case(&rule.content))
}

fn matches_url_partial(rule: &Rule, status: &RawStatus) -> bool {
    let term = clean_url(&rule.content);
    let urls = urls_from(status, |u| clean_url(&u.expanded_url));
    urls.iter().any(|u| u.eq_ignore_ascii_case(&term))
}

fn matches_domain(rule: &Rule, status: &RawStatus) -> bool {
    let domains = urls_from(status, |u| {
        u.display_url.split('/').next().unwrap_or_default().to_string()
    });
    domains.iter().any(|d| d.eq_ignore_ascii_case(&rule.content))
}

fn matches_retweets(rule: &Rule, status: &RawStatus) -> bool {
    let Some(rt) = &status.retweeted_status else {
        return false;
    };
    rt.user
        .screen_name
        .as_deref()
        .is_some_and(|h| h.eq_ignore_ascii_case(strip_mention(&rule.content)))
}

fn matches_direct_reply(rule: &Rule, status: &RawStatus) -> bool {
    let target = strip_mention(&rule.content);
    status
        .in_reply_to_screen_name
        .as_deref()
        .is_some_and(|h| h.eq_ignore_ascii_case(target))
        || status
            .user
            .screen_name
            .as_deref()
            .is_some_and(|h| h.eq_ignore_ascii_case(target))
}

fn matches_reply(rule: &Rule, status: &RawStatus) -> bool {
    let target = strip_mention(&rule.content);
    let in_run = status.in_reply_to_screen_name.is_some()
        && leading_mention_run(status)
            .iter()
            .any(|h| h.eq_ignore_ascii_case(target));
    in_run
        || status
            .user
            .screen_name
            .as_deref()
            .is_some_and(|h| h.eq_ignore_ascii_case(target))
}

fn matches_mention(rule: &Rule, status: &RawStatus) -> bool {
    let target = strip_mention(&rule.content);
    let hit = |s: &RawStatus| {
        s.all_entities()
            .user_mentions
            .iter()
            .any(|m| m.screen_name.eq_ignore_ascii_case(target))
    };
    hit(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_common::RuleKind;

    fn status_json(text: &str) -> RawStatus {
        serde_json::from_value(serde_json::json!({
            "id": 1, "id_str": "1",
            "text": text,
            "user": {"id": 10, "id_str": "10", "screen_name": "poster"},
        }))
        .unwrap()
    }

    fn with_entities(mut status: RawStatus, json: serde_json::Value) -> RawStatus {
        status.entities = serde_json::from_value(json).unwrap();
        status
    }

    #[test]
    fn text_any_matches_one_of_several_terms() {
        let rule = Rule::new("r", RuleKind::TextAny, "alpha beta");
        let status = status_json("nothing but ALPHA here");
        assert!(rule.matches(&status).is_some());
    }

    #[test]
    fn text_all_requires_every_term() {
        let rule = Rule::new("r", RuleKind::TextAll, "alpha beta");
        assert!(rule.matches(&status_json("only alpha")).is_none());
        assert!(rule.matches(&status_json("Beta then alpha")).is_some());
    }

    #[test]
    fn punctuation_is_split_off_tokens() {
        let rule = Rule::new("r", RuleKind::TextAny, "alpha");
        assert!(rule.matches(&status_json("well: alpha, obviously.")).is_some());
        assert!(rule.matches(&status_json("(alpha)")).is_some());
    }

    #[test]
    fn hashtag_rule_matches_hashtag_entity() {
        let rule = Rule::new("r", RuleKind::Hashtag, "protest");
        let status = with_entities(
            status_json("no terms in text"),
            serde_json::json!({"hashtags": [{"text": "Protest"}], "urls": [], "user_mentions": []}),
        );
        assert!(rule.matches(&status).is_some());
    }

    #[test]
    fn text_rule_sees_retweeted_source_terms() {
        let rule = Rule::new("r", RuleKind::TextAny, "hidden");
        let mut status = status_json("just an RT");
        status.retweeted_status =
            Some(Box::new(status_json("the hidden word lives here")));
        assert!(rule.matches(&status).is_some());
    }

    #[test]
    fn url_partial_ignores_scheme_www_query_and_fragment() {
        let rule = Rule::new("r", RuleKind::UrlPartial, "http://www.example.com/page?x=1");
        let status = with_entities(
            status_json("look"),
            serde_json::json!({
                "hashtags": [],
                "urls": [{"url": "https://t.co/x", "expanded_url": "https://example.com/page?x=2#frag", "display_url": "example.com/page"}],
                "user_mentions": []
            }),
        );
        assert!(rule.matches(&status).is_some());

        let other = Rule::new("r2", RuleKind::UrlPartial, "example.com/other");
        assert!(other.matches(&status).is_none());
    }

    #[test]
    fn exact_url_requires_exact_expanded_form() {
        let rule = Rule::new("r", RuleKind::Url, "https://example.com/page?x=2#frag");
        let status = with_entities(
            status_json("look"),
            serde_json::json!({
                "hashtags": [],
                "urls": [{"url": "https://t.co/x", "expanded_url": "https://example.com/page?x=2#frag", "display_url": "example.com/page"}],
                "user_mentions": []
            }),
        );
        assert!(rule.matches(&status).is_some());
        let miss = Rule::new("r2", RuleKind::Url, "https://example.com/page");
        assert!(miss.matches(&status).is_none());
    }

    #[test]
    fn domain_rule_matches_display_url_host() {
        let rule = Rule::new("r", RuleKind::Domain, "example.com");
        let status = with_entities(
            status_json("look"),
            serde_json::json!({
                "hashtags": [],
                "urls": [{"url": "u", "expanded_url": "https://example.com/a/b", "display_url": "example.com/a/b"}],
                "user_mentions": []
            }),
        );
        assert!(rule.matches(&status).is_some());
    }

    #[test]
    fn retweet_rule_matches_original_author() {
        let rule = Rule::new("r", RuleKind::UserRetweets, "origauthor");
        let mut status = status_json("RT");
        let mut original = status_json("the original");
        original.user.screen_name = Some("OrigAuthor".to_string());
        status.retweeted_status = Some(Box::new(original));
        assert!(rule.matches(&status).is_some());
        assert!(rule.matches(&status_json("no rt")).is_none());
    }

    #[test]
    fn direct_reply_matches_reply_target_or_author() {
        let rule = Rule::new("r", RuleKind::UserDirectReplies, "@target");
        let mut status = status_json("@target hello");
        status.in_reply_to_screen_name = Some("target".to_string());
        assert!(rule.matches(&status).is_some());

        // The tracked user's own posts count too.
        let mut own = status_json("talking");
        own.user.screen_name = Some("target".to_string());
        assert!(rule.matches(&own).is_some());

        assert!(rule.matches(&status_json("unrelated")).is_none());
    }

    #[test]
    fn lax_reply_checks_leading_mention_run() {
        let rule = Rule::new("r", RuleKind::UserReplies, "@threadroot");
        let mut status = status_json("@someone @threadroot I agree");
        status.in_reply_to_screen_name = Some("someone".to_string());
        assert!(rule.matches(&status).is_some());

        // Mention after the leading run does not count.
        let mut late = status_json("@someone I agree with @threadroot");
        late.in_reply_to_screen_name = Some("someone".to_string());
        assert!(rule.matches(&late).is_none());
    }

    #[test]
    fn mention_rule_checks_mention_entities() {
        let rule = Rule::new("r", RuleKind::UserMentions, "@Friend");
        let status = with_entities(
            status_json("hi @friend"),
            serde_json::json!({
                "hashtags": [],
                "urls": [],
                "user_mentions": [{"id": 3, "id_str": "3", "screen_name": "friend"}]
            }),
        );
        assert!(rule.matches(&status).is_some());
    }

    #[test]
    fn compound_kinds_or_their_parts() {
        let rule = Rule::new("r", RuleKind::UserDirectReplyRetweets, "target");
        let mut rt = status_json("RT");
        let mut original = status_json("x");
        original.user.screen_name = Some("target".to_string());
        rt.retweeted_status = Some(Box::new(original));
        assert!(rule.matches(&rt).is_some());

        let mut reply = status_json("@target yes");
        reply.in_reply_to_screen_name = Some("target".to_string());
        assert!(rule.matches(&reply).is_some());
    }

    #[test]
    fn matching_rules_collects_subset_in_one_pass() {
        let rules = vec![
            Rule::new("a", RuleKind::TextAny, "alpha"),
            Rule::new("b", RuleKind::TextAny, "missing"),
            Rule::new("c", RuleKind::TextAll, "alpha here"),
        ];
        let matched = matching_rules(&rules, &status_json("alpha here"));
        let slugs: Vec<&str> = matched.iter().map(|r| r.slug.as_str()).collect();
        assert_eq!(slugs, vec!["a", "c"]);
    }
}
