//! Tracking rules: the configured predicates that decide whether an
//! incoming post is relevant. Rules are immutable once created; evaluation
//! lives with the ingestion side.

use serde::{Deserialize, Serialize};

use crate::MurmurError;

/// Closed enumeration of rule kinds. Adding a kind means adding a variant
/// here and an entry in the tag registry below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Any term of `content` appears in the post's term universe.
    Hashtag,
    TextAny,
    /// All terms of `content` appear in the post's term universe.
    TextAll,
    /// Replies within a user's thread (lax, leading-mention heuristic).
    UserReplies,
    /// Direct replies to a user's posts (strict).
    UserDirectReplies,
    UserRetweets,
    UserDirectReplyRetweets,
    UserReplyRetweets,
    UserMentions,
    Domain,
    Url,
    UrlPartial,
}

/// Stable string tags, the external names of rule kinds. The registry is
/// the only place a tag string is interpreted.
const RULE_KIND_TAGS: &[(&str, RuleKind)] = &[
    ("hashtag", RuleKind::Hashtag),
    ("text_any", RuleKind::TextAny),
    ("text_all", RuleKind::TextAll),
    ("user_replies", RuleKind::UserReplies),
    ("user_direct_replies", RuleKind::UserDirectReplies),
    ("user_retweets", RuleKind::UserRetweets),
    ("user_direct_reply_retweets", RuleKind::UserDirectReplyRetweets),
    ("user_reply_retweets", RuleKind::UserReplyRetweets),
    ("user_mentions", RuleKind::UserMentions),
    ("domain", RuleKind::Domain),
    ("url", RuleKind::Url),
    ("url_partial", RuleKind::UrlPartial),
];

impl RuleKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        RULE_KIND_TAGS
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, k)| *k)
    }

    pub fn tag(&self) -> &'static str {
        RULE_KIND_TAGS
            .iter()
            .find(|(_, k)| k == self)
            .map(|(t, _)| *t)
            .expect("every RuleKind has a registry entry")
    }

    /// Kinds that track content (terms, domains, urls) rather than a user.
    pub fn is_tracking(&self) -> bool {
        matches!(
            self,
            RuleKind::Hashtag
                | RuleKind::TextAny
                | RuleKind::TextAll
                | RuleKind::Domain
                | RuleKind::Url
                | RuleKind::UrlPartial
        )
    }

    /// Kinds that follow interactions with a specific user.
    pub fn is_user(&self) -> bool {
        !self.is_tracking()
    }
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// A configured tracking predicate. `slug` is the stable identity used for
/// rule linkage on persisted posts and actors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub slug: String,
    pub name: String,
    pub kind: RuleKind,
    pub content: String,
}

impl Rule {
    /// Validate and build a rule. Unknown kind tags and empty content are
    /// configuration errors, fatal for the request that carries them.
    pub fn parse(slug: &str, name: &str, kind_tag: &str, content: &str) -> Result<Self, MurmurError> {
        let kind = RuleKind::from_tag(kind_tag)
            .ok_or_else(|| MurmurError::Validation(format!("unknown rule kind '{kind_tag}'")))?;
        if content.trim().is_empty() {
            return Err(MurmurError::Validation(format!(
                "rule '{slug}' has empty content"
            )));
        }
        Ok(Self {
            slug: slug.to_string(),
            name: name.to_string(),
            kind,
            content: content.trim().to_string(),
        })
    }

    pub fn new(slug: &str, kind: RuleKind, content: &str) -> Self {
        Self {
            slug: slug.to_string(),
            name: slug.to_string(),
            kind,
            content: content.to_string(),
        }
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.slug, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_round_trips_through_its_tag() {
        for (tag, kind) in RULE_KIND_TAGS {
            assert_eq!(RuleKind::from_tag(tag), Some(*kind));
            assert_eq!(kind.tag(), *tag);
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = Rule::parse("r1", "r1", "user_quotes", "someone").unwrap_err();
        assert!(matches!(err, MurmurError::Validation(_)));
    }

    #[test]
    fn empty_content_is_rejected() {
        let err = Rule::parse("r1", "r1", "hashtag", "   ").unwrap_err();
        assert!(matches!(err, MurmurError::Validation(_)));
    }

    #[test]
    fn tracking_and_user_kinds_partition() {
        assert!(RuleKind::Domain.is_tracking());
        assert!(RuleKind::UserMentions.is_user());
        assert!(!RuleKind::UserRetweets.is_tracking());
    }
}
