//! Compilation of tracking rules into provider-side track terms.
//!
//! The provider treats a dot as a word separator, so domain tracking sends
//! `example com` rather than `example.com` and relies on client-side rule
//! evaluation to filter the over-inclusive results. Literal URLs are not
//! filterable upstream and degrade to their domain.

use murmur_common::{Rule, RuleKind};

/// Derive the provider track terms for a rule set.
pub fn compile_track_terms(rules: &[Rule]) -> Vec<String> {
    let mut terms = Vec::with_capacity(rules.len());
    for rule in rules {
        match rule.kind {
            RuleKind::Domain => {
                let domain = rule.content.strip_prefix("www.").unwrap_or(&rule.content);
                terms.push(domain.replace('.', " "));
            }
            RuleKind::Url | RuleKind::UrlPartial => {
                let stripped = rule
                    .content
                    .strip_prefix("http://")
                    .or_else(|| rule.content.strip_prefix("https://"))
                    .unwrap_or(&rule.content);
                let stripped = stripped.strip_prefix("www.").unwrap_or(stripped);
                let domain = stripped.split('/').next().unwrap_or(stripped);
                terms.push(domain.replace('.', " "));
            }
            RuleKind::Hashtag => {
                if rule.content.starts_with('#') {
                    terms.push(rule.content.clone());
                } else {
                    terms.push(format!("#{}", rule.content));
                }
            }
            k if k.is_user() => {
                if rule.content.starts_with('@') {
                    terms.push(rule.content.clone());
                } else {
                    terms.push(format!("@{}", rule.content));
                }
            }
            _ => terms.push(rule.content.clone()),
        }
    }
    terms
}
