//! Channel include / exclude filtering
//!
//! Patterns are matched case-insensitively. A pattern matches a channel name
//! when it is `*`, equals the name, or ends with `*` and the name starts with
//! the part before the `*`.

use std::collections::HashMap;

/// Default allow-list: every channel
pub fn default_channels() -> Vec<String> {
    vec!["*".to_string()]
}

fn pattern_matches(name: &str, pattern: &str) -> bool {
    let pattern = pattern.to_lowercase();
    if pattern == "*" || pattern == name {
        return true;
    }
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => false,
    }
}

/// Uncached include test
pub fn channel_matches(name: &str, allow: &[String], deny: &[String]) -> bool {
    let name = name.to_lowercase();
    allow.iter().any(|p| pattern_matches(&name, p)) && !deny.iter().any(|p| pattern_matches(&name, p))
}

/// Per-route filter with a memo keyed by lower-cased channel name
///
/// The memo is never invalidated: changing the patterns after the first
/// query does not affect names that were already looked up.
#[derive(Debug, Clone)]
pub struct ChannelFilter {
    allow: Vec<String>,
    deny: Vec<String>,
    cache: HashMap<String, bool>,
}

impl ChannelFilter {
    pub fn new(allow: Vec<String>, deny: Vec<String>) -> Self {
        Self {
            allow,
            deny,
            cache: HashMap::new(),
        }
    }

    pub fn should_include(&mut self, name: &str) -> bool {
        let key = name.to_lowercase();
        if let Some(&cached) = self.cache.get(&key) {
            return cached;
        }
        let include = channel_matches(&key, &self.allow, &self.deny);
        self.cache.insert(key, include);
        include
    }

    pub fn set_patterns(&mut self, allow: Vec<String>, deny: Vec<String>) {
        self.allow = allow;
        self.deny = deny;
    }

    pub fn allow(&self) -> &[String] {
        &self.allow
    }

    pub fn deny(&self) -> &[String] {
        &self.deny
    }
}

impl Default for ChannelFilter {
    fn default() -> Self {
        Self::new(default_channels(), Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_includes_everything() {
        let mut filter = ChannelFilter::default();
        assert!(filter.should_include("general"));
        assert!(filter.should_include("general.db"));
    }

    #[test]
    fn test_wildcard_prefix() {
        let allow = strings(&["general.db*"]);
        assert!(channel_matches("general.db", &allow, &[]));
        assert!(channel_matches("General.DB.query", &allow, &[]));
        assert!(!channel_matches("general", &allow, &[]));
    }

    #[test]
    fn test_deny_wins() {
        let allow = strings(&["*"]);
        let deny = strings(&["general.Events*"]);
        assert!(channel_matches("general", &allow, &deny));
        assert!(!channel_matches("general.events.user", &allow, &deny));
    }

    #[test]
    fn test_exact_match_is_case_insensitive() {
        let allow = strings(&["Request"]);
        assert!(channel_matches("request", &allow, &[]));
        assert!(!channel_matches("requests", &allow, &[]));
    }

    #[test]
    fn test_cache_not_invalidated() {
        let mut filter = ChannelFilter::new(strings(&["*"]), vec![]);
        assert!(filter.should_include("noisy"));

        filter.set_patterns(strings(&["*"]), strings(&["noisy*"]));
        // memoized before the change
        assert!(filter.should_include("NOISY"));
        // first lookup after the change sees the new patterns
        assert!(!filter.should_include("noisy.sub"));
    }
}
