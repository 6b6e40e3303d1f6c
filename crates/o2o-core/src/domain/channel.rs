//! Channel domain type: an optional named grouping of credentials.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A named collection of credentials sharing one base URL, a model
/// allow-list, a model-remap table, and its own concurrency/priority/weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub base_url: String,
    pub enabled: bool,
    pub healthy: bool,
    pub credential_ids: Vec<String>,
    pub models: Vec<String>,
    pub model_mapping: HashMap<String, String>,
    pub priority: i32,
    pub weight: u32,
    pub max_concurrent: u32,
    pub current_concurrent: u32,
    pub total_requests: u64,
    pub failed_requests: u64,
    /// Round-robin cursor into `credential_ids`, private to the channel.
    #[serde(default)]
    pub cursor: usize,
}

impl Channel {
    /// Whether `currentConcurrent < maxConcurrent`, or the cap is disabled (0).
    #[must_use]
    pub fn has_capacity(&self) -> bool {
        self.max_concurrent == 0 || self.current_concurrent < self.max_concurrent
    }

    /// Whether the requested model is permitted: empty allow-list permits
    /// all, otherwise a glob match against `models` or a key in `model_mapping`.
    #[must_use]
    pub fn permits_model(&self, requested: &str) -> bool {
        if self.models.is_empty() {
            return true;
        }
        if self.model_mapping.contains_key(requested) {
            return true;
        }
        self.models.iter().any(|pattern| glob_match(pattern, requested))
    }

    /// Resolve the upstream model name via `modelMapping`, falling back to identity.
    #[must_use]
    pub fn resolve_model(&self, requested: &str) -> String {
        self.model_mapping
            .get(requested)
            .cloned()
            .unwrap_or_else(|| requested.to_string())
    }

    /// Auto-quarantine rule, identical in shape to the credential rule.
    #[must_use]
    pub fn should_quarantine(&self) -> bool {
        self.failed_requests > 5
            && (self.failed_requests as f64) / (self.total_requests.max(1) as f64) > 0.8
    }
}

/// `*`-wildcard glob match used for model allow-lists and token model scoping.
///
/// Patterns without `*` require an exact match. Otherwise the pattern is
/// split on `*` into literal segments, which must appear in `candidate` in
/// order, with the first/last segment anchored to the start/end.
#[must_use]
pub fn glob_match(pattern: &str, candidate: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == candidate;
    }
    let segments: Vec<&str> = pattern.split('*').collect();
    let mut rest = candidate;

    if let Some(first) = segments.first() {
        if !rest.starts_with(first) {
            return false;
        }
        rest = &rest[first.len()..];
    }
    if let Some(last) = segments.last() {
        if segments.len() > 1 && !rest.ends_with(last) {
            return false;
        }
    }

    for seg in &segments[1..segments.len().saturating_sub(1).max(1)] {
        if seg.is_empty() {
            continue;
        }
        match rest.find(seg) {
            Some(pos) => rest = &rest[pos + seg.len()..],
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_pattern_requires_exact_match() {
        assert!(glob_match("llama3", "llama3"));
        assert!(!glob_match("llama3", "llama3:8b"));
    }

    #[test]
    fn single_star_suffix() {
        assert!(glob_match("llama*", "llama3"));
        assert!(glob_match("llama*", "llama"));
        assert!(!glob_match("llama*", "mistral"));
    }

    #[test]
    fn single_star_prefix_and_infix() {
        assert!(glob_match("*:latest", "llama3:latest"));
        assert!(glob_match("llama*:latest", "llama3:latest"));
        assert!(!glob_match("llama*:latest", "llama3:8b"));
    }

    #[test]
    fn channel_capacity_zero_means_unbounded() {
        let ch = Channel {
            id: "c".into(),
            name: "c".into(),
            base_url: "https://x".into(),
            enabled: true,
            healthy: true,
            credential_ids: vec![],
            models: vec![],
            model_mapping: HashMap::new(),
            priority: 0,
            weight: 10,
            max_concurrent: 0,
            current_concurrent: 1000,
            total_requests: 0,
            failed_requests: 0,
            cursor: 0,
        };
        assert!(ch.has_capacity());
    }
}
