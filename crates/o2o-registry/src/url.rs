//! Key-string parsing and target-URL construction: small, pure
//! string-munging helpers kept apart from the stateful registry that
//! calls them.

use crate::error::RegistryError;

/// A parsed `(key, base_url)` pair, normalized and ready for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey {
    pub key: String,
    pub base_url: String,
}

/// Strip a trailing slash, strip a trailing `/api`, then re-append `/api`
/// when the host is an `ollama.com` authority. Self-hosted URLs keep
/// whatever shape the operator supplied.
#[must_use]
pub fn normalize_base_url(raw: &str) -> String {
    let mut url = raw.trim_end_matches('/').to_string();
    if let Some(stripped) = url.strip_suffix("/api") {
        url = stripped.to_string();
    }
    if url.contains("ollama.com") {
        url.push_str("/api");
    }
    url
}

/// A tail looks like an embedded API key when it is at least 20 characters
/// of `[A-Za-z0-9_.-]`.
fn looks_like_key_tail(tail: &str) -> bool {
    tail.chars().count() >= 20
        && tail
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
}

/// Parse one key-string line: `key`, `key@baseUrl`, or a bare URL with an
/// embedded key tail, in that order of precedence.
pub fn parse_key_string(raw: &str, default_base_url: &str) -> Result<ParsedKey, RegistryError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RegistryError::InvalidInput("empty key string".to_string()));
    }

    // Rule 1: contains "|" — split on the first one.
    if let Some(idx) = trimmed.find('|') {
        let lhs = &trimmed[..idx];
        let rhs = &trimmed[idx + 1..];
        return Ok(if lhs.starts_with("http") {
            ParsedKey { key: rhs.to_string(), base_url: normalize_base_url(lhs) }
        } else {
            ParsedKey { key: lhs.to_string(), base_url: normalize_base_url(rhs) }
        });
    }

    if trimmed.starts_with("http") {
        // Rule 2: last "#" separates baseUrl#key.
        if let Some(idx) = trimmed.rfind('#') {
            let base = &trimmed[..idx];
            let key = &trimmed[idx + 1..];
            return Ok(ParsedKey { key: key.to_string(), base_url: normalize_base_url(base) });
        }
        // Rule 3: tail after the last "/" looks like an embedded key.
        if let Some(idx) = trimmed.rfind('/') {
            let tail = &trimmed[idx + 1..];
            if looks_like_key_tail(tail) {
                let base = &trimmed[..idx];
                return Ok(ParsedKey { key: tail.to_string(), base_url: normalize_base_url(base) });
            }
        }
    }

    // Rule 4: bare key, default base URL.
    Ok(ParsedKey {
        key: trimmed.to_string(),
        base_url: normalize_base_url(default_base_url),
    })
}

/// Build the upstream request URL for `path` (e.g. `"/chat"`) against a
/// normalized base URL.
#[must_use]
pub fn build_target_url(base: &str, path: &str) -> String {
    if base.ends_with("/api") {
        format!("{base}{path}")
    } else {
        format!("{base}/api{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_key_uses_default_base_url() {
        let parsed = parse_key_string("sk-abcdefghij", "https://ollama.com/api").unwrap();
        assert_eq!(parsed.key, "sk-abcdefghij");
        assert_eq!(parsed.base_url, "https://ollama.com/api");
    }

    #[test]
    fn url_slash_key_split() {
        let parsed =
            parse_key_string("https://api.example.com/sk-test123456789012test", "https://x").unwrap();
        assert_eq!(parsed.base_url, "https://api.example.com");
        assert_eq!(parsed.key, "sk-test123456789012test");
    }

    #[test]
    fn pipe_separated_url_first() {
        let parsed = parse_key_string("https://host.example|sk-mykey", "https://x").unwrap();
        assert_eq!(parsed.base_url, "https://host.example");
        assert_eq!(parsed.key, "sk-mykey");
    }

    #[test]
    fn pipe_separated_key_first() {
        let parsed = parse_key_string("sk-mykey|https://host.example", "https://x").unwrap();
        assert_eq!(parsed.base_url, "https://host.example");
        assert_eq!(parsed.key, "sk-mykey");
    }

    #[test]
    fn hash_separated() {
        let parsed = parse_key_string("https://host.example#sk-mykey", "https://x").unwrap();
        assert_eq!(parsed.base_url, "https://host.example");
        assert_eq!(parsed.key, "sk-mykey");
    }

    #[test]
    fn empty_input_rejected() {
        assert!(parse_key_string("   ", "https://x").is_err());
    }

    #[test]
    fn ollama_com_base_gets_api_suffix_reapplied() {
        assert_eq!(normalize_base_url("https://ollama.com/api/"), "https://ollama.com/api");
        assert_eq!(normalize_base_url("https://ollama.com"), "https://ollama.com/api");
    }

    #[test]
    fn self_hosted_base_untouched_beyond_trailing_slash_and_api() {
        assert_eq!(normalize_base_url("http://localhost:11434/"), "http://localhost:11434");
        assert_eq!(normalize_base_url("http://localhost:11434/api"), "http://localhost:11434");
    }

    #[test]
    fn target_url_inserts_api_segment_when_missing() {
        assert_eq!(
            build_target_url("http://localhost:11434", "/chat"),
            "http://localhost:11434/api/chat"
        );
        assert_eq!(
            build_target_url("https://ollama.com/api", "/chat"),
            "https://ollama.com/api/chat"
        );
    }
}
