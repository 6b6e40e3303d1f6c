//! Cryptographically random id generation for OpenAI-shaped responses.

use rand::Rng;

const HEX_ALPHABET: &[u8] = b"0123456789abcdef";
const ALNUM_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

fn random_string(alphabet: &[u8], len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
        .collect()
}

/// `"chatcmpl-"` + 24 random hex characters.
#[must_use]
pub fn chat_completion_id() -> String {
    format!("chatcmpl-{}", random_string(HEX_ALPHABET, 24))
}

/// `"call_"` + 24 random alphanumeric characters, used for tool-call ids.
#[must_use]
pub fn tool_call_id() -> String {
    format!("call_{}", random_string(ALNUM_ALPHABET, 24))
}

/// `"chatcmpl-"` + 24 random hex characters, used for legacy text completions.
#[must_use]
pub fn completion_id() -> String {
    format!("chatcmpl-{}", random_string(HEX_ALPHABET, 24))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_id_has_expected_shape() {
        let id = chat_completion_id();
        assert!(id.starts_with("chatcmpl-"));
        assert_eq!(id.len(), "chatcmpl-".len() + 24);
        assert!(id["chatcmpl-".len()..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tool_call_id_has_expected_shape() {
        let id = tool_call_id();
        assert!(id.starts_with("call_"));
        assert_eq!(id.len(), "call_".len() + 24);
    }

    #[test]
    fn completion_id_has_expected_shape() {
        let id = completion_id();
        assert!(id.starts_with("chatcmpl-"));
        assert_eq!(id.len(), "chatcmpl-".len() + 24);
    }
}
