//! Internal identifier generation for registry entities (credentials,
//! channels, tokens). These ids are process-local handles, not wire-format
//! values, so a short random hex string is sufficient.

use rand::Rng;

const HEX_ALPHABET: &[u8] = b"0123456789abcdef";

/// A 16-hex-character id, unique enough for in-process entity identity.
#[must_use]
pub fn registry_id() -> String {
    let mut rng = rand::thread_rng();
    (0..16)
        .map(|_| HEX_ALPHABET[rng.gen_range(0..HEX_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_right_length() {
        let a = registry_id();
        let b = registry_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 16);
    }
}
