//! Short token generation.
//!
//! Generators are pure: they never look at storage. Uniqueness is settled by the
//! storage layer's unique key, and the caller retries on conflict.

/// URL-safe token alphabet (64 symbols).
pub const ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

pub const MIN_TOKEN_LENGTH: usize = 6;
pub const MAX_TOKEN_LENGTH: usize = 8;

/// Longest path segment that is still worth looking up.
const MAX_LOOKUP_LENGTH: usize = 64;

pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Draws fixed-length tokens uniformly from [`ALPHABET`] using the thread-local RNG.
#[derive(Debug, Clone)]
pub struct RandomTokenGenerator {
    length: usize,
}

impl RandomTokenGenerator {
    /// Lengths outside 6..=8 are clamped into range.
    pub fn new(length: usize) -> Self {
        Self {
            length: length.clamp(MIN_TOKEN_LENGTH, MAX_TOKEN_LENGTH),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for RandomTokenGenerator {
    fn default() -> Self {
        Self::new(MAX_TOKEN_LENGTH)
    }
}

impl TokenGenerator for RandomTokenGenerator {
    fn generate(&self) -> String {
        std::iter::repeat_with(|| ALPHABET[rand::random_range(0..ALPHABET.len())] as char)
            .take(self.length)
            .collect()
    }
}

/// Whether `candidate` could possibly be a token. Used to reject junk paths before
/// they reach storage.
pub fn is_well_formed(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate.len() <= MAX_LOOKUP_LENGTH
        && candidate.bytes().all(|b| ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generates_requested_length() {
        for length in MIN_TOKEN_LENGTH..=MAX_TOKEN_LENGTH {
            let generator = RandomTokenGenerator::new(length);
            for _ in 0..100 {
                assert_eq!(generator.generate().len(), length);
            }
        }
    }

    #[test]
    fn tokens_use_url_safe_alphabet() {
        let generator = RandomTokenGenerator::default();
        for _ in 0..1000 {
            let token = generator.generate();
            assert!(is_well_formed(&token), "unexpected token {token}");
        }
    }

    #[test]
    fn tokens_rarely_repeat() {
        let generator = RandomTokenGenerator::default();
        let tokens: HashSet<String> = (0..10_000).map(|_| generator.generate()).collect();
        // 64^8 possibilities; a repeat among 10k draws is vanishingly unlikely
        assert!(tokens.len() >= 9_999);
    }

    #[test]
    fn well_formed_rejects_junk() {
        assert!(is_well_formed("doesnotexist"));
        assert!(is_well_formed("aB3-_x"));
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("has space"));
        assert!(!is_well_formed("dot.dot"));
        assert!(!is_well_formed("ünï"));
        assert!(!is_well_formed(&"a".repeat(65)));
    }
}
