//! ID generation utilities.

use rand::Rng;
use uuid::Uuid;

/// Characters used in invite codes. Ambiguous glyphs (0/O, 1/I) are left out.
const INVITE_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of generated invite codes.
pub const INVITE_CODE_LEN: usize = 8;

/// ID generator for entities.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new row ID (random UUID v4, hyphenated).
    #[must_use]
    pub fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Generate a human-shareable invite code.
    #[must_use]
    pub fn generate_invite_code(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..INVITE_CODE_LEN)
            .map(|_| {
                let idx = rng.gen_range(0..INVITE_CODE_ALPHABET.len());
                char::from(INVITE_CODE_ALPHABET[idx])
            })
            .collect()
    }

    /// Generate a group join code.
    #[must_use]
    pub fn generate_join_code(&self) -> String {
        self.generate_invite_code()
    }
}
