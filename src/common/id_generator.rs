// src/common/id_generator.rs
//! Crockford Base32 ID Generator
//!
//! Generates human-readable, prefixed IDs using Crockford Base32 encoding.
//! Format: PREFIX_XXXXXX (e.g., U_K7NP3X for users)
//!
//! Also produces the placeholder usernames handed out when an OAuth
//! provider's display name is not usable as a username.

use rand::Rng;

/// Crockford Base32 alphabet (excludes I, L, O, U to avoid confusion)
const CROCKFORD_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Lowercase alphabet for placeholder usernames
const USERNAME_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Entity type prefixes for ID generation
#[derive(Debug, Clone, Copy)]
pub enum EntityPrefix {
    /// User (U_)
    User,
    /// Website / profile page (W_)
    Website,
    /// Social link (L_)
    Link,
    /// OAuth provider link (O_)
    OAuthLink,
}

impl EntityPrefix {
    /// Get the string prefix for this entity type
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityPrefix::User => "U",
            EntityPrefix::Website => "W",
            EntityPrefix::Link => "L",
            EntityPrefix::OAuthLink => "O",
        }
    }
}

/// Generate a random Crockford Base32 string of specified length
fn generate_crockford_string(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..32);
            CROCKFORD_ALPHABET[idx] as char
        })
        .collect()
}

/// Generate a prefixed ID using Crockford Base32 encoding
///
/// Returns a string in format "PREFIX_XXXXXXXX" (e.g., "U_K7NP3XQ2")
pub fn generate_id(prefix: EntityPrefix) -> String {
    format!("{}_{}", prefix.as_str(), generate_crockford_string(8))
}

/// Generate a User ID (U_XXXXXXXX)
pub fn generate_user_id() -> String {
    generate_id(EntityPrefix::User)
}

/// Generate a Website ID (W_XXXXXXXX)
pub fn generate_website_id() -> String {
    generate_id(EntityPrefix::Website)
}

/// Generate a Social Link ID (L_XXXXXXXX)
pub fn generate_link_id() -> String {
    generate_id(EntityPrefix::Link)
}

/// Generate an OAuth Link ID (O_XXXXXXXX)
pub fn generate_oauth_link_id() -> String {
    generate_id(EntityPrefix::OAuthLink)
}

/// Generate a placeholder username such as `user_k3x9q0ab`.
///
/// Always satisfies the username pattern (13 chars of `[a-z0-9_]`).
pub fn generate_placeholder_username() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..8)
        .map(|_| USERNAME_ALPHABET[rng.gen_range(0..USERNAME_ALPHABET.len())] as char)
        .collect();
    format!("user_{}", suffix)
}
