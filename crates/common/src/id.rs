//! ID generation utilities.

use ulid::Ulid;
use uuid::Uuid;

/// ID generator for entities and tokens.
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

    /// Generate a new ULID-based primary key.
    ///
    /// ULIDs sort by creation time, which keeps `ORDER BY id` close to
    /// insertion order.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Generate a random token for magic links and subscriptions.
    ///
    /// Hyphenated UUID v4, no time component.
    #[must_use]
    pub fn generate_token(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Short random suffix for stored file names.
    #[must_use]
    pub fn generate_short(&self) -> String {
        let mut simple = Uuid::new_v4().simple().to_string();
        simple.truncate(8);
        simple
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_ulid() {
        let id_gen = IdGenerator::new();
        let id1 = id_gen.generate();
        let id2 = id_gen.generate();

        assert_eq!(id1.len(), 26);
        assert_ne!(id1, id2);
        assert_eq!(id1, id1.to_lowercase());
    }

    #[test]
    fn test_generate_token() {
        let id_gen = IdGenerator::new();
        let token = id_gen.generate_token();

        assert_eq!(token.len(), 36);
        assert!(Uuid::parse_str(&token).is_ok());
    }

    #[test]
    fn test_generate_short() {
        let short = IdGenerator::new().generate_short();
        assert_eq!(short.len(), 8);
        assert!(short.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
