//! ID generation utilities.
//!
//! Every stored entity is keyed by a lowercase ULID, so IDs compare in
//! creation order and can be used directly as pagination cursors.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use ulid::{Generator, Ulid};
use uuid::Uuid;

/// ID generator for entities.
///
/// IDs from one generator are strictly increasing, even within the same millisecond.
pub struct IdGenerator {
    inner: Mutex<Generator>,
}

impl std::fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdGenerator").finish_non_exhaustive()
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Generator::new()),
        }
    }

    /// Generate a new ULID-based ID.
    #[must_use]
    pub fn generate(&self) -> String {
        let ulid = match self.inner.lock() {
            Ok(mut generator) => generator.generate().unwrap_or_else(|_| Ulid::new()),
            Err(_) => Ulid::new(),
        };
        ulid.to_string().to_lowercase()
    }

    /// Smallest possible ID for the given instant, usable as an exclusive lower cursor.
    #[must_use]
    pub fn floor_for(time: DateTime<Utc>) -> String {
        let millis = u64::try_from(time.timestamp_millis()).unwrap_or(0);
        Ulid::from_parts(millis, 0).to_string().to_lowercase()
    }

    /// Generate a random confirmation or API token.
    #[must_use]
    pub fn generate_token(&self) -> String {
        Uuid::new_v4().simple().to_string()
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
        assert_eq!(id2.len(), 26);
        assert!(id1 < id2);
        assert_eq!(id1, id1.to_lowercase());
    }

    #[test]
    fn test_floor_sorts_before_generated() {
        let id_gen = IdGenerator::new();
        let floor = IdGenerator::floor_for(Utc::now() - chrono::Duration::seconds(1));
        assert!(floor < id_gen.generate());
    }

    #[test]
    fn test_generate_token() {
        let id_gen = IdGenerator::new();
        let token = id_gen.generate_token();

        assert_eq!(token.len(), 32);
    }
}
