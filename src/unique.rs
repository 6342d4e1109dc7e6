//! Unique identifier generation.

use uuid::Uuid;

/// Generate a collision-resistant opaque id (hyphenated UUID v4).
pub fn id() -> String {
    Uuid::new_v4().to_string()
}
