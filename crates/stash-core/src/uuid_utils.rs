//! UUID helpers.
//!
//! Every entity id in stash is a UUIDv7, so ids sort by creation time and
//! newest-first listings can order by id when timestamps tie.

use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
///
/// # Example
///
/// ```
/// use stash_core::uuid_utils::new_v7;
///
/// let id = new_v7();
/// assert_eq!(id.get_version_num(), 7);
/// ```
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Parse a client-supplied identifier, tolerating surrounding whitespace.
///
/// Returns `None` for blank or malformed input; the nil UUID is rejected
/// because it can never name a stored entity.
pub fn parse_client_id(raw: &str) -> Option<Uuid> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Uuid::parse_str(trimmed).ok().filter(|id| !id.is_nil())
}
