use std::collections::HashSet;

use crate::record::{IdentityKey, Place};

/// Set of identity keys already accepted into a result set.
pub type KeyIndex = HashSet<IdentityKey>;

/// True when `place` matches a key already in `existing`.
///
/// Never inserts; callers add the key once they decide to keep the record.
pub fn is_duplicate(place: &Place, existing: &KeyIndex) -> bool {
    existing.contains(&place.identity_key())
}

/// Accepts `place` into `accepted` unless its key is already indexed.
/// Returns whether it was kept.
pub fn accept(place: Place, index: &mut KeyIndex, accepted: &mut Vec<Place>) -> bool {
    if is_duplicate(&place, index) {
        return false;
    }
    index.insert(place.identity_key());
    accepted.push(place);
    true
}
