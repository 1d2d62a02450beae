//! Reference-set helpers
//!
//! Mirrored references are stored as ordered id arrays. These helpers keep
//! them set-like: inserts are idempotent unions, removals drop every copy.

use uuid::Uuid;

pub fn contains(set: &[Uuid], id: Uuid) -> bool {
    set.iter().any(|existing| *existing == id)
}

/// Append `id` if absent; returns true when the set changed
pub fn union_insert(set: &mut Vec<Uuid>, id: Uuid) -> bool {
    if contains(set, id) {
        return false;
    }
    set.push(id);
    true
}

/// Union every id of `ids` into `set`; returns true when the set changed
pub fn union_all(set: &mut Vec<Uuid>, ids: &[Uuid]) -> bool {
    let mut changed = false;
    for id in ids {
        changed |= union_insert(set, *id);
    }
    changed
}

/// Remove all occurrences of `id`; returns true when the set changed
pub fn pull(set: &mut Vec<Uuid>, id: Uuid) -> bool {
    let before = set.len();
    set.retain(|existing| *existing != id);
    set.len() != before
}

/// Remove every id of `ids` from `set`; returns true when the set changed
pub fn pull_all(set: &mut Vec<Uuid>, ids: &[Uuid]) -> bool {
    let before = set.len();
    set.retain(|existing| !ids.contains(existing));
    set.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_insert_is_idempotent_and_order_preserving() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut set = vec![a];

        assert!(union_insert(&mut set, b));
        assert!(!union_insert(&mut set, a));
        assert!(!union_insert(&mut set, b));
        assert_eq!(set, vec![a, b]);
    }

    #[test]
    fn test_pull_removes_duplicates() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut set = vec![a, b, a];

        assert!(pull(&mut set, a));
        assert_eq!(set, vec![b]);
        assert!(!pull(&mut set, a));
    }

    #[test]
    fn test_bulk_variants() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut set = vec![a];

        assert!(union_all(&mut set, &[a, b, c]));
        assert_eq!(set, vec![a, b, c]);
        assert!(!union_all(&mut set, &[b]));

        assert!(pull_all(&mut set, &[a, c]));
        assert_eq!(set, vec![b]);
        assert!(!pull_all(&mut set, &[a]));
    }
}
