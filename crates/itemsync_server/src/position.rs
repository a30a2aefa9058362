//! Sibling position allocation.
//!
//! Siblings are ordered by a sparse integer key. Inserting between two
//! siblings picks a value closer to the earlier one, so that repeated
//! insertions after the same item keep room on both sides.

use itemsync_protocol::SyncEntity;

/// A live sibling as seen by the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sibling<'a> {
    /// Sibling id.
    pub id: &'a str,
    /// Current position.
    pub position: i64,
}

/// Where the client wants an entry placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionHint<'a> {
    /// Before every sibling.
    First,
    /// Right after the named sibling.
    After(&'a str),
    /// At a position the client computed itself.
    Absolute(i64),
    /// After every sibling.
    Last,
}

impl<'a> PositionHint<'a> {
    /// Reads the hint carried by a committed entry.
    ///
    /// A relative hint wins over an absolute position.
    pub fn of(entry: &'a SyncEntity) -> Self {
        match (entry.insert_after_item_id.as_deref(), entry.position_in_parent) {
            (Some(""), _) => PositionHint::First,
            (Some(after), _) => PositionHint::After(after),
            (None, Some(position)) => PositionHint::Absolute(position),
            (None, None) => PositionHint::Last,
        }
    }
}

/// Computes sibling positions.
#[derive(Debug, Clone, Copy)]
pub struct PositionAllocator {
    gap: i64,
}

impl PositionAllocator {
    /// Creates an allocator with the given preferred gap.
    pub fn new(gap: i64) -> Self {
        Self { gap: gap.max(1) }
    }

    /// Computes the position of `entry_id` among `siblings`.
    ///
    /// `siblings` are the live children of the target parent in position
    /// order. They may include the entry itself when it is being moved
    /// within its current parent.
    ///
    /// An entry asked to go first or last that already sits there keeps its
    /// current position rather than moving to `0`, so it never lands on a
    /// sibling's slot.
    pub fn allocate(&self, entry_id: &str, siblings: &[Sibling<'_>], hint: PositionHint<'_>) -> i64 {
        if let PositionHint::Absolute(position) = hint {
            return position;
        }
        let (Some(first), Some(last)) = (siblings.first(), siblings.last()) else {
            return 0;
        };
        let own_slot = siblings.iter().find(|s| s.id == entry_id).map(|s| s.position);

        match hint {
            PositionHint::First => {
                if first.id == entry_id {
                    first.position
                } else {
                    first.position.saturating_sub(self.gap)
                }
            }
            PositionHint::After(after) if after == entry_id => {
                own_slot.unwrap_or_else(|| self.after_last(entry_id, last))
            }
            PositionHint::After(after) => {
                let Some(index) = siblings.iter().position(|s| s.id == after) else {
                    return self.after_last(entry_id, last);
                };
                let anchor = siblings[index];
                match siblings.get(index + 1) {
                    None => anchor.position.saturating_add(self.gap),
                    Some(next) if next.id == entry_id => next.position,
                    Some(next) => between(anchor.position, next.position),
                }
            }
            PositionHint::Last | PositionHint::Absolute(_) => self.after_last(entry_id, last),
        }
    }

    fn after_last(&self, entry_id: &str, last: &Sibling<'_>) -> i64 {
        if last.id == entry_id {
            last.position
        } else {
            last.position.saturating_add(self.gap)
        }
    }
}

/// Integer interpolation weighted 7:1 towards `low`.
fn between(low: i64, high: i64) -> i64 {
    let value = (i128::from(low) * 7 + i128::from(high)).div_euclid(8);
    i64::try_from(value).unwrap_or(low)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAP: i64 = 1 << 20;

    fn siblings<'a>(pairs: &[(&'a str, i64)]) -> Vec<Sibling<'a>> {
        pairs
            .iter()
            .map(|(id, position)| Sibling {
                id,
                position: *position,
            })
            .collect()
    }

    #[test]
    fn hint_from_entry() {
        let mut entry = SyncEntity::default();
        assert_eq!(PositionHint::of(&entry), PositionHint::Last);
        entry.position_in_parent = Some(5);
        assert_eq!(PositionHint::of(&entry), PositionHint::Absolute(5));
        entry.insert_after_item_id = Some(String::new());
        assert_eq!(PositionHint::of(&entry), PositionHint::First);
        entry.insert_after_item_id = Some("x".into());
        assert_eq!(PositionHint::of(&entry), PositionHint::After("x"));
    }

    #[test]
    fn first_child_gets_zero() {
        let allocator = PositionAllocator::new(GAP);
        for hint in [PositionHint::First, PositionHint::After("x"), PositionHint::Last] {
            assert_eq!(allocator.allocate("a", &[], hint), 0);
        }
    }

    #[test]
    fn front_and_back() {
        let allocator = PositionAllocator::new(GAP);
        let list = siblings(&[("a", 0), ("b", GAP)]);
        assert_eq!(allocator.allocate("c", &list, PositionHint::First), -GAP);
        assert_eq!(allocator.allocate("c", &list, PositionHint::After("b")), 2 * GAP);
        assert_eq!(allocator.allocate("c", &list, PositionHint::Last), 2 * GAP);
    }

    #[test]
    fn interpolates_towards_anchor() {
        let allocator = PositionAllocator::new(GAP);
        let list = siblings(&[("a", 0), ("b", GAP)]);
        assert_eq!(allocator.allocate("c", &list, PositionHint::After("a")), GAP / 8);

        let list = siblings(&[("a", -16), ("b", 0)]);
        assert_eq!(allocator.allocate("c", &list, PositionHint::After("a")), -14);
    }

    #[test]
    fn unknown_anchor_appends() {
        let allocator = PositionAllocator::new(GAP);
        let list = siblings(&[("a", 0), ("b", GAP)]);
        assert_eq!(
            allocator.allocate("c", &list, PositionHint::After("zzz")),
            2 * GAP
        );
    }

    #[test]
    fn stays_put_when_already_in_place() {
        let allocator = PositionAllocator::new(GAP);
        let list = siblings(&[("a", 0), ("b", 40), ("c", GAP)]);
        assert_eq!(allocator.allocate("b", &list, PositionHint::After("a")), 40);
        assert_eq!(allocator.allocate("a", &list, PositionHint::First), 0);
        assert_eq!(allocator.allocate("c", &list, PositionHint::Last), GAP);
        assert_eq!(allocator.allocate("b", &list, PositionHint::After("b")), 40);
    }

    #[test]
    fn self_anchor_outside_siblings_appends() {
        let allocator = PositionAllocator::new(GAP);
        let list = siblings(&[("a", 0)]);
        assert_eq!(allocator.allocate("z", &list, PositionHint::After("z")), GAP);
    }

    #[test]
    fn absolute_position_is_kept() {
        let allocator = PositionAllocator::new(GAP);
        let list = siblings(&[("a", 0)]);
        assert_eq!(allocator.allocate("b", &list, PositionHint::Absolute(77)), 77);
        assert_eq!(allocator.allocate("b", &[], PositionHint::Absolute(77)), 77);
    }

    #[test]
    fn extreme_positions_do_not_overflow() {
        let allocator = PositionAllocator::new(GAP);
        let list = siblings(&[("a", i64::MAX - 1), ("b", i64::MAX)]);
        let position = allocator.allocate("c", &list, PositionHint::After("a"));
        assert!(position >= i64::MAX - 1);
        assert_eq!(allocator.allocate("c", &list, PositionHint::Last), i64::MAX);
    }
}
