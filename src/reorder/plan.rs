//! Pure planning helpers for a single-item move.

use crate::model::{ItemId, OrderedItem};

/// In-memory result of moving one item within its siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    pub from: usize,
    pub to: usize,
    /// Sibling ids in their final order.
    pub target: Vec<ItemId>,
}

impl MovePlan {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

/// Clamp a requested index into `[0, len - 1]`.
///
/// Negative requests land on 0 and anything past the end lands on the last
/// slot. An empty collection clamps to 0.
#[must_use]
pub fn clamp_index(target: i64, len: usize) -> usize {
    let last = len.saturating_sub(1);
    usize::try_from(target).map_or(0, |t| t.min(last))
}

/// Plan moving `item_id` to `target` among `siblings` (ascending by order).
///
/// Returns `None` when the item is not one of the siblings.
#[must_use]
pub fn plan_move(siblings: &[OrderedItem], item_id: &ItemId, target: i64) -> Option<MovePlan> {
    let from = siblings.iter().position(|i| &i.id == item_id)?;
    let to = clamp_index(target, siblings.len());

    let mut ids: Vec<ItemId> = siblings.iter().map(|i| i.id.clone()).collect();
    let moved = ids.remove(from);
    ids.insert(to, moved);

    Some(MovePlan {
        from,
        to,
        target: ids,
    })
}

/// First order of the temporary range used to displace every sibling.
///
/// It sits above both the configured offset and every order currently held,
/// and never below the sibling count, so neither phase can collide with a
/// slot that is still occupied, even when an earlier failed reorder left the
/// collection inside the offset range.
#[must_use]
pub fn displacement_base(offset: i64, siblings: &[OrderedItem]) -> i64 {
    let count = i64::try_from(siblings.len()).unwrap_or(i64::MAX);
    let above_max = siblings
        .iter()
        .map(|i| i.order)
        .max()
        .map_or(0, |max| max.saturating_add(1));
    offset.max(above_max).max(count)
}

/// Order value for the `index`-th slot.
#[must_use]
pub fn slot(index: usize) -> i64 {
    i64::try_from(index).unwrap_or(i64::MAX)
}
