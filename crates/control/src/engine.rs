//! Pure sequencing over the ordered item list.
//!
//! `items` must already be sorted ascending by `order` (the store reads it
//! back that way). `None` results are no-ops, never errors: the show is at a
//! terminal position or there is nothing to move to.

use shared::domain::{ItemId, ScheduleItem};

/// Selects the item after the current one. With no current id (or an id that
/// is no longer in the list) the first item starts the show; at the last item
/// there is nothing further.
pub fn next_item<'a>(
    items: &'a [ScheduleItem],
    current_id: Option<&ItemId>,
) -> Option<&'a ScheduleItem> {
    let Some(current_id) = current_id else {
        return items.first();
    };
    match items.iter().position(|item| &item.id == current_id) {
        None => items.first(),
        Some(index) if index + 1 < items.len() => Some(&items[index + 1]),
        Some(_) => None,
    }
}

/// Selects the item before the current one. Requires a current item that is
/// actually in the list and not first.
pub fn previous_item<'a>(
    items: &'a [ScheduleItem],
    current_id: Option<&ItemId>,
) -> Option<&'a ScheduleItem> {
    let current_id = current_id?;
    let index = items.iter().position(|item| &item.id == current_id)?;
    if index > 0 {
        Some(&items[index - 1])
    } else {
        None
    }
}
