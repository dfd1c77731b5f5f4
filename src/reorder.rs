//! List reordering for drag-and-drop and move buttons.

/// Move the item at `from` so it lands before the item that was at `to`.
///
/// `to` ranges over `0..=len`; `len` means "after the last item". `from` and
/// `to` are clamped into range. Returns false when the list is unchanged
/// (empty list, or a drop onto the item's own position or the slot right
/// after it).
pub fn reorder_in_place<T>(items: &mut Vec<T>, from: usize, to: usize) -> bool {
    let len = items.len();
    if len == 0 {
        return false;
    }
    let from = from.min(len - 1);
    let to = to.min(len);
    if to == from || to == from + 1 {
        return false;
    }
    let item = items.remove(from);
    let insert_at = if from < to { to - 1 } else { to };
    items.insert(insert_at.min(items.len()), item);
    true
}

/// Non-mutating form of [`reorder_in_place`].
pub fn reorder<T: Clone>(items: &[T], from: usize, to: usize) -> Vec<T> {
    let mut out = items.to_vec();
    reorder_in_place(&mut out, from, to);
    out
}

/// Move the item at `index` by `delta` positions. Out-of-range targets are a no-op.
pub fn move_by<T>(items: &mut Vec<T>, index: usize, delta: isize) -> bool {
    if index >= items.len() {
        return false;
    }
    let Some(target) = index.checked_add_signed(delta).filter(|t| *t < items.len()) else {
        return false;
    };
    if target == index {
        return false;
    }
    let item = items.remove(index);
    items.insert(target, item);
    true
}

/// Remove the item at `index` if it exists.
pub fn remove_at<T>(items: &mut Vec<T>, index: usize) -> bool {
    if index >= items.len() {
        return false;
    }
    items.remove(index);
    true
}
