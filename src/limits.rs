//! Firmware capacity limits mirrored by the editor.

use tracing::warn;

use crate::error::EditError;

pub const MAX_DEVICES: usize = 12;
pub const MAX_SCENARIOS: usize = 8;
pub const MAX_STEPS: usize = 16;

pub const MAX_UID_SLOTS: usize = 8;
pub const MAX_MQTT_RULES: usize = 8;
pub const MAX_FLAG_RULES: usize = 8;
/// Condition rules share the flag-rule capacity on the firmware side.
pub const MAX_CONDITION_RULES: usize = MAX_FLAG_RULES;
pub const MAX_SEQUENCE_STEPS: usize = 8;
pub const MAX_WAIT_REQUIREMENTS: usize = 8;

/// Append `item` unless `items` already holds `limit` entries.
///
/// Returns the index of the new entry.
pub(crate) fn push_limited<T>(
    items: &mut Vec<T>,
    item: T,
    limit: usize,
    what: &'static str,
) -> Result<usize, EditError> {
    if items.len() >= limit {
        warn!(what, limit, "refusing to add beyond limit");
        return Err(EditError::LimitReached { what, limit });
    }
    items.push(item);
    Ok(items.len() - 1)
}
