//! Membership deltas for unordered list resources
//!
//! Remote list endpoints accept append/remove patches. Sending only the
//! difference between the previously declared membership and the new one
//! avoids clobbering entries added remotely in the meantime.

use std::collections::BTreeMap;

/// Append/remove patch between two unordered memberships.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetDelta {
    /// Values present in the new membership but not the old.
    pub append: Vec<String>,

    /// Values present in the old membership but not the new.
    pub remove: Vec<String>,
}

impl SetDelta {
    pub fn is_empty(&self) -> bool {
        self.append.is_empty() && self.remove.is_empty()
    }
}

/// Compute the append/remove delta from `old` to `new`.
///
/// Values occurring in both memberships are never part of the delta.
/// Output order is lexicographic so patches are deterministic.
pub fn set_delta(old: &[String], new: &[String]) -> SetDelta {
    let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
    for value in new {
        *counts.entry(value).or_default() += 1;
    }
    for value in old {
        *counts.entry(value).or_default() -= 1;
    }

    let mut delta = SetDelta::default();
    for (value, count) in counts {
        if count > 0 {
            delta.append.push(value.to_string());
        } else if count < 0 {
            delta.remove.push(value.to_string());
        }
    }
    delta
}
