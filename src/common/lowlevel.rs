use std::cmp::Ordering;
use std::collections::BTreeSet;

use super::Position;

/// Open set entry. `key` is the strategy-specific priority and `g_cost` the
/// g-score at push time, used to recognise stale duplicates on pop.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct OpenNode {
    pub(crate) position: Position,
    pub(crate) key: usize,
    pub(crate) g_cost: usize,
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            // Higher g cost has higher priority
            .then_with(|| other.g_cost.cmp(&self.g_cost))
            .then_with(|| self.position.cmp(&other.position))
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Ordered frontier; `pop_first` yields the minimum entry.
pub(crate) type OpenList = BTreeSet<OpenNode>;
