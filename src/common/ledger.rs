use std::collections::HashMap;

use super::Position;

/// Cost of a node that has not been reached.
pub(crate) const INFINITY: usize = usize::MAX;

/// Cost of one more unit step; stays infinite when `g` is infinite.
pub(crate) fn step_cost(g: usize) -> usize {
    g.saturating_add(1)
}

/// Per-run g/rhs bookkeeping. Absent entries are infinite.
#[derive(Debug, Clone, Default)]
pub(crate) struct CostLedger {
    g_cost_map: HashMap<Position, usize>,
    rhs_map: HashMap<Position, usize>,
}

impl CostLedger {
    pub(crate) fn new(start: Position) -> Self {
        let mut ledger = CostLedger::default();
        ledger.g_cost_map.insert(start, 0);
        ledger
    }

    pub(crate) fn g(&self, position: Position) -> usize {
        *self.g_cost_map.get(&position).unwrap_or(&INFINITY)
    }

    pub(crate) fn rhs(&self, position: Position) -> usize {
        *self.rhs_map.get(&position).unwrap_or(&INFINITY)
    }

    pub(crate) fn set_g(&mut self, position: Position, cost: usize) {
        if cost == INFINITY {
            self.g_cost_map.remove(&position);
        } else {
            self.g_cost_map.insert(position, cost);
        }
    }

    pub(crate) fn set_rhs(&mut self, position: Position, cost: usize) {
        if cost == INFINITY {
            self.rhs_map.remove(&position);
        } else {
            self.rhs_map.insert(position, cost);
        }
    }

    pub(crate) fn invalidate(&mut self, position: Position) {
        self.g_cost_map.remove(&position);
        self.rhs_map.remove(&position);
    }

    pub(crate) fn is_consistent(&self, position: Position) -> bool {
        self.g(position) == self.rhs(position)
    }

    /// Every node with a finite g, in increasing g order (ties by position).
    pub(crate) fn discovered(&self) -> Vec<(Position, usize)> {
        let mut discovered: Vec<_> = self.g_cost_map.iter().map(|(&p, &g)| (p, g)).collect();
        discovered.sort_by_key(|&(position, g)| (g, position));
        discovered
    }
}
