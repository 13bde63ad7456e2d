mod ledger;
mod lowlevel;

pub(crate) use ledger::{step_cost, CostLedger, INFINITY};
pub(crate) use lowlevel::{OpenList, OpenNode};

use anyhow::bail;
use tracing::trace;

use crate::map::Map;

/// Grid coordinate as `(row, col)`.
pub type Position = (usize, usize);

/// Steps from the cell after start up to and including the goal.
pub type Path = Vec<Position>;

/// Estimated remaining cost from `node` to `goal`.
pub trait Heuristic {
    fn estimate(&self, node: Position, goal: Position) -> usize;
}

impl<F> Heuristic for F
where
    F: Fn(Position, Position) -> usize,
{
    fn estimate(&self, node: Position, goal: Position) -> usize {
        self(node, goal)
    }
}

/// Manhattan distance, admissible and consistent on a 4-connected unit grid.
pub fn manhattan(node: Position, goal: Position) -> usize {
    node.0.abs_diff(goal.0) + node.1.abs_diff(goal.1)
}

/// Synchronous hook into a running search. Both callbacks must return before
/// the search continues; nothing in the search depends on them.
pub trait StepObserver {
    fn on_visit(&mut self, _position: Position) {}
    fn on_path(&mut self, _position: Position) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl StepObserver for NoopObserver {}

/// Forwards every step to `tracing` at trace level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl StepObserver for TracingObserver {
    fn on_visit(&mut self, position: Position) {
        trace!("visit {position:?}");
    }

    fn on_path(&mut self, position: Position) {
        trace!("path {position:?}");
    }
}

/// Records every notification in order.
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    pub visits: Vec<Position>,
    pub path: Vec<Position>,
}

impl StepObserver for RecordingObserver {
    fn on_visit(&mut self, position: Position) {
        self.visits.push(position);
    }

    fn on_path(&mut self, position: Position) {
        self.path.push(position);
    }
}

#[derive(Clone, Copy)]
pub struct SearchRequest<'a> {
    pub start: Position,
    pub goal: Position,
    pub heuristic: Option<&'a dyn Heuristic>,
    pub max_expansions: Option<usize>,
}

impl<'a> SearchRequest<'a> {
    pub fn new(start: Position, goal: Position) -> Self {
        SearchRequest {
            start,
            goal,
            heuristic: None,
            max_expansions: None,
        }
    }

    /// Request between the map's current start and end cells.
    pub fn from_map(map: &Map) -> Self {
        Self::new(map.start(), map.end())
    }

    pub fn with_heuristic(mut self, heuristic: &'a dyn Heuristic) -> Self {
        self.heuristic = Some(heuristic);
        self
    }

    pub fn with_max_expansions(mut self, max_expansions: Option<usize>) -> Self {
        self.max_expansions = max_expansions;
        self
    }

    pub(crate) fn h(&self, node: Position) -> usize {
        match self.heuristic {
            Some(heuristic) => heuristic.estimate(node, self.goal),
            None => manhattan(node, self.goal),
        }
    }

    pub(crate) fn validate(&self, map: &Map) -> anyhow::Result<()> {
        for (name, position) in [("start", self.start), ("goal", self.goal)] {
            if !map.contains(position) {
                bail!(
                    "{name} {position:?} is outside the {}x{} grid",
                    map.height,
                    map.width
                );
            }
            if map.is_wall(position) {
                bail!("{name} {position:?} is a wall");
            }
        }
        if self.start == self.goal {
            bail!("start and goal are both {:?}", self.start);
        }
        Ok(())
    }

    pub(crate) fn check_budget(&self, expansions: usize) -> anyhow::Result<()> {
        check_budget(self.max_expansions, expansions)
    }
}

/// Fails once `expansions` exceeds `limit`.
pub(crate) fn check_budget(limit: Option<usize>, expansions: usize) -> anyhow::Result<()> {
    if let Some(limit) = limit {
        if expansions > limit {
            bail!("expansion limit reached after {limit} expansions");
        }
    }
    Ok(())
}

/// Outcome of one search call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchReport {
    pub path: Path,
    /// Expanded nodes in first-expansion order.
    pub visited: Vec<Position>,
    pub expansions: usize,
}

impl SearchReport {
    pub fn found(&self) -> bool {
        !self.path.is_empty()
    }
}
