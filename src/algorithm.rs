mod astar;
mod dijkstra;
mod dstar;
mod dstarlite;

pub use astar::a_star_search;
pub use dijkstra::dijkstra_search;
pub use dstar::{d_star_search, DStar};
pub use dstarlite::d_star_lite_search;

use std::collections::HashMap;
use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::common::{Path, Position, SearchReport, SearchRequest, StepObserver};
use crate::map::Map;

/// Search strategies behind one uniform entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    Dijkstra,
    AStar,
    DStar,
    DStarLite,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::Dijkstra,
        Strategy::AStar,
        Strategy::DStar,
        Strategy::DStarLite,
    ];

    pub fn search(
        self,
        map: &Map,
        request: &SearchRequest,
        observer: &mut dyn StepObserver,
    ) -> anyhow::Result<SearchReport> {
        match self {
            Strategy::Dijkstra => dijkstra_search(map, request, observer),
            Strategy::AStar => a_star_search(map, request, observer),
            Strategy::DStar => d_star_search(map, request, observer),
            Strategy::DStarLite => d_star_lite_search(map, request, observer),
        }
    }

    /// Whether the strategy can repair an earlier plan in place.
    pub fn is_incremental(self) -> bool {
        matches!(self, Strategy::DStar)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Dijkstra => "Dijkstra",
            Strategy::AStar => "A*",
            Strategy::DStar => "D*",
            Strategy::DStarLite => "D* Lite",
        };
        f.write_str(name)
    }
}

/// Predecessor map. A node gets an entry only when its g-score strictly
/// improves, so following entries always ends at the start.
#[derive(Debug, Clone, Default)]
pub(crate) struct Trace(HashMap<Position, Position>);

impl Trace {
    pub(crate) fn record(&mut self, node: Position, parent: Position) {
        self.0.insert(node, parent);
    }

    pub(crate) fn parent(&self, node: Position) -> Option<Position> {
        self.0.get(&node).copied()
    }

    pub(crate) fn forget(&mut self, node: Position) {
        self.0.remove(&node);
    }

    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }
}

/// Proof that the goal was popped from the open set. Only the search loops
/// construct it, so a path is never rebuilt for an unreached goal.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Reached(Position);

impl Reached {
    pub(crate) fn goal(goal: Position) -> Self {
        Reached(goal)
    }
}

/// Walks predecessors back from the goal. The result excludes `start` and
/// includes the goal.
pub(crate) fn construct_path(trace: &Trace, reached: Reached, start: Position) -> Path {
    let mut current = reached.0;
    let mut path = vec![current];
    while let Some(parent) = trace.parent(current) {
        if parent == start {
            break;
        }
        path.push(parent);
        current = parent;
    }
    path.reverse();
    path
}

/// Announces the final path to the observer, once per node.
pub(crate) fn notify_path(path: &Path, observer: &mut dyn StepObserver) {
    for &position in path {
        observer.on_path(position);
    }
}
