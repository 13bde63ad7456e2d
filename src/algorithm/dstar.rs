use super::{construct_path, notify_path, Reached, Trace};
use crate::common::{
    check_budget, step_cost, CostLedger, OpenList, OpenNode, Position, SearchReport,
    SearchRequest, StepObserver, INFINITY,
};
use crate::map::Map;

use anyhow::bail;
use std::collections::HashSet;
use tracing::{debug, instrument, trace};

/// Replanning search bound to one start/goal pair.
///
/// The open set is keyed by rhs. After the caller edits walls,
/// [`DStar::propagate_changes`] drops every g-score whose predecessor chain
/// now crosses a wall, recomputes rhs over the whole grid, and resumes from
/// the surviving frontier instead of starting over.
#[derive(Debug, Clone)]
pub struct DStar {
    start: Position,
    goal: Position,
    start_rhs: usize,
    max_expansions: Option<usize>,
    ledger: CostLedger,
    trace: Trace,
    open_list: OpenList,
}

impl DStar {
    pub fn new(map: &Map, request: &SearchRequest) -> anyhow::Result<Self> {
        request.validate(map)?;
        let mut planner = DStar {
            start: request.start,
            goal: request.goal,
            start_rhs: request.h(request.start),
            max_expansions: request.max_expansions,
            ledger: CostLedger::default(),
            trace: Trace::default(),
            open_list: OpenList::new(),
        };
        planner.reset();
        Ok(planner)
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn goal(&self) -> Position {
        self.goal
    }

    /// Best known cost from start, `None` while unreached.
    pub fn g_score(&self, position: Position) -> Option<usize> {
        Some(self.ledger.g(position)).filter(|&g| g != INFINITY)
    }

    pub fn rhs_score(&self, position: Position) -> Option<usize> {
        Some(self.ledger.rhs(position)).filter(|&rhs| rhs != INFINITY)
    }

    pub fn is_consistent(&self, position: Position) -> bool {
        self.ledger.is_consistent(position)
    }

    fn reset(&mut self) {
        self.ledger = CostLedger::new(self.start);
        self.ledger.set_rhs(self.start, self.start_rhs);
        self.trace.clear();
        self.open_list.clear();
        self.open_list.insert(OpenNode {
            position: self.start,
            key: self.start_rhs,
            g_cost: 0,
        });
    }

    /// Plans from scratch, discarding anything learned earlier.
    #[instrument(skip_all, name = "d_star_plan", fields(start = format!("{:?}", self.start), goal = format!("{:?}", self.goal)), level = "debug")]
    pub fn plan(
        &mut self,
        map: &Map,
        observer: &mut dyn StepObserver,
    ) -> anyhow::Result<SearchReport> {
        self.check_endpoints(map)?;
        self.reset();
        self.replan(map, observer)
    }

    /// Repairs the plan after wall edits. Nodes whose predecessor chain is
    /// still wall-free keep their g-score and predecessor.
    #[instrument(skip_all, name = "d_star_propagate", fields(start = format!("{:?}", self.start), goal = format!("{:?}", self.goal)), level = "debug")]
    pub fn propagate_changes(
        &mut self,
        map: &Map,
        observer: &mut dyn StepObserver,
    ) -> anyhow::Result<SearchReport> {
        self.check_endpoints(map)?;
        let invalidated = self.invalidate(map);

        // Full rhs pass, not a localised update from the edited cells.
        for node in map.nodes() {
            if map.is_wall(node) {
                self.ledger.set_rhs(node, INFINITY);
            } else {
                self.update_rhs(map, node);
            }
        }

        self.open_list.clear();
        for (position, g_cost) in self.ledger.discovered() {
            let can_improve_neighbor = map.get_neighbors(position).into_iter().any(|neighbor| {
                !map.is_wall(neighbor) && step_cost(g_cost) < self.ledger.g(neighbor)
            });
            if can_improve_neighbor || position == self.goal {
                self.open_list.insert(OpenNode {
                    position,
                    key: g_cost.min(self.ledger.rhs(position)),
                    g_cost,
                });
            }
        }
        debug!(
            "invalidated {invalidated} nodes, reseeded {} frontier nodes",
            self.open_list.len()
        );

        self.replan(map, observer)
    }

    fn check_endpoints(&self, map: &Map) -> anyhow::Result<()> {
        for position in [self.start, self.goal] {
            if !map.contains(position) || map.is_wall(position) {
                bail!("endpoint {position:?} is no longer a free cell; start a new plan");
            }
        }
        Ok(())
    }

    /// Forgets every node that is a wall or hangs off one. Parents always have
    /// a strictly smaller g, so one pass in g order settles the whole tree.
    fn invalidate(&mut self, map: &Map) -> usize {
        let mut valid = HashSet::new();
        let mut invalidated = 0;
        for (position, _) in self.ledger.discovered() {
            let supported = position == self.start
                || (!map.is_wall(position)
                    && self
                        .trace
                        .parent(position)
                        .is_some_and(|parent| valid.contains(&parent)));
            if supported {
                valid.insert(position);
            } else {
                self.ledger.invalidate(position);
                self.trace.forget(position);
                invalidated += 1;
            }
        }
        invalidated
    }

    /// One-step lookahead from the neighbours' g-scores.
    fn update_rhs(&mut self, map: &Map, node: Position) {
        if node == self.start {
            return;
        }

        let min_rhs = map
            .get_neighbors(node)
            .into_iter()
            .filter(|&neighbor| !map.is_wall(neighbor))
            .map(|neighbor| step_cost(self.ledger.g(neighbor)))
            .min()
            .unwrap_or(INFINITY);

        self.ledger.set_rhs(node, min_rhs);
    }

    fn replan(
        &mut self,
        map: &Map,
        observer: &mut dyn StepObserver,
    ) -> anyhow::Result<SearchReport> {
        let mut report = SearchReport::default();
        let mut visited = HashSet::new();

        while let Some(current) = self.open_list.pop_first() {
            // Superseded by a later push with a smaller g.
            if current.g_cost != self.ledger.g(current.position) {
                continue;
            }

            report.expansions += 1;
            check_budget(self.max_expansions, report.expansions)?;
            if visited.insert(current.position) {
                report.visited.push(current.position);
            }
            observer.on_visit(current.position);
            trace!("expand node: {current:?}");

            if current.position == self.goal {
                report.path =
                    construct_path(&self.trace, Reached::goal(current.position), self.start);
                notify_path(&report.path, observer);
                debug!(
                    "found path of length {} after {} expansions",
                    report.path.len(),
                    report.expansions
                );
                return Ok(report);
            }

            let tentative_g_cost = step_cost(current.g_cost);
            for neighbor in map.get_neighbors(current.position) {
                if map.is_wall(neighbor) {
                    continue;
                }

                let improved = tentative_g_cost < self.ledger.g(neighbor);
                if improved {
                    self.trace.record(neighbor, current.position);
                    self.ledger.set_g(neighbor, tentative_g_cost);
                }

                self.update_rhs(map, neighbor);

                if improved {
                    self.open_list.insert(OpenNode {
                        position: neighbor,
                        key: self.ledger.rhs(neighbor),
                        g_cost: tentative_g_cost,
                    });
                }
            }
        }

        debug!("cannot find solution");
        Ok(report)
    }
}

/// One-shot D*: a fresh planner that plans once.
pub fn d_star_search(
    map: &Map,
    request: &SearchRequest,
    observer: &mut dyn StepObserver,
) -> anyhow::Result<SearchReport> {
    DStar::new(map, request)?.plan(map, observer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::dijkstra_search;
    use crate::algorithm::tests::{assert_valid_path, init_tracing};
    use crate::common::NoopObserver;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_d_star_g_along_path() {
        init_tracing();
        let map = Map::new(5, 5).unwrap();
        let request = SearchRequest::from_map(&map);
        let mut planner = DStar::new(&map, &request).unwrap();
        let report = planner.plan(&map, &mut NoopObserver).unwrap();
        assert_eq!(report.path.len(), 8);

        let costs: Vec<_> = std::iter::once(map.start())
            .chain(report.path.iter().copied())
            .map(|p| planner.g_score(p).unwrap())
            .collect();
        assert_eq!(costs, (0..=8).collect::<Vec<_>>());

        // The start keeps its heuristic rhs, so it is the one inconsistent node.
        assert_eq!(planner.rhs_score(map.start()), Some(8));
        assert!(!planner.is_consistent(map.start()));
    }

    #[test]
    fn test_d_star_gate_closes() {
        init_tracing();
        let mut map = Map::from_file("map_file/test/gate.map", None).unwrap();
        let request = SearchRequest::from_map(&map);
        let mut planner = DStar::new(&map, &request).unwrap();

        let report = planner.plan(&map, &mut NoopObserver).unwrap();
        assert!(report.path.contains(&(1, 1)));

        map.make_wall((1, 1)).unwrap();
        let report = planner.propagate_changes(&map, &mut NoopObserver).unwrap();
        assert!(report.path.is_empty());
        assert_eq!(planner.g_score((2, 2)), None);
        assert_eq!(planner.g_score((0, 2)), Some(2));

        // Reopening the gate finds the route again.
        map.make_empty((1, 1)).unwrap();
        let report = planner.propagate_changes(&map, &mut NoopObserver).unwrap();
        assert_eq!(report.path.len(), 4);
        assert!(report.path.contains(&(1, 1)));
    }

    #[test]
    fn test_d_star_propagate_without_edits_keeps_path() {
        let map = Map::from_file("map_file/test/spiral.map", None).unwrap();
        let request = SearchRequest::from_map(&map);
        let mut planner = DStar::new(&map, &request).unwrap();
        let first = planner.plan(&map, &mut NoopObserver).unwrap();
        let second = planner.propagate_changes(&map, &mut NoopObserver).unwrap();
        assert_eq!(first.path, second.path);
        assert!(second.expansions <= first.expansions);
    }

    #[test]
    fn test_d_star_detour_after_new_wall() {
        let mut map = Map::new(6, 6).unwrap();
        let request = SearchRequest::from_map(&map);
        let mut planner = DStar::new(&map, &request).unwrap();
        let report = planner.plan(&map, &mut NoopObserver).unwrap();
        assert_eq!(report.path.len(), 10);

        // Block the cell the current path uses right after the start.
        let blocked = report.path[0];
        map.make_wall(blocked).unwrap();
        let report = planner.propagate_changes(&map, &mut NoopObserver).unwrap();
        assert_eq!(report.path.len(), 10);
        assert!(!report.path.contains(&blocked));
        assert_valid_path(&map, map.start(), map.end(), &report.path);
    }

    #[test]
    fn test_d_star_repair_matches_fresh_search() {
        init_tracing();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..25 {
            let mut map = Map::new(10, 12).unwrap();
            map.scatter_walls(0.2, &mut rng).unwrap();
            let request = SearchRequest::from_map(&map);
            let mut planner = DStar::new(&map, &request).unwrap();
            planner.plan(&map, &mut NoopObserver).unwrap();

            for _ in 0..4 {
                for _ in 0..6 {
                    let cell = (rng.gen_range(0..map.height), rng.gen_range(0..map.width));
                    if !map.is_start(cell) && !map.is_end(cell) {
                        map.toggle_wall(cell).unwrap();
                    }
                }
                let repaired = planner.propagate_changes(&map, &mut NoopObserver).unwrap();
                let fresh = dijkstra_search(&map, &request, &mut NoopObserver).unwrap();
                assert_eq!(repaired.path.len(), fresh.path.len());
                if repaired.found() {
                    assert_valid_path(&map, map.start(), map.end(), &repaired.path);
                }
            }
        }
    }

    #[test]
    fn test_d_star_rejects_walled_endpoint() {
        let mut map = Map::new(3, 3).unwrap();
        let request = SearchRequest::new((0, 0), (1, 1));
        let mut planner = DStar::new(&map, &request).unwrap();
        planner.plan(&map, &mut NoopObserver).unwrap();
        map.make_wall((1, 1)).unwrap();
        assert!(planner.propagate_changes(&map, &mut NoopObserver).is_err());
    }
}
