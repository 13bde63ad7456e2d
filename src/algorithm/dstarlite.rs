use super::{construct_path, notify_path, Reached, Trace};
use crate::common::{
    step_cost, CostLedger, OpenList, OpenNode, Position, SearchReport, SearchRequest,
    StepObserver, INFINITY,
};
use crate::map::Map;

use std::collections::HashSet;
use tracing::{debug, instrument, trace};

// Same lookahead as D*'s rhs update. Kept separate on purpose: the two
// strategies order their open sets differently.
fn update_node_costs(map: &Map, ledger: &mut CostLedger, start: Position, node: Position) {
    if node == start {
        return;
    }

    let mut min_rhs = INFINITY;
    for neighbor in map.get_neighbors(node) {
        if !map.is_wall(neighbor) {
            // Cost between adjacent nodes is 1
            min_rhs = min_rhs.min(step_cost(ledger.g(neighbor)));
        }
    }

    ledger.set_rhs(node, min_rhs);
}

/// D* Lite without localised repair: every call plans from scratch, so a
/// re-invocation after `clear_path` is how callers pick up grid edits.
#[instrument(skip_all, name = "d_star_lite", fields(start = format!("{:?}", request.start), goal = format!("{:?}", request.goal)), level = "debug")]
pub fn d_star_lite_search(
    map: &Map,
    request: &SearchRequest,
    observer: &mut dyn StepObserver,
) -> anyhow::Result<SearchReport> {
    request.validate(map)?;

    let mut open_list = OpenList::new();
    let mut trace = Trace::default();
    let mut ledger = CostLedger::new(request.start);
    let mut report = SearchReport::default();
    let mut visited = HashSet::new();

    let start_rhs = request.h(request.start);
    ledger.set_rhs(request.start, start_rhs);
    open_list.insert(OpenNode {
        position: request.start,
        key: start_rhs,
        g_cost: 0,
    });

    while let Some(current) = open_list.pop_first() {
        if current.g_cost != ledger.g(current.position) {
            continue;
        }

        report.expansions += 1;
        request.check_budget(report.expansions)?;
        if visited.insert(current.position) {
            report.visited.push(current.position);
        }
        observer.on_visit(current.position);
        trace!("expand node: {current:?}");

        if current.position == request.goal {
            report.path = construct_path(&trace, Reached::goal(current.position), request.start);
            notify_path(&report.path, observer);
            debug!(
                "found path of length {} after {} expansions",
                report.path.len(),
                report.expansions
            );
            return Ok(report);
        }

        // Assuming uniform cost for movement.
        let tentative_g_cost = step_cost(current.g_cost);
        for neighbor in map.get_neighbors(current.position) {
            if map.is_wall(neighbor) {
                continue;
            }

            if tentative_g_cost < ledger.g(neighbor) {
                trace.record(neighbor, current.position);
                ledger.set_g(neighbor, tentative_g_cost);
                open_list.insert(OpenNode {
                    position: neighbor,
                    key: tentative_g_cost,
                    g_cost: tentative_g_cost,
                });
            }

            update_node_costs(map, &mut ledger, request.start, neighbor);
        }
    }

    debug!("cannot find solution");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::dijkstra_search;
    use crate::algorithm::tests::{assert_valid_path, init_tracing};
    use crate::common::NoopObserver;

    #[test]
    fn test_d_star_lite_gate_closes_on_reinvocation() {
        init_tracing();
        let mut map = Map::from_file("map_file/test/gate.map", None).unwrap();
        let request = SearchRequest::from_map(&map);

        let report = d_star_lite_search(&map, &request, &mut NoopObserver).unwrap();
        assert_eq!(report.path, vec![(0, 1), (1, 1), (2, 1), (2, 2)]);
        map.mark(&report);

        map.clear_path();
        map.make_wall((1, 1)).unwrap();
        let report = d_star_lite_search(&map, &request, &mut NoopObserver).unwrap();
        assert!(report.path.is_empty());
    }

    #[test]
    fn test_d_star_lite_custom_heuristic_only_seeds_start() {
        let map = Map::from_file("map_file/test/test.map", None).unwrap();
        let huge = |_: Position, _: Position| 1_000;
        let request = SearchRequest::from_map(&map).with_heuristic(&huge);
        let report = d_star_lite_search(&map, &request, &mut NoopObserver).unwrap();
        let baseline = dijkstra_search(&map, &request, &mut NoopObserver).unwrap();
        assert_eq!(report.path.len(), baseline.path.len());
        assert_valid_path(&map, map.start(), map.end(), &report.path);
    }

    #[test]
    fn test_update_node_costs_uses_lookahead() {
        let map = Map::parse("S.\n#E", None).unwrap();
        let mut ledger = CostLedger::new((0, 0));
        ledger.set_g((0, 1), 1);
        update_node_costs(&map, &mut ledger, (0, 0), (1, 1));
        assert_eq!(ledger.rhs((1, 1)), 2);
        update_node_costs(&map, &mut ledger, (0, 0), (0, 0));
        assert_eq!(ledger.rhs((0, 0)), INFINITY);
    }
}
