use super::{construct_path, notify_path, Reached, Trace};
use crate::common::{
    step_cost, CostLedger, OpenList, OpenNode, SearchReport, SearchRequest, StepObserver,
};
use crate::map::Map;

use std::collections::HashSet;
use tracing::{debug, instrument, trace};

#[instrument(skip_all, name = "a_star", fields(start = format!("{:?}", request.start), goal = format!("{:?}", request.goal)), level = "debug")]
pub fn a_star_search(
    map: &Map,
    request: &SearchRequest,
    observer: &mut dyn StepObserver,
) -> anyhow::Result<SearchReport> {
    request.validate(map)?;

    let mut open_list = OpenList::new();
    let mut closed_list = HashSet::new();
    let mut trace = Trace::default();
    let mut ledger = CostLedger::new(request.start);
    let mut report = SearchReport::default();

    open_list.insert(OpenNode {
        position: request.start,
        key: request.h(request.start),
        g_cost: 0,
    });

    while let Some(current) = open_list.pop_first() {
        if !closed_list.insert(current.position) {
            continue;
        }

        // Update stats.
        report.expansions += 1;
        request.check_budget(report.expansions)?;
        report.visited.push(current.position);
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

        // Assuming uniform cost.
        let tentative_g_cost = step_cost(ledger.g(current.position));

        // Expand nodes from the current position.
        for neighbor in map.get_neighbors(current.position) {
            if map.is_wall(neighbor) || closed_list.contains(&neighbor) {
                continue;
            }

            if tentative_g_cost < ledger.g(neighbor) {
                trace.record(neighbor, current.position);
                ledger.set_g(neighbor, tentative_g_cost);

                let h_open_cost = request.h(neighbor);
                open_list.insert(OpenNode {
                    position: neighbor,
                    key: tentative_g_cost.saturating_add(h_open_cost),
                    g_cost: tentative_g_cost,
                });
            }
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
    use crate::common::{NoopObserver, Position};

    #[test]
    fn test_a_star_open_grid_expands_only_the_corridor() {
        init_tracing();
        let map = Map::new(5, 5).unwrap();
        let request = SearchRequest::new((2, 0), (2, 4));
        let report = a_star_search(&map, &request, &mut NoopObserver).unwrap();
        assert_eq!(report.path, vec![(2, 1), (2, 2), (2, 3), (2, 4)]);
        assert_eq!(report.expansions, 5);
    }

    #[test]
    fn test_a_star_no_worse_than_dijkstra() {
        let map = Map::from_file("map_file/test/test.map", None).unwrap();
        let request = SearchRequest::from_map(&map);
        let a_star = a_star_search(&map, &request, &mut NoopObserver).unwrap();
        let dijkstra = dijkstra_search(&map, &request, &mut NoopObserver).unwrap();
        assert_eq!(a_star.path.len(), dijkstra.path.len());
        assert!(a_star.expansions <= dijkstra.expansions);
        assert_valid_path(&map, map.start(), map.end(), &a_star.path);
    }

    #[test]
    fn test_a_star_zero_heuristic_matches_dijkstra() {
        let map = Map::from_file("map_file/test/spiral.map", None).unwrap();
        let zero = |_: Position, _: Position| 0;
        let request = SearchRequest::from_map(&map).with_heuristic(&zero);
        let a_star = a_star_search(&map, &request, &mut NoopObserver).unwrap();
        let dijkstra = dijkstra_search(&map, &request, &mut NoopObserver).unwrap();
        assert_eq!(a_star, dijkstra);
    }
}
