use super::{construct_path, notify_path, Reached, Trace};
use crate::common::{
    step_cost, CostLedger, OpenList, OpenNode, SearchReport, SearchRequest, StepObserver,
};
use crate::map::Map;

use std::collections::HashSet;
use tracing::{debug, instrument, trace};

#[instrument(skip_all, name = "dijkstra", fields(start = format!("{:?}", request.start), goal = format!("{:?}", request.goal)), level = "debug")]
pub fn dijkstra_search(
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
        key: 0,
        g_cost: 0,
    });

    while let Some(current) = open_list.pop_first() {
        // Stale duplicate of a node that is already final.
        if !closed_list.insert(current.position) {
            continue;
        }

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

        for neighbor in map.get_neighbors(current.position) {
            if map.is_wall(neighbor) || closed_list.contains(&neighbor) {
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
        }
    }

    debug!("cannot find solution");
    Ok(report)
}
