use std::fs;
use std::time::Instant;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::algorithm::{DStar, Strategy};
use crate::common::{Position, SearchReport, SearchRequest, StepObserver};
use crate::map::Map;
use crate::stat::Stats;

/// Scripted wall edits. The scenario plans once, then after each batch of
/// toggles replans: D* repairs its previous plan, every other strategy
/// searches again from scratch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Scenario {
    pub map: Option<String>,
    pub start: Option<Position>,
    pub goal: Option<Position>,
    pub strategy: Option<Strategy>,
    pub edits: Vec<Vec<Position>>,
}

enum Session {
    Incremental(DStar),
    Fresh(Strategy),
}

impl Scenario {
    pub fn load_from_file(path: &str) -> anyhow::Result<Self> {
        let yaml = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario file {path}"))?;
        Self::from_yaml_str(&yaml).with_context(|| format!("error with scenario file: {path}"))
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let scenario: Scenario = serde_yaml::from_str(yaml)?;
        Ok(scenario)
    }

    /// Runs the initial plan and one replan per edit batch, leaving the last
    /// result marked on `map`.
    pub fn run(
        &self,
        map: &mut Map,
        strategy: Strategy,
        max_expansions: Option<usize>,
        observer: &mut dyn StepObserver,
    ) -> anyhow::Result<Vec<Stats>> {
        let request = SearchRequest::from_map(map).with_max_expansions(max_expansions);
        let mut session = if strategy.is_incremental() {
            Session::Incremental(DStar::new(map, &request)?)
        } else {
            Session::Fresh(strategy)
        };

        let mut stats = Vec::with_capacity(self.edits.len() + 1);
        map.clear_path();
        let report = time_round(strategy, 0, &mut stats, || match &mut session {
            Session::Incremental(planner) => planner.plan(map, observer),
            Session::Fresh(strategy) => strategy.search(map, &request, observer),
        })?;
        map.mark(&report);

        for (index, batch) in self.edits.iter().enumerate() {
            map.clear_path();
            for &cell in batch {
                let is_wall = map
                    .toggle_wall(cell)
                    .with_context(|| format!("edit batch {index}"))?;
                debug!("toggled {cell:?}, wall: {is_wall}");
            }

            let report = time_round(strategy, index + 1, &mut stats, || match &mut session {
                Session::Incremental(planner) => planner.propagate_changes(map, observer),
                Session::Fresh(strategy) => strategy.search(map, &request, observer),
            })?;
            map.mark(&report);
        }

        info!("scenario finished after {} rounds", stats.len());
        Ok(stats)
    }
}

fn time_round<F>(
    strategy: Strategy,
    round: usize,
    stats: &mut Vec<Stats>,
    search: F,
) -> anyhow::Result<SearchReport>
where
    F: FnOnce() -> anyhow::Result<SearchReport>,
{
    let started = Instant::now();
    let report = search()?;
    let stat = Stats::from_report(strategy, round, &report, started.elapsed());
    stat.print();
    stats.push(stat);
    Ok(report)
}
