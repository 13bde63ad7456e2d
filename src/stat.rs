use std::fs::OpenOptions;
use std::io::Write;
use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use tracing::info;

use crate::algorithm::Strategy;
use crate::common::SearchReport;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub strategy: String,
    /// 0 for the initial plan, then one per replan.
    pub round: usize,
    pub found: bool,
    pub path_length: usize,
    pub expand_nodes: usize,
    pub visited_nodes: usize,
    pub time_us: usize,
}

impl Stats {
    pub fn from_report(
        strategy: Strategy,
        round: usize,
        report: &SearchReport,
        elapsed: Duration,
    ) -> Self {
        Stats {
            strategy: strategy.to_string(),
            round,
            found: report.found(),
            path_length: report.path.len(),
            expand_nodes: report.expansions,
            visited_nodes: report.visited.len(),
            time_us: elapsed.as_micros() as usize,
        }
    }

    pub fn print(&self) {
        info!(
            "{} round {} found {:?} path length {:?} Time(microseconds) {:?} Expand nodes number: {:?} Visited nodes number {:?}",
            self.strategy,
            self.round,
            self.found,
            self.path_length,
            self.time_us,
            self.expand_nodes,
            self.visited_nodes
        );
    }

    /// Appends one JSON object per line.
    pub fn append_to_file(path: &str, stats: &[Stats]) -> anyhow::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open output file {path}"))?;
        for stat in stats {
            let line = serde_json::to_string(stat)?;
            writeln!(file, "{line}")?;
        }
        Ok(())
    }
}

/// Among the runs that found a shortest path, the one with fewest expansions.
pub fn best_choice(stats: &[Stats]) -> Option<&Stats> {
    let shortest = stats
        .iter()
        .filter(|stat| stat.found)
        .map(|stat| stat.path_length)
        .min()?;
    stats
        .iter()
        .filter(|stat| stat.found && stat.path_length == shortest)
        .min_by_key(|stat| (stat.expand_nodes, stat.time_us))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(strategy: &str, found: bool, path_length: usize, expand_nodes: usize) -> Stats {
        Stats {
            strategy: strategy.to_string(),
            found,
            path_length,
            expand_nodes,
            ..Stats::default()
        }
    }

    #[test]
    fn test_from_report() {
        let report = SearchReport {
            path: vec![(0, 1), (1, 1)],
            visited: vec![(0, 0), (0, 1), (1, 1)],
            expansions: 4,
        };
        let stats = Stats::from_report(Strategy::AStar, 2, &report, Duration::from_micros(15));
        assert_eq!(stats.strategy, "A*");
        assert_eq!(stats.round, 2);
        assert!(stats.found);
        assert_eq!(stats.path_length, 2);
        assert_eq!(stats.expand_nodes, 4);
        assert_eq!(stats.visited_nodes, 3);
        assert_eq!(stats.time_us, 15);
    }

    #[test]
    fn test_best_choice() {
        let stats = vec![
            stat("Dijkstra", true, 8, 25),
            stat("A*", true, 8, 9),
            stat("D*", false, 0, 3),
        ];
        assert_eq!(best_choice(&stats).unwrap().strategy, "A*");
        assert!(best_choice(&[stat("D*", false, 0, 3)]).is_none());
    }

    #[test]
    fn test_serialize_line() {
        let line = serde_json::to_string(&stat("D* Lite", true, 4, 7)).unwrap();
        assert!(line.contains("\"strategy\":\"D* Lite\""));
        assert!(line.contains("\"path_length\":4"));
    }
}
