use anyhow::{anyhow, bail};
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::algorithm::Strategy;
use crate::common::Position;

#[derive(Parser, Debug, Default)]
#[command(
    name = "grid_replan",
    about = "Dijkstra, A*, D* and D* Lite over an editable 4-connected grid.",
    version = "0.1"
)]
pub struct Cli {
    #[arg(long, help = "Path to a YAML config file")]
    pub config: Option<String>,

    #[arg(long, help = "Path to the map file; a random grid is used when absent")]
    pub map_path: Option<String>,

    #[arg(long, help = "Path to a YAML replanning scenario")]
    pub scenario_path: Option<String>,

    #[arg(long, help = "Append run statistics as JSON lines to this file")]
    pub output_path: Option<String>,

    #[arg(long, value_enum, help = "Search strategy to use")]
    pub strategy: Option<Strategy>,

    #[arg(long, help = "Run every strategy and report the best", default_value_t = false)]
    pub compare: bool,

    #[arg(long, help = "Rows of the random grid")]
    pub rows: Option<usize>,

    #[arg(long, help = "Columns of the random grid")]
    pub cols: Option<usize>,

    #[arg(long, help = "Probability that a random grid cell is a wall")]
    pub wall_density: Option<f64>,

    #[arg(long, help = "Seed for the random number generator")]
    pub seed: Option<u64>,

    #[arg(long, help = "Start cell as row,col", value_delimiter = ',')]
    pub start: Vec<usize>,

    #[arg(long, help = "Goal cell as row,col", value_delimiter = ',')]
    pub goal: Vec<usize>,

    #[arg(long, help = "Abort a search after this many expansions")]
    pub max_expansions: Option<usize>,

    #[arg(long, help = "Print the grid with visited and path cells", default_value_t = false)]
    pub print_grid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub map_path: Option<String>,
    pub scenario_path: Option<String>,
    pub output_path: Option<String>,
    pub strategy: Strategy,
    pub compare: bool,
    pub rows: usize,
    pub cols: usize,
    pub wall_density: f64,
    pub seed: u64,
    pub start: Option<Position>,
    pub goal: Option<Position>,
    pub max_expansions: Option<usize>,
    pub print_grid: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            map_path: None,
            scenario_path: None,
            output_path: None,
            strategy: Strategy::AStar,
            compare: false,
            rows: 20,
            cols: 40,
            wall_density: 0.25,
            seed: 0,
            start: None,
            goal: None,
            max_expansions: None,
            print_grid: false,
        }
    }
}

impl Config {
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn override_from_command_line(mut self, cli: &Cli) -> anyhow::Result<Self> {
        if let Some(map_path) = &cli.map_path {
            self.map_path = Some(map_path.clone());
        }
        if let Some(scenario_path) = &cli.scenario_path {
            self.scenario_path = Some(scenario_path.clone());
        }
        if let Some(output_path) = &cli.output_path {
            self.output_path = Some(output_path.clone());
        }
        if let Some(strategy) = cli.strategy {
            self.strategy = strategy;
        }
        self.compare |= cli.compare;
        self.print_grid |= cli.print_grid;
        if let Some(rows) = cli.rows {
            self.rows = rows;
        }
        if let Some(cols) = cli.cols {
            self.cols = cols;
        }
        if let Some(wall_density) = cli.wall_density {
            self.wall_density = wall_density;
        }
        if let Some(seed) = cli.seed {
            self.seed = seed;
        }
        if let Some(start) = parse_position("start", &cli.start)? {
            self.start = Some(start);
        }
        if let Some(goal) = parse_position("goal", &cli.goal)? {
            self.goal = Some(goal);
        }
        if cli.max_expansions.is_some() {
            self.max_expansions = cli.max_expansions;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.map_path.is_none() && self.rows * self.cols < 2 {
            bail!(
                "a {}x{} grid cannot hold distinct start and goal cells",
                self.rows,
                self.cols
            );
        }

        if !(0.0..=1.0).contains(&self.wall_density) {
            return Err(anyhow!(
                "Wall density must be within [0, 1], got {}",
                self.wall_density
            ));
        }

        if self.max_expansions == Some(0) {
            bail!("max expansions must be greater than 0");
        }

        if let (Some(start), Some(goal)) = (self.start, self.goal) {
            if start == goal {
                bail!("start and goal are both {start:?}");
            }
        }

        Ok(())
    }

    /// Both endpoints when the config pins them, otherwise `None`.
    pub fn endpoints(&self) -> anyhow::Result<Option<(Position, Position)>> {
        match (self.start, self.goal) {
            (Some(start), Some(goal)) => Ok(Some((start, goal))),
            (None, None) => Ok(None),
            _ => bail!("start and goal must be given together"),
        }
    }
}

fn parse_position(name: &str, values: &[usize]) -> anyhow::Result<Option<Position>> {
    match values {
        [] => Ok(None),
        [row, col] => Ok(Some((*row, *col))),
        _ => bail!("{name} expects `row,col`, got {values:?}"),
    }
}
