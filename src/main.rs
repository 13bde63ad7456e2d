use grid_replan::config::{Cli, Config};
use grid_replan::map::Map;
use grid_replan::scenario::Scenario;
use grid_replan::stat::{best_choice, Stats};
use grid_replan::{Strategy, TracingObserver};

use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let config = if let Some(config_file) = cli.config.as_ref() {
        let config_str = std::fs::read_to_string(config_file)
            .with_context(|| format!("failed to read config file {config_file}"))?;
        Config::from_yaml_str(&config_str)
            .with_context(|| format!("error with config file: {config_file}"))?
    } else {
        info!("No config file specified, using default config");
        Config::default()
    }
    .override_from_command_line(&cli)?;

    let scenario = match config.scenario_path.as_deref() {
        Some(path) => Scenario::load_from_file(path)?,
        None => Scenario::default(),
    };
    let mut map = build_map(&config, &scenario)?;
    let strategy = scenario.strategy.unwrap_or(config.strategy);
    let mut observer = TracingObserver;

    let mut stats = Vec::new();
    if config.compare {
        for strategy in Strategy::ALL {
            let mut trial = map.clone();
            stats.extend(scenario.run(&mut trial, strategy, config.max_expansions, &mut observer)?);
        }
        match best_choice(&stats) {
            Some(best) => info!(
                "Optimal choice: {} ({} expansions)",
                best.strategy, best.expand_nodes
            ),
            None => warn!("no strategy found a path"),
        }
    } else {
        stats = scenario.run(&mut map, strategy, config.max_expansions, &mut observer)?;
        if config.print_grid {
            println!("{map}");
        }
    }

    if let Some(output_path) = config.output_path.as_deref() {
        Stats::append_to_file(output_path, &stats)?;
        info!("wrote {} records to {output_path}", stats.len());
    }

    Ok(())
}

/// Map from the scenario, else from the config, else a random grid.
fn build_map(config: &Config, scenario: &Scenario) -> anyhow::Result<Map> {
    let endpoints = match (scenario.start, scenario.goal) {
        (Some(start), Some(goal)) => Some((start, goal)),
        _ => config.endpoints()?,
    };

    if let Some(map_path) = scenario.map.as_deref().or(config.map_path.as_deref()) {
        return Map::from_file(map_path, endpoints);
    }

    let mut map = Map::new(config.rows, config.cols)?;
    if let Some((start, goal)) = endpoints {
        map.set_endpoints(start, goal)
            .context("endpoints do not fit the random grid")?;
    }
    let mut rng = StdRng::seed_from_u64(config.seed);
    let walls = map.scatter_walls(config.wall_density, &mut rng)?;
    info!(
        "Generated {}x{} grid with {walls} walls (seed {})",
        config.rows, config.cols, config.seed
    );
    Ok(map)
}
