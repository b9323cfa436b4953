/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use agmjoin::{JoinConfig, JoinError, QueryEngine, Result, Strategy};
use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info, warn};
use relstore::{Dataset, StatsCatalog, StorageError};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "agmjoin-cli",
    version = "0.1.1",
    author = "Volodymyr Kadzhaia <vkadzhaia@gmail.com>",
    author = "Pieter Bonte <pieter.bonte@kuleuven.be>",
    about = "Plan and run worst-case optimal joins",
    long_about = "agmjoin CLI - loads column-major relations, plans the join with an AGM-bound guided strategy and reports the result cardinality with per-phase timings."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a dataset query, plan it and execute the join
    Run {
        #[arg(long, help = "Directory holding the datasets", value_name = "DIR")]
        data: PathBuf,

        #[arg(long, help = "Dataset name under the data directory", value_name = "NAME")]
        dataset: String,

        #[arg(short, long, help = "Query file under the dataset's sql directory", value_name = "FILE")]
        query: String,

        #[arg(short, long, help = "Plan search strategy (top-down, dp, beam, hub)")]
        strategy: Option<Strategy>,

        #[arg(long, help = "LP solver used for AGM bounds")]
        solver: Option<String>,

        #[arg(long, help = "Maximum rows of any intermediate table")]
        row_limit: Option<usize>,

        #[arg(short, long, help = "JSON configuration file", value_name = "FILE")]
        config: Option<PathBuf>,

        #[arg(long, value_enum, help = "Print the chosen plan")]
        explain: Option<Explain>,

        #[arg(long, help = "Print the first N result tuples", value_name = "N")]
        print: Option<usize>,

        #[arg(long, help = "Disable the rayon thread pool")]
        sequential: bool,
    },
    /// Plan statistics catalogs without loading data
    PlanBench {
        #[arg(short, long, num_args = 1.., required = true, help = "Statistics catalogs", value_name = "FILE")]
        input: Vec<PathBuf>,

        #[arg(short, long, help = "Plan search strategy (top-down, dp, beam, hub)")]
        strategy: Option<Strategy>,

        #[arg(long, help = "LP solver used for AGM bounds")]
        solver: Option<String>,

        #[arg(short, long, help = "File the timings are appended to", value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Explain {
    Text,
    Json,
}

fn load_config(
    file: Option<&Path>,
    strategy: Option<Strategy>,
    solver: Option<String>,
) -> Result<JoinConfig> {
    let mut config = match file {
        Some(path) => JoinConfig::from_json_file(path)?,
        None => JoinConfig::default(),
    };
    if let Some(strategy) = strategy {
        config.strategy = strategy;
    }
    if let Some(solver) = solver {
        config.solver = solver;
    }
    Ok(config)
}

#[allow(clippy::too_many_arguments)]
fn run(
    data: &Path,
    dataset: &str,
    query: &str,
    mut config: JoinConfig,
    row_limit: Option<usize>,
    explain: Option<Explain>,
    print: Option<usize>,
    sequential: bool,
) -> Result<()> {
    if let Some(row_limit) = row_limit {
        config.row_limit = row_limit;
    }
    if sequential {
        config.parallel = false;
    }
    let engine = QueryEngine::new(config)?;

    let dataset = Dataset::open(data, dataset);
    let spec = dataset.query(query)?;
    let mut relations = dataset.load_relations(&spec)?;
    info!(
        "Loaded {} relations over {} attributes from {}",
        relations.len(),
        spec.attributes.len(),
        dataset.root().display()
    );

    let report = engine.run(&mut relations, &spec.attributes)?;

    match explain {
        Some(Explain::Text) => println!("{}", report.plan),
        Some(Explain::Json) => {
            let json = serde_json::to_string_pretty(&report.plan)
                .map_err(|e| JoinError::illegal(format!("cannot serialize plan: {}", e)))?;
            println!("{}", json);
        }
        None => {}
    }

    println!("{}", report.variable_order);
    println!("opt time: {:.6}", report.optimize_time.as_secs_f64());
    println!("sort time: {:.6}", report.sort_time.as_secs_f64());
    println!("join time: {:.6}", report.join_time.as_secs_f64());
    println!("total time: {:.6}", report.total_time.as_secs_f64());
    println!("attr num: {}", report.attribute_count());
    println!("{}", report.cardinality);

    if let Some(limit) = print {
        for tuple in report.output.materialize(&relations, &spec.attributes, Some(limit))? {
            let line: Vec<String> = tuple.iter().map(i32::to_string).collect();
            println!("{}", line.join(" "));
        }
    }
    Ok(())
}

/// Seconds recorded for a catalog the strategy refuses to plan.
const UNPLANNED_SECONDS: f64 = 1000.0;

/// `<relnum> <attrnum> <seconds>` for one catalog.
fn bench_line(engine: &QueryEngine, catalog: &StatsCatalog, source: &Path) -> Result<String> {
    let seconds = match engine.plan_only(&catalog.relations, &catalog.attributes) {
        Ok(summary) => {
            info!("{}: order [{}]", source.display(), summary.variable_order);
            summary.optimize_time.as_secs_f64()
        }
        Err(e @ JoinError::ResourceExceeded { .. }) => {
            warn!("{}: {}", source.display(), e);
            UNPLANNED_SECONDS
        }
        Err(e) => return Err(e),
    };
    Ok(format!(
        "{} {} {:.6}",
        catalog.relations.len(),
        catalog.attributes.len(),
        seconds
    ))
}

fn plan_bench(inputs: &[PathBuf], config: JoinConfig, output: Option<&Path>) -> Result<()> {
    let engine = QueryEngine::new(config)?;
    let mut lines = Vec::with_capacity(inputs.len());
    for input in inputs {
        let catalog = StatsCatalog::load(input)?;
        lines.push(bench_line(&engine, &catalog, input)?);
    }

    match output {
        Some(path) => {
            let io_error = |source| StorageError::Io {
                path: path.to_path_buf(),
                source,
            };
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(io_error)?;
            for line in &lines {
                writeln!(file, "{}", line).map_err(io_error)?;
            }
        }
        None => {
            for line in &lines {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run {
            data,
            dataset,
            query,
            strategy,
            solver,
            row_limit,
            config,
            explain,
            print,
            sequential,
        } => load_config(config.as_deref(), strategy, solver).and_then(|config| {
            run(&data, &dataset, &query, config, row_limit, explain, print, sequential)
        }),
        Command::PlanBench {
            input,
            strategy,
            solver,
            output,
        } => load_config(None, strategy, solver)
            .and_then(|config| plan_bench(&input, config, output.as_deref())),
    };

    if let Err(e) = result {
        error!("{}", e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relstore::RelationStats;

    /// A ring of `n` binary relations over `x0 .. x{n-1}`.
    fn ring(n: usize) -> StatsCatalog {
        let attributes: Vec<String> = (0..n).map(|i| format!("x{}", i)).collect();
        let relations = (0..n)
            .map(|i| {
                RelationStats::new(
                    format!("R{}", i),
                    100,
                    vec![attributes[i].clone(), attributes[(i + 1) % n].clone()],
                )
            })
            .collect();
        StatsCatalog {
            attributes,
            relations,
        }
    }

    #[test]
    fn test_bench_line_reports_sizes() {
        let engine = QueryEngine::new(JoinConfig::with_strategy(Strategy::Dp)).unwrap();
        let line = bench_line(&engine, &ring(4), Path::new("ring4")).unwrap();
        let fields: Vec<&str> = line.split(' ').collect();
        assert_eq!(fields.len(), 3);
        assert_eq!(&fields[..2], &["4", "4"]);
        assert!(fields[2].parse::<f64>().unwrap() < UNPLANNED_SECONDS);
    }

    #[test]
    fn test_too_wide_catalog_gets_sentinel() {
        let config = JoinConfig {
            dp_max_attributes: 3,
            ..JoinConfig::with_strategy(Strategy::Dp)
        };
        let engine = QueryEngine::new(config).unwrap();
        let line = bench_line(&engine, &ring(4), Path::new("ring4")).unwrap();
        assert_eq!(line, "4 4 1000.000000");
    }

    #[test]
    fn test_illegal_catalog_still_fails() {
        let engine = QueryEngine::new(JoinConfig::default()).unwrap();
        let catalog = StatsCatalog {
            attributes: vec!["missing".to_string()],
            relations: vec![RelationStats::new("R", 3, vec!["a"])],
        };
        assert!(matches!(
            bench_line(&engine, &catalog, Path::new("bad")),
            Err(JoinError::IllegalQuery(_))
        ));
    }
}
