//! etlgen: the etlgen CLI
//!
//! Generates Hive SQL and ETL steps from DWS table sheets.
//!
//! # Usage
//!
//! ```bash
//! # Print the Hive SQL of every table
//! etlgen tables.txt
//!
//! # Write one file per table
//! etlgen tables.txt --output out/
//!
//! # Show the ETL steps of the incremental load
//! etlgen pipeline tables.txt --load incr
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use etlgen::classify;
use etlgen::prelude::*;
use etlgen::steps::{parse_process, parse_process_strict};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "etlgen")]
#[command(author = "etlgen Contributors")]
#[command(version)]
#[command(about = "Hive SQL and ETL step generator for DWS table sheets", long_about = None)]
#[command(after_help = "EXAMPLES:
    etlgen tables.txt
    etlgen tables.txt --format json
    etlgen tables.txt --output generated/
    etlgen pipeline tables.txt --load incr
    etlgen steps job.txt --name T_DWS_SALES")]
struct Cli {
    /// Table sheet to generate Hive SQL from
    file: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "sql", global = true)]
    format: OutputFormat,

    /// Write one file per table into this directory instead of printing
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long, env = "ETLGEN_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Sql,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum LoadArg {
    Init,
    Incr,
    All,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the parsed tables and the query derived from each
    Explain {
        /// Table sheet
        file: PathBuf,
    },
    /// Print the ETL steps of every table
    Pipeline {
        /// Table sheet
        file: PathBuf,

        /// Load type to plan
        #[arg(short, long, value_enum, default_value = "all")]
        load: LoadArg,
    },
    /// Parse step documents and print them as JSON
    Steps {
        /// Step documents
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Process name for a single file, collection name for several
        #[arg(short, long)]
        name: Option<String>,

        /// Fail on blocks without a valid step header
        #[arg(long)]
        strict: bool,
    },
}

/// JSON shape of `etlgen pipeline --format json`.
#[derive(Serialize)]
struct TablePlan<'a> {
    table: &'a str,
    steps: Vec<PipelineStep>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "etlgen=debug" } else { "etlgen=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Some(Commands::Explain { file }) => explain(file, &load_config(cli)?),
        Some(Commands::Pipeline { file, load }) => {
            show_pipeline(file, *load, cli.format, &load_config(cli)?)
        }
        Some(Commands::Steps { files, name, strict }) => {
            show_steps(files, name.as_deref(), *strict)
        }
        None => match &cli.file {
            Some(file) => generate(file, cli, &load_config(cli)?),
            None => {
                println!("{}", "etlgen: Hive ETL script generator".cyan().bold());
                println!();
                println!("Usage: etlgen <FILE> [OPTIONS]");
                println!();
                println!("Try: etlgen --help");
                Ok(())
            }
        },
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    Config::load(cli.config.as_deref()).context("failed to load configuration")
}

fn read_tables(file: &Path) -> Result<Vec<TableRecord>> {
    let tables = etlgen::load_tables(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    tracing::info!("{} table(s) in {}", tables.len(), file.display());
    Ok(tables)
}

/// Build the query of every table, skipping tables without a source table.
fn build_queries<'a>(
    tables: &'a [TableRecord],
    config: &Config,
) -> Vec<(&'a TableRecord, QueryConfig)> {
    tables
        .iter()
        .filter_map(|table| match table.to_query_config(&config.conventions) {
            Some(query) => Some((table, query)),
            None => {
                tracing::warn!("skipping {}: no usable source table", table.name);
                None
            }
        })
        .collect()
}

fn generate(file: &Path, cli: &Cli, config: &Config) -> Result<()> {
    let tables = read_tables(file)?;
    let queries = build_queries(&tables, config);

    if let Some(dir) = &cli.output {
        return write_outputs(dir, &queries, cli.format);
    }

    match cli.format {
        OutputFormat::Json => {
            let configs: Vec<&QueryConfig> = queries.iter().map(|(_, q)| q).collect();
            println!("{}", serde_json::to_string_pretty(&configs)?);
        }
        OutputFormat::Sql => {
            for (table, query) in &queries {
                println!("{}", format!("-- {}", table.name).dimmed());
                println!("{}", query.to_sql());
            }
        }
    }
    Ok(())
}

fn write_outputs(dir: &Path, queries: &[(&TableRecord, QueryConfig)], format: OutputFormat) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    for (table, query) in queries {
        let (path, content) = match format {
            OutputFormat::Sql => (
                dir.join(format!("{}.sql", table.name)),
                format!("{}{}", file_header(table), query.to_sql()),
            ),
            OutputFormat::Json => (
                dir.join(format!("{}.json", table.name)),
                serde_json::to_string_pretty(query)?,
            ),
        };
        std::fs::write(&path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("{} Wrote {}", "✓".green(), path.display().to_string().cyan());
    }
    Ok(())
}

fn file_header(table: &TableRecord) -> String {
    let mut header = format!(
        "-- generated by etlgen at {}\n-- table: {}\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        table.name
    );
    if !table.remark.is_empty() {
        header.push_str(&format!("-- remark: {}\n", table.remark));
    }
    header
}

fn explain(file: &Path, config: &Config) -> Result<()> {
    let tables = read_tables(file)?;

    for table in &tables {
        println!("{} {}", "Table:".green().bold(), table.name.white().bold());
        if !table.source_sheet.is_empty() {
            println!("  {} {}", "Sheet:".dimmed(), table.source_sheet);
        }
        if !table.remark.is_empty() {
            println!("  {} {}", "Remark:".dimmed(), table.remark);
        }
        if !table.increment_field.is_empty() {
            println!("  {} {}", "Increment:".dimmed(), table.increment_field.yellow());
        }

        println!("  {}", "Fields:".dimmed());
        for field in &table.fields {
            let kind = if classify::is_aggregate_call(&field.logic) {
                "aggregate".magenta()
            } else if classify::is_constant(&field.logic) {
                "constant".blue()
            } else {
                "column".normal()
            };
            println!(
                "    • {} = {} [{}] {}",
                field.name.white(),
                field.logic.yellow(),
                kind,
                field.source_table.dimmed()
            );
        }

        match table.to_query_config(&config.conventions) {
            Some(query) => {
                println!("  {}", "Derived:".dimmed());
                println!(
                    "    {} {} {}",
                    "From:".dimmed(),
                    query.from_table.full_name().cyan(),
                    query.from_table.alias
                );
                for join in &query.joins {
                    println!("    {} {}", "Join:".dimmed(), join.to_sql().cyan());
                }
                if let Some(where_clause) = &query.where_clause {
                    println!("    {} {}", "Where:".dimmed(), where_clause);
                }
                if query.has_group_by() {
                    let columns: Vec<&str> =
                        query.group_by.iter().map(|g| g.expression.as_str()).collect();
                    println!("    {} {}", "Group by:".dimmed(), columns.join(", "));
                }
                println!();
                println!("{}", "Generated SQL:".green().bold());
                println!("{}", query.to_sql().white());
            }
            None => println!("  {}", "⚠ No usable source table, skipped".yellow()),
        }
        println!();
    }
    Ok(())
}

fn show_pipeline(file: &Path, load: LoadArg, format: OutputFormat, config: &Config) -> Result<()> {
    let tables = read_tables(file)?;
    let pipeline = Pipeline::new(config);

    let mut plans = Vec::new();
    for table in &tables {
        let planned = match load {
            LoadArg::Init => pipeline.plan(table, &LoadType::Initialization),
            LoadArg::Incr => pipeline.plan(table, &LoadType::Incremental),
            LoadArg::All => pipeline.plan_all(table),
        };
        match planned {
            Ok(steps) => plans.push(TablePlan {
                table: &table.name,
                steps,
            }),
            Err(EtlError::NoSourceTable { table }) => {
                tracing::warn!("skipping {}: no usable source table", table);
            }
            Err(e) => return Err(e.into()),
        }
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plans)?),
        OutputFormat::Sql => {
            for plan in plans {
                println!("{}", format!("-- {}", plan.table).dimmed());
                let process = Process {
                    name: plan.table.to_string(),
                    steps: plan.steps.into_iter().map(Step::from).collect(),
                };
                println!("{}", process.to_document());
                println!();
            }
        }
    }
    Ok(())
}

fn show_steps(files: &[PathBuf], name: Option<&str>, strict: bool) -> Result<()> {
    let mut processes = Vec::new();
    for file in files {
        let content = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        let process_name = match (name, files.len()) {
            (Some(name), 1) => name.to_string(),
            _ => file_stem(file),
        };
        let process = if strict {
            parse_process_strict(&content, process_name)
                .with_context(|| format!("invalid step document {}", file.display()))?
        } else {
            parse_process(&content, process_name)
        };
        tracing::info!("{} step(s) in {}", process.steps.len(), file.display());
        processes.push(process);
    }

    if let [process] = processes.as_slice() {
        println!("{}", serde_json::to_string_pretty(process)?);
    } else {
        let collection = ProcessCollection {
            name: name.unwrap_or("steps").to_string(),
            processes,
        };
        println!("{}", serde_json::to_string_pretty(&collection)?);
    }
    Ok(())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
