use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Parser, Subcommand};

use galcat::complete::Routes;
use galcat::error::ConfigError;
use galcat::schema::{Field, SourceTable, ALL_FIELDS};
use galcat::source::{SourceConfig, SourceKind, DEFAULT_PRIORITY};
use galcat::{collect, complete, merge, table};

#[derive(Parser)]
#[command(name = "galcat", about = "Galaxy attribute collector for HyperLeda and NED")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Network timeout per adapter call, seconds
    #[arg(long, global = true, default_value = "10")]
    timeout_secs: u64,

    /// WebDriver endpoint used by the dynamic NED page adapter
    #[arg(long, global = true, default_value = "http://localhost:9515")]
    webdriver_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect per-source tables for a name list, then merge by priority
    Collect {
        /// CSV name list with a Name column
        #[arg(long)]
        names: PathBuf,
        /// Directory for per-source and merged CSVs
        #[arg(long, default_value = "tables")]
        out_dir: PathBuf,
        /// Comma-separated sources, order = priority (default: leda-query,leda-page,ned-page,ned-query)
        #[arg(long, value_delimiter = ',')]
        sources: Vec<String>,
        /// Canonical columns to keep (default: all)
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
        /// Max names to process
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Merge already-collected tables, highest priority first
    Merge {
        /// Table paths in priority order
        tables: Vec<PathBuf>,
        #[arg(long, default_value = "tables/galaxy_infos_merged.csv")]
        out: PathBuf,
        /// Canonical columns to keep (default: all)
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
    },
    /// Fill missing fields of an existing table in place
    Complete {
        #[arg(long)]
        table: PathBuf,
        /// Columns to complete (default: all)
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
        /// Route override, field=source (repeatable)
        #[arg(long)]
        route: Vec<String>,
        /// Max rows to touch
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Compact console view of a table
    Show {
        table: PathBuf,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let cfg = SourceConfig {
        timeout: Duration::from_secs(cli.timeout_secs),
        webdriver_url: cli.webdriver_url.clone(),
    };

    let result = match cli.command {
        Commands::Collect {
            names,
            out_dir,
            sources,
            fields,
            limit,
        } => run_collect(&cfg, &names, &out_dir, &sources, &fields, limit).await,
        Commands::Merge { tables, out, fields } => run_merge(&tables, &out, &fields),
        Commands::Complete {
            table,
            fields,
            route,
            limit,
        } => run_complete(&cfg, &table, &fields, &route, limit).await,
        Commands::Show { table, limit } => run_show(&table, limit),
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn run_collect(
    cfg: &SourceConfig,
    names_path: &PathBuf,
    out_dir: &PathBuf,
    sources: &[String],
    fields: &[String],
    limit: Option<usize>,
) -> Result<()> {
    // Configuration errors surface before any per-object work.
    let kinds = parse_sources(sources)?;
    let fields = parse_fields(fields)?;

    let mut names = table::read_names(names_path)?;
    if let Some(n) = limit {
        names.truncate(n);
    }
    if names.is_empty() {
        println!("Name list is empty, nothing to do.");
        return Ok(());
    }

    let mut tables: Vec<SourceTable> = Vec::new();
    for kind in &kinds {
        let source = kind.build(cfg)?;
        println!("Collecting {} objects from {}...", names.len(), kind);
        let (table, report) = collect::collect(
            source.adapter.as_ref(),
            source.normalizer.as_ref(),
            &names,
        )
        .await;
        println!(
            "{}: {} ok, {} failed.",
            kind,
            report.ok,
            report.failures.len()
        );

        let path = out_dir.join(source_file_name(*kind));
        table::write_table(&path, &table, &fields)?;
        tables.push(table);
    }

    let merged = merge::reconcile(&tables, &fields)?;
    let merged_path = out_dir.join("galaxy_infos_merged.csv");
    table::write_table(&merged_path, &merged, &fields)?;
    println!(
        "Merged {} objects into {}.",
        merged.len(),
        merged_path.display()
    );
    Ok(())
}

fn run_merge(paths: &[PathBuf], out: &PathBuf, fields: &[String]) -> Result<()> {
    if paths.is_empty() {
        return Err(ConfigError::EmptyPriority.into());
    }
    let fields = parse_fields(fields)?;

    let mut tables = Vec::new();
    for path in paths {
        tables.push(table::read_table(path, &fields)?);
    }
    let merged = merge::reconcile(&tables, &fields)?;
    table::write_table(out, &merged, &fields)?;
    println!(
        "Merged {} tables, {} objects, into {}.",
        tables.len(),
        merged.len(),
        out.display()
    );
    Ok(())
}

async fn run_complete(
    cfg: &SourceConfig,
    path: &PathBuf,
    fields: &[String],
    route_specs: &[String],
    limit: Option<usize>,
) -> Result<()> {
    let fields = parse_fields(fields)?;
    let mut routes = Routes::defaults();
    routes.apply_overrides(route_specs)?;

    // The raw table keeps columns we know nothing about, so the rewrite
    // below gives them back unchanged.
    let mut raw = table::read_table_raw(path)?;
    let mut records = raw.records();

    // Build only the sources the routing for the tracked fields can hit.
    let mut sources = Vec::new();
    for kind in routes.kinds_for(&fields) {
        sources.push(kind.build(cfg)?);
    }

    let upto = limit.unwrap_or(records.len()).min(records.len());
    println!("Completing {} rows from {}...", upto, path.display());
    let report = complete::complete(&mut records[..upto], &fields, &routes, &sources).await;

    raw.apply(&records, &fields);
    raw.write(path)?;
    println!(
        "Filled {} fields ({} failures). Updated {}.",
        report.filled,
        report.failures.len(),
        path.display()
    );
    Ok(())
}

fn run_show(path: &PathBuf, limit: usize) -> Result<()> {
    let table = table::read_table(path, &ALL_FIELDS)?;
    if table.is_empty() {
        println!("No objects in {}.", path.display());
        return Ok(());
    }

    println!(
        "{:>3} | {:<16} | {:>9} | {:>8} | {:>8} | {:>7} | {:>7} | {:>6} | {:>8}",
        "#", "Name", "lon", "lat", "v", "logd25", "logr25", "pa", "mpc"
    );
    println!("{}", "-".repeat(92));

    for (i, r) in table.records.iter().take(limit).enumerate() {
        println!(
            "{:>3} | {:<16} | {:>9} | {:>8} | {:>8} | {:>7} | {:>7} | {:>6} | {:>8}",
            i + 1,
            truncate(&r.name, 16),
            cell(r.lon, 4),
            cell(r.lat, 4),
            cell(r.v, 1),
            cell(r.logd25, 2),
            cell(r.logr25, 2),
            cell(r.pa, 1),
            cell(r.mpc, 2),
        );
    }

    let complete_rows = table
        .records
        .iter()
        .filter(|r| r.missing(&ALL_FIELDS).is_empty())
        .count();
    println!(
        "\n{} objects | {} with all fields present",
        table.len(),
        complete_rows
    );
    Ok(())
}

fn parse_fields(specs: &[String]) -> Result<Vec<Field>, ConfigError> {
    if specs.is_empty() {
        return Ok(ALL_FIELDS.to_vec());
    }
    specs.iter().map(|s| s.parse()).collect()
}

fn parse_sources(specs: &[String]) -> Result<Vec<SourceKind>, ConfigError> {
    if specs.is_empty() {
        return Ok(DEFAULT_PRIORITY.to_vec());
    }
    let kinds: Vec<SourceKind> = specs
        .iter()
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse())
        .collect::<Result<_, _>>()?;
    if kinds.is_empty() {
        return Err(ConfigError::EmptyPriority);
    }
    Ok(kinds)
}

fn source_file_name(kind: SourceKind) -> String {
    format!("galaxy_infos_{}.csv", kind.label().replace('-', "_"))
}

fn cell(v: Option<f64>, decimals: usize) -> String {
    match v {
        Some(v) => format!("{:.*}", decimals, v),
        None => "-".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
