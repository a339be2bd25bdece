// Entry point and high-level CLI flow.
//
// - `partition` loads the sheet and writes the monthly fragments.
// - `serve` exposes the fragments and the aggregation API over HTTP.
// - `view` / `dashboard` fetch fragments and print KPI and ranking tables;
//   `dashboard` keeps asking for periods until the user quits.
mod cli;

use anyhow::{Context, Result};
use cli::{Args, Command, FetchFrom};
use prod_dashboard::aggregate::{price_coverage, view_or_empty};
use prod_dashboard::config::{Config, CONFIG_FILE};
use prod_dashboard::output;
use prod_dashboard::partition;
use prod_dashboard::periods::PeriodIndex;
use prod_dashboard::server;
use prod_dashboard::session::{DashboardSession, SelectOutcome};
use prod_dashboard::source::{DirSource, HttpSource, PartitionSource};
use prod_dashboard::util::{format_int, month_name};
use prod_dashboard::{DashboardView, PartitionError, PartitionKey};
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = Args::parse_args();

    if let Command::InitConfig = args.command {
        std::process::exit(match handle_init_config() {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                1
            }
        });
    }

    init_logging(&args);
    debug!("Arguments: {:?}", args);

    let code = match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            1
        }
    };
    std::process::exit(code);
}

/// RUST_LOG wins over -v/-q when set.
fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::from_level(args.log_level()).into()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);
    if path.exists() {
        anyhow::bail!("{} already exists. Remove it first or edit it manually.", CONFIG_FILE);
    }
    std::fs::write(path, Config::default_toml()).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;
    println!("Created {} with default settings.", CONFIG_FILE);
    Ok(())
}

async fn run(args: Args) -> Result<i32> {
    let config = Config::load(args.config.as_deref())?;

    match args.command {
        Command::Partition => Ok(handle_partition(&config)),
        Command::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            server::run_server(&host, port, config.data_dir(), config.static_dir(), config.aggregate_options()).await?;
            Ok(0)
        }
        Command::View { year, month, from, json } => {
            let key = PartitionKey::new(year, month);
            let view = match from {
                FetchFrom::Dir => fetch_view(&DirSource::new(config.data_dir()), &config, key).await,
                FetchFrom::Http => fetch_view(&HttpSource::new(config.dashboard.base_url.clone()), &config, key).await,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print!("{}", output::render_dashboard(&view));
            }
            Ok(if view.error.is_some() { 1 } else { 0 })
        }
        Command::Dashboard { from } => match from {
            FetchFrom::Dir => interactive(DirSource::new(config.data_dir()), &config).await,
            FetchFrom::Http => interactive(HttpSource::new(config.dashboard.base_url.clone()), &config).await,
        },
        Command::Check { year, month } => handle_check(&config, year.zip(month)).await,
        Command::InitConfig => Ok(0),
    }
}

/// Missing source and empty sheet are the only failures; skipped rows are
/// reported but do not fail the run.
fn handle_partition(config: &Config) -> i32 {
    let source = config.source_path();
    let out_dir = config.data_dir();
    println!("Reading source file: {}", source.display());

    match partition::run(&source, &out_dir, &config.aliases(), &config.read_options()) {
        Ok(report) => {
            println!(
                "Data loaded: {} rows ({} blank rows skipped).",
                format_int(report.rows_loaded),
                format_int(report.load.blank_rows)
            );
            println!("Using columns: year='{}', month='{}'", report.year_column, report.month_column);
            if report.skipped_rows > 0 {
                println!(
                    "Warning: {} rows ignored for missing year/month.",
                    format_int(report.skipped_rows)
                );
            }
            println!("Processing finished.");
            println!(
                "- {} data files written to: {}",
                format_int(report.write.files_written),
                report.write.out_dir.display()
            );
            0
        }
        Err(e @ (PartitionError::SourceMissing(_) | PartitionError::EmptyDataset(_))) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            1
        }
        Err(e) => {
            error!("fatal error while processing data: {}", e);
            eprintln!("Fatal error while processing data: {}", e);
            1
        }
    }
}

/// One fetch + aggregation; failures become the empty view.
async fn fetch_view<S: PartitionSource>(source: &S, config: &Config, key: PartitionKey) -> DashboardView {
    let fetched = source.fetch_partition(key).await;
    view_or_empty(key, fetched, &config.aggregate_options())
}

#[derive(Debug, PartialEq, Eq)]
enum MenuChoice {
    Period(i32, u32),
    Year(i32),
    Month(u32),
    List,
    Quit,
    Invalid,
}

fn parse_choice(line: &str) -> MenuChoice {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        ["q"] | ["quit"] => MenuChoice::Quit,
        ["l"] | ["list"] => MenuChoice::List,
        ["y", y] => y.parse().map(MenuChoice::Year).unwrap_or(MenuChoice::Invalid),
        ["m", m] => m.parse().map(MenuChoice::Month).unwrap_or(MenuChoice::Invalid),
        [y, m] => match (y.parse(), m.parse()) {
            (Ok(y), Ok(m)) => MenuChoice::Period(y, m),
            _ => MenuChoice::Invalid,
        },
        _ => MenuChoice::Invalid,
    }
}

/// Period a selection points at, if the index lists it.
fn resolve_choice(choice: &MenuChoice, current: Option<PartitionKey>, periods: &PeriodIndex) -> Option<PartitionKey> {
    let key = match *choice {
        MenuChoice::Period(y, m) => PartitionKey::new(y, m),
        MenuChoice::Year(y) => periods.switch_year(y, current.map(|k| k.month))?,
        MenuChoice::Month(m) => PartitionKey::new(current?.year, m),
        MenuChoice::List | MenuChoice::Quit | MenuChoice::Invalid => return None,
    };
    periods.contains(key).then_some(key)
}

fn print_periods(periods: &PeriodIndex) {
    println!("Available periods:");
    for year in periods.years() {
        let months: Vec<String> = periods
            .months(year)
            .into_iter()
            .map(|m| format!("{} ({})", m, month_name(m)))
            .collect();
        println!("  {}: {}", year, months.join(", "));
    }
    println!();
}

fn prompt() {
    print!("Select period (<year> <month> | y <year> | m <month> | l | q): ");
    let _ = std::io::stdout().flush();
}

async fn interactive<S: PartitionSource>(source: S, config: &Config) -> Result<i32> {
    let session = DashboardSession::open(source, config.aggregate_options())
        .await
        .context("Failed to load initial data. Check that the partition step has been run")?;

    if session.periods().is_empty() {
        println!("No periods available.");
        return Ok(0);
    }
    print_periods(session.periods());

    let mut current = session.periods().default_selection();
    if let Some(SelectOutcome::Applied(view)) = session.select_default().await {
        print!("{}", output::render_dashboard(&view));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let choice = parse_choice(&line);
        match choice {
            MenuChoice::Quit => break,
            MenuChoice::List => {
                print_periods(session.periods());
                continue;
            }
            MenuChoice::Invalid => {
                println!("Invalid choice.");
                continue;
            }
            _ => {}
        }
        let Some(key) = resolve_choice(&choice, current, session.periods()) else {
            println!("No data for that selection. Use 'l' to list the available periods.");
            continue;
        };
        current = Some(key);
        if let SelectOutcome::Applied(view) = session.select(key).await {
            print!("{}", output::render_dashboard(&view));
        }
    }
    println!("Exiting the program.");
    Ok(0)
}

async fn handle_check(config: &Config, period: Option<(i32, u32)>) -> Result<i32> {
    let source = DirSource::new(config.data_dir());
    let key = match period {
        Some((y, m)) => PartitionKey::new(y, m),
        None => {
            let entries = source.fetch_metadata().await.context("Failed to read metadata.json")?;
            match PeriodIndex::new(entries).default_selection() {
                Some(key) => key,
                None => {
                    println!("No periods available.");
                    return Ok(1);
                }
            }
        }
    };
    info!(partition = %key, "checking unit prices");

    let records = match source.fetch_partition(key).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("File {} not readable: {}", key.file_name(), e);
            return Ok(1);
        }
    };
    let coverage = price_coverage(&records, &config.aliases(), 5);
    print!("{}", output::render_price_coverage(&key.file_name(), &coverage));
    Ok(0)
}
