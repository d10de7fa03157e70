use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::env;
use std::path::Path;

use trip_journal::{
    import_expenses, load_expenses_csv, logging, AggregationEngine, Config, FilterSpec,
    FsMediaStore, PhotoFilterEngine, ReconciliationEngine, SqliteExecutor,
};

const USAGE: &str = "\
Usage:
  trip-journal init
  trip-journal import <trip_id> <expenses.csv>
  trip-journal report <summary|categories|locations|secondary|people-photos|memory-photos>
                      [--trip ID] [--location L] [--category C] [--from DATE --to DATE]
  trip-journal cleanup";

fn main() -> Result<()> {
    logging::init()?;
    let config = Config::load()?;
    let args: Vec<String> = env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        Some("init") => run_init(&config),
        Some("import") => run_import(&config, &args[1..]),
        Some("report") => run_report(&config, &args[1..]),
        Some("cleanup") => run_cleanup(&config),
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }
}

fn open_db(config: &Config) -> Result<SqliteExecutor> {
    let db = SqliteExecutor::open(&config.db_path)?;
    db.setup()?;
    Ok(db)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_init(config: &Config) -> Result<()> {
    open_db(config)?;
    println!("✓ Database initialized at {}", config.db_path.display());
    Ok(())
}

fn run_import(config: &Config, args: &[String]) -> Result<()> {
    let (trip_id, csv_path) = match args {
        [trip_id, csv_path] => (trip_id, csv_path),
        _ => bail!("import expects <trip_id> <expenses.csv>\n{}", USAGE),
    };
    let trip_id: i64 = trip_id
        .parse()
        .with_context(|| format!("Invalid trip id: {}", trip_id))?;

    let db = open_db(config)?;
    let records = load_expenses_csv(Path::new(csv_path))?;
    println!("📂 Loaded {} expenses from {}", records.len(), csv_path);

    let inserted = import_expenses(&db, trip_id, &records)?;
    println!("✓ Inserted: {} expenses", inserted);
    println!("✓ Skipped duplicates: {}", records.len() - inserted);
    Ok(())
}

/// `--trip 1 --location Paris ...` → FilterSpec
fn parse_filter(args: &[String]) -> Result<FilterSpec> {
    let mut pairs: Vec<(&str, &str)> = Vec::new();
    let mut iter = args.iter();

    while let Some(flag) = iter.next() {
        let key = match flag.as_str() {
            "--trip" => "trip_id",
            "--location" => "location",
            "--category" => "category",
            "--from" => "start_date",
            "--to" => "end_date",
            other => bail!("Unknown option: {}", other),
        };
        let value = iter
            .next()
            .with_context(|| format!("Missing value for {}", flag))?;
        pairs.push((key, value.as_str()));
    }

    Ok(FilterSpec::from_pairs(pairs))
}

fn run_report(config: &Config, args: &[String]) -> Result<()> {
    let kind = args.first().map(String::as_str).unwrap_or("");
    let filter = parse_filter(args.get(1..).unwrap_or(&[]))?;
    let db = open_db(config)?;
    let reports = AggregationEngine::new(&db);

    match kind {
        "summary" => print_json(&reports.expense_summary(&filter)?),
        "categories" => print_json(&reports.category_breakdown(&filter)?),
        "locations" => print_json(&reports.location_breakdown(&filter)?),
        "secondary" => print_json(&reports.secondary_summary(&filter)?),
        "people-photos" => print_json(&PhotoFilterEngine::new(&db).person_photos(&filter)?),
        "memory-photos" => print_json(&PhotoFilterEngine::new(&db).memory_photos(&filter)?),
        other => bail!("Unknown report: {:?}\n{}", other, USAGE),
    }
}

fn run_cleanup(config: &Config) -> Result<()> {
    let db = open_db(config)?;
    let store = FsMediaStore::new(&config.media_root);

    let report = ReconciliationEngine::with_extensions(&db, &store, config.image_extensions.clone())
        .reconcile()?;

    println!("🧹 {}", report.summary());
    print_json(&report)
}
