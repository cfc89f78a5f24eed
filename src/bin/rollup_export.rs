use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};

use slate_grader::export;
use slate_grader::store;

const DEFAULT_WINDOW_DAYS: i64 = 30;
const DEFAULT_OUT_FILE: &str = "slate_report.xlsx";

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let db_path = parse_db_path_arg()
        .or_else(store::default_db_path)
        .context("unable to resolve sqlite path")?;
    let window_days = parse_window_arg()
        .unwrap_or(DEFAULT_WINDOW_DAYS)
        .clamp(1, 365);
    let out_path = parse_out_arg().unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_FILE));
    let since = Utc::now() - Duration::days(window_days);

    let conn = store::open_db(&db_path)?;
    let outcomes = store::load_outcomes_since(&conn, since)?;
    let rollups = store::load_rollups_since(&conn, since.date_naive())?;

    let report = export::export_workbook(&out_path, &rollups, &outcomes)?;

    println!("Report written to {}", out_path.display());
    println!("Window: last {window_days} days");
    println!("Rollup rows: {}", report.rollups);
    println!("Evaluation rows: {}", report.outcomes);
    Ok(())
}

fn parse_db_path_arg() -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix("--db=") {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == "--db"
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(PathBuf::from(next));
        }
    }
    None
}

fn parse_window_arg() -> Option<i64> {
    for arg in std::env::args().skip(1) {
        if let Some(raw) = arg.strip_prefix("--window-days=") {
            if let Ok(days) = raw.trim().parse::<i64>() {
                return Some(days);
            }
        }
    }
    None
}

fn parse_out_arg() -> Option<PathBuf> {
    for arg in std::env::args().skip(1) {
        if let Some(raw) = arg.strip_prefix("--out=") {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
    }
    None
}
