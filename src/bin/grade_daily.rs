use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use serde_json::Value;

use slate_grader::grading;
use slate_grader::http_client::http_client;
use slate_grader::model::{DailyRollup, EvaluatedOutcome, GameResult};
use slate_grader::postgrest::{self, RestSink};
use slate_grader::retry::RetryPolicy;
use slate_grader::rollup;
use slate_grader::store;

const DEFAULT_WINDOW_DAYS: i64 = 30;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let db_path = parse_db_path_arg()
        .or_else(store::default_db_path)
        .context("unable to resolve sqlite path")?;
    let window_days = parse_window_arg()
        .or_else(window_from_env)
        .unwrap_or(DEFAULT_WINDOW_DAYS)
        .clamp(1, 365);
    let since = Utc::now() - Duration::days(window_days);

    let mut conn = store::open_db(&db_path)?;

    let results = store::load_results_since(&conn, since)?;
    if results.is_empty() {
        println!("No recent game results; nothing to evaluate.");
        return Ok(());
    }
    let game_ids: Vec<String> = results.iter().map(|r| r.game_id.clone()).collect();
    let by_id: HashMap<String, GameResult> = results
        .into_iter()
        .map(|r| (r.game_id.clone(), r))
        .collect();

    let preds = store::load_predictions_for_games(&conn, &game_ids)?;
    if preds.is_empty() {
        println!("No predictions matching recent results; nothing to evaluate.");
        return Ok(());
    }

    let (outcomes, summary) = grading::evaluate_predictions(&preds, &by_id);
    if outcomes.is_empty() {
        println!("No gradeable picks were found.");
        return Ok(());
    }
    store::upsert_outcomes(&mut conn, &outcomes)?;

    // Rollups are recomputed over the whole window, not just this run's
    // outcomes, so re-grading stays idempotent.
    let windowed = store::load_outcomes_since(&conn, since)?;
    let rollups = rollup::daily_rollups(&windowed);
    store::upsert_rollups(&mut conn, &rollups)?;

    let mirrored = mirror_to_remote(&outcomes, &rollups)?;

    println!("Grading complete");
    println!("DB: {}", db_path.display());
    println!("Window: last {window_days} days");
    println!("Predictions graded: {}", summary.predictions);
    println!("Market outcomes evaluated: {}", summary.evaluated);
    println!(
        "Ungradeable (excluded, not losses): {} ({} unparseable, {} missing score, {} missing line); {} markets had no pick",
        summary.skipped_total(),
        summary.skipped_unparseable,
        summary.skipped_missing_score,
        summary.skipped_missing_line,
        summary.skipped_missing_pick
    );
    println!("Mean composite grade: {:.2}", summary.mean_composite_grade());
    println!("Daily rollup rows upserted: {}", rollups.len());
    if let Some((eval_rows, rollup_rows)) = mirrored {
        println!("Remote mirror: {eval_rows} eval rows, {rollup_rows} rollup rows");
    }

    println!("Most recent rollups:");
    for r in rollups.iter().rev().take(9) {
        println!(
            "  {} {} {}: {}-{}-{} hit {:.4}",
            r.stat_date, r.league, r.market, r.wins, r.losses, r.pushes, r.hit_rate
        );
    }
    Ok(())
}

/// Mirror the graded rows to the hosted datastore when it is configured.
/// Both upserts are keyed on the natural composite key, so reruns overwrite
/// rather than duplicate.
fn mirror_to_remote(
    outcomes: &[EvaluatedOutcome],
    rollups: &[DailyRollup],
) -> Result<Option<(usize, usize)>> {
    let Some(sink) = RestSink::from_env() else {
        return Ok(None);
    };
    let client = http_client()?;
    let retry = RetryPolicy::from_env();

    let eval_rows: Vec<Value> = outcomes.iter().map(EvaluatedOutcome::to_rest_row).collect();
    let eval_count = postgrest::rest_upsert(
        client,
        &sink,
        "model_eval",
        "league,game_id,market",
        &eval_rows,
        &retry,
    )?;

    let rollup_rows: Vec<Value> = rollups.iter().map(DailyRollup::to_rest_row).collect();
    let rollup_count = postgrest::rest_upsert(
        client,
        &sink,
        "model_metrics_daily",
        "stat_date,league,market",
        &rollup_rows,
        &retry,
    )?;

    Ok(Some((eval_count, rollup_count)))
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

fn window_from_env() -> Option<i64> {
    std::env::var("GRADE_WINDOW_DAYS")
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
}
