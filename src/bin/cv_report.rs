use std::fs;

use anyhow::{Context, Result, anyhow};

use slate_grader::cv;
use slate_grader::dataset;
use slate_grader::http_client::http_client;
use slate_grader::postgrest::{self, RestSink};
use slate_grader::retry::RetryPolicy;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let Some(league) = std::env::args().nth(1).map(|s| s.trim().to_ascii_lowercase()) else {
        eprintln!("Usage: cv_report <league>   (e.g. nfl, ncaaf, mlb)");
        return Err(anyhow!("missing league argument"));
    };
    if league.is_empty() || !league.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(anyhow!("league must be alphanumeric, got {league:?}"));
    }

    let sink = RestSink::from_env()
        .ok_or_else(|| anyhow!("SYNC_REST_URL and SYNC_REST_KEY must be set"))?;
    let client = http_client()?;
    let retry = RetryPolicy::from_env();

    let table = format!("{league}_teams");
    let rows = postgrest::rest_select(client, &sink, &table, "*", &retry)?;
    if rows.is_empty() {
        return Err(anyhow!("no rows returned from {table}"));
    }

    let ds = dataset::build_labeled_dataset(&rows)?;
    let report = cv::run_cv(&ds, cv::DEFAULT_SPLITS, cv::DEFAULT_SEED)?;

    fs::create_dir_all("model").context("create model dir")?;
    let out_path = format!("model/{league}_cv_metrics.json");
    let json = serde_json::to_string_pretty(&report).context("serialize cv report")?;
    fs::write(&out_path, json).with_context(|| format!("write {out_path}"))?;

    let summary = &report.summary;
    println!(
        "CV report for {league}: {} rows, {} features, {} splits",
        ds.len(),
        ds.feature_names.len(),
        summary.splits
    );
    println!(
        "accuracy {:.4}  roc_auc {:.4}  log_loss {:.4}  brier {:.4}",
        summary.accuracy_mean, summary.roc_auc_mean, summary.log_loss_mean, summary.brier_mean
    );
    println!("seasons: {:?}", summary.seasons);
    println!("Wrote fold details to {out_path}");
    Ok(())
}
