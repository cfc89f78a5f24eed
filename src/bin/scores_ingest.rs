use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use slate_grader::http_client::http_client;
use slate_grader::model::GameResult;
use slate_grader::retry::RetryPolicy;
use slate_grader::scores_fetch::{self, ScoresConfig, TeamDirectory};
use slate_grader::store;

const DEFAULT_LEAGUES: &[&str] = &["mlb", "nfl", "nba", "nhl", "ncaaf", "ncaab", "wnba"];

struct LeagueSummary {
    league: String,
    fetched: usize,
    finals: usize,
    upserted: usize,
    error: Option<String>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let leagues = parse_leagues_arg().unwrap_or_else(leagues_from_env);
    if leagues.is_empty() {
        return Err(anyhow!("no leagues resolved for scores ingest"));
    }

    let db_path = parse_db_path_arg()
        .or_else(store::default_db_path)
        .context("unable to resolve sqlite path")?;

    let mut cfg = ScoresConfig::from_env();
    if let Some(days) = parse_days_from_arg() {
        cfg.days_from = days.clamp(1, 3);
    }
    if !cfg.enabled {
        println!("Scores ingest disabled (SCORES_ENABLED=0).");
        return Ok(());
    }

    let retry = RetryPolicy::from_env();
    let teams = load_team_directory()?;
    let client = http_client()?;
    let mut conn = store::open_db(&db_path)?;

    let mut summaries = Vec::new();
    for league in &leagues {
        match scores_fetch::fetch_league_scores(client, league, &cfg, &retry) {
            Ok(events) => {
                let rows: Vec<GameResult> = events
                    .iter()
                    .map(|event| scores_fetch::event_to_game_result(event, league, &teams))
                    .collect();
                let finals = rows.iter().filter(|r| r.final_score().is_some()).count();
                let upserted = store::upsert_game_results(&mut conn, &rows)?;
                summaries.push(LeagueSummary {
                    league: league.clone(),
                    fetched: events.len(),
                    finals,
                    upserted,
                    error: None,
                });
            }
            Err(err) => summaries.push(LeagueSummary {
                league: league.clone(),
                fetched: 0,
                finals: 0,
                upserted: 0,
                error: Some(format!("{err:#}")),
            }),
        }
    }

    println!("Scores ingest complete");
    println!("DB: {}", db_path.display());
    println!("Window: last {} day(s)", cfg.days_from);
    if !teams.is_empty() {
        println!("Team aliases loaded: {}", teams.len());
    }
    for summary in &summaries {
        match &summary.error {
            None => println!(
                "league {}: events={} finals={} upserted={}",
                summary.league, summary.fetched, summary.finals, summary.upserted
            ),
            Some(err) => println!("league {}: FAILED ({err})", summary.league),
        }
    }

    let failures = summaries.iter().filter(|s| s.error.is_some()).count();
    if failures == summaries.len() {
        return Err(anyhow!("every league failed to ingest"));
    }
    Ok(())
}

fn load_team_directory() -> Result<TeamDirectory> {
    match std::env::var("TEAM_ALIASES_PATH") {
        Ok(raw) if !raw.trim().is_empty() => TeamDirectory::load(PathBuf::from(raw.trim()).as_path()),
        _ => Ok(TeamDirectory::default()),
    }
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

fn parse_leagues_arg() -> Option<Vec<String>> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix("--leagues=") {
            let leagues = parse_league_list(raw);
            if !leagues.is_empty() {
                return Some(leagues);
            }
        }
        if arg == "--leagues"
            && let Some(next) = args.get(idx + 1)
        {
            let leagues = parse_league_list(next);
            if !leagues.is_empty() {
                return Some(leagues);
            }
        }
    }
    None
}

fn parse_days_from_arg() -> Option<u32> {
    for arg in std::env::args().skip(1) {
        if let Some(raw) = arg.strip_prefix("--days-from=") {
            if let Ok(days) = raw.trim().parse::<u32>() {
                return Some(days);
            }
        }
    }
    None
}

fn leagues_from_env() -> Vec<String> {
    match std::env::var("SCORES_LEAGUES") {
        Ok(raw) if !raw.trim().is_empty() => parse_league_list(&raw),
        _ => DEFAULT_LEAGUES.iter().map(|s| s.to_string()).collect(),
    }
}

fn parse_league_list(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for part in raw.split([',', ';', ' ']) {
        let league = part.trim().to_ascii_lowercase();
        if !league.is_empty() && seen.insert(league.clone()) {
            out.push(league);
        }
    }
    out
}
