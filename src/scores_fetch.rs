use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use serde::Deserialize;

use crate::http_client::APP_USER_AGENT;
use crate::model::{GameResult, parse_utc};
use crate::retry::RetryPolicy;

const SCORES_BASE_URL: &str = "https://api.the-odds-api.com/v4/sports";

const DEFAULT_DAYS_FROM: u32 = 2;

#[derive(Debug, Clone)]
pub struct ScoresConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    /// How many days back the vendor scores window reaches (vendor caps at 3).
    pub days_from: u32,
}

impl ScoresConfig {
    pub fn from_env() -> Self {
        let enabled = std::env::var("SCORES_ENABLED")
            .map(|v| !matches!(v.trim(), "0" | "false" | "no"))
            .unwrap_or(true);
        let api_key = std::env::var("ODDS_API_KEY")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let days_from = std::env::var("SCORES_DAYS_FROM")
            .ok()
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(DEFAULT_DAYS_FROM)
            .clamp(1, 3);
        Self {
            enabled,
            api_key,
            days_from,
        }
    }
}

pub fn sport_key_for_league(league: &str) -> Option<&'static str> {
    match league.trim().to_ascii_lowercase().as_str() {
        "mlb" => Some("baseball_mlb"),
        "nfl" => Some("americanfootball_nfl"),
        "nba" => Some("basketball_nba"),
        "nhl" => Some("icehockey_nhl"),
        "ncaaf" => Some("americanfootball_ncaaf"),
        "ncaab" => Some("basketball_ncaab"),
        "wnba" => Some("basketball_wnba"),
        _ => None,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoreEvent {
    pub id: String,
    #[serde(default)]
    pub commence_time: Option<String>,
    #[serde(default)]
    pub completed: bool,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub scores: Option<Vec<ScoreEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoreEntry {
    pub name: String,
    #[serde(default)]
    pub score: Option<String>,
}

/// The scores endpoint returns a JSON array, or `null` when a sport is out
/// of season.
pub fn parse_scores_json(raw: &str) -> Result<Vec<ScoreEvent>> {
    let events: Option<Vec<ScoreEvent>> =
        serde_json::from_str(raw).context("invalid scores json")?;
    Ok(events.unwrap_or_default())
}

pub fn fetch_league_scores(
    client: &Client,
    league: &str,
    cfg: &ScoresConfig,
    retry: &RetryPolicy,
) -> Result<Vec<ScoreEvent>> {
    if !cfg.enabled {
        return Ok(Vec::new());
    }
    let Some(api_key) = cfg.api_key.as_ref() else {
        return Err(anyhow!("ODDS_API_KEY missing"));
    };
    let Some(sport_key) = sport_key_for_league(league) else {
        // Leagues the vendor does not cover simply produce no rows.
        return Ok(Vec::new());
    };

    let url = format!("{SCORES_BASE_URL}/{sport_key}/scores");
    let days_from = cfg.days_from.to_string();
    retry.run(&format!("scores fetch {league}"), || {
        let resp = client
            .get(&url)
            .query(&[
                ("apiKey", api_key.as_str()),
                ("daysFrom", days_from.as_str()),
                ("dateFormat", "iso"),
            ])
            .header(USER_AGENT, APP_USER_AGENT)
            .send()
            .context("scores request failed")?;
        let status = resp.status();
        let body = resp.text().context("failed reading scores body")?;
        if !status.is_success() {
            return Err(anyhow!("scores http {}: {}", status, body_snippet(&body)));
        }
        parse_scores_json(&body)
    })
}

fn body_snippet(body: &str) -> String {
    body.trim()
        .replace('\n', " ")
        .replace('\r', " ")
        .chars()
        .take(220)
        .collect()
}

/// Final (home, away) score for a completed event. Both team entries must
/// match the event's team names; anything else leaves the game unscored.
pub fn final_score(event: &ScoreEvent) -> Option<(i64, i64)> {
    if !event.completed {
        return None;
    }
    let entries = event.scores.as_ref()?;
    let mut home = None;
    let mut away = None;
    for entry in entries {
        let Some(raw) = entry.score.as_deref() else {
            continue;
        };
        let Ok(value) = raw.trim().parse::<i64>() else {
            continue;
        };
        if entry.name == event.home_team {
            home = Some(value);
        } else if entry.name == event.away_team {
            away = Some(value);
        }
    }
    match (home, away) {
        (Some(home), Some(away)) => Some((home, away)),
        _ => None,
    }
}

/// Request-scoped team-name canonicalization. Built once per run and passed
/// explicitly into the reshape step; there is no process-wide alias cache.
#[derive(Debug, Clone, Default)]
pub struct TeamDirectory {
    aliases: HashMap<String, String>,
}

impl TeamDirectory {
    pub fn insert(&mut self, name: &str, code: &str) {
        self.aliases.insert(norm_key(name), code.to_string());
    }

    pub fn canonical(&self, name: &str) -> String {
        self.aliases
            .get(&norm_key(name))
            .cloned()
            .unwrap_or_else(|| name.trim().to_string())
    }

    /// Load a `{ "Full Team Name": "CODE", ... }` JSON alias file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read team aliases {}", path.display()))?;
        let pairs: HashMap<String, String> =
            serde_json::from_str(&raw).context("invalid team aliases json")?;
        let mut directory = Self::default();
        for (name, code) in pairs {
            directory.insert(&name, &code);
        }
        Ok(directory)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

fn norm_key(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}

pub fn event_to_game_result(event: &ScoreEvent, league: &str, teams: &TeamDirectory) -> GameResult {
    let score = final_score(event);
    GameResult {
        league: league.to_string(),
        game_id: event.id.clone(),
        home_team: teams.canonical(&event.home_team),
        away_team: teams.canonical(&event.away_team),
        home_score: score.map(|s| s.0),
        away_score: score.map(|s| s.1),
        completed: event.completed,
        start_time: event.commence_time.as_deref().and_then(parse_utc),
    }
}
