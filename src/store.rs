use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, params, params_from_iter};

use crate::markets::{Market, PickSide};
use crate::model::{DailyRollup, EvaluatedOutcome, GameResult, Outcome, PredictionRow, parse_utc};

const CACHE_DIR: &str = "slate_grader";
const DB_FILE: &str = "slate.sqlite";

// sqlite caps bound parameters per statement, so IN (...) lookups go out in
// slices.
const IN_CHUNK: usize = 500;

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(CACHE_DIR));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(DB_FILE))
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS game_results (
            league TEXT NOT NULL,
            game_id TEXT NOT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            home_score INTEGER NULL,
            away_score INTEGER NULL,
            completed INTEGER NOT NULL,
            start_time TEXT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (league, game_id)
        );
        CREATE INDEX IF NOT EXISTS idx_game_results_start ON game_results(start_time);

        CREATE TABLE IF NOT EXISTS predictions (
            id INTEGER PRIMARY KEY,
            league TEXT NOT NULL,
            game_id TEXT NOT NULL,
            pick_moneyline TEXT NULL,
            pick_spread TEXT NULL,
            pick_total TEXT NULL,
            spread_line REAL NULL,
            total_line REAL NULL,
            created_at TEXT NOT NULL,
            UNIQUE (league, game_id)
        );
        CREATE INDEX IF NOT EXISTS idx_predictions_game ON predictions(game_id);

        CREATE TABLE IF NOT EXISTS model_eval (
            league TEXT NOT NULL,
            game_id TEXT NOT NULL,
            market TEXT NOT NULL,
            pick TEXT NOT NULL,
            pick_side TEXT NOT NULL,
            pick_line REAL NULL,
            result TEXT NOT NULL,
            is_correct INTEGER NULL,
            margin REAL NOT NULL,
            game_start TEXT NOT NULL,
            prediction_id INTEGER NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (league, game_id, market)
        );
        CREATE INDEX IF NOT EXISTS idx_model_eval_start ON model_eval(game_start);

        CREATE TABLE IF NOT EXISTS model_metrics_daily (
            stat_date TEXT NOT NULL,
            league TEXT NOT NULL,
            market TEXT NOT NULL,
            n INTEGER NOT NULL,
            wins INTEGER NOT NULL,
            losses INTEGER NOT NULL,
            pushes INTEGER NOT NULL,
            hit_rate REAL NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (stat_date, league, market)
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

pub fn upsert_game_results(conn: &mut Connection, rows: &[GameResult]) -> Result<usize> {
    let tx = conn.transaction().context("begin results transaction")?;
    let updated_at = Utc::now().to_rfc3339();
    for row in rows {
        tx.execute(
            r#"
            INSERT INTO game_results (
                league, game_id, home_team, away_team,
                home_score, away_score, completed, start_time, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(league, game_id) DO UPDATE SET
                home_team = excluded.home_team,
                away_team = excluded.away_team,
                home_score = excluded.home_score,
                away_score = excluded.away_score,
                completed = excluded.completed,
                start_time = excluded.start_time,
                updated_at = excluded.updated_at
            "#,
            params![
                row.league,
                row.game_id,
                row.home_team,
                row.away_team,
                row.home_score,
                row.away_score,
                row.completed as i64,
                row.start_time.map(|dt| dt.to_rfc3339()),
                updated_at,
            ],
        )
        .context("upsert game result")?;
    }
    tx.commit().context("commit results transaction")?;
    Ok(rows.len())
}

pub fn load_results_since(conn: &Connection, since: DateTime<Utc>) -> Result<Vec<GameResult>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT league, game_id, home_team, away_team,
                   home_score, away_score, completed, start_time
            FROM game_results
            WHERE start_time IS NOT NULL AND start_time >= ?1
            ORDER BY start_time ASC, game_id ASC
            "#,
        )
        .context("prepare load results query")?;

    let rows = stmt
        .query_map(params![since.to_rfc3339()], |row| {
            Ok(GameResult {
                league: row.get(0)?,
                game_id: row.get(1)?,
                home_team: row.get(2)?,
                away_team: row.get(3)?,
                home_score: row.get(4)?,
                away_score: row.get(5)?,
                completed: row.get::<_, i64>(6)? != 0,
                start_time: row
                    .get::<_, Option<String>>(7)?
                    .as_deref()
                    .and_then(parse_utc),
            })
        })
        .context("query load results")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode result row")?);
    }
    Ok(out)
}

pub fn upsert_predictions(conn: &mut Connection, rows: &[PredictionRow]) -> Result<usize> {
    let tx = conn.transaction().context("begin predictions transaction")?;
    let created_at = Utc::now().to_rfc3339();
    for row in rows {
        tx.execute(
            r#"
            INSERT INTO predictions (
                league, game_id, pick_moneyline, pick_spread, pick_total,
                spread_line, total_line, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(league, game_id) DO UPDATE SET
                pick_moneyline = excluded.pick_moneyline,
                pick_spread = excluded.pick_spread,
                pick_total = excluded.pick_total,
                spread_line = excluded.spread_line,
                total_line = excluded.total_line
            "#,
            params![
                row.league,
                row.game_id,
                row.pick_moneyline,
                row.pick_spread,
                row.pick_total,
                row.spread_line,
                row.total_line,
                created_at,
            ],
        )
        .context("upsert prediction")?;
    }
    tx.commit().context("commit predictions transaction")?;
    Ok(rows.len())
}

pub fn load_predictions_for_games(
    conn: &Connection,
    game_ids: &[String],
) -> Result<Vec<PredictionRow>> {
    let mut out = Vec::new();
    for chunk in game_ids.chunks(IN_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(",");
        let sql = format!(
            "SELECT id, league, game_id, pick_moneyline, pick_spread, pick_total, \
                    spread_line, total_line \
             FROM predictions WHERE game_id IN ({placeholders}) \
             ORDER BY league ASC, game_id ASC"
        );
        let mut stmt = conn.prepare(&sql).context("prepare predictions query")?;
        let rows = stmt
            .query_map(params_from_iter(chunk.iter()), |row| {
                Ok(PredictionRow {
                    id: row.get(0)?,
                    league: row.get(1)?,
                    game_id: row.get(2)?,
                    pick_moneyline: row.get(3)?,
                    pick_spread: row.get(4)?,
                    pick_total: row.get(5)?,
                    spread_line: row.get(6)?,
                    total_line: row.get(7)?,
                })
            })
            .context("query predictions")?;
        for row in rows {
            out.push(row.context("decode prediction row")?);
        }
    }
    Ok(out)
}

pub fn upsert_outcomes(conn: &mut Connection, rows: &[EvaluatedOutcome]) -> Result<usize> {
    let tx = conn.transaction().context("begin eval transaction")?;
    let updated_at = Utc::now().to_rfc3339();
    for row in rows {
        tx.execute(
            r#"
            INSERT INTO model_eval (
                league, game_id, market, pick, pick_side, pick_line,
                result, is_correct, margin, game_start, prediction_id, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(league, game_id, market) DO UPDATE SET
                pick = excluded.pick,
                pick_side = excluded.pick_side,
                pick_line = excluded.pick_line,
                result = excluded.result,
                is_correct = excluded.is_correct,
                margin = excluded.margin,
                game_start = excluded.game_start,
                prediction_id = excluded.prediction_id,
                updated_at = excluded.updated_at
            "#,
            params![
                row.league,
                row.game_id,
                row.market.as_str(),
                row.pick,
                row.pick_side.as_str(),
                row.pick_line,
                row.result.as_str(),
                row.is_correct.map(|v| v as i64),
                row.margin,
                row.game_start.to_rfc3339(),
                row.prediction_id,
                updated_at,
            ],
        )
        .context("upsert evaluated outcome")?;
    }
    tx.commit().context("commit eval transaction")?;
    Ok(rows.len())
}

pub fn load_outcomes_since(
    conn: &Connection,
    since: DateTime<Utc>,
) -> Result<Vec<EvaluatedOutcome>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT league, game_id, market, pick, pick_side, pick_line,
                   result, is_correct, margin, game_start, prediction_id
            FROM model_eval
            WHERE game_start >= ?1
            ORDER BY game_start ASC, league ASC, game_id ASC, market ASC
            "#,
        )
        .context("prepare load eval query")?;

    struct RawEval {
        league: String,
        game_id: String,
        market: String,
        pick: String,
        pick_side: String,
        pick_line: Option<f64>,
        result: String,
        is_correct: Option<i64>,
        margin: f64,
        game_start: String,
        prediction_id: Option<i64>,
    }

    let rows = stmt
        .query_map(params![since.to_rfc3339()], |row| {
            Ok(RawEval {
                league: row.get(0)?,
                game_id: row.get(1)?,
                market: row.get(2)?,
                pick: row.get(3)?,
                pick_side: row.get(4)?,
                pick_line: row.get(5)?,
                result: row.get(6)?,
                is_correct: row.get(7)?,
                margin: row.get(8)?,
                game_start: row.get(9)?,
                prediction_id: row.get(10)?,
            })
        })
        .context("query load eval")?;

    let mut out = Vec::new();
    for row in rows {
        let raw = row.context("decode eval row")?;
        let market = Market::parse(&raw.market)
            .ok_or_else(|| anyhow!("unknown market in model_eval: {}", raw.market))?;
        let pick_side = PickSide::parse(&raw.pick_side)
            .ok_or_else(|| anyhow!("unknown pick side in model_eval: {}", raw.pick_side))?;
        let result = Outcome::parse(&raw.result)
            .ok_or_else(|| anyhow!("unknown result in model_eval: {}", raw.result))?;
        let game_start = parse_utc(&raw.game_start)
            .ok_or_else(|| anyhow!("bad game_start in model_eval: {}", raw.game_start))?;
        out.push(EvaluatedOutcome {
            league: raw.league,
            game_id: raw.game_id,
            market,
            pick: raw.pick,
            pick_side,
            pick_line: raw.pick_line,
            result,
            is_correct: raw.is_correct.map(|v| v != 0),
            margin: raw.margin,
            game_start,
            prediction_id: raw.prediction_id,
        });
    }
    Ok(out)
}

pub fn upsert_rollups(conn: &mut Connection, rows: &[DailyRollup]) -> Result<usize> {
    let tx = conn.transaction().context("begin rollup transaction")?;
    let updated_at = Utc::now().to_rfc3339();
    for row in rows {
        tx.execute(
            r#"
            INSERT INTO model_metrics_daily (
                stat_date, league, market, n, wins, losses, pushes, hit_rate, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(stat_date, league, market) DO UPDATE SET
                n = excluded.n,
                wins = excluded.wins,
                losses = excluded.losses,
                pushes = excluded.pushes,
                hit_rate = excluded.hit_rate,
                updated_at = excluded.updated_at
            "#,
            params![
                row.stat_date.to_string(),
                row.league,
                row.market.as_str(),
                row.n,
                row.wins,
                row.losses,
                row.pushes,
                row.hit_rate,
                updated_at,
            ],
        )
        .context("upsert daily rollup")?;
    }
    tx.commit().context("commit rollup transaction")?;
    Ok(rows.len())
}

pub fn load_rollups_since(conn: &Connection, since: NaiveDate) -> Result<Vec<DailyRollup>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT stat_date, league, market, n, wins, losses, pushes, hit_rate
            FROM model_metrics_daily
            WHERE stat_date >= ?1
            ORDER BY stat_date ASC, league ASC, market ASC
            "#,
        )
        .context("prepare load rollups query")?;

    let rows = stmt
        .query_map(params![since.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, u32>(4)?,
                row.get::<_, u32>(5)?,
                row.get::<_, u32>(6)?,
                row.get::<_, f64>(7)?,
            ))
        })
        .context("query load rollups")?;

    let mut out = Vec::new();
    for row in rows {
        let (stat_date, league, market, n, wins, losses, pushes, hit_rate) =
            row.context("decode rollup row")?;
        let stat_date = NaiveDate::parse_from_str(&stat_date, "%Y-%m-%d")
            .with_context(|| format!("bad stat_date in model_metrics_daily: {stat_date}"))?;
        let market = Market::parse(&market)
            .ok_or_else(|| anyhow!("unknown market in model_metrics_daily: {market}"))?;
        out.push(DailyRollup {
            stat_date,
            league,
            market,
            n,
            wins,
            losses,
            pushes,
            hit_rate,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rusqlite::Connection;

    use super::*;
    use crate::markets::{Market, PickSide};
    use crate::model::{DailyRollup, EvaluatedOutcome, GameResult, Outcome, PredictionRow};

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().expect("in-memory sqlite");
        init_schema(&conn).expect("schema");
        conn
    }

    fn sample_result(game_id: &str, start_offset_days: i64) -> GameResult {
        GameResult {
            league: "nfl".to_string(),
            game_id: game_id.to_string(),
            home_team: "KC".to_string(),
            away_team: "BUF".to_string(),
            home_score: Some(27),
            away_score: Some(20),
            completed: true,
            start_time: Some(
                Utc.with_ymd_and_hms(2026, 8, 1, 17, 0, 0).unwrap() + Duration::days(start_offset_days),
            ),
        }
    }

    #[test]
    fn game_result_upsert_is_idempotent() {
        let mut conn = test_db();
        let row = sample_result("g1", 0);
        upsert_game_results(&mut conn, &[row.clone()]).expect("first upsert");
        upsert_game_results(&mut conn, &[row]).expect("second upsert");

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM game_results", [], |r| r.get(0))
            .expect("count");
        assert_eq!(count, 1);
    }

    #[test]
    fn results_window_excludes_older_rows() {
        let mut conn = test_db();
        upsert_game_results(
            &mut conn,
            &[sample_result("old", -40), sample_result("recent", -1)],
        )
        .expect("upsert");

        let since = Utc.with_ymd_and_hms(2026, 8, 1, 17, 0, 0).unwrap() - Duration::days(30);
        let rows = load_results_since(&conn, since).expect("load");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].game_id, "recent");
    }

    #[test]
    fn outcome_roundtrip_preserves_fields() {
        let mut conn = test_db();
        let outcome = EvaluatedOutcome {
            league: "nfl".to_string(),
            game_id: "g1".to_string(),
            market: Market::Spread,
            pick: "HOME -3".to_string(),
            pick_side: PickSide::Home,
            pick_line: Some(-3.0),
            result: Outcome::Win,
            is_correct: Some(true),
            margin: 4.0,
            game_start: Utc.with_ymd_and_hms(2026, 8, 1, 17, 0, 0).unwrap(),
            prediction_id: Some(7),
        };
        upsert_outcomes(&mut conn, &[outcome.clone()]).expect("upsert");
        // Re-grading the same key overwrites rather than duplicating.
        upsert_outcomes(&mut conn, &[outcome]).expect("second upsert");

        let since = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();
        let rows = load_outcomes_since(&conn, since).expect("load");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pick_line, Some(-3.0));
        assert_eq!(rows[0].result, Outcome::Win);
        assert_eq!(rows[0].is_correct, Some(true));
        assert_eq!(rows[0].prediction_id, Some(7));
    }

    #[test]
    fn push_outcome_stores_null_correctness() {
        let mut conn = test_db();
        let outcome = EvaluatedOutcome {
            league: "nfl".to_string(),
            game_id: "g2".to_string(),
            market: Market::Total,
            pick: "Over 45".to_string(),
            pick_side: PickSide::Over,
            pick_line: Some(45.0),
            result: Outcome::Push,
            is_correct: None,
            margin: 0.0,
            game_start: Utc.with_ymd_and_hms(2026, 8, 1, 17, 0, 0).unwrap(),
            prediction_id: None,
        };
        upsert_outcomes(&mut conn, &[outcome]).expect("upsert");
        let rows =
            load_outcomes_since(&conn, Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap())
                .expect("load");
        assert_eq!(rows[0].is_correct, None);
        assert_eq!(rows[0].result, Outcome::Push);
    }

    #[test]
    fn prediction_lookup_by_game_ids() {
        let mut conn = test_db();
        let rows = vec![
            PredictionRow {
                league: "nfl".to_string(),
                game_id: "g1".to_string(),
                pick_moneyline: Some("HOME".to_string()),
                ..Default::default()
            },
            PredictionRow {
                league: "nfl".to_string(),
                game_id: "g2".to_string(),
                pick_spread: Some("AWAY +3".to_string()),
                ..Default::default()
            },
        ];
        upsert_predictions(&mut conn, &rows).expect("upsert");

        let found =
            load_predictions_for_games(&conn, &["g2".to_string(), "missing".to_string()])
                .expect("load");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].game_id, "g2");
        assert_eq!(found[0].pick_spread.as_deref(), Some("AWAY +3"));
        assert!(found[0].id.is_some());
    }

    #[test]
    fn rollup_roundtrip_and_idempotency() {
        let mut conn = test_db();
        let rollup = DailyRollup {
            stat_date: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            league: "nfl".to_string(),
            market: Market::Moneyline,
            n: 3,
            wins: 2,
            losses: 1,
            pushes: 0,
            hit_rate: 0.6667,
        };
        upsert_rollups(&mut conn, &[rollup.clone()]).expect("first");
        upsert_rollups(&mut conn, &[rollup.clone()]).expect("second");

        let rows = load_rollups_since(&conn, NaiveDate::from_ymd_opt(2026, 7, 1).unwrap())
            .expect("load");
        assert_eq!(rows, vec![rollup]);
    }
}
