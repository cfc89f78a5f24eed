use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::markets::Market;
use crate::model::{DailyRollup, EvaluatedOutcome, Outcome};

/// wins / max(wins + losses, 1), rounded to 4 decimal places. Pushes stay
/// out of the denominator, so a day of nothing but pushes reports 0.0
/// without dividing by zero.
pub fn hit_rate(wins: u32, losses: u32) -> f64 {
    let denom = (wins + losses).max(1) as f64;
    round4(wins as f64 / denom)
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    n: u32,
    wins: u32,
    losses: u32,
    pushes: u32,
}

/// Group evaluated outcomes by (stat_date, league, market) and compute the
/// per-group hit rate. Output order is deterministic (date, league, market).
pub fn daily_rollups(outcomes: &[EvaluatedOutcome]) -> Vec<DailyRollup> {
    let mut groups: BTreeMap<(NaiveDate, String, Market), Tally> = BTreeMap::new();

    for outcome in outcomes {
        let key = (outcome.stat_date(), outcome.league.clone(), outcome.market);
        let tally = groups.entry(key).or_default();
        tally.n += 1;
        match outcome.result {
            Outcome::Win => tally.wins += 1,
            Outcome::Loss => tally.losses += 1,
            Outcome::Push => tally.pushes += 1,
        }
    }

    groups
        .into_iter()
        .map(|((stat_date, league, market), tally)| DailyRollup {
            stat_date,
            league,
            market,
            n: tally.n,
            wins: tally.wins,
            losses: tally.losses,
            pushes: tally.pushes,
            hit_rate: hit_rate(tally.wins, tally.losses),
        })
        .collect()
}
