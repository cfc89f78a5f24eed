use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::model::{DailyRollup, EvaluatedOutcome};

pub struct ExportReport {
    pub rollups: usize,
    pub outcomes: usize,
}

/// Write the windowed rollups and evaluated outcomes into one workbook:
/// a "Daily Metrics" sheet and an "Evaluations" sheet.
pub fn export_workbook(
    path: &Path,
    rollups: &[DailyRollup],
    outcomes: &[EvaluatedOutcome],
) -> Result<ExportReport> {
    let rollup_rows = rollup_rows(rollups);
    let outcome_rows = outcome_rows(outcomes);

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Daily Metrics")?;
        write_rows(sheet, &rollup_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Evaluations")?;
        write_rows(sheet, &outcome_rows)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        rollups: rollup_rows.len().saturating_sub(1),
        outcomes: outcome_rows.len().saturating_sub(1),
    })
}

fn rollup_rows(rollups: &[DailyRollup]) -> Vec<Vec<String>> {
    let mut rows = vec![vec![
        "Date".to_string(),
        "League".to_string(),
        "Market".to_string(),
        "N".to_string(),
        "Wins".to_string(),
        "Losses".to_string(),
        "Pushes".to_string(),
        "Hit Rate".to_string(),
    ]];
    for rollup in rollups {
        rows.push(vec![
            rollup.stat_date.to_string(),
            rollup.league.clone(),
            rollup.market.as_str().to_string(),
            rollup.n.to_string(),
            rollup.wins.to_string(),
            rollup.losses.to_string(),
            rollup.pushes.to_string(),
            format!("{:.4}", rollup.hit_rate),
        ]);
    }
    rows
}

fn outcome_rows(outcomes: &[EvaluatedOutcome]) -> Vec<Vec<String>> {
    let mut rows = vec![vec![
        "League".to_string(),
        "Game ID".to_string(),
        "Market".to_string(),
        "Pick".to_string(),
        "Side".to_string(),
        "Line".to_string(),
        "Result".to_string(),
        "Correct".to_string(),
        "Margin".to_string(),
        "Game Start".to_string(),
    ]];
    for outcome in outcomes {
        rows.push(vec![
            outcome.league.clone(),
            outcome.game_id.clone(),
            outcome.market.as_str().to_string(),
            outcome.pick.clone(),
            outcome.pick_side.as_str().to_string(),
            outcome
                .pick_line
                .map(|line| line.to_string())
                .unwrap_or_default(),
            outcome.result.as_str().to_string(),
            match outcome.is_correct {
                Some(true) => "yes".to_string(),
                Some(false) => "no".to_string(),
                None => String::new(),
            },
            format!("{:.2}", outcome.margin),
            outcome.game_start.to_rfc3339(),
        ]);
    }
    rows
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::rollup_rows;
    use crate::markets::Market;
    use crate::model::DailyRollup;

    #[test]
    fn rollup_rows_have_header_and_data() {
        let rollup = DailyRollup {
            stat_date: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            league: "nfl".to_string(),
            market: Market::Spread,
            n: 4,
            wins: 2,
            losses: 1,
            pushes: 1,
            hit_rate: 0.6667,
        };
        let rows = rollup_rows(&[rollup]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], "Date");
        let expected: Vec<String> = ["2026-08-01", "nfl", "spread", "4", "2", "1", "1", "0.6667"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(rows[1], expected);
    }
}
