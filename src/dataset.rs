use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Result, anyhow};
use serde_json::{Map, Value};

// Column-name candidates, checked in order, for the non-feature columns of a
// team-stats table. Providers disagree on naming, so detection is flexible.
const ID_KEYS: &[&str] = &["team_id", "id", "teamid", "abbr", "team_abbr", "team_code"];
const NAME_KEYS: &[&str] = &["team_name", "name"];
const SEASON_KEYS: &[&str] = &["season", "year"];

const FALLBACK_FEATURE: &str = "zero_feature";

/// A feature matrix plus the season-balanced binary label, built from
/// arbitrary team-stat rows.
#[derive(Debug, Clone)]
pub struct LabeledDataset {
    pub feature_names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub labels: Vec<u8>,
    pub seasons: Vec<Option<i64>>,
}

impl LabeledDataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sorted distinct seasons present in the dataset.
    pub fn distinct_seasons(&self) -> Vec<i64> {
        let mut seasons: Vec<i64> = self.seasons.iter().flatten().copied().collect();
        seasons.sort_unstable();
        seasons.dedup();
        seasons
    }
}

/// Build the matrix from raw JSON rows: every column that is numeric in all
/// its present values becomes a feature (strings that parse count, missing
/// values become 0.0); detected id/name/season columns are excluded. When no
/// numeric column survives, a single all-zero feature keeps the pipeline
/// runnable.
pub fn build_labeled_dataset(raw_rows: &[Value]) -> Result<LabeledDataset> {
    if raw_rows.is_empty() {
        return Err(anyhow!("no rows to build a dataset from"));
    }
    let objects: Vec<&Map<String, Value>> = raw_rows
        .iter()
        .map(|row| row.as_object().ok_or_else(|| anyhow!("row is not a json object")))
        .collect::<Result<_>>()?;

    let mut all_keys: BTreeSet<&str> = BTreeSet::new();
    for object in &objects {
        all_keys.extend(object.keys().map(String::as_str));
    }

    let id_key = pick_first(&all_keys, ID_KEYS);
    let name_key = pick_first(&all_keys, NAME_KEYS);
    let season_key = pick_first(&all_keys, SEASON_KEYS);
    let excluded: BTreeSet<&str> = [id_key, name_key, season_key].into_iter().flatten().collect();

    let mut feature_names: Vec<String> = all_keys
        .iter()
        .filter(|key| !excluded.contains(*key))
        .filter(|key| is_numeric_column(&objects, key))
        .map(|key| key.to_string())
        .collect();
    if feature_names.is_empty() {
        feature_names.push(FALLBACK_FEATURE.to_string());
    }

    let rows: Vec<Vec<f64>> = objects
        .iter()
        .map(|object| {
            feature_names
                .iter()
                .map(|key| object.get(key).and_then(numeric_value).unwrap_or(0.0))
                .collect()
        })
        .collect();

    let seasons: Vec<Option<i64>> = objects
        .iter()
        .map(|object| season_key.and_then(|key| object.get(key)).and_then(season_value))
        .collect();

    let composite = composite_zscores(&rows);
    let labels = season_balanced_labels(&composite, &seasons);

    Ok(LabeledDataset {
        feature_names,
        rows,
        labels,
        seasons,
    })
}

fn pick_first<'a>(keys: &BTreeSet<&'a str>, candidates: &[&'a str]) -> Option<&'a str> {
    candidates.iter().copied().find(|c| keys.contains(c))
}

fn is_numeric_column(objects: &[&Map<String, Value>], key: &str) -> bool {
    let mut seen_value = false;
    for object in objects {
        match object.get(key) {
            None | Some(Value::Null) => continue,
            Some(value) => {
                if numeric_value(value).is_none() {
                    return false;
                }
                seen_value = true;
            }
        }
    }
    seen_value
}

fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn season_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|v| v as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Composite score per row: z-score every column (population std + 1e-9)
/// and sum across columns.
pub fn composite_zscores(rows: &[Vec<f64>]) -> Vec<f64> {
    let Some(width) = rows.first().map(Vec::len) else {
        return Vec::new();
    };
    let n = rows.len() as f64;
    let mut composite = vec![0.0; rows.len()];

    for col in 0..width {
        let mean = rows.iter().map(|r| r[col]).sum::<f64>() / n;
        let var = rows.iter().map(|r| (r[col] - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt() + 1e-9;
        for (idx, row) in rows.iter().enumerate() {
            composite[idx] += (row[col] - mean) / std;
        }
    }
    composite
}

/// Median-split the composite within each season: 1 iff composite >= the
/// season median. A season that comes out single-class (and has more than
/// one row) gets the row nearest the cutoff flipped so both classes exist.
pub fn season_balanced_labels(composite: &[f64], seasons: &[Option<i64>]) -> Vec<u8> {
    let mut groups: BTreeMap<Option<i64>, Vec<usize>> = BTreeMap::new();
    for (idx, season) in seasons.iter().enumerate() {
        groups.entry(*season).or_default().push(idx);
    }

    let mut labels = vec![0u8; composite.len()];
    for indices in groups.values() {
        let mut values: Vec<f64> = indices.iter().map(|&i| composite[i]).collect();
        let cutoff = median(&mut values);

        let mut ones = 0usize;
        for &idx in indices {
            if composite[idx] >= cutoff {
                labels[idx] = 1;
                ones += 1;
            }
        }

        if indices.len() > 1 && (ones == 0 || ones == indices.len()) {
            let nearest = indices
                .iter()
                .copied()
                .min_by(|&a, &b| {
                    let da = (composite[a] - cutoff).abs();
                    let db = (composite[b] - cutoff).abs();
                    da.total_cmp(&db)
                })
                .unwrap_or(indices[0]);
            labels[nearest] = 1 - labels[nearest];
        }
    }
    labels
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{build_labeled_dataset, composite_zscores, season_balanced_labels};

    #[test]
    fn detects_numeric_columns_and_excludes_keys() {
        let rows = vec![
            json!({"team_id": "KC", "team_name": "Chiefs", "season": 2025, "wins": 14, "ppg": "28.4"}),
            json!({"team_id": "BUF", "team_name": "Bills", "season": 2025, "wins": 11, "ppg": "26.1"}),
            json!({"team_id": "NYJ", "team_name": "Jets", "season": 2025, "wins": 5, "ppg": null}),
        ];
        let ds = build_labeled_dataset(&rows).expect("dataset");
        assert_eq!(ds.feature_names, vec!["ppg".to_string(), "wins".to_string()]);
        assert_eq!(ds.len(), 3);
        // Null ppg fills with zero.
        assert_eq!(ds.rows[2][0], 0.0);
        assert_eq!(ds.distinct_seasons(), vec![2025]);
    }

    #[test]
    fn text_columns_are_not_features() {
        let rows = vec![
            json!({"team_id": 1, "season": 2025, "coach": "Reid", "wins": 10}),
            json!({"team_id": 2, "season": 2025, "coach": "McDermott", "wins": 9}),
        ];
        let ds = build_labeled_dataset(&rows).expect("dataset");
        assert_eq!(ds.feature_names, vec!["wins".to_string()]);
    }

    #[test]
    fn fabricates_zero_feature_when_nothing_is_numeric() {
        let rows = vec![
            json!({"team_id": "A", "team_name": "Alpha"}),
            json!({"team_id": "B", "team_name": "Beta"}),
        ];
        let ds = build_labeled_dataset(&rows).expect("dataset");
        assert_eq!(ds.feature_names, vec!["zero_feature".to_string()]);
        assert!(ds.rows.iter().all(|r| r == &vec![0.0]));
        // Identical composites median-split to all ones, then one flips.
        let ones = ds.labels.iter().filter(|&&l| l == 1).count();
        assert_eq!(ones, 1);
    }

    #[test]
    fn labels_are_balanced_within_each_season() {
        let composite = vec![3.0, 1.0, -1.0, -3.0, 4.0, 2.0, -2.0, -4.0];
        let seasons = vec![
            Some(2024),
            Some(2024),
            Some(2024),
            Some(2024),
            Some(2025),
            Some(2025),
            Some(2025),
            Some(2025),
        ];
        let labels = season_balanced_labels(&composite, &seasons);
        assert_eq!(labels, vec![1, 1, 0, 0, 1, 1, 0, 0]);
    }

    #[test]
    fn single_class_season_gets_one_flip() {
        let composite = vec![1.0, 1.0, 1.0];
        let seasons = vec![Some(2025); 3];
        let labels = season_balanced_labels(&composite, &seasons);
        let ones = labels.iter().filter(|&&l| l == 1).count();
        assert_eq!(ones, 2, "one of three identical rows flips to the other class");
    }

    #[test]
    fn composite_is_sum_of_column_zscores() {
        let rows = vec![vec![1.0, 10.0], vec![3.0, 30.0]];
        let composite = composite_zscores(&rows);
        // Both columns push the same direction, so signs agree and magnitudes
        // are symmetric.
        assert!(composite[0] < 0.0 && composite[1] > 0.0);
        assert!((composite[0] + composite[1]).abs() < 1e-9);
    }
}
