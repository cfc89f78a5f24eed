use anyhow::{Result, anyhow};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::Serialize;

use crate::dataset::LabeledDataset;

pub const DEFAULT_SPLITS: usize = 3;
pub const DEFAULT_SEED: u64 = 42;

/// Predictions are clipped into [CLIP, 1 - CLIP] before log-loss.
const CLIP: f64 = 1e-6;

#[derive(Debug, Clone, Serialize)]
pub struct FoldMetrics {
    pub fold: usize,
    pub accuracy: f64,
    pub roc_auc: f64,
    pub log_loss: f64,
    pub brier: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CvSummary {
    pub accuracy_mean: f64,
    pub roc_auc_mean: f64,
    pub log_loss_mean: f64,
    pub brier_mean: f64,
    pub n: usize,
    pub splits: usize,
    pub seasons: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CvReport {
    pub folds: Vec<FoldMetrics>,
    pub summary: CvSummary,
}

/// Shuffled stratified k-fold: indices of each class are shuffled with the
/// seeded RNG and dealt round-robin, so per-fold class counts differ by at
/// most one.
pub fn stratified_kfold(labels: &[u8], splits: usize, seed: u64) -> Vec<(Vec<usize>, Vec<usize>)> {
    let splits = splits.max(2).min(labels.len().max(2));
    let mut rng = StdRng::seed_from_u64(seed);

    let mut fold_of = vec![0usize; labels.len()];
    for class in [1u8, 0u8] {
        let mut indices: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        indices.shuffle(&mut rng);
        for (position, idx) in indices.into_iter().enumerate() {
            fold_of[idx] = position % splits;
        }
    }

    (0..splits)
        .map(|fold| {
            let mut train = Vec::new();
            let mut test = Vec::new();
            for (idx, &assigned) in fold_of.iter().enumerate() {
                if assigned == fold {
                    test.push(idx);
                } else {
                    train.push(idx);
                }
            }
            (train, test)
        })
        .collect()
}

/// Training knobs for the fold model. The defaults are deliberately mild;
/// the harness, not the learner, is the point.
#[derive(Debug, Clone, Copy)]
pub struct TrainConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    pub l2: f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 300,
            learning_rate: 0.1,
            l2: 1.0,
        }
    }
}

/// A small deterministic logistic regressor over standardized inputs,
/// trained with full-batch gradient descent.
#[derive(Debug, Clone)]
pub struct LogisticModel {
    weights: Vec<f64>,
    bias: f64,
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl LogisticModel {
    pub fn fit(rows: &[Vec<f64>], labels: &[u8], cfg: TrainConfig) -> Self {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        let n = rows.len().max(1) as f64;

        let mut mean = vec![0.0; width];
        let mut std = vec![1.0; width];
        for col in 0..width {
            let m = rows.iter().map(|r| r[col]).sum::<f64>() / n;
            let var = rows.iter().map(|r| (r[col] - m).powi(2)).sum::<f64>() / n;
            mean[col] = m;
            std[col] = var.sqrt().max(1e-9);
        }

        let mut weights = vec![0.0; width];
        let mut bias = 0.0;
        for _ in 0..cfg.epochs {
            let mut grad_w = vec![0.0; width];
            let mut grad_b = 0.0;
            for (row, &label) in rows.iter().zip(labels) {
                let z: Vec<f64> = (0..width).map(|c| (row[c] - mean[c]) / std[c]).collect();
                let pred = sigmoid(dot(&weights, &z) + bias);
                let err = pred - label as f64;
                for c in 0..width {
                    grad_w[c] += err * z[c];
                }
                grad_b += err;
            }
            for c in 0..width {
                weights[c] -= cfg.learning_rate * (grad_w[c] / n + cfg.l2 * weights[c] / n);
            }
            bias -= cfg.learning_rate * grad_b / n;
        }

        Self {
            weights,
            bias,
            mean,
            std,
        }
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let z: Vec<f64> = self
            .weights
            .iter()
            .enumerate()
            .map(|(c, _)| (row[c] - self.mean[c]) / self.std[c])
            .collect();
        sigmoid(dot(&self.weights, &z) + self.bias)
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn accuracy(preds: &[f64], labels: &[u8]) -> f64 {
    if preds.is_empty() {
        return f64::NAN;
    }
    let correct = preds
        .iter()
        .zip(labels)
        .filter(|&(ref p, &y)| (**p >= 0.5) == (y == 1))
        .count();
    correct as f64 / preds.len() as f64
}

/// Rank-based ROC-AUC with tie-averaged ranks. NaN when a fold is
/// single-class.
pub fn roc_auc(preds: &[f64], labels: &[u8]) -> f64 {
    let positives = labels.iter().filter(|&&y| y == 1).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return f64::NAN;
    }

    let mut order: Vec<usize> = (0..preds.len()).collect();
    order.sort_by(|&a, &b| preds[a].total_cmp(&preds[b]));

    let mut ranks = vec![0.0; preds.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && preds[order[j + 1]] == preds[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }

    let positive_rank_sum: f64 = labels
        .iter()
        .enumerate()
        .filter(|&(_, &y)| y == 1)
        .map(|(idx, _)| ranks[idx])
        .sum();
    let p = positives as f64;
    let q = negatives as f64;
    (positive_rank_sum - p * (p + 1.0) / 2.0) / (p * q)
}

pub fn log_loss(preds: &[f64], labels: &[u8]) -> f64 {
    if preds.is_empty() {
        return f64::NAN;
    }
    let total: f64 = preds
        .iter()
        .zip(labels)
        .map(|(p, &y)| {
            let p = p.clamp(CLIP, 1.0 - CLIP);
            if y == 1 { -p.ln() } else { -(1.0 - p).ln() }
        })
        .sum();
    total / preds.len() as f64
}

pub fn brier(preds: &[f64], labels: &[u8]) -> f64 {
    if preds.is_empty() {
        return f64::NAN;
    }
    preds
        .iter()
        .zip(labels)
        .map(|(p, &y)| (p - y as f64).powi(2))
        .sum::<f64>()
        / preds.len() as f64
}

pub fn run_cv(ds: &LabeledDataset, splits: usize, seed: u64) -> Result<CvReport> {
    if ds.is_empty() {
        return Err(anyhow!("empty dataset"));
    }
    if ds.len() < 2 {
        return Err(anyhow!("need at least 2 rows for cross-validation"));
    }

    let folds = stratified_kfold(&ds.labels, splits, seed);
    let fold_metrics: Vec<FoldMetrics> = folds
        .par_iter()
        .enumerate()
        .map(|(fold_idx, (train, test))| {
            let train_rows: Vec<Vec<f64>> = train.iter().map(|&i| ds.rows[i].clone()).collect();
            let train_labels: Vec<u8> = train.iter().map(|&i| ds.labels[i]).collect();
            let model = LogisticModel::fit(&train_rows, &train_labels, TrainConfig::default());

            let preds: Vec<f64> = test.iter().map(|&i| model.predict(&ds.rows[i])).collect();
            let labels: Vec<u8> = test.iter().map(|&i| ds.labels[i]).collect();

            FoldMetrics {
                fold: fold_idx + 1,
                accuracy: accuracy(&preds, &labels),
                roc_auc: roc_auc(&preds, &labels),
                log_loss: log_loss(&preds, &labels),
                brier: brier(&preds, &labels),
            }
        })
        .collect();

    let summary = CvSummary {
        accuracy_mean: nanmean(fold_metrics.iter().map(|m| m.accuracy)),
        roc_auc_mean: nanmean(fold_metrics.iter().map(|m| m.roc_auc)),
        log_loss_mean: nanmean(fold_metrics.iter().map(|m| m.log_loss)),
        brier_mean: nanmean(fold_metrics.iter().map(|m| m.brier)),
        n: ds.len(),
        splits: fold_metrics.len(),
        seasons: ds.distinct_seasons(),
    };

    Ok(CvReport {
        folds: fold_metrics,
        summary,
    })
}

fn nanmean(values: impl Iterator<Item = f64>) -> f64 {
    let finite: Vec<f64> = values.filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return f64::NAN;
    }
    finite.iter().sum::<f64>() / finite.len() as f64
}
