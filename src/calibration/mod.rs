//! Calibration Monitor - checks whether predicted recall probabilities can be trusted
//!
//! Metrics:
//! - ECE (Expected Calibration Error): predictions are bucketed into equal-width
//!   bins over [0, 1]; ECE = Σ (n_b / N) * |mean_predicted_b - accuracy_b|
//! - MAE: mean |predicted - actual| * 100
//! - Brier score: mean (predicted - actual)^2
//!
//! Empty input yields an all-zero report instead of an error.

pub mod prediction_log;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use prediction_log::{PredictionLog, PREDICTION_LOG_KEY};

pub const DEFAULT_NUM_BINS: usize = 10;

/// |mean predicted - accuracy| within which the engine counts as unbiased
const BIAS_TOLERANCE: f64 = 0.05;

// ==================== Data Structures ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    /// Predicted recall probability, [0, 1]
    pub predicted: f64,
    /// 1 recalled, 0 forgotten
    pub actual: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl Prediction {
    pub fn new(predicted: f64, actual: bool) -> Self {
        Self {
            predicted,
            actual: actual as u8,
            word: None,
            timestamp: None,
        }
    }

    fn outcome(&self) -> f64 {
        if self.actual > 0 {
            1.0
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityBand {
    Excellent,
    Good,
    Fair,
    Poor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBias {
    OverConfident,
    UnderConfident,
    Balanced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
    pub mean_predicted: f64,
    pub accuracy: f64,
    /// |mean_predicted - accuracy|
    pub gap: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationReport {
    pub ece: f64,
    pub mae: f64,
    pub brier_score: f64,
    pub bins: Vec<CalibrationBin>,
    pub overall_accuracy: f64,
    pub mean_predicted: f64,
    pub sample_count: usize,
    pub ece_quality: QualityBand,
    pub mae_quality: QualityBand,
    pub bias: ConfidenceBias,
}

impl CalibrationReport {
    pub fn empty(num_bins: usize) -> Self {
        Self {
            ece: 0.0,
            mae: 0.0,
            brier_score: 0.0,
            bins: bin_edges(num_bins)
                .map(|(lower, upper)| CalibrationBin {
                    lower,
                    upper,
                    count: 0,
                    mean_predicted: 0.0,
                    accuracy: 0.0,
                    gap: 0.0,
                })
                .collect(),
            overall_accuracy: 0.0,
            mean_predicted: 0.0,
            sample_count: 0,
            ece_quality: QualityBand::Excellent,
            mae_quality: QualityBand::Excellent,
            bias: ConfidenceBias::Balanced,
        }
    }
}

// ==================== Metrics ====================

fn effective_bins(num_bins: usize) -> usize {
    if num_bins == 0 {
        DEFAULT_NUM_BINS
    } else {
        num_bins
    }
}

fn bin_edges(num_bins: usize) -> impl Iterator<Item = (f64, f64)> {
    let n = effective_bins(num_bins);
    (0..n).map(move |i| (i as f64 / n as f64, (i + 1) as f64 / n as f64))
}

/// Last bin is closed on both ends so p = 1.0 lands in it
fn bin_index(p: f64, num_bins: usize) -> usize {
    ((p * num_bins as f64).floor() as usize).min(num_bins - 1)
}

fn valid(predictions: &[Prediction]) -> impl Iterator<Item = &Prediction> {
    predictions.iter().filter(|p| p.predicted.is_finite())
}

#[derive(Default, Clone, Copy)]
struct BinAccumulator {
    count: usize,
    predicted_sum: f64,
    correct_sum: f64,
}

fn accumulate(predictions: &[Prediction], num_bins: usize) -> (Vec<BinAccumulator>, usize) {
    let n = effective_bins(num_bins);
    let mut bins = vec![BinAccumulator::default(); n];
    let mut total = 0;
    for prediction in valid(predictions) {
        let p = prediction.predicted.clamp(0.0, 1.0);
        let bin = &mut bins[bin_index(p, n)];
        bin.count += 1;
        bin.predicted_sum += p;
        bin.correct_sum += prediction.outcome();
        total += 1;
    }
    (bins, total)
}

pub fn calculate_ece(predictions: &[Prediction], num_bins: usize) -> f64 {
    let (bins, total) = accumulate(predictions, num_bins);
    if total == 0 {
        return 0.0;
    }
    bins.iter()
        .filter(|b| b.count > 0)
        .map(|b| {
            let mean_predicted = b.predicted_sum / b.count as f64;
            let accuracy = b.correct_sum / b.count as f64;
            (b.count as f64 / total as f64) * (mean_predicted - accuracy).abs()
        })
        .sum()
}

pub fn calculate_mae(predictions: &[Prediction]) -> f64 {
    let errors: Vec<f64> = valid(predictions)
        .map(|p| (p.predicted.clamp(0.0, 1.0) - p.outcome()).abs() * 100.0)
        .collect();
    if errors.is_empty() {
        return 0.0;
    }
    errors.iter().sum::<f64>() / errors.len() as f64
}

pub fn calculate_brier_score(predictions: &[Prediction]) -> f64 {
    let errors: Vec<f64> = valid(predictions)
        .map(|p| (p.predicted.clamp(0.0, 1.0) - p.outcome()).powi(2))
        .collect();
    if errors.is_empty() {
        return 0.0;
    }
    errors.iter().sum::<f64>() / errors.len() as f64
}

pub fn evaluate_calibration_quality(ece: f64) -> QualityBand {
    if ece <= 0.05 {
        QualityBand::Excellent
    } else if ece <= 0.10 {
        QualityBand::Good
    } else if ece <= 0.15 {
        QualityBand::Fair
    } else {
        QualityBand::Poor
    }
}

pub fn evaluate_mae_quality(mae: f64) -> QualityBand {
    if mae <= 10.0 {
        QualityBand::Excellent
    } else if mae <= 20.0 {
        QualityBand::Good
    } else if mae <= 30.0 {
        QualityBand::Fair
    } else {
        QualityBand::Poor
    }
}

pub fn analyze_calibration(predictions: &[Prediction], num_bins: usize) -> CalibrationReport {
    let (accumulated, total) = accumulate(predictions, num_bins);
    if total == 0 {
        return CalibrationReport::empty(num_bins);
    }

    let bins: Vec<CalibrationBin> = bin_edges(num_bins)
        .zip(&accumulated)
        .map(|((lower, upper), acc)| {
            if acc.count == 0 {
                return CalibrationBin {
                    lower,
                    upper,
                    count: 0,
                    mean_predicted: 0.0,
                    accuracy: 0.0,
                    gap: 0.0,
                };
            }
            let mean_predicted = acc.predicted_sum / acc.count as f64;
            let accuracy = acc.correct_sum / acc.count as f64;
            CalibrationBin {
                lower,
                upper,
                count: acc.count,
                mean_predicted,
                accuracy,
                gap: (mean_predicted - accuracy).abs(),
            }
        })
        .collect();

    let ece: f64 = bins
        .iter()
        .map(|b| b.count as f64 / total as f64 * b.gap)
        .sum();
    let mae = calculate_mae(predictions);
    let overall_accuracy =
        accumulated.iter().map(|b| b.correct_sum).sum::<f64>() / total as f64;
    let mean_predicted = accumulated.iter().map(|b| b.predicted_sum).sum::<f64>() / total as f64;

    let bias = if mean_predicted - overall_accuracy > BIAS_TOLERANCE {
        ConfidenceBias::OverConfident
    } else if overall_accuracy - mean_predicted > BIAS_TOLERANCE {
        ConfidenceBias::UnderConfident
    } else {
        ConfidenceBias::Balanced
    };

    tracing::debug!(samples = total, ece, mae, "calibration analyzed");

    CalibrationReport {
        ece,
        mae,
        brier_score: calculate_brier_score(predictions),
        bins,
        overall_accuracy,
        mean_predicted,
        sample_count: total,
        ece_quality: evaluate_calibration_quality(ece),
        mae_quality: evaluate_mae_quality(mae),
        bias,
    }
}

// ==================== Monitor ====================

/// On-demand auditor over a [`PredictionLog`]
pub struct CalibrationMonitor {
    log: Arc<PredictionLog>,
    num_bins: usize,
}

impl CalibrationMonitor {
    pub fn new(log: Arc<PredictionLog>) -> Self {
        Self::with_bins(log, DEFAULT_NUM_BINS)
    }

    pub fn with_bins(log: Arc<PredictionLog>, num_bins: usize) -> Self {
        Self {
            log,
            num_bins: effective_bins(num_bins),
        }
    }

    pub async fn analyze(&self) -> CalibrationReport {
        analyze_calibration(&self.log.all().await, self.num_bins)
    }

    pub async fn analyze_recent(&self, n: usize) -> CalibrationReport {
        analyze_calibration(&self.log.recent(n).await, self.num_bins)
    }

    pub async fn analyze_item(&self, word: &str) -> CalibrationReport {
        analyze_calibration(&self.log.by_item(word).await, self.num_bins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preds(pairs: &[(f64, bool)]) -> Vec<Prediction> {
        pairs.iter().map(|&(p, a)| Prediction::new(p, a)).collect()
    }

    #[test]
    fn test_perfect_calibration() {
        let set = preds(&[(1.0, true), (0.0, false), (1.0, true), (0.0, false)]);
        assert_eq!(calculate_ece(&set, 10), 0.0);
        assert_eq!(calculate_mae(&set), 0.0);
        assert_eq!(calculate_brier_score(&set), 0.0);
    }

    #[test]
    fn test_over_confidence_detected() {
        let set: Vec<Prediction> = (0..10).map(|i| Prediction::new(0.9, i < 5)).collect();
        let ece = calculate_ece(&set, 10);
        assert!((ece - 0.4).abs() < 1e-9);

        let report = analyze_calibration(&set, 10);
        assert_eq!(report.bias, ConfidenceBias::OverConfident);
        assert_eq!(report.ece_quality, QualityBand::Poor);
        assert_eq!(report.bins[9].count, 10);
        assert!((report.overall_accuracy - 0.5).abs() < 1e-12);
        assert!((report.mae - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_input_is_zero_report() {
        let report = analyze_calibration(&[], 10);
        assert_eq!(report.ece, 0.0);
        assert_eq!(report.mae, 0.0);
        assert_eq!(report.sample_count, 0);
        assert_eq!(report.bins.len(), 10);
        assert_eq!(calculate_ece(&[], 10), 0.0);
        assert_eq!(calculate_mae(&[]), 0.0);
    }

    #[test]
    fn test_bins_weighted_by_occupancy() {
        // bin 2: 3 × 0.25, one correct -> gap |0.25 - 1/3|
        // bin 7: 1 × 0.75, correct -> gap 0.25
        let set = preds(&[(0.25, true), (0.25, false), (0.25, false), (0.75, true)]);
        let expected = 0.75 * (0.25f64 - 1.0 / 3.0).abs() + 0.25 * 0.25;
        assert!((calculate_ece(&set, 10) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_predictions_skipped() {
        let mut set = preds(&[(1.0, true)]);
        set.push(Prediction::new(f64::NAN, false));
        assert_eq!(calculate_ece(&set, 10), 0.0);
        assert_eq!(analyze_calibration(&set, 10).sample_count, 1);
    }

    #[test]
    fn test_zero_bins_defaults() {
        let set = preds(&[(0.5, true)]);
        assert_eq!(analyze_calibration(&set, 0).bins.len(), DEFAULT_NUM_BINS);
    }

    #[test]
    fn test_quality_bands() {
        assert_eq!(evaluate_calibration_quality(0.05), QualityBand::Excellent);
        assert_eq!(evaluate_calibration_quality(0.08), QualityBand::Good);
        assert_eq!(evaluate_calibration_quality(0.15), QualityBand::Fair);
        assert_eq!(evaluate_calibration_quality(0.2), QualityBand::Poor);
        assert_eq!(evaluate_mae_quality(10.0), QualityBand::Excellent);
        assert_eq!(evaluate_mae_quality(15.0), QualityBand::Good);
        assert_eq!(evaluate_mae_quality(30.0), QualityBand::Fair);
        assert_eq!(evaluate_mae_quality(31.0), QualityBand::Poor);
    }

    #[test]
    fn test_under_confidence() {
        let set: Vec<Prediction> = (0..10).map(|_| Prediction::new(0.3, true)).collect();
        assert_eq!(analyze_calibration(&set, 10).bias, ConfidenceBias::UnderConfident);
    }
}
