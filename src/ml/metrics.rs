// ============================================================
// Layer 5 — Metric Computer
// ============================================================
// Scores a whole partition from the concatenated logits and
// label rows. One strategy per problem type:
//
//   multi-label   sigmoid → p > threshold → weighted F1, Hamming
//   single-label  arg-max per row         → weighted F1, accuracy
//
// Weighted F1 is the per-class F1 averaged with the class
// support (number of true occurrences) as weight:
//   F1_c = 2·tp / (2·tp + fp + fn)
// A class with an empty denominator scores `zero_division`
// (1 for multi-label, 0 for single-label).
//
// The threshold comparison here is strict. Prediction for a
// single text (Evaluator::prediction) is inclusive.

use std::collections::BTreeMap;

use anyhow::Result;
use burn::{prelude::*, tensor::activation::sigmoid};

use crate::domain::problem::ProblemType;

/// Metric name → value, e.g. {"f1": 0.83, "hamming": 0.07}
pub type MetricMap = BTreeMap<String, f64>;

pub const F1: &str = "f1";
pub const HAMMING: &str = "hamming";
pub const ACCURACY: &str = "accuracy";

pub trait MetricStrategy {
    /// True when logits go through a sigmoid before `score`
    fn wants_probabilities(&self) -> bool;

    /// Score row-major `outputs` and `labels`, both N × `num_classes`
    fn score(&self, outputs: &[f32], labels: &[f32], num_classes: usize) -> MetricMap;
}

pub fn strategy_for(problem: ProblemType, threshold: f64) -> Box<dyn MetricStrategy> {
    match problem {
        ProblemType::MultiLabel  => Box::new(MultiLabelMetrics { threshold }),
        ProblemType::SingleLabel => Box::new(SingleLabelMetrics),
    }
}

/// Score logits [N, C] against labels [N, C].
pub fn compute_metrics<B: Backend>(
    logits:    Tensor<B, 2>,
    labels:    Tensor<B, 2>,
    problem:   ProblemType,
    threshold: f64,
) -> Result<MetricMap> {
    let strategy = strategy_for(problem, threshold);
    let [_, num_classes] = logits.dims();

    let outputs = if strategy.wants_probabilities() { sigmoid(logits) } else { logits };

    let outputs: Vec<f32> = outputs
        .into_data()
        .to_vec()
        .map_err(|e| anyhow::anyhow!("Cannot read model outputs: {e:?}"))?;
    let labels: Vec<f32> = labels
        .into_data()
        .to_vec()
        .map_err(|e| anyhow::anyhow!("Cannot read labels: {e:?}"))?;

    Ok(strategy.score(&outputs, &labels, num_classes))
}

// ─── Multi-label ──────────────────────────────────────────────────────────────

pub struct MultiLabelMetrics {
    pub threshold: f64,
}

impl MetricStrategy for MultiLabelMetrics {
    fn wants_probabilities(&self) -> bool {
        true
    }

    fn score(&self, probs: &[f32], labels: &[f32], num_classes: usize) -> MetricMap {
        let y_pred: Vec<bool> = probs.iter().map(|&p| p as f64 > self.threshold).collect();
        let y_true: Vec<bool> = labels.iter().map(|&l| l > 0.5).collect();

        let mut counts = vec![ClassCounts::default(); num_classes];
        let mut mismatches = 0usize;
        for (i, (&t, &p)) in y_true.iter().zip(&y_pred).enumerate() {
            let c = &mut counts[i % num_classes.max(1)];
            match (t, p) {
                (true, true)   => c.tp += 1,
                (false, true)  => { c.fp += 1; mismatches += 1 }
                (true, false)  => { c.fn_ += 1; mismatches += 1 }
                (false, false) => {}
            }
        }

        let hamming = if y_true.is_empty() { 0.0 } else { mismatches as f64 / y_true.len() as f64 };

        let mut m = MetricMap::new();
        m.insert(F1.into(), weighted_f1(&counts, 1.0));
        m.insert(HAMMING.into(), hamming);
        m
    }
}

// ─── Single-label ─────────────────────────────────────────────────────────────

pub struct SingleLabelMetrics;

impl MetricStrategy for SingleLabelMetrics {
    fn wants_probabilities(&self) -> bool {
        false
    }

    fn score(&self, logits: &[f32], labels: &[f32], num_classes: usize) -> MetricMap {
        let width  = num_classes.max(1);
        let y_pred: Vec<usize> = logits.chunks(width).map(argmax).collect();
        let y_true: Vec<usize> = labels.chunks(width).map(argmax).collect();

        let mut counts = vec![ClassCounts::default(); width];
        let mut present = vec![false; width];
        let mut correct = 0usize;
        for (&t, &p) in y_true.iter().zip(&y_pred) {
            present[t] = true;
            present[p] = true;
            if t == p {
                counts[t].tp += 1;
                correct += 1;
            } else {
                counts[t].fn_ += 1;
                counts[p].fp += 1;
            }
        }

        // Only classes seen in y_true ∪ y_pred take part
        let counts: Vec<ClassCounts> = counts
            .into_iter()
            .zip(&present)
            .filter_map(|(c, &seen)| seen.then_some(c))
            .collect();

        let accuracy = if y_true.is_empty() { 0.0 } else { correct as f64 / y_true.len() as f64 };

        let mut m = MetricMap::new();
        m.insert(F1.into(), weighted_f1(&counts, 0.0));
        m.insert(ACCURACY.into(), accuracy);
        m
    }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
struct ClassCounts {
    tp:  usize,
    fp:  usize,
    fn_: usize,
}

impl ClassCounts {
    fn support(&self) -> usize {
        self.tp + self.fn_
    }

    fn f1(&self, zero_division: f64) -> f64 {
        let denom = 2 * self.tp + self.fp + self.fn_;
        if denom == 0 { zero_division } else { 2.0 * self.tp as f64 / denom as f64 }
    }
}

fn weighted_f1(counts: &[ClassCounts], zero_division: f64) -> f64 {
    let total: usize = counts.iter().map(ClassCounts::support).sum();
    if total == 0 {
        return zero_division;
    }
    counts
        .iter()
        .map(|c| c.f1(zero_division) * c.support() as f64)
        .sum::<f64>()
        / total as f64
}

/// Index of the first maximum
fn argmax(row: &[f32]) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) })
        .0
}
