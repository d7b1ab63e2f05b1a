// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one row per training epoch to `metrics.csv` in the
// run directory. The validation columns follow the problem
// type's metric names:
//
//   epoch,train_loss,val_f1,val_hamming,improved
//   1,0.693147,0.412000,0.288000,1
//   2,0.601250,0.398000,0.301000,0
//
// `improved` marks the epochs that produced a checkpoint.

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::ml::metrics::MetricMap;

pub const METRICS_FILE: &str = "metrics.csv";

/// One epoch's results
#[derive(Debug, Clone)]
pub struct EpochMetrics {
    /// Starts at 1
    pub epoch:       usize,
    pub train_loss:  f64,
    pub val_metrics: MetricMap,
    pub improved:    bool,
}

pub struct MetricsLogger {
    csv_path: PathBuf,
    columns:  Vec<String>,
}

impl MetricsLogger {
    /// Create `dir/metrics.csv` with a header for `metric_names`.
    pub fn new(dir: &Path, metric_names: &[&str]) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;

        let csv_path = dir.join(METRICS_FILE);
        let columns: Vec<String> = metric_names.iter().map(|s| s.to_string()).collect();

        let header: Vec<String> = std::iter::once("epoch".to_string())
            .chain(std::iter::once("train_loss".to_string()))
            .chain(columns.iter().map(|c| format!("val_{c}")))
            .chain(std::iter::once("improved".to_string()))
            .collect();

        let mut f = fs::File::create(&csv_path)
            .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
        writeln!(f, "{}", header.join(","))?;
        tracing::debug!("Created metrics CSV: '{}'", csv_path.display());

        Ok(Self { csv_path, columns })
    }

    /// Append one row. A metric missing from the map is written as NaN.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        let mut row = vec![m.epoch.to_string(), format!("{:.6}", m.train_loss)];
        row.extend(
            self.columns
                .iter()
                .map(|c| format!("{:.6}", m.val_metrics.get(c).copied().unwrap_or(f64::NAN))),
        );
        row.push(u8::from(m.improved).to_string());
        writeln!(f, "{}", row.join(","))?;

        tracing::debug!(epoch = m.epoch, train_loss = m.train_loss, "Logged epoch metrics");
        Ok(())
    }
}
