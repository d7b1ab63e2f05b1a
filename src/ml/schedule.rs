//! Learning-rate schedules selected by name.
//!
//! The schedule is a multiplier on the base learning rate evaluated at the
//! global optimizer step (0-based), over `total_steps = epochs × batches`.
//! Warmup is supported but the trainer always uses zero warmup steps.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LrScheduleKind {
    /// Linear decay from the base rate to zero
    #[default]
    Linear,
    /// Half-cosine decay from the base rate to zero
    Cosine,
    /// Base rate throughout
    Constant,
}

impl fmt::Display for LrScheduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LrScheduleKind::Linear   => write!(f, "linear"),
            LrScheduleKind::Cosine   => write!(f, "cosine"),
            LrScheduleKind::Constant => write!(f, "constant"),
        }
    }
}

impl FromStr for LrScheduleKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linear"   => Ok(LrScheduleKind::Linear),
            "cosine"   => Ok(LrScheduleKind::Cosine),
            "constant" => Ok(LrScheduleKind::Constant),
            other      => anyhow::bail!("unknown scheduler '{other}' (expected linear, cosine or constant)"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LrSchedule {
    pub kind:         LrScheduleKind,
    pub base_lr:      f64,
    pub warmup_steps: usize,
    pub total_steps:  usize,
}

impl LrSchedule {
    pub fn new(kind: LrScheduleKind, base_lr: f64, warmup_steps: usize, total_steps: usize) -> Self {
        Self { kind, base_lr, warmup_steps, total_steps }
    }

    /// Learning rate used for the optimizer step `step` (0-based).
    pub fn lr_at(&self, step: usize) -> f64 {
        if self.warmup_steps > 0 && step < self.warmup_steps {
            return self.base_lr * step as f64 / self.warmup_steps as f64;
        }

        let decay_steps = self.total_steps.saturating_sub(self.warmup_steps).max(1);
        let progress = step.saturating_sub(self.warmup_steps) as f64 / decay_steps as f64;

        let factor = match self.kind {
            LrScheduleKind::Constant => 1.0,
            LrScheduleKind::Linear   => (1.0 - progress).max(0.0),
            LrScheduleKind::Cosine   => {
                (0.5 * (1.0 + (std::f64::consts::PI * progress.min(1.0)).cos())).max(0.0)
            }
        };
        self.base_lr * factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_linear_decays_to_zero() {
        let s = LrSchedule::new(LrScheduleKind::Linear, 1e-3, 0, 100);
        assert!(close(s.lr_at(0), 1e-3));
        assert!(close(s.lr_at(50), 5e-4));
        assert!(close(s.lr_at(99), 1e-5));
        assert!(close(s.lr_at(100), 0.0));
        assert!(close(s.lr_at(150), 0.0));
    }

    #[test]
    fn test_cosine_midpoint_is_half() {
        let s = LrSchedule::new(LrScheduleKind::Cosine, 2e-4, 0, 1000);
        assert!(close(s.lr_at(0), 2e-4));
        assert!(close(s.lr_at(500), 1e-4));
        assert!(s.lr_at(999) < 2e-4 * 0.01);
    }

    #[test]
    fn test_constant_ignores_progress() {
        let s = LrSchedule::new(LrScheduleKind::Constant, 0.01, 0, 10);
        assert!(close(s.lr_at(0), 0.01));
        assert!(close(s.lr_at(9), 0.01));
    }

    #[test]
    fn test_warmup_ramps_up_then_decays() {
        let s = LrSchedule::new(LrScheduleKind::Linear, 1.0, 10, 110);
        assert!(close(s.lr_at(0), 0.0));
        assert!(close(s.lr_at(5), 0.5));
        assert!(close(s.lr_at(10), 1.0));
        assert!(close(s.lr_at(60), 0.5));
    }

    #[test]
    fn test_zero_total_steps_does_not_divide_by_zero() {
        let s = LrSchedule::new(LrScheduleKind::Linear, 1.0, 0, 0);
        assert!(s.lr_at(0).is_finite());
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("Cosine".parse::<LrScheduleKind>().unwrap(), LrScheduleKind::Cosine);
        assert!("polynomial".parse::<LrScheduleKind>().is_err());
    }
}
