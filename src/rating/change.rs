//! Period-over-period change analytics used by the relative ratings.

/// Stateless analytic comparing a past aggregate with a recent one.
pub trait ChangeAnalytic: Send + Sync {
    fn compute(&self, past: f64, recent: f64) -> f64;
}

/// Percentage change that degrades to `0.0` when the past value is zero.
///
/// Used for volatility, where a zero base is reported as "no change" rather
/// than an infinite emergence.
pub struct GuardedPercentChange;

impl ChangeAnalytic for GuardedPercentChange {
    fn compute(&self, past: f64, recent: f64) -> f64 {
        if past == 0.0 {
            return 0.0;
        }
        percent_change(past, recent)
    }
}

/// Plain IEEE percentage change; a zero past value yields `inf` or `NaN`.
///
/// Used for volume, which has no zero guard.
pub struct PercentChange;

impl ChangeAnalytic for PercentChange {
    fn compute(&self, past: f64, recent: f64) -> f64 {
        percent_change(past, recent)
    }
}

fn percent_change(past: f64, recent: f64) -> f64 {
    (recent - past) / past * 100.0
}
