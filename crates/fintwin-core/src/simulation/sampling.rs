use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use statrs::distribution::{Normal, Uniform};

use crate::calibration::stats::STD_FLOOR;
use crate::error::FinTwinError;
use crate::events::{CostDistribution, LifeEvent};
use crate::FinTwinResult;

/// Independent, reproducible generator for one iteration: stream `iteration` of `base_seed`.
pub fn iteration_rng(base_seed: u64, iteration: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(base_seed);
    rng.set_stream(iteration);
    rng
}

/// Fresh base seed when the caller supplies none.
pub fn entropy_seed() -> u64 {
    rand::thread_rng().gen()
}

fn checked(value: f64, context: &str) -> FinTwinResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FinTwinError::SamplingFailure {
            context: format!("{context}: drew {value}"),
        })
    }
}

fn floored_std(std_dev: f64) -> f64 {
    if std_dev.is_finite() && std_dev > STD_FLOOR {
        std_dev
    } else {
        STD_FLOOR
    }
}

/// Draw from `Normal(mean, std)`; degenerate spreads are floored, NaN is fatal.
pub fn sample_normal<R: Rng>(rng: &mut R, mean: f64, std_dev: f64, context: &str) -> FinTwinResult<f64> {
    let n = Normal::new(mean, floored_std(std_dev)).map_err(|e| FinTwinError::SamplingFailure {
        context: format!("{context}: invalid Normal({mean}, {std_dev}): {e}"),
    })?;
    checked(rng.sample(n), context)
}

/// Draw from the uniform with the given mean and standard deviation.
pub fn sample_uniform_matched<R: Rng>(
    rng: &mut R,
    mean: f64,
    std_dev: f64,
    context: &str,
) -> FinTwinResult<f64> {
    let half = floored_std(std_dev) * 3f64.sqrt();
    let u = Uniform::new(mean - half, mean + half).map_err(|e| FinTwinError::SamplingFailure {
        context: format!("{context}: invalid Uniform around {mean}: {e}"),
    })?;
    checked(rng.sample(u), context)
}

/// One month's cost of an event, following its cost shape. Not floored.
pub fn sample_event_cost<R: Rng>(rng: &mut R, event: &LifeEvent) -> FinTwinResult<f64> {
    match event.distribution {
        CostDistribution::Normal => sample_normal(rng, event.mean_cost(), event.std_cost(), &event.id),
        CostDistribution::Uniform => {
            sample_uniform_matched(rng, event.mean_cost(), event.std_cost(), &event.id)
        }
    }
}

/// Sort-and-index percentile: `sorted[min(n - 1, n * p / 100)]`.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let n = sorted.len();
    let idx = ((n as f64 * p / 100.0).floor() as usize).min(n - 1);
    sorted[idx]
}
