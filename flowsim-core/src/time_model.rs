//! Time models: pure(ish) functions from an optional origin/target pair to a
//! duration. Every variant advances the same seeded [`crate::rng::SimRng`]
//! when it needs randomness, so the whole crate stays deterministic given a
//! seed (spec §3, §8 property 4).

use crate::distribution::{Distribution, DistributionKind};
use crate::location::{DistanceMetric, Location};
use crate::rng::SimRng;

pub type Time = u64;

/// A tagged variant over the four ways the source configuration can
/// describe "how long does this take" (spec §3, §6).
pub enum TimeModel {
    /// Draws from a distribution. `batch` pre-draws `batch` samples at once
    /// and serves them off an internal buffer — useful when a caller wants
    /// to inspect many draws without re-entering the RNG one at a time.
    Function { distribution: Box<dyn Distribution>, batch: usize, buffer: Vec<f64> },
    /// Cycles through a fixed list of samples, in order, wrapping around.
    Sample { values: Vec<f64>, cursor: usize },
    /// Travel time between two locations at a constant speed, plus a fixed
    /// reaction time. `speed == f64::INFINITY` collapses the distance term
    /// to zero (used to model an instantaneous, unconstrained transporter).
    Distance { metric: DistanceMetric, speed: f64, reaction_time: f64 },
    /// A fixed schedule of delays. `absolute` times are offsets from
    /// simulation zero rather than from the last sample; `cyclic` wraps the
    /// schedule around once exhausted, repeating with the same period.
    Scheduled { schedule: Vec<f64>, absolute: bool, cyclic: bool, cursor: usize },
}

impl TimeModel {
    pub fn function(kind: DistributionKind, parameters: &[f64], batch: usize) -> Self {
        TimeModel::Function {
            distribution: kind.build(parameters),
            batch: batch.max(1),
            buffer: Vec::new(),
        }
    }

    pub fn constant(value: f64) -> Self {
        TimeModel::function(DistributionKind::Constant, &[value], 1)
    }

    pub fn sample(values: Vec<f64>) -> Self {
        TimeModel::Sample { values, cursor: 0 }
    }

    pub fn distance(metric: DistanceMetric, speed: f64, reaction_time: f64) -> Self {
        TimeModel::Distance { metric, speed, reaction_time }
    }

    pub fn scheduled(schedule: Vec<f64>, absolute: bool, cyclic: bool) -> Self {
        TimeModel::Scheduled { schedule, absolute, cyclic, cursor: 0 }
    }

    /// A deterministic, RNG-free estimate of this model's typical duration.
    /// Used by the SPT policies to rank pending requests — policy ordering
    /// must be a pure function of configuration (spec §4.4, §4.5).
    pub fn expected_value(&self, origin: Option<Location>, target: Option<Location>) -> f64 {
        match self {
            TimeModel::Function { distribution, .. } => distribution.expected_value(),
            TimeModel::Sample { values, .. } => {
                if values.is_empty() {
                    0.0
                } else {
                    values.iter().sum::<f64>() / values.len() as f64
                }
            }
            TimeModel::Distance { metric, speed, reaction_time } => {
                let (origin, target) = match (origin, target) {
                    (Some(o), Some(t)) => (o, t),
                    _ => return *reaction_time,
                };
                let travel = if speed.is_infinite() || *speed <= 0.0 { 0.0 } else { metric.distance(origin, target) / *speed };
                reaction_time + travel
            }
            TimeModel::Scheduled { schedule, .. } => {
                if schedule.is_empty() {
                    0.0
                } else {
                    schedule.iter().sum::<f64>() / schedule.len() as f64
                }
            }
        }
    }

    /// Draw the next duration. `now` is needed by `Scheduled` (to turn an
    /// absolute timestamp into a relative delay); `origin`/`target` are
    /// needed by `Distance`.
    pub fn next(&mut self, rng: &mut SimRng, now: Time, origin: Option<Location>, target: Option<Location>) -> Time {
        match self {
            TimeModel::Function { distribution, batch, buffer } => {
                if buffer.is_empty() {
                    for _ in 0..*batch {
                        buffer.push(distribution.sample(rng));
                    }
                    buffer.reverse();
                }
                let value = buffer.pop().unwrap_or(0.0);
                value.round().max(0.0) as Time
            }
            TimeModel::Sample { values, cursor } => {
                if values.is_empty() {
                    return 0;
                }
                let value = values[*cursor % values.len()];
                *cursor += 1;
                value.round().max(0.0) as Time
            }
            TimeModel::Distance { metric, speed, reaction_time } => {
                let (origin, target) = match (origin, target) {
                    (Some(o), Some(t)) => (o, t),
                    _ => return reaction_time.round().max(0.0) as Time,
                };
                let travel = if speed.is_infinite() || *speed <= 0.0 {
                    0.0
                } else {
                    metric.distance(origin, target) / *speed
                };
                (*reaction_time + travel).round().max(0.0) as Time
            }
            TimeModel::Scheduled { schedule, absolute, cyclic, cursor } => {
                if schedule.is_empty() {
                    return 0;
                }
                if *cursor >= schedule.len() {
                    if *cyclic {
                        *cursor = 0;
                    } else {
                        return 0;
                    }
                }
                let period = if *absolute && *cyclic {
                    schedule.last().copied().unwrap_or(0.0)
                } else {
                    0.0
                };
                let laps = if *absolute {
                    (*cursor / schedule.len()) as f64 * period
                } else {
                    0.0
                };
                let raw = schedule[*cursor % schedule.len()] + laps;
                *cursor += 1;
                if *absolute {
                    (raw - now as f64).max(0.0).round() as Time
                } else {
                    raw.max(0.0).round() as Time
                }
            }
        }
    }
}

impl std::fmt::Debug for TimeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeModel::Function { batch, .. } => write!(f, "TimeModel::Function(batch={batch})"),
            TimeModel::Sample { values, .. } => write!(f, "TimeModel::Sample({} values)", values.len()),
            TimeModel::Distance { metric, speed, reaction_time } => {
                write!(f, "TimeModel::Distance({metric:?}, speed={speed}, reaction={reaction_time})")
            }
            TimeModel::Scheduled { schedule, absolute, cyclic, .. } => {
                write!(f, "TimeModel::Scheduled({} entries, absolute={absolute}, cyclic={cyclic})", schedule.len())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_model_is_stable() {
        let mut rng = SimRng::new(0);
        let mut tm = TimeModel::constant(5.0);
        assert_eq!(tm.next(&mut rng, 0, None, None), 5);
        assert_eq!(tm.next(&mut rng, 0, None, None), 5);
    }

    #[test]
    fn distance_model_infinite_speed_is_zero() {
        let mut rng = SimRng::new(0);
        let mut tm = TimeModel::distance(DistanceMetric::Manhattan, f64::INFINITY, 0.0);
        let d = tm.next(&mut rng, 0, Some(Location::new(0.0, 0.0)), Some(Location::new(5.0, 5.0)));
        assert_eq!(d, 0);
    }

    #[test]
    fn distance_model_respects_speed_and_reaction() {
        let mut rng = SimRng::new(0);
        let mut tm = TimeModel::distance(DistanceMetric::Manhattan, 1.0, 0.0);
        let d = tm.next(&mut rng, 0, Some(Location::new(0.0, 0.0)), Some(Location::new(5.0, 5.0)));
        assert_eq!(d, 10);
    }

    #[test]
    fn sample_model_cycles() {
        let mut rng = SimRng::new(0);
        let mut tm = TimeModel::sample(vec![1.0, 2.0, 3.0]);
        let observed: Vec<Time> = (0..5).map(|_| tm.next(&mut rng, 0, None, None)).collect();
        assert_eq!(observed, vec![1, 2, 3, 1, 2]);
    }
}
