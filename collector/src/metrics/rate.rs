//! Counter to delta/rate conversion.
//!
//! [`RateConverter::convert`] never touches [`CounterState`]; it returns the
//! [`Observation`] that should be recorded, and the cycle commits those only
//! once the batch has been handed to the sink. A failed cycle therefore leaves
//! the previous samples in place and the next good cycle covers the gap.

use super::{
    Datapoint,
    MetricKind,
    MetricSample,
    MetricValue,
};
use bindstats_config::{
    DeriveMode,
    FirstSample,
};
use std::collections::HashMap;

/// A counter reading to remember for the next cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub path: String,
    pub value: u64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Previous {
    value: u64,
    timestamp: i64,
}

/// Last value and timestamp per counter path, owned by the scheduler.
#[derive(Debug, Default)]
pub struct CounterState {
    counters: HashMap<String, Previous>,
    last_update: Option<i64>,
}

impl CounterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous(&self, path: &str) -> Option<(u64, i64)> {
        self.counters.get(path).map(|p| (p.value, p.timestamp))
    }

    /// Once a path has been recorded it stays a counter for good.
    pub fn is_counter(&self, path: &str) -> bool {
        self.counters.contains_key(path)
    }

    pub fn commit(&mut self, observations: impl IntoIterator<Item = Observation>) {
        for observation in observations {
            self.last_update = Some(self.last_update.map_or(observation.timestamp, |t| t.max(observation.timestamp)));
            self.counters.insert(
                observation.path,
                Previous {
                    value: observation.value,
                    timestamp: observation.timestamp,
                },
            );
        }
    }

    /// Timestamp of the newest committed observation.
    pub fn last_update(&self) -> Option<i64> {
        self.last_update
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub value: Option<MetricValue>,
    pub observation: Option<Observation>,
}

/// Datapoints of one cycle plus the counter state they imply.
#[derive(Debug, Default)]
pub struct ConvertedBatch {
    pub datapoints: Vec<Datapoint>,
    pub observations: Vec<Observation>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RateConverter {
    mode: DeriveMode,
    first_sample: FirstSample,
}

impl RateConverter {
    pub fn new(mode: DeriveMode, first_sample: FirstSample) -> Self {
        Self { mode, first_sample }
    }

    pub fn convert(&self, sample: &MetricSample, state: &CounterState) -> Conversion {
        let is_counter = sample.kind == MetricKind::Counter || state.is_counter(&sample.path);
        if !is_counter || self.mode == DeriveMode::Absolute {
            return Conversion {
                value: Some(MetricValue::Integer(sample.value)),
                observation: None,
            };
        }

        let observation = Observation {
            path: sample.path.clone(),
            value: sample.value,
            timestamp: sample.timestamp,
        };
        let Some((previous, previous_ts)) = state.previous(&sample.path) else {
            let value = match (self.first_sample, self.mode) {
                (FirstSample::Suppress, _) => None,
                (FirstSample::Zero, DeriveMode::Rate) => Some(MetricValue::Float(0.0)),
                (FirstSample::Zero, _) => Some(MetricValue::Integer(0)),
                // No rate without two samples.
                (FirstSample::Emit, DeriveMode::Rate) => None,
                (FirstSample::Emit, _) => Some(MetricValue::Integer(sample.value)),
            };
            return Conversion {
                value,
                observation: Some(observation),
            };
        };

        let delta = if sample.value >= previous {
            sample.value - previous
        } else {
            trace!(path = %sample.path, previous, current = sample.value, "Counter reset");
            sample.value
        };

        match self.mode {
            DeriveMode::Rate => {
                let elapsed = sample.timestamp - previous_ts;
                if elapsed <= 0 {
                    // Keep the older sample so the next cycle has a usable interval.
                    return Conversion {
                        value: None,
                        observation: None,
                    };
                }
                Conversion {
                    value: Some(MetricValue::Float(delta as f64 / elapsed as f64)),
                    observation: Some(observation),
                }
            }
            _ => Conversion {
                value: Some(MetricValue::Integer(delta)),
                observation: Some(observation),
            },
        }
    }

    pub fn convert_all(&self, samples: &[MetricSample], state: &CounterState) -> ConvertedBatch {
        let mut batch = ConvertedBatch::default();
        for sample in samples {
            let Conversion { value, observation } = self.convert(sample, state);
            if let Some(value) = value {
                batch.datapoints.push(Datapoint {
                    path: sample.path.clone(),
                    value,
                    timestamp: sample.timestamp,
                });
            }
            batch.observations.extend(observation);
        }
        batch
    }
}
