pub mod naming;
pub mod rate;

pub use naming::{
    kind_of,
    normalize_component,
    Namer,
    ServerIdentity,
};
pub use rate::{
    Conversion,
    ConvertedBatch,
    CounterState,
    Observation,
    RateConverter,
};

use std::fmt;

/// Whether a value is a point-in-time reading or a total since server start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Gauge,
    Counter,
}

/// A named counter reading of one poll, before rate conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSample {
    pub path: String,
    pub value: u64,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    pub kind: MetricKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Integer(u64),
    Float(f64),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Integer(v) => write!(f, "{v}"),
            MetricValue::Float(v) => {
                let text = format!("{v:.6}");
                let text = text.trim_end_matches('0').trim_end_matches('.');
                f.write_str(if text.is_empty() || text == "-" { "0" } else { text })
            }
        }
    }
}

/// A value ready for the sink.
#[derive(Debug, Clone, PartialEq)]
pub struct Datapoint {
    pub path: String,
    pub value: MetricValue,
    pub timestamp: i64,
}

impl Datapoint {
    /// Carbon plaintext line: `<path> <value> <timestamp>\n`.
    pub fn to_line(&self) -> String {
        format!("{} {} {}\n", self.path, self.value, self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn float_values_drop_trailing_zeros() {
        assert_eq!(MetricValue::Float(2.5).to_string(), "2.5");
        assert_eq!(MetricValue::Float(3.0).to_string(), "3");
        assert_eq!(MetricValue::Float(0.0).to_string(), "0");
        assert_eq!(MetricValue::Float(1.0 / 3.0).to_string(), "0.333333");
        assert_eq!(MetricValue::Integer(50).to_string(), "50");
    }

    #[test]
    fn line_format() {
        let point = Datapoint {
            path: "stats.ns1.auth.opcode.query".to_string(),
            value: MetricValue::Integer(1000),
            timestamp: 1_700_000_000,
        };
        assert_eq!(point.to_line(), "stats.ns1.auth.opcode.query 1000 1700000000\n");
    }
}
