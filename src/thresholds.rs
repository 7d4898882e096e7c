use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::metrics::{metric_kind, to_f64, MetricKind, MetricsSnapshot};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ThresholdError {
    #[error("unknown metric '{0}'")]
    UnknownMetric(String),
    #[error("cannot parse threshold '{expression}' on '{metric}': {reason}")]
    Parse {
        metric: String,
        expression: String,
        reason: String,
    },
    #[error("aggregation '{aggregation}' is not valid for {kind:?} metric '{metric}'")]
    IncompatibleAggregation {
        metric: String,
        aggregation: String,
        kind: MetricKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    Avg,
    Min,
    Max,
    Med,
    Percentile(f64),
    Rate,
    Count,
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Avg => write!(f, "avg"),
            Self::Min => write!(f, "min"),
            Self::Max => write!(f, "max"),
            Self::Med => write!(f, "med"),
            Self::Percentile(p) => write!(f, "p({p})"),
            Self::Rate => write!(f, "rate"),
            Self::Count => write!(f, "count"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Operator {
    fn apply(self, observed: f64, limit: f64) -> bool {
        match self {
            Self::Lt => observed < limit,
            Self::Le => observed <= limit,
            Self::Gt => observed > limit,
            Self::Ge => observed >= limit,
            Self::Eq => (observed - limit).abs() < f64::EPSILON,
            Self::Ne => (observed - limit).abs() >= f64::EPSILON,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub metric: String,
    pub source: String,
    pub aggregation: Aggregation,
    pub operator: Operator,
    pub limit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdOutcome {
    pub metric: String,
    pub source: String,
    /// `None` when the metric recorded no samples.
    pub observed: Option<f64>,
    pub passed: bool,
}

impl Threshold {
    pub fn parse(metric: &str, expression: &str) -> Result<Self, ThresholdError> {
        let kind = metric_kind(metric)
            .ok_or_else(|| ThresholdError::UnknownMetric(metric.to_string()))?;

        let parse_err = |reason: &str| ThresholdError::Parse {
            metric: metric.to_string(),
            expression: expression.to_string(),
            reason: reason.to_string(),
        };

        let compact: String = expression.chars().filter(|c| !c.is_whitespace()).collect();
        let op_start = compact
            .find(['<', '>', '=', '!'])
            .ok_or_else(|| parse_err("missing comparison operator"))?;
        let (lhs, rest) = compact.split_at(op_start);

        let (operator, value) = if let Some(v) = rest.strip_prefix("<=") {
            (Operator::Le, v)
        } else if let Some(v) = rest.strip_prefix(">=") {
            (Operator::Ge, v)
        } else if let Some(v) = rest.strip_prefix("==") {
            (Operator::Eq, v)
        } else if let Some(v) = rest.strip_prefix("!=") {
            (Operator::Ne, v)
        } else if let Some(v) = rest.strip_prefix('<') {
            (Operator::Lt, v)
        } else if let Some(v) = rest.strip_prefix('>') {
            (Operator::Gt, v)
        } else {
            return Err(parse_err("unknown comparison operator"));
        };

        let limit: f64 = value
            .parse()
            .map_err(|_| parse_err("threshold value is not a number"))?;

        let aggregation = match lhs {
            "avg" => Aggregation::Avg,
            "min" => Aggregation::Min,
            "max" => Aggregation::Max,
            "med" => Aggregation::Med,
            "rate" => Aggregation::Rate,
            "count" => Aggregation::Count,
            other => {
                let p = other
                    .strip_prefix("p(")
                    .and_then(|s| s.strip_suffix(')'))
                    .ok_or_else(|| parse_err("unknown aggregation"))?;
                let p: f64 = p
                    .parse()
                    .map_err(|_| parse_err("percentile is not a number"))?;
                if !(0.0..=100.0).contains(&p) {
                    return Err(parse_err("percentile must be between 0 and 100"));
                }
                Aggregation::Percentile(p)
            }
        };

        let compatible = match kind {
            MetricKind::Trend => !matches!(aggregation, Aggregation::Rate | Aggregation::Count),
            MetricKind::Rate => matches!(aggregation, Aggregation::Rate),
            MetricKind::Counter => matches!(aggregation, Aggregation::Count | Aggregation::Rate),
        };
        if !compatible {
            return Err(ThresholdError::IncompatibleAggregation {
                metric: metric.to_string(),
                aggregation: aggregation.to_string(),
                kind,
            });
        }

        Ok(Self {
            metric: metric.to_string(),
            source: expression.to_string(),
            aggregation,
            operator,
            limit,
        })
    }

    fn observe(&self, snapshot: &MetricsSnapshot) -> Option<f64> {
        if let Some(trend) = snapshot.trend(&self.metric) {
            if trend.is_empty() {
                return None;
            }
            return Some(match self.aggregation {
                Aggregation::Avg => trend.avg,
                Aggregation::Min => trend.min,
                Aggregation::Max => trend.max,
                Aggregation::Med => trend.med,
                Aggregation::Percentile(p) => trend.percentile(p),
                Aggregation::Rate | Aggregation::Count => return None,
            });
        }

        if let Some(rate) = snapshot.rate(&self.metric) {
            return (rate.total > 0).then_some(rate.rate);
        }

        let count = snapshot.counter(&self.metric)?;
        match self.aggregation {
            Aggregation::Count => Some(to_f64(count)),
            Aggregation::Rate => Some(snapshot.per_second(count)),
            _ => None,
        }
    }

    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> ThresholdOutcome {
        let observed = self.observe(snapshot);
        let passed = observed.map_or(true, |v| self.operator.apply(v, self.limit));
        ThresholdOutcome {
            metric: self.metric.clone(),
            source: self.source.clone(),
            observed,
            passed,
        }
    }
}

/// All thresholds of a run, in metric-name order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThresholdSet {
    thresholds: Vec<Threshold>,
}

impl ThresholdSet {
    pub fn from_config(config: &BTreeMap<String, Vec<String>>) -> Result<Self, ThresholdError> {
        let thresholds = config
            .iter()
            .flat_map(|(metric, exprs)| exprs.iter().map(move |e| Threshold::parse(metric, e)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { thresholds })
    }

    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> Vec<ThresholdOutcome> {
        self.thresholds.iter().map(|t| t.evaluate(snapshot)).collect()
    }

    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }
}
