use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::anomaly::types::{Anomaly, AnomalyType, Severity, ValueUnit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternType {
    ActivityBurst,
    HighFailureRate,
    TokenConcentration,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        self.anomaly_type().as_str()
    }

    pub fn anomaly_type(&self) -> AnomalyType {
        match self {
            Self::ActivityBurst => AnomalyType::ActivityBurst,
            Self::HighFailureRate => AnomalyType::HighFailureRate,
            Self::TokenConcentration => AnomalyType::TokenConcentration,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "pattern", rename_all = "snake_case")]
pub enum PatternData {
    Burst {
        count: usize,
        window_ms: u64,
    },
    FailureRate {
        failed_count: usize,
        total_count: usize,
        /// Percentage of in-window transactions that failed.
        rate: f64,
    },
    Concentration {
        token: String,
        /// Dominant token's share of in-window activity, in percent.
        percentage: f64,
    },
}

/// A window-level signal over recent transaction history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pattern {
    pub kind: PatternType,
    pub severity: Severity,
    pub description: String,
    pub data: PatternData,
}

impl Pattern {
    /// Feed entry for a pattern that just appeared.
    pub fn to_anomaly(&self, now: DateTime<Utc>) -> Anomaly {
        let (title, value, unit, subject) = match &self.data {
            PatternData::Burst { count, .. } => {
                ("Activity Burst", *count as f64, ValueUnit::Count, String::new())
            }
            PatternData::FailureRate { rate, .. } => {
                ("High Failure Rate", *rate, ValueUnit::Percent, String::new())
            }
            PatternData::Concentration { token, percentage } => (
                "Token Concentration",
                *percentage,
                ValueUnit::Percent,
                token.clone(),
            ),
        };

        Anomaly {
            kind: self.kind.anomaly_type(),
            severity: self.severity,
            title: title.to_string(),
            message: self.description.clone(),
            details: format!("Window pattern {}", self.kind.as_str()),
            value,
            unit,
            subject,
            created_at: now,
        }
    }
}
