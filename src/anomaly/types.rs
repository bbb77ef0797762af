use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Types of anomalies the engine can detect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyType {
    // Candle rules
    PriceSpike,
    VolumeSpike,
    HighVolatility,
    // Transaction rules
    LargeTransaction,
    FailedTransaction,
    ActivityBurst,
    // Window patterns, only present when merged into the feed
    HighFailureRate,
    TokenConcentration,
}

impl AnomalyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PriceSpike => "PRICE_SPIKE",
            Self::VolumeSpike => "VOLUME_SPIKE",
            Self::HighVolatility => "HIGH_VOLATILITY",
            Self::LargeTransaction => "LARGE_TRANSACTION",
            Self::FailedTransaction => "FAILED_TRANSACTION",
            Self::ActivityBurst => "ACTIVITY_BURST",
            Self::HighFailureRate => "HIGH_FAILURE_RATE",
            Self::TokenConcentration => "TOKEN_CONCENTRATION",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PRICE_SPIKE" => Some(Self::PriceSpike),
            "VOLUME_SPIKE" => Some(Self::VolumeSpike),
            "HIGH_VOLATILITY" => Some(Self::HighVolatility),
            "LARGE_TRANSACTION" => Some(Self::LargeTransaction),
            "FAILED_TRANSACTION" => Some(Self::FailedTransaction),
            "ACTIVITY_BURST" => Some(Self::ActivityBurst),
            "HIGH_FAILURE_RATE" => Some(Self::HighFailureRate),
            "TOKEN_CONCENTRATION" => Some(Self::TokenConcentration),
            _ => None,
        }
    }
}

/// Single ordered severity scale shared by every rule.
///
/// Wallet rules historically spoke `info`/`warning`/`error` while candle
/// rules spoke `MEDIUM`/`HIGH`/`CRITICAL`. Both map onto this scale:
/// `info` → Info, `warning` and `MEDIUM` → Warning, `HIGH` → High,
/// `error` and `CRITICAL` → Critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Accepts either vocabulary.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Some(Self::Info),
            "warning" | "medium" => Some(Self::Warning),
            "high" => Some(Self::High),
            "critical" | "error" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// How an anomaly's numeric `value` should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueUnit {
    Percent,
    Ratio,
    Count,
    Amount,
}

/// A detected anomaly, ready for the feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub kind: AnomalyType,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub details: String,
    pub value: f64,
    pub unit: ValueUnit,
    /// Token symbol for candle anomalies, tx hash or token for wallet ones.
    pub subject: String,
    pub created_at: DateTime<Utc>,
}

impl Anomaly {
    pub fn display_value(&self) -> String {
        match self.unit {
            ValueUnit::Percent => format!("{:.2}%", self.value),
            ValueUnit::Ratio => format!("{:.2}x", self.value),
            ValueUnit::Count => format!("{:.0}", self.value),
            ValueUnit::Amount => format!("{:.2}", self.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_severity_vocabulary_mapping() {
        assert_eq!(Severity::parse("warning"), Some(Severity::Warning));
        assert_eq!(Severity::parse("MEDIUM"), Some(Severity::Warning));
        assert_eq!(Severity::parse("HIGH"), Some(Severity::High));
        assert_eq!(Severity::parse("error"), Some(Severity::Critical));
        assert_eq!(Severity::parse("CRITICAL"), Some(Severity::Critical));
        assert_eq!(Severity::parse("bogus"), None);
    }

    #[test]
    fn test_anomaly_type_round_trips_name() {
        for kind in [
            AnomalyType::PriceSpike,
            AnomalyType::VolumeSpike,
            AnomalyType::HighVolatility,
            AnomalyType::LargeTransaction,
            AnomalyType::FailedTransaction,
            AnomalyType::ActivityBurst,
            AnomalyType::HighFailureRate,
            AnomalyType::TokenConcentration,
        ] {
            assert_eq!(AnomalyType::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_display_value() {
        let anomaly = Anomaly {
            kind: AnomalyType::VolumeSpike,
            severity: Severity::High,
            title: String::new(),
            message: String::new(),
            details: String::new(),
            value: 2.5,
            unit: ValueUnit::Ratio,
            subject: "SOL".to_string(),
            created_at: Utc::now(),
        };
        assert_eq!(anomaly.display_value(), "2.50x");

        let pct = Anomaly { value: -12.346, unit: ValueUnit::Percent, ..anomaly };
        assert_eq!(pct.display_value(), "-12.35%");
    }
}
