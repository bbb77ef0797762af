use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub transaction_rules: TransactionRulesConfig,
    #[serde(default)]
    pub candle_rules: CandleRulesConfig,
    #[serde(default)]
    pub patterns: PatternConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

// ============================================================
// History & Feed Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    #[serde(default = "default_transaction_capacity")]
    pub transaction_capacity: usize,
    #[serde(default = "default_candle_capacity")]
    pub candle_capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            transaction_capacity: 100,
            candle_capacity: 50,
        }
    }
}

fn default_transaction_capacity() -> usize {
    100
}

fn default_candle_capacity() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    #[serde(default = "default_feed_capacity")]
    pub capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { capacity: 50 }
    }
}

fn default_feed_capacity() -> usize {
    50
}

// ============================================================
// Anomaly Rule Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct TransactionRulesConfig {
    #[serde(default = "default_large_transaction_threshold")]
    pub large_transaction_threshold: f64,
    /// Recent in-window transaction count above which a single event is
    /// tagged as part of an activity burst.
    #[serde(default = "default_activity_burst_threshold")]
    pub activity_burst_threshold: usize,
}

impl Default for TransactionRulesConfig {
    fn default() -> Self {
        Self {
            large_transaction_threshold: 1000.0,
            activity_burst_threshold: 3,
        }
    }
}

fn default_large_transaction_threshold() -> f64 {
    1000.0
}

fn default_activity_burst_threshold() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct CandleRulesConfig {
    #[serde(default = "default_min_history")]
    pub min_history: usize,
    #[serde(default = "default_price_spike_std_multiplier")]
    pub price_spike_std_multiplier: f64,
    #[serde(default = "default_price_spike_critical_multiplier")]
    pub price_spike_critical_multiplier: f64,
    #[serde(default = "default_volume_spike_ratio")]
    pub volume_spike_ratio: f64,
    #[serde(default = "default_volume_spike_critical_ratio")]
    pub volume_spike_critical_ratio: f64,
    #[serde(default = "default_volatility_multiplier")]
    pub volatility_multiplier: f64,
    /// Stand-in for a previous high/low spread of exactly zero.
    #[serde(default = "default_spread_epsilon")]
    pub spread_epsilon: f64,
}

impl Default for CandleRulesConfig {
    fn default() -> Self {
        Self {
            min_history: 3,
            price_spike_std_multiplier: 2.0,
            price_spike_critical_multiplier: 3.0,
            volume_spike_ratio: 2.0,
            volume_spike_critical_ratio: 5.0,
            volatility_multiplier: 3.0,
            spread_epsilon: 1e-5,
        }
    }
}

fn default_min_history() -> usize {
    3
}

fn default_price_spike_std_multiplier() -> f64 {
    2.0
}

fn default_price_spike_critical_multiplier() -> f64 {
    3.0
}

fn default_volume_spike_ratio() -> f64 {
    2.0
}

fn default_volume_spike_critical_ratio() -> f64 {
    5.0
}

fn default_volatility_multiplier() -> f64 {
    3.0
}

fn default_spread_epsilon() -> f64 {
    1e-5
}

// ============================================================
// Pattern Detection Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct PatternConfig {
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    #[serde(default = "default_burst_threshold")]
    pub burst_threshold: usize,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: f64,
    #[serde(default = "default_concentration_min_transactions")]
    pub concentration_min_transactions: usize,
    #[serde(default = "default_concentration_share")]
    pub concentration_share: f64,
    #[serde(default)]
    pub merge_into_feed: bool,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            burst_threshold: 5,
            failure_threshold: 0.5,
            concentration_min_transactions: 3,
            concentration_share: 0.7,
            merge_into_feed: false,
        }
    }
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_burst_threshold() -> usize {
    5
}

fn default_failure_threshold() -> f64 {
    0.5
}

fn default_concentration_min_transactions() -> usize {
    3
}

fn default_concentration_share() -> f64 {
    0.7
}

// ============================================================
// Stream Source Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default)]
    pub wallet_address: String,
    #[serde(default)]
    pub tokens: Vec<String>,
    /// JSON-lines file of raw wallet activity payloads to replay.
    pub transactions_path: Option<String>,
    /// JSON-lines file of raw OHLCV batch payloads to replay.
    pub candles_path: Option<String>,
    #[serde(default)]
    pub replay_delay_ms: u64,
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            wallet_address: String::new(),
            tokens: Vec::new(),
            transactions_path: None,
            candles_path: None,
            replay_delay_ms: 0,
            channel_buffer: 256,
        }
    }
}

fn default_channel_buffer() -> usize {
    256
}

// ============================================================
// API Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_api_port")]
    pub port: u16,
    #[serde(default = "default_api_host")]
    pub host: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_api_port() -> u16 {
    3000
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

impl Config {
    pub fn load(path: &str) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("Failed to read config file '{}': {}", path, e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| eyre::eyre!("Failed to parse config file '{}': {}", path, e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        if self.history.transaction_capacity == 0 || self.history.candle_capacity == 0 {
            return Err(eyre::eyre!("History capacities must be greater than zero"));
        }
        if self.feed.capacity == 0 {
            return Err(eyre::eyre!("Anomaly feed capacity must be greater than zero"));
        }
        if self.source.channel_buffer == 0 {
            return Err(eyre::eyre!("Source channel buffer must be greater than zero"));
        }

        let patterns = &self.patterns;
        if patterns.window_ms == 0 {
            return Err(eyre::eyre!("Pattern window must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&patterns.failure_threshold) {
            return Err(eyre::eyre!(
                "Failure threshold {} must be within [0, 1]",
                patterns.failure_threshold
            ));
        }
        if !(0.0..=1.0).contains(&patterns.concentration_share) {
            return Err(eyre::eyre!(
                "Concentration share {} must be within [0, 1]",
                patterns.concentration_share
            ));
        }

        let rules = &self.candle_rules;
        let multipliers = [
            ("price_spike_std_multiplier", rules.price_spike_std_multiplier),
            (
                "price_spike_critical_multiplier",
                rules.price_spike_critical_multiplier,
            ),
            ("volume_spike_ratio", rules.volume_spike_ratio),
            ("volume_spike_critical_ratio", rules.volume_spike_critical_ratio),
            ("volatility_multiplier", rules.volatility_multiplier),
            ("spread_epsilon", rules.spread_epsilon),
        ];
        for (name, value) in multipliers {
            if value.is_nan() || value <= 0.0 {
                return Err(eyre::eyre!("Candle rule '{}' must be positive, got {}", name, value));
            }
        }
        if rules.price_spike_critical_multiplier < rules.price_spike_std_multiplier {
            return Err(eyre::eyre!(
                "Critical price multiplier must not be below the spike multiplier"
            ));
        }
        if rules.volume_spike_critical_ratio < rules.volume_spike_ratio {
            return Err(eyre::eyre!(
                "Critical volume ratio must not be below the spike ratio"
            ));
        }

        let threshold = self.transaction_rules.large_transaction_threshold;
        if threshold.is_nan() || threshold < 0.0 {
            return Err(eyre::eyre!(
                "Large transaction threshold must be a non-negative number, got {}",
                threshold
            ));
        }

        Ok(())
    }
}
