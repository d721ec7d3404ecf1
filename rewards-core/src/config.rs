//! Configuration for the rewards service

use serde::{Deserialize, Serialize};

/// Default OCR confidence a physical scan must exceed
pub const DEFAULT_OCR_CONFIDENCE_THRESHOLD: f64 = 0.9;

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Publishing key for the ledger client
    pub publishing_key: String,

    /// License key for the ledger client
    pub license_key: String,

    /// Scan key for the capture client
    pub scan_key: String,

    /// Intel (duplicate/fraud detection) key for the capture client
    pub intel_key: String,

    /// Scan configuration
    pub scan: ScanConfig,

    /// Consent configuration
    pub consent: ConsentConfig,

    /// Ledger configuration
    pub ledger: LedgerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "rewards-core".to_string(),
            publishing_key: String::new(),
            license_key: String::new(),
            scan_key: String::new(),
            intel_key: String::new(),
            scan: ScanConfig::default(),
            consent: ConsentConfig::default(),
            ledger: LedgerConfig::default(),
        }
    }
}

/// Scan configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Physical receipts at or below this confidence are dropped
    pub ocr_confidence_threshold: f64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            ocr_confidence_threshold: DEFAULT_OCR_CONFIDENCE_THRESHOLD,
        }
    }
}

/// Consent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsentConfig {
    /// License that proves the user opted into the rewards program
    pub license_id: String,

    /// Also require consent before issuing any payable
    pub enforce_on_payouts: bool,
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            license_id: "rewards-consent".to_string(),
            enforce_on_payouts: false,
        }
    }
}

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Currency payables are issued in
    pub currency: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse from a TOML document
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(key) = std::env::var("REWARDS_PUBLISHING_KEY") {
            config.publishing_key = key;
        }

        if let Ok(key) = std::env::var("REWARDS_LICENSE_KEY") {
            config.license_key = key;
        }

        if let Ok(key) = std::env::var("REWARDS_SCAN_KEY") {
            config.scan_key = key;
        }

        if let Ok(key) = std::env::var("REWARDS_INTEL_KEY") {
            config.intel_key = key;
        }

        if let Ok(threshold) = std::env::var("REWARDS_OCR_THRESHOLD") {
            config.scan.ocr_confidence_threshold = threshold.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid REWARDS_OCR_THRESHOLD: {}", e))
            })?;
        }

        if let Ok(license_id) = std::env::var("REWARDS_CONSENT_LICENSE_ID") {
            config.consent.license_id = license_id;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> crate::Result<()> {
        let threshold = self.scan.ocr_confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(crate::Error::Config(format!(
                "ocr_confidence_threshold must be within [0, 1], got {}",
                threshold
            )));
        }

        if self.consent.license_id.trim().is_empty() {
            return Err(crate::Error::Config(
                "consent.license_id must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
