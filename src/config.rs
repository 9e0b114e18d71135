use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Score contribution of each rule. Every rule must be listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RiskWeights {
    pub domain_age_very_new: i32,
    pub domain_age_new: i32,
    pub domain_age_recent: i32,
    pub no_mx_records: i32,
    pub no_spf_records: i32,
    pub ssl_invalid: i32,
    pub ssl_self_signed: i32,
    pub risky_tld: i32,
    pub suspicious_keyword: i32,
    pub punycode_detected: i32,
    pub whois_lookup_failed: i32,
    pub dns_resolution_failed: i32,
}

impl RiskWeights {
    pub fn entries(&self) -> [(&'static str, i32); 12] {
        [
            ("domain_age_very_new", self.domain_age_very_new),
            ("domain_age_new", self.domain_age_new),
            ("domain_age_recent", self.domain_age_recent),
            ("no_mx_records", self.no_mx_records),
            ("no_spf_records", self.no_spf_records),
            ("ssl_invalid", self.ssl_invalid),
            ("ssl_self_signed", self.ssl_self_signed),
            ("risky_tld", self.risky_tld),
            ("suspicious_keyword", self.suspicious_keyword),
            ("punycode_detected", self.punycode_detected),
            ("whois_lookup_failed", self.whois_lookup_failed),
            ("dns_resolution_failed", self.dns_resolution_failed),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RiskThresholds {
    pub low: i32,
    pub medium: i32,
    pub high: i32,
    pub critical: i32,
}

/// Per-probe timeouts in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Timeouts {
    pub dns: u64,
    pub whois: u64,
    pub ssl: u64,
}

impl Timeouts {
    pub fn dns_duration(&self) -> Duration {
        Duration::from_secs(self.dns)
    }

    pub fn whois_duration(&self) -> Duration {
        Duration::from_secs(self.whois)
    }

    pub fn ssl_duration(&self) -> Duration {
        Duration::from_secs(self.ssl)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub risk_weights: RiskWeights,
    pub risk_thresholds: RiskThresholds,
    pub risky_tlds: Vec<String>,
    pub suspicious_keywords: Vec<String>,
    pub timeouts: Timeouts,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            risk_weights: RiskWeights {
                domain_age_very_new: 25,
                domain_age_new: 15,
                domain_age_recent: 8,
                no_mx_records: 15,
                no_spf_records: 10,
                ssl_invalid: 20,
                ssl_self_signed: 15,
                risky_tld: 20,
                suspicious_keyword: 15,
                punycode_detected: 25,
                whois_lookup_failed: 10,
                dns_resolution_failed: 10,
            },
            risk_thresholds: RiskThresholds {
                low: 10,
                medium: 30,
                high: 55,
                critical: 80,
            },
            risky_tlds: [
                ".tk", ".ml", ".ga", ".cf", ".gq", ".xyz", ".top", ".club", ".icu", ".work",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            suspicious_keywords: [
                "login", "signin", "account", "verify", "secure", "banking", "paypal", "amazon",
                "update", "confirm", "password", "wallet",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            timeouts: Timeouts {
                dns: 5,
                whois: 10,
                ssl: 10,
            },
        }
    }
}

impl Settings {
    /// Read, normalize and validate a YAML settings file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        log::debug!("Loading settings from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let mut settings: Settings = serde_yaml::from_str(content)?;
        settings.normalize();
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Lowercase the lexical lists, give every TLD a leading dot and drop
    /// blanks and repeats while keeping first-seen order.
    pub fn normalize(&mut self) {
        self.suspicious_keywords = dedup_lowercase(&self.suspicious_keywords, |kw| kw.to_string());
        self.risky_tlds = dedup_lowercase(&self.risky_tlds, |tld| {
            if tld.starts_with('.') {
                tld.to_string()
            } else {
                format!(".{tld}")
            }
        });
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (rule, value) in self.risk_weights.entries() {
            if value < 0 {
                return Err(ConfigError::NegativeWeight { rule, value });
            }
        }

        let t = &self.risk_thresholds;
        if !(t.low < t.medium && t.medium < t.high && t.high < t.critical) {
            return Err(ConfigError::UnorderedThresholds);
        }
        if t.critical > 100 {
            return Err(ConfigError::ThresholdAboveMaximum(t.critical));
        }

        for (probe, seconds) in [
            ("dns", self.timeouts.dns),
            ("whois", self.timeouts.whois),
            ("ssl", self.timeouts.ssl),
        ] {
            if seconds == 0 {
                return Err(ConfigError::ZeroTimeout(probe));
            }
        }

        Ok(())
    }
}

fn dedup_lowercase(items: &[String], shape: impl Fn(&str) -> String) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let item = item.trim().to_lowercase();
        if item.is_empty() {
            continue;
        }
        let item = shape(&item);
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
