use crate::config::{RiskThresholds, RiskWeights, Settings};
use crate::signals::SignalRecord;
use serde::{Deserialize, Serialize};

pub const MAX_SCORE: u32 = 100;

/// Keyword matches beyond this count add nothing to the score.
const KEYWORD_CAP: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Classification {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Classification::Low => "Low",
            Classification::Medium => "Medium",
            Classification::High => "High",
            Classification::Critical => "Critical",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub rule_name: String,
    pub triggered: bool,
    pub weight: i32,
    pub justification: String,
}

impl RuleOutcome {
    fn new(rule_name: &str, triggered: bool, weight: i32, justification: String) -> Self {
        Self {
            rule_name: rule_name.to_string(),
            triggered,
            weight,
            justification,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskResult {
    pub domain: String,
    pub score: u32,
    pub classification: Classification,
    pub triggered_rules: Vec<RuleOutcome>,
    pub signal_record: SignalRecord,
}

/// Pure, deterministic scoring of a signal record.
///
/// Assumes its weights and thresholds were validated when loaded; it does not
/// re-check them.
#[derive(Debug, Clone)]
pub struct RiskEngine {
    weights: RiskWeights,
    thresholds: RiskThresholds,
}

impl RiskEngine {
    pub fn new(weights: RiskWeights, thresholds: RiskThresholds) -> Self {
        Self {
            weights,
            thresholds,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.risk_weights.clone(), settings.risk_thresholds)
    }

    pub fn evaluate(&self, signal: &SignalRecord) -> RiskResult {
        let triggered_rules: Vec<RuleOutcome> = self
            .rule_outcomes(signal)
            .into_iter()
            .filter(|outcome| outcome.triggered)
            .collect();

        let total: i64 = triggered_rules.iter().map(|r| i64::from(r.weight)).sum();
        let score = total.clamp(0, i64::from(MAX_SCORE)) as u32;

        RiskResult {
            domain: signal.domain.clone(),
            score,
            classification: self.classify(score),
            triggered_rules,
            signal_record: signal.clone(),
        }
    }

    /// Every evaluated rule, triggered or not, in group order: age, DNS,
    /// TLS, behavioral, collector failures.
    pub fn rule_outcomes(&self, signal: &SignalRecord) -> Vec<RuleOutcome> {
        let mut outcomes = Vec::new();
        outcomes.extend(self.age_rules(signal));
        outcomes.extend(self.dns_rules(signal));
        outcomes.extend(self.tls_rules(signal));
        outcomes.extend(self.behavioral_rules(signal));
        outcomes.extend(self.failure_rules(signal));
        outcomes
    }

    pub fn classify(&self, score: u32) -> Classification {
        let score = i64::from(score);
        let t = &self.thresholds;
        if score >= i64::from(t.critical) {
            Classification::Critical
        } else if score >= i64::from(t.high) {
            Classification::High
        } else if score >= i64::from(t.medium) {
            Classification::Medium
        } else {
            Classification::Low
        }
    }

    fn age_rules(&self, signal: &SignalRecord) -> Vec<RuleOutcome> {
        let bands = [
            ("domain_age_very_new", 7, self.weights.domain_age_very_new),
            ("domain_age_new", 30, self.weights.domain_age_new),
            ("domain_age_recent", 90, self.weights.domain_age_recent),
        ];

        // Most specific band first; at most one fires.
        let fired = signal
            .age_days
            .and_then(|age| bands.iter().position(|(_, limit, _)| age < *limit));

        bands
            .iter()
            .enumerate()
            .map(|(i, (name, limit, weight))| {
                let justification = match signal.age_days {
                    Some(age) => format!("Domain registered {age} days ago (< {limit} days)"),
                    None => "Domain age unknown".to_string(),
                };
                RuleOutcome::new(name, fired == Some(i), *weight, justification)
            })
            .collect()
    }

    fn dns_rules(&self, signal: &SignalRecord) -> Vec<RuleOutcome> {
        vec![
            RuleOutcome::new(
                "no_mx_records",
                !signal.has_mx,
                self.weights.no_mx_records,
                "No MX records found (no email infrastructure)".to_string(),
            ),
            RuleOutcome::new(
                "no_spf_records",
                !signal.has_spf,
                self.weights.no_spf_records,
                "No SPF records found (no email authentication)".to_string(),
            ),
        ]
    }

    fn tls_rules(&self, signal: &SignalRecord) -> Vec<RuleOutcome> {
        vec![
            RuleOutcome::new(
                "ssl_invalid",
                !signal.ssl_valid,
                self.weights.ssl_invalid,
                "SSL certificate invalid or not present".to_string(),
            ),
            RuleOutcome::new(
                "ssl_self_signed",
                signal.is_self_signed,
                self.weights.ssl_self_signed,
                "SSL certificate is self-signed".to_string(),
            ),
        ]
    }

    fn behavioral_rules(&self, signal: &SignalRecord) -> Vec<RuleOutcome> {
        let keywords = &signal.triggered_keywords;
        let counted = keywords.len().min(KEYWORD_CAP);
        let keyword_weight = self.weights.suspicious_keyword.saturating_mul(counted.max(1) as i32);
        let keyword_justification = if keywords.is_empty() {
            "No suspicious keywords".to_string()
        } else {
            format!("Suspicious keywords: {}", keywords[..counted].join(", "))
        };

        vec![
            RuleOutcome::new(
                "risky_tld",
                signal.risky_tld,
                self.weights.risky_tld,
                "High-risk TLD detected".to_string(),
            ),
            RuleOutcome::new(
                "suspicious_keyword",
                counted > 0,
                keyword_weight,
                keyword_justification,
            ),
            RuleOutcome::new(
                "punycode_detected",
                signal.is_punycode,
                self.weights.punycode_detected,
                "Punycode detected (potential homograph attack)".to_string(),
            ),
        ]
    }

    /// Collector failures count against the domain: hostile infrastructure
    /// often resists enumeration. One outcome per matching error string.
    fn failure_rules(&self, signal: &SignalRecord) -> Vec<RuleOutcome> {
        let mut outcomes = Vec::new();
        let mut whois_fired = false;
        let mut dns_fired = false;

        for error in &signal.errors {
            let lower = error.to_lowercase();
            if lower.contains("whois") {
                whois_fired = true;
                outcomes.push(RuleOutcome::new(
                    "whois_lookup_failed",
                    true,
                    self.weights.whois_lookup_failed,
                    format!("WHOIS lookup failed or timed out: {error}"),
                ));
            } else if lower.contains("dns") {
                dns_fired = true;
                outcomes.push(RuleOutcome::new(
                    "dns_resolution_failed",
                    true,
                    self.weights.dns_resolution_failed,
                    format!("DNS resolution failed: {error}"),
                ));
            }
        }

        if !whois_fired {
            outcomes.push(RuleOutcome::new(
                "whois_lookup_failed",
                false,
                self.weights.whois_lookup_failed,
                "WHOIS lookup succeeded".to_string(),
            ));
        }
        if !dns_fired {
            outcomes.push(RuleOutcome::new(
                "dns_resolution_failed",
                false,
                self.weights.dns_resolution_failed,
                "DNS resolution succeeded".to_string(),
            ));
        }

        outcomes
    }
}
