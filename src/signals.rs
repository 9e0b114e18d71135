use crate::error::ProbeError;
use serde::{Deserialize, Serialize};

/// Merged evidence for one domain at one point in time. Built once by the
/// collector and only read afterwards.
///
/// Booleans default to `false` when a probe could not determine them; the
/// engine treats missing evidence as a negative signal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub domain: String,
    pub age_days: Option<u32>,
    pub has_mx: bool,
    pub has_spf: bool,
    pub ssl_valid: bool,
    pub is_self_signed: bool,
    pub triggered_keywords: Vec<String>,
    pub risky_tld: bool,
    pub is_punycode: bool,
    pub errors: Vec<String>,
}

/// What a single probe hands back: its signal fields (possibly degraded to
/// defaults) and whatever failures it hit on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeReport<T> {
    pub signals: T,
    pub errors: Vec<ProbeError>,
}

impl<T> ProbeReport<T> {
    pub fn ok(signals: T) -> Self {
        Self {
            signals,
            errors: Vec::new(),
        }
    }

    pub fn with_error(signals: T, error: ProbeError) -> Self {
        Self {
            signals,
            errors: vec![error],
        }
    }
}

impl<T: Default> ProbeReport<T> {
    pub fn failed(error: ProbeError) -> Self {
        Self::with_error(T::default(), error)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DnsSignals {
    pub has_mx: bool,
    pub has_spf: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WhoisSignals {
    pub age_days: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CertificateSignals {
    pub ssl_valid: bool,
    pub is_self_signed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LexicalSignals {
    pub triggered_keywords: Vec<String>,
    pub risky_tld: bool,
    pub is_punycode: bool,
}
