use thiserror::Error;

/// The only failure an analysis call surfaces to its caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Weight {rule} cannot be negative: {value}")]
    NegativeWeight { rule: &'static str, value: i32 },
    #[error("Risk thresholds must be in ascending order (low < medium < high < critical)")]
    UnorderedThresholds,
    #[error("Critical threshold cannot exceed 100: {0}")]
    ThresholdAboveMaximum(i32),
    #[error("Timeout for {0} must be greater than zero")]
    ZeroTimeout(&'static str),
}

/// Which collector a probe failure belongs to. The declaration order is the
/// order errors appear in a signal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProbeKind {
    Dns,
    Whois,
    Ssl,
}

impl ProbeKind {
    pub fn timeout_error(self) -> ProbeError {
        match self {
            ProbeKind::Dns => ProbeError::DnsTimeout,
            ProbeKind::Whois => ProbeError::WhoisTimeout,
            ProbeKind::Ssl => ProbeError::SslTimeout,
        }
    }
}

/// Every failure a network probe can report. The display text is what lands
/// in `SignalRecord::errors`, so the probe tag prefix must stay stable: the
/// risk engine keys its failure rules off it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("DNS: Domain does not exist")]
    DnsNxDomain,
    #[error("DNS: Query timeout")]
    DnsTimeout,
    #[error("DNS: {0}")]
    DnsFailure(String),

    #[error("WHOIS: Lookup timeout")]
    WhoisTimeout,
    #[error("WHOIS: Lookup failed ({0})")]
    WhoisLookup(String),
    #[error("WHOIS: Parsing error ({0})")]
    WhoisParse(String),

    #[error("SSL: Connection timeout")]
    SslTimeout,
    #[error("SSL: DNS resolution failed")]
    SslDnsResolution,
    #[error("SSL: {0}")]
    SslFailure(String),
}
