use super::SignalProbe;
use crate::error::{ProbeError, ProbeKind};
use crate::signals::{DnsSignals, ProbeReport};
use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::TokioAsyncResolver;
use std::time::Duration;

/// Why a single record lookup produced nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupFailure {
    /// The name exists but has no records of the requested type.
    NoRecords,
    NxDomain,
    Timeout,
    Other(String),
}

impl From<ResolveError> for LookupFailure {
    fn from(err: ResolveError) -> Self {
        match err.kind() {
            ResolveErrorKind::NoRecordsFound { response_code, .. }
                if *response_code == ResponseCode::NXDomain =>
            {
                LookupFailure::NxDomain
            }
            ResolveErrorKind::NoRecordsFound { .. } => LookupFailure::NoRecords,
            ResolveErrorKind::Timeout => LookupFailure::Timeout,
            _ => LookupFailure::Other(err.to_string()),
        }
    }
}

#[async_trait]
pub trait DnsLookup: Send + Sync {
    async fn mx_count(&self, domain: &str) -> Result<usize, LookupFailure>;
    async fn txt_records(&self, domain: &str) -> Result<Vec<String>, LookupFailure>;
}

/// `DnsLookup` backed by the system resolver configuration.
pub struct HickoryLookup {
    resolver: TokioAsyncResolver,
}

impl HickoryLookup {
    pub fn new(timeout: Duration) -> Self {
        let (config, mut opts) = match hickory_resolver::system_conf::read_system_conf() {
            Ok(conf) => conf,
            Err(e) => {
                log::warn!("Could not read system resolver config, using defaults: {e}");
                (ResolverConfig::default(), ResolverOpts::default())
            }
        };
        opts.timeout = timeout;
        opts.attempts = 1;

        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }
}

#[async_trait]
impl DnsLookup for HickoryLookup {
    async fn mx_count(&self, domain: &str) -> Result<usize, LookupFailure> {
        let response = self.resolver.mx_lookup(domain).await?;
        Ok(response.iter().count())
    }

    async fn txt_records(&self, domain: &str) -> Result<Vec<String>, LookupFailure> {
        let response = self.resolver.txt_lookup(domain).await?;
        Ok(response
            .iter()
            .map(|txt| {
                txt.txt_data()
                    .iter()
                    .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
                    .collect::<String>()
            })
            .collect())
    }
}

/// Derives `has_mx` and `has_spf` from MX and TXT lookups.
pub struct DnsProbe {
    lookup: Box<dyn DnsLookup>,
}

impl DnsProbe {
    pub fn new(timeout: Duration) -> Self {
        Self::with_lookup(Box::new(HickoryLookup::new(timeout)))
    }

    pub fn with_lookup(lookup: Box<dyn DnsLookup>) -> Self {
        Self { lookup }
    }

    async fn check_mx(&self, domain: &str) -> (bool, Option<ProbeError>) {
        match self.lookup.mx_count(domain).await {
            Ok(count) => {
                log::debug!("Found {count} MX records for {domain}");
                (count > 0, None)
            }
            Err(LookupFailure::NoRecords) => {
                log::debug!("No MX records for {domain}");
                (false, None)
            }
            Err(LookupFailure::NxDomain) => {
                log::warn!("NXDOMAIN for {domain}");
                (false, Some(ProbeError::DnsNxDomain))
            }
            Err(LookupFailure::Timeout) => {
                log::warn!("DNS timeout for {domain}");
                (false, Some(ProbeError::DnsTimeout))
            }
            Err(LookupFailure::Other(e)) => {
                log::error!("DNS error for {domain}: {e}");
                (false, Some(ProbeError::DnsFailure(e)))
            }
        }
    }

    /// TXT failures are logged only; the MX lookup already accounts for an
    /// unreachable or missing domain.
    async fn check_spf(&self, domain: &str) -> bool {
        match self.lookup.txt_records(domain).await {
            Ok(records) => {
                let has_spf = records
                    .iter()
                    .any(|record| record.to_lowercase().contains("v=spf1"));
                if has_spf {
                    log::debug!("Found SPF record for {domain}");
                }
                has_spf
            }
            Err(LookupFailure::NoRecords) | Err(LookupFailure::NxDomain) => {
                log::debug!("No SPF records for {domain}");
                false
            }
            Err(LookupFailure::Timeout) => {
                log::warn!("SPF lookup timeout for {domain}");
                false
            }
            Err(LookupFailure::Other(e)) => {
                log::error!("SPF lookup error for {domain}: {e}");
                false
            }
        }
    }
}

#[async_trait]
impl SignalProbe<DnsSignals> for DnsProbe {
    fn name(&self) -> &str {
        "dns"
    }

    fn kind(&self) -> ProbeKind {
        ProbeKind::Dns
    }

    async fn probe(&self, domain: &str) -> ProbeReport<DnsSignals> {
        let ((has_mx, mx_error), has_spf) =
            tokio::join!(self.check_mx(domain), self.check_spf(domain));

        ProbeReport {
            signals: DnsSignals { has_mx, has_spf },
            errors: mx_error.into_iter().collect(),
        }
    }
}
