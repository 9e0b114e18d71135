pub mod certificate;
pub mod dns;
pub mod lexical;
pub mod whois;

use crate::error::ProbeKind;
use crate::signals::ProbeReport;
use async_trait::async_trait;

pub use certificate::CertificateProbe;
pub use dns::{DnsLookup, DnsProbe, HickoryLookup, LookupFailure};
pub use lexical::LexicalAnalyzer;
pub use whois::{TcpWhoisSource, WhoisProbe, WhoisSource};

/// A network collector contributing one group of fields to a signal record.
///
/// Implementations never fail outright: anything that goes wrong is reported
/// as a `ProbeError` alongside degraded signals.
#[async_trait]
pub trait SignalProbe<T>: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> ProbeKind;
    async fn probe(&self, domain: &str) -> ProbeReport<T>;
}
