use crate::config::{Settings, Timeouts};
use crate::error::ProbeError;
use crate::probes::{CertificateProbe, DnsProbe, LexicalAnalyzer, SignalProbe, WhoisProbe};
use crate::signals::{
    CertificateSignals, DnsSignals, LexicalSignals, ProbeReport, SignalRecord, WhoisSignals,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Runs the network probes concurrently, each under its own deadline, and
/// merges everything into one `SignalRecord`.
///
/// The probes run inside the caller's task (`tokio::join!`), so dropping the
/// `collect` future cancels all of them; nothing is spawned.
pub struct SignalCollector {
    dns: Arc<dyn SignalProbe<DnsSignals>>,
    whois: Arc<dyn SignalProbe<WhoisSignals>>,
    ssl: Arc<dyn SignalProbe<CertificateSignals>>,
    lexical: LexicalAnalyzer,
    timeouts: Timeouts,
}

impl SignalCollector {
    pub fn from_settings(settings: &Settings) -> Self {
        let timeouts = settings.timeouts;
        Self::new(
            Arc::new(DnsProbe::new(timeouts.dns_duration())),
            Arc::new(WhoisProbe::new(timeouts.whois_duration())),
            Arc::new(CertificateProbe::new(timeouts.ssl_duration())),
            LexicalAnalyzer::new(&settings.suspicious_keywords, &settings.risky_tlds),
            timeouts,
        )
    }

    pub fn new(
        dns: Arc<dyn SignalProbe<DnsSignals>>,
        whois: Arc<dyn SignalProbe<WhoisSignals>>,
        ssl: Arc<dyn SignalProbe<CertificateSignals>>,
        lexical: LexicalAnalyzer,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            dns,
            whois,
            ssl,
            lexical,
            timeouts,
        }
    }

    /// `domain` must already be validated.
    pub async fn collect(&self, domain: &str) -> SignalRecord {
        let lexical = self.lexical.analyze(domain);

        let (dns, whois, ssl) = tokio::join!(
            run_bounded(self.dns.as_ref(), domain, self.timeouts.dns_duration()),
            run_bounded(self.whois.as_ref(), domain, self.timeouts.whois_duration()),
            run_bounded(self.ssl.as_ref(), domain, self.timeouts.ssl_duration()),
        );

        merge(domain, dns, whois, ssl, lexical)
    }
}

/// A probe that overruns its deadline is cancelled and degrades to its
/// default signals plus a timeout error.
async fn run_bounded<T: Default>(
    probe: &dyn SignalProbe<T>,
    domain: &str,
    deadline: Duration,
) -> ProbeReport<T> {
    match timeout(deadline, probe.probe(domain)).await {
        Ok(report) => {
            if !report.errors.is_empty() {
                log::debug!("{} probe for {domain} reported {:?}", probe.name(), report.errors);
            }
            report
        }
        Err(_) => {
            log::warn!(
                "{} probe for {domain} exceeded {}s, using defaults",
                probe.name(),
                deadline.as_secs_f32()
            );
            ProbeReport::failed(probe.kind().timeout_error())
        }
    }
}

fn merge(
    domain: &str,
    dns: ProbeReport<DnsSignals>,
    whois: ProbeReport<WhoisSignals>,
    ssl: ProbeReport<CertificateSignals>,
    lexical: LexicalSignals,
) -> SignalRecord {
    let ProbeReport {
        signals: DnsSignals { has_mx, has_spf },
        errors: dns_errors,
    } = dns;
    let ProbeReport {
        signals: WhoisSignals { age_days },
        errors: whois_errors,
    } = whois;
    let ProbeReport {
        signals: CertificateSignals {
            ssl_valid,
            is_self_signed,
        },
        errors: ssl_errors,
    } = ssl;
    let LexicalSignals {
        triggered_keywords,
        risky_tld,
        is_punycode,
    } = lexical;

    let errors = dns_errors
        .iter()
        .chain(&whois_errors)
        .chain(&ssl_errors)
        .map(ProbeError::to_string)
        .collect();

    SignalRecord {
        domain: domain.to_string(),
        age_days,
        has_mx,
        has_spf,
        ssl_valid,
        is_self_signed,
        triggered_keywords,
        risky_tld,
        is_punycode,
        errors,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ProbeKind;
    use async_trait::async_trait;

    /// Probe double returning a fixed report after an optional delay.
    pub(crate) struct StaticProbe<T> {
        pub kind: ProbeKind,
        pub report: ProbeReport<T>,
        pub delay: Duration,
    }

    impl<T> StaticProbe<T> {
        pub fn new(kind: ProbeKind, report: ProbeReport<T>) -> Self {
            Self {
                kind,
                report,
                delay: Duration::ZERO,
            }
        }

        pub fn delayed(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl<T: Clone + Send + Sync + 'static> SignalProbe<T> for StaticProbe<T> {
        fn name(&self) -> &str {
            "static"
        }

        fn kind(&self) -> ProbeKind {
            self.kind
        }

        async fn probe(&self, _domain: &str) -> ProbeReport<T> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.report.clone()
        }
    }

    pub(crate) fn timeouts() -> Timeouts {
        Timeouts {
            dns: 5,
            whois: 10,
            ssl: 10,
        }
    }

    pub(crate) fn lexical() -> LexicalAnalyzer {
        let keywords = vec!["login".to_string(), "secure".to_string()];
        let tlds = vec![".tk".to_string()];
        LexicalAnalyzer::new(&keywords, &tlds)
    }

    pub(crate) fn healthy_collector() -> SignalCollector {
        SignalCollector::new(
            Arc::new(StaticProbe::new(
                ProbeKind::Dns,
                ProbeReport::ok(DnsSignals {
                    has_mx: true,
                    has_spf: true,
                }),
            )),
            Arc::new(StaticProbe::new(
                ProbeKind::Whois,
                ProbeReport::ok(WhoisSignals {
                    age_days: Some(5000),
                }),
            )),
            Arc::new(StaticProbe::new(
                ProbeKind::Ssl,
                ProbeReport::ok(CertificateSignals {
                    ssl_valid: true,
                    is_self_signed: false,
                }),
            )),
            lexical(),
            timeouts(),
        )
    }

    #[tokio::test]
    async fn test_merges_all_probe_fields() {
        let record = healthy_collector().collect("secure-login.tk").await;

        assert_eq!(record.domain, "secure-login.tk");
        assert_eq!(record.age_days, Some(5000));
        assert!(record.has_mx && record.has_spf);
        assert!(record.ssl_valid && !record.is_self_signed);
        assert_eq!(record.triggered_keywords, vec!["login", "secure"]);
        assert!(record.risky_tld);
        assert!(!record.is_punycode);
        assert!(record.errors.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_grouped_dns_whois_ssl() {
        // SSL finishes first, DNS last; order in the record must not follow completion.
        let collector = SignalCollector::new(
            Arc::new(
                StaticProbe::new(ProbeKind::Dns, ProbeReport::failed(ProbeError::DnsNxDomain))
                    .delayed(Duration::from_millis(30)),
            ),
            Arc::new(
                StaticProbe::new(
                    ProbeKind::Whois,
                    ProbeReport::failed(ProbeError::WhoisLookup("refused".to_string())),
                )
                .delayed(Duration::from_millis(20)),
            ),
            Arc::new(StaticProbe::new(
                ProbeKind::Ssl,
                ProbeReport::failed(ProbeError::SslDnsResolution),
            )),
            lexical(),
            timeouts(),
        );

        let record = collector.collect("example.com").await;
        assert_eq!(
            record.errors,
            vec![
                "DNS: Domain does not exist".to_string(),
                "WHOIS: Lookup failed (refused)".to_string(),
                "SSL: DNS resolution failed".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_probe_times_out_without_blocking_others() {
        let collector = SignalCollector::new(
            Arc::new(StaticProbe::new(
                ProbeKind::Dns,
                ProbeReport::ok(DnsSignals {
                    has_mx: true,
                    has_spf: true,
                }),
            )),
            Arc::new(
                StaticProbe::new(
                    ProbeKind::Whois,
                    ProbeReport::ok(WhoisSignals { age_days: Some(3) }),
                )
                .delayed(Duration::from_secs(3600)),
            ),
            Arc::new(StaticProbe::new(
                ProbeKind::Ssl,
                ProbeReport::ok(CertificateSignals {
                    ssl_valid: true,
                    is_self_signed: false,
                }),
            )),
            lexical(),
            timeouts(),
        );

        let started = tokio::time::Instant::now();
        let record = collector.collect("example.com").await;
        let elapsed = started.elapsed();

        assert_eq!(record.age_days, None);
        assert_eq!(record.errors, vec!["WHOIS: Lookup timeout".to_string()]);
        assert!(record.has_mx && record.ssl_valid);
        // Bounded by the whois deadline, not the probe's own delay.
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wall_clock_is_max_not_sum_of_timeouts() {
        let collector = SignalCollector::new(
            Arc::new(
                StaticProbe::new(ProbeKind::Dns, ProbeReport::ok(DnsSignals::default()))
                    .delayed(Duration::from_secs(600)),
            ),
            Arc::new(
                StaticProbe::new(ProbeKind::Whois, ProbeReport::ok(WhoisSignals::default()))
                    .delayed(Duration::from_secs(600)),
            ),
            Arc::new(
                StaticProbe::new(
                    ProbeKind::Ssl,
                    ProbeReport::ok(CertificateSignals::default()),
                )
                .delayed(Duration::from_secs(600)),
            ),
            lexical(),
            timeouts(),
        );

        let started = tokio::time::Instant::now();
        let record = collector.collect("example.com").await;
        let elapsed = started.elapsed();

        assert_eq!(
            record.errors,
            vec![
                "DNS: Query timeout".to_string(),
                "WHOIS: Lookup timeout".to_string(),
                "SSL: Connection timeout".to_string(),
            ]
        );
        assert!(elapsed < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn test_outer_deadline_cancels_collection() {
        let collector = SignalCollector::new(
            Arc::new(
                StaticProbe::new(ProbeKind::Dns, ProbeReport::ok(DnsSignals::default()))
                    .delayed(Duration::from_secs(600)),
            ),
            Arc::new(StaticProbe::new(
                ProbeKind::Whois,
                ProbeReport::ok(WhoisSignals::default()),
            )),
            Arc::new(StaticProbe::new(
                ProbeKind::Ssl,
                ProbeReport::ok(CertificateSignals::default()),
            )),
            lexical(),
            timeouts(),
        );

        let outcome = timeout(Duration::from_secs(1), collector.collect("example.com")).await;
        assert!(outcome.is_err());
    }
}
