#![allow(clippy::uninlined_format_args)]

use domain_risk::probes::{CertificateProbe, DnsProbe, SignalProbe, WhoisProbe};
use domain_risk::{DomainAnalyzer, Settings};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("Testing REAL network probes (no fakes)...");

    let dns = DnsProbe::new(Duration::from_secs(5));
    let whois = WhoisProbe::new(Duration::from_secs(10));
    let ssl = CertificateProbe::new(Duration::from_secs(10));

    let test_domains = vec![
        "google.com",
        "example.com",
        "github.com",
        "expired.badssl.com",
        "self-signed.badssl.com",
        "this-domain-should-not-exist-4821.com",
    ];

    for domain in &test_domains {
        println!("\n=== Probing: {} ===", domain);

        let report = dns.probe(domain).await;
        println!(
            "  DNS:   has_mx={} has_spf={} errors={:?}",
            report.signals.has_mx, report.signals.has_spf, report.errors
        );

        let report = whois.probe(domain).await;
        match report.signals.age_days {
            Some(days) => println!("  WHOIS: {} days old", days),
            None => println!("  WHOIS: age unknown, errors={:?}", report.errors),
        }

        let report = ssl.probe(domain).await;
        println!(
            "  SSL:   valid={} self_signed={} errors={:?}",
            report.signals.ssl_valid, report.signals.is_self_signed, report.errors
        );
    }

    println!("\n=== Full analysis ===");
    let analyzer = DomainAnalyzer::new(Settings::default())?;
    for domain in ["google.com", "secure-login-verify.tk"] {
        match analyzer.analyze(domain).await {
            Ok(result) => {
                println!(
                    "✅ {} → score {} ({})",
                    result.domain, result.score, result.classification
                );
                for rule in &result.triggered_rules {
                    println!("    +{} {}", rule.weight, rule.rule_name);
                }
            }
            Err(e) => println!("❌ {} → {}", domain, e),
        }
    }

    Ok(())
}
