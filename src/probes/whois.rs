use super::SignalProbe;
use crate::error::{ProbeError, ProbeKind};
use crate::signals::{ProbeReport, WhoisSignals};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use std::time::Duration;

const WHOIS_PORT: u16 = 43;
const IANA_WHOIS: &str = "whois.iana.org";
const INTERNIC_WHOIS: &str = "whois.internic.net";
const MAX_SERVER_HOPS: u32 = 3;

const TWO_PART_SUFFIXES: [&str; 17] = [
    "co.uk", "com.au", "co.jp", "co.kr", "com.br", "co.za", "com.mx", "co.in", "com.sg", "co.nz",
    "com.ar", "co.il", "org.uk", "net.au", "gov.uk", "ac.uk", "edu.au",
];

lazy_static! {
    // More specific labels first so "Registered on: <date>" is not swallowed
    // by the bare "registered" pattern.
    static ref CREATION_PATTERNS: Vec<Regex> = [
        r"(?i)creation\s*date[:\s]+([^\r\n]+)",
        r"(?i)registration\s*date[:\s]+([^\r\n]+)",
        r"(?i)registration\s*time[:\s]+([^\r\n]+)",
        r"(?i)created\s*on[:\s]+([^\r\n]+)",
        r"(?i)registered\s*on[:\s]+([^\r\n]+)",
        r"(?i)domain\s*created[:\s]+([^\r\n]+)",
        r"(?i)create[d_]*\s*date[:\s]+([^\r\n]+)",
        r"(?i)created[:\s]+([^\r\n]+)",
        r"(?i)registered[:\s]+([^\r\n]+)",
        r"(?i)fecha\s*de\s*creaci[oó]n[:\s]+([^\r\n]+)",
        r"(?i)date\s*de\s*cr[eé]ation[:\s]+([^\r\n]+)",
        r"(?i)erstellt\s*am[:\s]+([^\r\n]+)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect();

    static ref REFER_PATTERN: Regex = Regex::new(r"(?im)^\s*(?:refer|whois):\s*(\S+)").unwrap();
    static ref IANA_MARKER: Regex =
        Regex::new(r"(?im)^%\s*IANA WHOIS server|^\s*source:\s*IANA\s*$").unwrap();
}

/// Registrable part of a domain, e.g. `mail.example.co.uk` -> `example.co.uk`.
pub fn extract_root_domain(domain: &str) -> String {
    let parts: Vec<&str> = domain.split('.').collect();
    if parts.len() < 2 {
        return domain.to_string();
    }

    let n = parts.len();
    let suffix = format!("{}.{}", parts[n - 2], parts[n - 1]);
    if n >= 3 && TWO_PART_SUFFIXES.contains(&suffix.as_str()) {
        return format!("{}.{}", parts[n - 3], suffix);
    }
    suffix
}

fn whois_server_for(tld: &str) -> Option<&'static str> {
    let server = match tld {
        "com" | "net" => "whois.verisign-grs.com",
        "org" => "whois.pir.org",
        "info" => "whois.afilias.net",
        "biz" => "whois.nic.biz",
        "us" => "whois.nic.us",
        "uk" => "whois.nic.uk",
        "de" => "whois.denic.de",
        "fr" => "whois.nic.fr",
        "it" => "whois.nic.it",
        "nl" => "whois.domain-registry.nl",
        "au" => "whois.auda.org.au",
        "ca" => "whois.cira.ca",
        "jp" => "whois.jprs.jp",
        "cn" => "whois.cnnic.cn",
        "ru" => "whois.tcinet.ru",
        "br" => "whois.registro.br",
        "mx" => "whois.mx",
        "io" => "whois.nic.io",
        "xyz" => "whois.nic.xyz",
        "top" => "whois.nic.top",
        "tk" => "whois.dot.tk",
        "ml" => "whois.dot.ml",
        "ga" => "whois.dot.ga",
        "cf" => "whois.dot.cf",
        _ => return None,
    };
    Some(server)
}

/// Authoritative server named in an IANA (or thin registry) response.
pub fn referral_server(response: &str) -> Option<String> {
    REFER_PATTERN
        .captures(response)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().trim_end_matches('.').to_lowercase())
}

/// Find and parse the registration date in a raw WHOIS response. The first
/// recognised creation line wins when a registry lists several.
pub fn parse_creation_date(text: &str) -> Result<DateTime<Utc>> {
    let mut unparsed: Option<String> = None;

    for pattern in CREATION_PATTERNS.iter() {
        let Some(value) = pattern.captures(text).and_then(|c| c.get(1)) else {
            continue;
        };
        let value = value.as_str().trim();
        match parse_date(value) {
            Some(date) => {
                log::debug!("Found creation date: '{value}'");
                return Ok(date);
            }
            None => {
                log::debug!("Could not parse date format: '{value}'");
                unparsed.get_or_insert_with(|| value.to_string());
            }
        }
    }

    match unparsed {
        Some(value) => Err(anyhow!("unrecognized creation date '{value}'")),
        None => Err(anyhow!("no creation date in response")),
    }
}

fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date.with_timezone(&Utc));
    }

    let token = value.split_whitespace().next()?;
    if let Ok(date) = DateTime::parse_from_rfc3339(token) {
        return Some(date.with_timezone(&Utc));
    }

    let date_part = token.split('T').next()?;
    ["%Y-%m-%d", "%d-%b-%Y", "%d.%m.%Y", "%Y.%m.%d", "%Y/%m/%d"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| Utc.from_utc_datetime(&midnight))
}

/// Whole days between registration and `now`, clamped at zero.
pub fn age_in_days(created: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let days = now.signed_duration_since(created).num_days();
    if days < 0 {
        log::debug!("Creation date {created} lies in the future, clamping age to 0");
        return 0;
    }
    u32::try_from(days).unwrap_or(u32::MAX)
}

#[async_trait]
pub trait WhoisSource: Send + Sync {
    /// Raw WHOIS text for a registrable domain.
    async fn query(&self, domain: &str) -> Result<String>;
}

/// True for a record served by IANA itself. Those describe the TLD, not the
/// domain, so their `created:` line must never be read as a domain age.
pub fn is_iana_record(response: &str) -> bool {
    IANA_MARKER.is_match(response)
}

/// Where `TcpWhoisSource` sends its queries.
#[derive(Clone)]
pub struct WhoisEndpoints {
    pub port: u16,
    pub iana: String,
    pub fallbacks: Vec<String>,
    /// Registry server for a TLD (without dot), `None` to ask IANA.
    pub registry_for: fn(&str) -> Option<&'static str>,
}

impl Default for WhoisEndpoints {
    fn default() -> Self {
        Self {
            port: WHOIS_PORT,
            iana: IANA_WHOIS.to_string(),
            fallbacks: vec![INTERNIC_WHOIS.to_string()],
            registry_for: whois_server_for,
        }
    }
}

/// Plain-text WHOIS over TCP port 43.
///
/// A lookup can take an IANA hop, the registry query and a fallback, so each
/// server exchange gets a third of the overall budget.
#[derive(Clone)]
pub struct TcpWhoisSource {
    server_timeout: Duration,
    endpoints: WhoisEndpoints,
}

impl TcpWhoisSource {
    pub fn new(timeout: Duration) -> Self {
        Self::with_endpoints(timeout, WhoisEndpoints::default())
    }

    pub fn with_endpoints(timeout: Duration, endpoints: WhoisEndpoints) -> Self {
        Self {
            server_timeout: timeout / MAX_SERVER_HOPS,
            endpoints,
        }
    }

    async fn query_server(&self, server: &str, domain: &str) -> Result<String> {
        use tokio::time::timeout;

        log::debug!("Connecting to WHOIS server: {server}:{}", self.endpoints.port);
        timeout(self.server_timeout, self.exchange(server, domain))
            .await
            .map_err(|_| anyhow!("query to {server} timed out"))?
    }

    async fn exchange(&self, server: &str, domain: &str) -> Result<String> {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpStream;

        let mut stream = TcpStream::connect((server, self.endpoints.port)).await?;
        stream.write_all(format!("{domain}\r\n").as_bytes()).await?;

        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await?;

        let response = String::from_utf8_lossy(&buf).into_owned();
        if response.trim().is_empty() {
            return Err(anyhow!("empty response from {server}"));
        }
        Ok(response)
    }

    async fn query_primary(&self, domain: &str) -> Result<String> {
        let tld = domain.rsplit('.').next().unwrap_or(domain);
        if let Some(server) = (self.endpoints.registry_for)(tld) {
            return self.query_server(server, domain).await;
        }

        let iana = &self.endpoints.iana;
        let response = self.query_server(iana, domain).await?;
        match referral_server(&response) {
            Some(server) if &server != iana => {
                log::debug!("IANA refers {domain} to {server}");
                self.query_server(&server, domain).await
            }
            _ => Err(anyhow!("no WHOIS server known for .{tld}")),
        }
    }
}

#[async_trait]
impl WhoisSource for TcpWhoisSource {
    async fn query(&self, domain: &str) -> Result<String> {
        let primary_error = match self.query_primary(domain).await {
            Ok(text) => return Ok(text),
            Err(e) => e,
        };
        log::debug!("Primary WHOIS query for {domain} failed: {primary_error}");

        for server in &self.endpoints.fallbacks {
            match self.query_server(server, domain).await {
                Ok(text) if is_iana_record(&text) => {
                    log::debug!("Fallback server {server} only returned the IANA TLD record");
                }
                Ok(text) => return Ok(text),
                Err(e) => log::debug!("Fallback server {server} failed: {e}"),
            }
        }

        Err(primary_error)
    }
}

/// Derives `age_days` from the registry creation date.
pub struct WhoisProbe {
    source: Box<dyn WhoisSource>,
}

impl WhoisProbe {
    pub fn new(timeout: Duration) -> Self {
        Self::with_source(Box::new(TcpWhoisSource::new(timeout)))
    }

    pub fn with_source(source: Box<dyn WhoisSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl SignalProbe<WhoisSignals> for WhoisProbe {
    fn name(&self) -> &str {
        "whois"
    }

    fn kind(&self) -> ProbeKind {
        ProbeKind::Whois
    }

    async fn probe(&self, domain: &str) -> ProbeReport<WhoisSignals> {
        let root = extract_root_domain(domain);
        log::debug!("Checking domain age for {domain} (root: {root})");

        let text = match self.source.query(&root).await {
            Ok(text) if is_iana_record(&text) => {
                log::warn!("WHOIS for {domain} returned only the IANA TLD record");
                return ProbeReport::failed(ProbeError::WhoisLookup(
                    "no registry record".to_string(),
                ));
            }
            Ok(text) => text,
            Err(e) => {
                log::error!("WHOIS error for {domain}: {e}");
                return ProbeReport::failed(ProbeError::WhoisLookup(e.to_string()));
            }
        };

        match parse_creation_date(&text) {
            Ok(created) => {
                let age_days = age_in_days(created, Utc::now());
                log::debug!("Domain {domain} is {age_days} days old");
                ProbeReport::ok(WhoisSignals {
                    age_days: Some(age_days),
                })
            }
            Err(e) => {
                log::warn!("WHOIS parsing error for {domain}: {e}");
                ProbeReport::failed(ProbeError::WhoisParse(e.to_string()))
            }
        }
    }
}
