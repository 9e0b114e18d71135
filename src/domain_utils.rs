use crate::error::AnalysisError;
use lazy_static::lazy_static;
use regex::Regex;

const MAX_DOMAIN_LENGTH: usize = 253;
const MAX_LABEL_LENGTH: usize = 63;

lazy_static! {
    static ref HOSTNAME_PATTERN: Regex = Regex::new(
        r"^(?:[a-z0-9](?:[a-z0-9\-]{0,61}[a-z0-9])?\.)*[a-z0-9](?:[a-z0-9\-]{0,61}[a-z0-9])?$"
    )
    .unwrap();
}

/// Normalizes and validates raw domain input before any probe runs.
pub struct DomainValidator;

impl DomainValidator {
    /// Strip scheme, `www.` and path/query decoration, lowercase, then check
    /// the result against hostname grammar and DNS length limits.
    pub fn validate(raw: &str) -> Result<String, AnalysisError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AnalysisError::InvalidDomain(
                "Domain cannot be empty".to_string(),
            ));
        }

        let domain = Self::strip_path(&Self::strip_scheme(&trimmed.to_lowercase())).to_string();

        if domain.is_empty() {
            return Err(AnalysisError::InvalidDomain(format!(
                "No domain found in input: {trimmed}"
            )));
        }

        if domain.len() > MAX_DOMAIN_LENGTH {
            return Err(AnalysisError::InvalidDomain(format!(
                "Domain exceeds maximum length ({MAX_DOMAIN_LENGTH} characters)"
            )));
        }

        if domain.split('.').any(|label| label.len() > MAX_LABEL_LENGTH) {
            return Err(AnalysisError::InvalidDomain(format!(
                "Domain label exceeds maximum length ({MAX_LABEL_LENGTH} characters)"
            )));
        }

        if !HOSTNAME_PATTERN.is_match(&domain) {
            return Err(AnalysisError::InvalidDomain(format!(
                "Invalid domain format: {domain}"
            )));
        }

        Ok(domain)
    }

    fn strip_scheme(domain: &str) -> &str {
        let mut rest = domain;
        for prefix in ["https://", "http://", "//", "www."] {
            if let Some(stripped) = rest.strip_prefix(prefix) {
                rest = stripped;
            }
        }
        rest
    }

    fn strip_path(domain: &str) -> &str {
        domain
            .split(['/', '?', '#'])
            .next()
            .unwrap_or(domain)
    }

    /// Final label with a leading dot, or `None` for single-label names.
    pub fn extract_tld(domain: &str) -> Option<String> {
        let (_, tld) = domain.rsplit_once('.')?;
        if tld.is_empty() {
            return None;
        }
        Some(format!(".{tld}"))
    }

    pub fn is_punycode(domain: &str) -> bool {
        domain.contains("xn--")
    }
}
