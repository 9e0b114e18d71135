use crate::domain_utils::DomainValidator;
use crate::signals::LexicalSignals;

/// Keyword, TLD and punycode checks on the domain string itself. No I/O.
#[derive(Debug, Clone)]
pub struct LexicalAnalyzer {
    suspicious_keywords: Vec<String>,
    risky_tlds: Vec<String>,
}

impl LexicalAnalyzer {
    pub fn new(suspicious_keywords: &[String], risky_tlds: &[String]) -> Self {
        Self {
            suspicious_keywords: suspicious_keywords.iter().map(|kw| kw.to_lowercase()).collect(),
            risky_tlds: risky_tlds.iter().map(|tld| tld.to_lowercase()).collect(),
        }
    }

    pub fn analyze(&self, domain: &str) -> LexicalSignals {
        let domain_lower = domain.to_lowercase();

        let mut triggered_keywords: Vec<String> = Vec::new();
        for keyword in &self.suspicious_keywords {
            if domain_lower.contains(keyword.as_str()) && !triggered_keywords.contains(keyword) {
                triggered_keywords.push(keyword.clone());
            }
        }
        if !triggered_keywords.is_empty() {
            log::debug!("Triggered keywords in {domain}: {triggered_keywords:?}");
        }

        let risky_tld = match DomainValidator::extract_tld(&domain_lower) {
            Some(tld) => {
                let risky = self.risky_tlds.contains(&tld);
                if risky {
                    log::debug!("Risky TLD detected: {tld}");
                }
                risky
            }
            None => false,
        };

        let is_punycode = DomainValidator::is_punycode(&domain_lower);
        if is_punycode {
            log::debug!("Punycode detected in {domain}");
        }

        LexicalSignals {
            triggered_keywords,
            risky_tld,
            is_punycode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> LexicalAnalyzer {
        let keywords: Vec<String> = ["login", "secure", "verify", "paypal"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let tlds: Vec<String> = [".tk", ".xyz"].iter().map(|s| s.to_string()).collect();
        LexicalAnalyzer::new(&keywords, &tlds)
    }

    #[test]
    fn test_keywords_follow_configured_order() {
        let signals = analyzer().analyze("verify-paypal-login.com");
        assert_eq!(signals.triggered_keywords, vec!["login", "verify", "paypal"]);
    }

    #[test]
    fn test_keyword_reported_once() {
        let signals = analyzer().analyze("login-login-login.com");
        assert_eq!(signals.triggered_keywords, vec!["login"]);
    }

    #[test]
    fn test_keywords_case_insensitive() {
        let signals = analyzer().analyze("SecureBank.com");
        assert_eq!(signals.triggered_keywords, vec!["secure"]);
    }

    #[test]
    fn test_risky_tld() {
        assert!(analyzer().analyze("free-prizes.tk").risky_tld);
        assert!(analyzer().analyze("shop.XYZ").risky_tld);
        assert!(!analyzer().analyze("example.com").risky_tld);
        // TLD must be the final label, not any label
        assert!(!analyzer().analyze("tk.example.com").risky_tld);
    }

    #[test]
    fn test_single_label_has_no_tld() {
        let keywords: Vec<String> = Vec::new();
        let tlds = vec![".localhost".to_string()];
        let analyzer = LexicalAnalyzer::new(&keywords, &tlds);
        assert!(!analyzer.analyze("localhost").risky_tld);
    }

    #[test]
    fn test_punycode() {
        assert!(analyzer().analyze("xn--pple-43d.com").is_punycode);
        assert!(!analyzer().analyze("apple.com").is_punycode);
    }

    #[test]
    fn test_clean_domain() {
        let signals = analyzer().analyze("example.com");
        assert_eq!(signals, LexicalSignals::default());
    }

    #[test]
    fn test_deterministic() {
        let a = analyzer();
        assert_eq!(
            a.analyze("secure-login.xyz"),
            a.analyze("secure-login.xyz")
        );
    }
}
