use crate::collector::SignalCollector;
use crate::config::Settings;
use crate::domain_utils::DomainValidator;
use crate::error::{AnalysisError, ConfigError};
use crate::risk_engine::{RiskEngine, RiskResult};

/// Entry point for analyzing a domain: validate, collect, evaluate.
///
/// Holds no per-request state, so one instance can serve concurrent calls.
pub struct DomainAnalyzer {
    collector: SignalCollector,
    engine: RiskEngine,
}

impl DomainAnalyzer {
    /// Builds the live probes and the engine from `settings`, rejecting
    /// settings that fail validation.
    pub fn new(mut settings: Settings) -> Result<Self, ConfigError> {
        settings.normalize();
        settings.validate()?;
        log::debug!(
            "Analyzer ready: {} risky TLDs, {} keywords",
            settings.risky_tlds.len(),
            settings.suspicious_keywords.len()
        );

        Ok(Self::from_parts(
            SignalCollector::from_settings(&settings),
            RiskEngine::from_settings(&settings),
        ))
    }

    pub fn from_parts(collector: SignalCollector, engine: RiskEngine) -> Self {
        Self { collector, engine }
    }

    pub async fn analyze(&self, raw: &str) -> Result<RiskResult, AnalysisError> {
        let domain = DomainValidator::validate(raw)?;
        log::info!("Analyzing domain: {domain}");

        let signal = self.collector.collect(&domain).await;
        let result = self.engine.evaluate(&signal);

        log::info!(
            "Analysis complete for {domain}: score={}, classification={}",
            result.score,
            result.classification
        );
        Ok(result)
    }
}
