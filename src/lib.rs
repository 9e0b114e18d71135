pub mod analyzer;
pub mod collector;
pub mod config;
pub mod domain_utils;
pub mod error;
pub mod probes;
pub mod risk_engine;
pub mod signals;

pub use analyzer::DomainAnalyzer;
pub use collector::SignalCollector;
pub use config::{RiskThresholds, RiskWeights, Settings, Timeouts};
pub use domain_utils::DomainValidator;
pub use error::{AnalysisError, ConfigError, ProbeError, ProbeKind};
pub use probes::SignalProbe;
pub use risk_engine::{Classification, RiskEngine, RiskResult, RuleOutcome};
pub use signals::{ProbeReport, SignalRecord};
