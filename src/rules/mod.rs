//! Scan rule contract: rule metadata, tuning enums, the passive/active rule
//! traits, alert collection, and the typed rule registry.
//!
//! Rules are selected by explicit registration, never discovered at runtime;
//! the registry enforces plugin-id uniqueness at registration time.

pub mod active;
pub mod passive;

use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;

use crate::errors::ScanError;
use crate::models::alert::{Alert, AlertBuilder, Confidence, Risk};
use crate::models::http::HttpMessage;
use crate::models::tech::TechSet;
use crate::services::active_scan::ScanHost;

/// Maturity of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleStatus {
    Alpha,
    Beta,
    Release,
}

/// Broad category a rule belongs to, used for policy grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleCategory {
    InfoGather,
    Injection,
    ServerSecurity,
    BrowserSide,
    Misc,
}

/// Static description of a scan rule.
///
/// The `id` is the stable plugin id used as the primary key for alert
/// correlation and filter targeting; it must be unique across all loaded
/// rules.
#[derive(Debug, Clone)]
pub struct RuleMetadata {
    pub id: i32,
    pub name: String,
    pub risk: Risk,
    pub confidence: Confidence,
    pub category: RuleCategory,
    pub cwe_id: u32,
    pub wasc_id: u32,
    pub tags: BTreeMap<String, String>,
    pub status: RuleStatus,
}

impl RuleMetadata {
    /// Alert builder pre-populated with this rule's defaults.
    pub fn alert(&self) -> AlertBuilder {
        Alert::builder(self.id)
            .name(self.name.clone())
            .risk(self.risk)
            .confidence(self.confidence)
            .cwe_id(self.cwe_id)
            .wasc_id(self.wasc_id)
            .tags(self.tags.clone())
    }
}

/// Minimum confidence a passive rule requires before raising a finding.
///
/// `Off` disables the rule entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlertThreshold {
    Off,
    Low,
    #[default]
    Medium,
    High,
}

impl AlertThreshold {
    /// Minimum confidence implied by this threshold; `None` when the rule is
    /// disabled.
    pub fn minimum_confidence(self) -> Option<Confidence> {
        match self {
            Self::Off => None,
            Self::Low => Some(Confidence::Low),
            Self::Medium => Some(Confidence::Medium),
            Self::High => Some(Confidence::High),
        }
    }
}

impl FromStr for AlertThreshold {
    type Err = ScanError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(ScanError::Validation(format!(
                "unknown alert threshold: {other}"
            ))),
        }
    }
}

/// How aggressively active rules may probe a single target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttackStrength {
    Low,
    #[default]
    Medium,
    High,
    Insane,
}

impl AttackStrength {
    /// Recommended maximum number of probe requests per target parameter.
    pub fn max_probes(self) -> usize {
        match self {
            Self::Low => 6,
            Self::Medium => 12,
            Self::High => 24,
            Self::Insane => usize::MAX,
        }
    }
}

impl FromStr for AttackStrength {
    type Err = ScanError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "insane" => Ok(Self::Insane),
            other => Err(ScanError::Validation(format!(
                "unknown attack strength: {other}"
            ))),
        }
    }
}

/// Collector through which rules raise findings.
///
/// Rules push built alerts; the dispatcher drains the collector after each
/// hook and forwards the alerts into the pipeline, stamping correlation
/// fields the rule does not know about.
#[derive(Debug, Default)]
pub struct AlertCollector {
    alerts: Vec<Alert>,
}

impl AlertCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&mut self, alert: Alert) {
        self.alerts.push(alert);
    }

    pub fn take(&mut self) -> Vec<Alert> {
        std::mem::take(&mut self.alerts)
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

/// A rule that inspects traffic already captured by the proxy.
///
/// Hooks must not mutate the message. A hook returning an error is logged by
/// the dispatcher and never aborts the chain for other rules or messages.
pub trait PassiveRule: Send {
    fn metadata(&self) -> &RuleMetadata;

    /// Threshold this instance raises findings at.
    fn alert_threshold(&self) -> AlertThreshold;

    fn set_alert_threshold(&mut self, threshold: AlertThreshold);

    /// Inspect a request on its way out through the proxy.
    fn scan_request(
        &mut self,
        _msg: &HttpMessage,
        _id: u64,
        _sink: &mut AlertCollector,
    ) -> Result<(), ScanError> {
        Ok(())
    }

    /// Inspect a completed message. `html` is supplied only for textual
    /// HTML responses; rules needing raw text read the message directly.
    fn scan_response(
        &mut self,
        _msg: &HttpMessage,
        _id: u64,
        _html: Option<&scraper::Html>,
        _sink: &mut AlertCollector,
    ) -> Result<(), ScanError> {
        Ok(())
    }

    /// Whether concurrent dispatch must serialize on a single instance
    /// instead of cloning per message.
    fn is_single_threaded(&self) -> bool {
        false
    }

    /// Independent instance for concurrent per-message dispatch.
    fn boxed_clone(&self) -> Box<dyn PassiveRule>;

    /// Representative alerts, for documentation and tests.
    fn example_alerts(&self) -> Vec<Alert> {
        Vec::new()
    }
}

/// A rule that sends crafted variant requests and evaluates the responses.
///
/// `scan` is invoked once per target. Implementations must poll
/// `host.is_stop()` before each send and return early when set; transport
/// errors are logged and treated as "no finding" for that probe.
#[async_trait]
pub trait ActiveRule: Send {
    fn metadata(&self) -> &RuleMetadata;

    /// Technologies this rule targets; `None` means it applies everywhere.
    fn targets(&self) -> Option<TechSet> {
        None
    }

    async fn scan(&mut self, host: &mut ScanHost) -> Result<(), ScanError>;

    /// Representative alerts, for documentation and tests.
    fn example_alerts(&self) -> Vec<Alert> {
        Vec::new()
    }
}

/// Typed registry mapping stable plugin ids to rule instances.
#[derive(Default)]
pub struct RuleRegistry {
    passive: Vec<Box<dyn PassiveRule>>,
    active: Vec<Box<dyn ActiveRule>>,
    descriptors: Vec<RuleMetadata>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a passive rule; duplicate plugin ids are an error.
    pub fn register_passive(&mut self, rule: Box<dyn PassiveRule>) -> Result<(), ScanError> {
        self.claim_id(rule.metadata())?;
        self.passive.push(rule);
        Ok(())
    }

    /// Register an active rule; duplicate plugin ids are an error.
    pub fn register_active(&mut self, rule: Box<dyn ActiveRule>) -> Result<(), ScanError> {
        self.claim_id(rule.metadata())?;
        self.active.push(rule);
        Ok(())
    }

    fn claim_id(&mut self, metadata: &RuleMetadata) -> Result<(), ScanError> {
        if self.descriptors.iter().any(|d| d.id == metadata.id) {
            return Err(ScanError::Conflict(format!(
                "plugin id {} already registered",
                metadata.id
            )));
        }
        self.descriptors.push(metadata.clone());
        Ok(())
    }

    /// Metadata for a registered rule id.
    pub fn descriptor(&self, id: i32) -> Option<&RuleMetadata> {
        self.descriptors.iter().find(|d| d.id == id)
    }

    /// All registered descriptors, in registration order.
    pub fn descriptors(&self) -> &[RuleMetadata] {
        &self.descriptors
    }

    pub fn passive_len(&self) -> usize {
        self.passive.len()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Hand the rule instances to the engines, keeping descriptors intact.
    pub fn into_parts(self) -> (Vec<Box<dyn PassiveRule>>, Vec<Box<dyn ActiveRule>>) {
        (self.passive, self.active)
    }
}
