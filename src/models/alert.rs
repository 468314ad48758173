//! Core alert model shared by every scan rule and the filter pipeline.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Risk level of a finding.
///
/// Variants are declared in ascending severity so the derived ordering
/// matches the numeric codes used for persistence and filter encoding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Risk {
    Info,
    Low,
    Medium,
    High,
}

impl Risk {
    /// Numeric code used in persisted records and filter encodings.
    pub fn code(self) -> i32 {
        match self {
            Self::Info => 0,
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }

    /// Decode a persisted numeric code.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Info),
            1 => Some(Self::Low),
            2 => Some(Self::Medium),
            3 => Some(Self::High),
            _ => None,
        }
    }
}

/// Confidence level of a finding.
///
/// `FalsePositive` is a real confidence value, not a status flag: filter
/// overrides move alerts into and out of it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Confidence {
    FalsePositive,
    Low,
    Medium,
    High,
    UserConfirmed,
}

impl Confidence {
    /// Numeric code used in persisted records and filter encodings.
    pub fn code(self) -> i32 {
        match self {
            Self::FalsePositive => 0,
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::UserConfirmed => 4,
        }
    }

    /// Decode a persisted numeric code.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::FalsePositive),
            1 => Some(Self::Low),
            2 => Some(Self::Medium),
            3 => Some(Self::High),
            4 => Some(Self::UserConfirmed),
            _ => None,
        }
    }
}

/// A single security finding raised by a scan rule.
///
/// `id` is assigned by the alert store on insert (0 until then) and is
/// stable for the lifetime of the session. Overrides never touch `id`,
/// `plugin_id` or `uri`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub id: i64,
    pub plugin_id: i32,
    pub name: String,
    pub risk: Risk,
    pub confidence: Confidence,
    pub description: String,
    pub uri: String,
    pub param: String,
    pub attack: String,
    pub evidence: String,
    pub other_info: String,
    pub solution: String,
    pub reference: String,
    pub cwe_id: u32,
    pub wasc_id: u32,
    pub tags: BTreeMap<String, String>,
    /// Weak back-reference to the message record the alert was raised on.
    pub history_id: Option<i64>,
    /// Owning context, `None` when the alert is not scoped to any context.
    pub context_id: Option<i64>,
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    /// Start building an alert for the given rule.
    pub fn builder(plugin_id: i32) -> AlertBuilder {
        AlertBuilder {
            alert: Alert {
                id: 0,
                plugin_id,
                name: String::new(),
                risk: Risk::Medium,
                confidence: Confidence::Medium,
                description: String::new(),
                uri: String::new(),
                param: String::new(),
                attack: String::new(),
                evidence: String::new(),
                other_info: String::new(),
                solution: String::new(),
                reference: String::new(),
                cwe_id: 0,
                wasc_id: 0,
                tags: BTreeMap::new(),
                history_id: None,
                context_id: None,
                raised_at: Utc::now(),
            },
        }
    }

    /// Copy of this alert with overridden risk/confidence.
    ///
    /// Identity fields (`id`, `plugin_id`, `uri`) are untouched; this is the
    /// only mutation path the filter engine uses.
    pub fn with_risk_confidence(&self, risk: Risk, confidence: Confidence) -> Alert {
        let mut updated = self.clone();
        updated.risk = risk;
        updated.confidence = confidence;
        updated
    }
}

/// Fluent builder used by rules to assemble findings.
#[derive(Debug)]
pub struct AlertBuilder {
    alert: Alert,
}

impl AlertBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.alert.name = name.into();
        self
    }

    pub fn risk(mut self, risk: Risk) -> Self {
        self.alert.risk = risk;
        self
    }

    pub fn confidence(mut self, confidence: Confidence) -> Self {
        self.alert.confidence = confidence;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.alert.description = description.into();
        self
    }

    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.alert.uri = uri.into();
        self
    }

    pub fn param(mut self, param: impl Into<String>) -> Self {
        self.alert.param = param.into();
        self
    }

    pub fn attack(mut self, attack: impl Into<String>) -> Self {
        self.alert.attack = attack.into();
        self
    }

    pub fn evidence(mut self, evidence: impl Into<String>) -> Self {
        self.alert.evidence = evidence.into();
        self
    }

    pub fn other_info(mut self, other_info: impl Into<String>) -> Self {
        self.alert.other_info = other_info.into();
        self
    }

    pub fn solution(mut self, solution: impl Into<String>) -> Self {
        self.alert.solution = solution.into();
        self
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.alert.reference = reference.into();
        self
    }

    pub fn cwe_id(mut self, cwe_id: u32) -> Self {
        self.alert.cwe_id = cwe_id;
        self
    }

    pub fn wasc_id(mut self, wasc_id: u32) -> Self {
        self.alert.wasc_id = wasc_id;
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.alert.tags.insert(key.into(), value.into());
        self
    }

    pub fn tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.alert.tags = tags;
        self
    }

    pub fn history_id(mut self, history_id: i64) -> Self {
        self.alert.history_id = Some(history_id);
        self
    }

    pub fn context_id(mut self, context_id: i64) -> Self {
        self.alert.context_id = Some(context_id);
        self
    }

    pub fn build(self) -> Alert {
        self.alert
    }
}
