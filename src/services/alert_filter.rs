//! Alert filters: ordered risk/confidence override rules, global or scoped
//! to a context.
//!
//! This module is pure matching and override logic plus the persistence
//! codec; the lifecycle coordinator owns evaluation order and side effects.

use std::fs;

use crate::errors::ScanError;
use crate::models::alert::{Alert, Confidence, Risk};
use crate::models::context::Context;

/// Override target of a filter.
///
/// `FalsePositive` is persisted as the sentinel code -1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewRisk {
    FalsePositive,
    Risk(Risk),
}

impl NewRisk {
    pub fn code(self) -> i32 {
        match self {
            Self::FalsePositive => -1,
            Self::Risk(risk) => risk.code(),
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        if code == -1 {
            return Some(Self::FalsePositive);
        }
        Risk::from_code(code).map(Self::Risk)
    }
}

/// One override rule.
///
/// Every matcher is optional; an absent or empty matcher accepts any value.
/// Matchers are literal comparisons unless their `_regex` flag is set.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertFilter {
    /// Owning context; `None` for a global filter.
    pub context_id: Option<i64>,
    /// Plugin id the filter targets.
    pub rule_id: i32,
    pub new_risk: NewRisk,
    pub url: Option<String>,
    pub url_regex: bool,
    pub parameter: Option<String>,
    pub parameter_regex: bool,
    pub attack: Option<String>,
    pub attack_regex: bool,
    pub evidence: Option<String>,
    pub evidence_regex: bool,
    pub enabled: bool,
}

impl AlertFilter {
    /// Filter with only a rule id and override, matching every alert of the
    /// rule.
    pub fn new(context_id: Option<i64>, rule_id: i32, new_risk: NewRisk) -> Self {
        Self {
            context_id,
            rule_id,
            new_risk,
            url: None,
            url_regex: false,
            parameter: None,
            parameter_regex: false,
            attack: None,
            attack_regex: false,
            evidence: None,
            evidence_regex: false,
            enabled: true,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>, regex: bool) -> Self {
        self.url = Some(url.into());
        self.url_regex = regex;
        self
    }

    pub fn with_parameter(mut self, parameter: impl Into<String>, regex: bool) -> Self {
        self.parameter = Some(parameter.into());
        self.parameter_regex = regex;
        self
    }

    pub fn with_attack(mut self, attack: impl Into<String>, regex: bool) -> Self {
        self.attack = Some(attack.into());
        self.attack_regex = regex;
        self
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>, regex: bool) -> Self {
        self.evidence = Some(evidence.into());
        self.evidence_regex = regex;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Whether this filter matches the alert.
    ///
    /// `context` is the filter's owning context when the caller has not
    /// already established scope: pass `Some` to require the alert URI to be
    /// inside it (manual apply over all alerts), `None` when scope was
    /// checked upstream (auto apply in the lifecycle).
    pub fn applies_to_alert(&self, alert: &Alert, context: Option<&Context>) -> bool {
        if !self.enabled {
            return false;
        }
        if self.rule_id != alert.plugin_id {
            return false;
        }
        if let Some(context) = context {
            if !context.is_in_context(&alert.uri) {
                return false;
            }
        }
        matches_field(&self.url, self.url_regex, &alert.uri)
            && matches_field(&self.parameter, self.parameter_regex, &alert.param)
            && matches_field(&self.attack, self.attack_regex, &alert.attack)
            && matches_field(&self.evidence, self.evidence_regex, &alert.evidence)
    }

    /// Check that every regex matcher compiles.
    pub fn validate(&self) -> Result<(), ScanError> {
        for (matcher, is_regex) in [
            (&self.url, self.url_regex),
            (&self.parameter, self.parameter_regex),
            (&self.attack, self.attack_regex),
            (&self.evidence, self.evidence_regex),
        ] {
            if is_regex {
                if let Some(pattern) = matcher {
                    regex::Regex::new(pattern).map_err(|e| {
                        ScanError::Validation(format!("invalid filter pattern: {e}"))
                    })?;
                }
            }
        }
        Ok(())
    }

    /// Encode for persistence: tab-separated fields, reversible escaping.
    ///
    /// The owning context is implied by the storage location and is not part
    /// of the encoding.
    pub fn encode(&self) -> String {
        [
            self.rule_id.to_string(),
            self.new_risk.code().to_string(),
            escape(self.url.as_deref().unwrap_or_default()),
            bool_field(self.url_regex),
            escape(self.parameter.as_deref().unwrap_or_default()),
            bool_field(self.parameter_regex),
            escape(self.attack.as_deref().unwrap_or_default()),
            bool_field(self.attack_regex),
            escape(self.evidence.as_deref().unwrap_or_default()),
            bool_field(self.evidence_regex),
            bool_field(self.enabled),
        ]
        .join("\t")
    }

    /// Decode a persisted filter for the given owner.
    pub fn decode(context_id: Option<i64>, encoded: &str) -> Result<Self, ScanError> {
        let fields: Vec<&str> = encoded.split('\t').collect();
        if fields.len() != 11 {
            return Err(ScanError::Decode(format!(
                "alert filter entry has {} fields, expected 11",
                fields.len()
            )));
        }
        let rule_id = fields[0]
            .parse()
            .map_err(|_| ScanError::Decode(format!("rule id: {}", fields[0])))?;
        let risk_code: i32 = fields[1]
            .parse()
            .map_err(|_| ScanError::Decode(format!("risk code: {}", fields[1])))?;
        let new_risk = NewRisk::from_code(risk_code)
            .ok_or_else(|| ScanError::Decode(format!("risk code: {risk_code}")))?;

        let filter = Self {
            context_id,
            rule_id,
            new_risk,
            url: optional(unescape(fields[2])),
            url_regex: parse_bool(fields[3])?,
            parameter: optional(unescape(fields[4])),
            parameter_regex: parse_bool(fields[5])?,
            attack: optional(unescape(fields[6])),
            attack_regex: parse_bool(fields[7])?,
            evidence: optional(unescape(fields[8])),
            evidence_regex: parse_bool(fields[9])?,
            enabled: parse_bool(fields[10])?,
        };
        filter.validate()?;
        Ok(filter)
    }

    /// Decode tolerantly: malformed entries become `None` after a warning so
    /// one bad record never aborts loading the rest.
    pub fn decode_opt(context_id: Option<i64>, encoded: &str) -> Option<Self> {
        match Self::decode(context_id, encoded) {
            Ok(filter) => Some(filter),
            Err(e) => {
                tracing::warn!(error = %e, entry = encoded, "Skipping malformed alert filter");
                None
            }
        }
    }
}

/// Apply a filter's override to an alert, returning the updated copy.
///
/// Overriding to false positive keeps the risk; overriding an alert that is
/// currently a false positive restores confidence Medium, since the
/// pre-override confidence is not recoverable.
pub fn apply_override(alert: &Alert, new_risk: NewRisk) -> Alert {
    match new_risk {
        NewRisk::FalsePositive => {
            alert.with_risk_confidence(alert.risk, Confidence::FalsePositive)
        }
        NewRisk::Risk(risk) => {
            if alert.confidence == Confidence::FalsePositive {
                alert.with_risk_confidence(risk, Confidence::Medium)
            } else {
                alert.with_risk_confidence(risk, alert.confidence)
            }
        }
    }
}

/// Insertion-ordered filters of one context.
#[derive(Debug)]
pub struct ContextFilterManager {
    context_id: i64,
    filters: Vec<AlertFilter>,
}

impl ContextFilterManager {
    pub fn new(context_id: i64) -> Self {
        Self {
            context_id,
            filters: Vec::new(),
        }
    }

    pub fn context_id(&self) -> i64 {
        self.context_id
    }

    /// Add a filter, preserving insertion order; exact duplicates are
    /// ignored. Returns whether the filter was added.
    pub fn add(&mut self, filter: AlertFilter) -> bool {
        if self.filters.contains(&filter) {
            return false;
        }
        self.filters.push(filter);
        true
    }

    pub fn remove(&mut self, filter: &AlertFilter) -> bool {
        let before = self.filters.len();
        self.filters.retain(|f| f != filter);
        self.filters.len() != before
    }

    pub fn filters(&self) -> &[AlertFilter] {
        &self.filters
    }
}

/// The process-wide global filter set, evaluated before any context set.
#[derive(Debug, Default)]
pub struct GlobalAlertFilters {
    filters: Vec<AlertFilter>,
}

impl GlobalAlertFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, filter: AlertFilter) -> bool {
        if self.filters.contains(&filter) {
            return false;
        }
        self.filters.push(filter);
        true
    }

    pub fn remove(&mut self, filter: &AlertFilter) -> bool {
        let before = self.filters.len();
        self.filters.retain(|f| f != filter);
        self.filters.len() != before
    }

    pub fn clear(&mut self) {
        self.filters.clear();
    }

    pub fn filters(&self) -> &[AlertFilter] {
        &self.filters
    }

    /// Load from a file of encoded filters, one per line; malformed lines
    /// are skipped. A missing file is an empty set.
    pub fn load(path: &str) -> Self {
        let mut set = Self::new();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(path, error = %e, "No global alert filter file, starting empty");
                return set;
            }
        };
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(filter) = AlertFilter::decode_opt(None, line) {
                set.add(filter);
            }
        }
        set
    }

    /// Persist to a file, one encoded filter per line.
    pub fn save(&self, path: &str) -> Result<(), ScanError> {
        let mut out = String::new();
        for filter in &self.filters {
            out.push_str(&filter.encode());
            out.push('\n');
        }
        fs::write(path, out).map_err(|e| ScanError::Internal(format!("saving filters: {e}")))
    }
}

fn matches_field(matcher: &Option<String>, is_regex: bool, value: &str) -> bool {
    let Some(matcher) = matcher else {
        return true;
    };
    if matcher.is_empty() {
        return true;
    }
    if is_regex {
        match regex::Regex::new(matcher) {
            Ok(pattern) => pattern.is_match(value),
            Err(e) => {
                tracing::warn!(pattern = matcher, error = %e, "Unparseable filter pattern");
                false
            }
        }
    } else {
        matcher == value
    }
}

fn escape(field: &str) -> String {
    field
        .replace('%', "%25")
        .replace('\t', "%09")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn unescape(field: &str) -> String {
    field
        .replace("%09", "\t")
        .replace("%0D", "\r")
        .replace("%0A", "\n")
        .replace("%25", "%")
}

fn optional(field: String) -> Option<String> {
    if field.is_empty() {
        None
    } else {
        Some(field)
    }
}

fn bool_field(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

fn parse_bool(field: &str) -> Result<bool, ScanError> {
    match field {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(ScanError::Decode(format!("boolean field: {other}"))),
    }
}
