//! Passive rule flagging sensitive information carried in URL query strings.
//!
//! Three checks per URL parameter: a sensitive parameter-name word list,
//! and value patterns for credit card numbers, e-mail addresses, and US
//! social security numbers. The word list is immutable shared state built
//! once at first use; every rule instance reads the same copy.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::ScanError;
use crate::models::alert::{Alert, Confidence, Risk};
use crate::models::http::HttpMessage;
use crate::rules::{
    AlertCollector, AlertThreshold, PassiveRule, RuleCategory, RuleMetadata, RuleStatus,
};

const PLUGIN_ID: i32 = 10024;

/// Lowercase fragments that mark a parameter name as sensitive.
static SENSITIVE_WORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "user", "username", "pass", "password", "pwd", "token", "ticket", "session", "jsessionid",
        "email", "creditcard", "ssn", "secret", "apikey", "api_key",
    ]
});

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,4}\b").expect("email pattern")
});

// CC Pattern Source:
// https://www.oreilly.com/library/view/regular-expressions-cookbook/9781449327453/ch04s20.html
static CREDIT_CARD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:4[0-9]{12}(?:[0-9]{3})?|5[1-5][0-9]{14}|6(?:011|5[0-9][0-9])[0-9]{12}|3[47][0-9]{13}|3(?:0[0-5]|[68][0-9])[0-9]{11}|(?:2131|1800|35\d{3})\d{11})\b",
    )
    .expect("credit card pattern")
});

static US_SSN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[0-9]{3}-[0-9]{2}-[0-9]{4}\b").expect("ssn pattern"));

/// Passive scan rule reporting sensitive data in request URLs.
pub struct InfoDisclosureInUrlRule {
    metadata: RuleMetadata,
    threshold: AlertThreshold,
}

impl InfoDisclosureInUrlRule {
    pub fn new() -> Self {
        Self {
            metadata: RuleMetadata {
                id: PLUGIN_ID,
                name: "Information Disclosure in URL".to_string(),
                risk: Risk::Info,
                confidence: Confidence::Medium,
                category: RuleCategory::InfoGather,
                cwe_id: 598,
                wasc_id: 13,
                tags: BTreeMap::from([
                    ("OWASP_2021_A01".to_string(), String::new()),
                    ("OWASP_2017_A03".to_string(), String::new()),
                ]),
                status: RuleStatus::Release,
            },
            threshold: AlertThreshold::default(),
        }
    }

    pub fn boxed() -> Box<dyn PassiveRule> {
        Box::new(Self::new())
    }

    fn build_alert(&self, param: &str, evidence: &str, other_info: &str) -> Alert {
        self.metadata
            .alert()
            .description(
                "The request appeared to contain sensitive information leaked in the URL.",
            )
            .solution("Do not pass sensitive information in URIs.")
            .param(param)
            .evidence(evidence)
            .other_info(other_info)
            .build()
    }

    fn sensitive_word_in(param_name: &str) -> Option<&'static str> {
        let name = param_name.to_lowercase();
        SENSITIVE_WORDS.iter().find(|word| name.contains(*word)).copied()
    }
}

impl Default for InfoDisclosureInUrlRule {
    fn default() -> Self {
        Self::new()
    }
}

impl PassiveRule for InfoDisclosureInUrlRule {
    fn metadata(&self) -> &RuleMetadata {
        &self.metadata
    }

    fn alert_threshold(&self) -> AlertThreshold {
        self.threshold
    }

    fn set_alert_threshold(&mut self, threshold: AlertThreshold) {
        self.threshold = threshold;
    }

    fn scan_request(
        &mut self,
        msg: &HttpMessage,
        _id: u64,
        sink: &mut AlertCollector,
    ) -> Result<(), ScanError> {
        for param in msg.request.url_params() {
            if let Some(word) = Self::sensitive_word_in(&param.name) {
                sink.raise(self.build_alert(
                    &param.name,
                    &param.name,
                    &format!(
                        "The URL contains potentially sensitive information: parameter name \
                         matches '{word}'"
                    ),
                ));
            }
            if CREDIT_CARD_PATTERN.is_match(&param.value) {
                sink.raise(self.build_alert(
                    &param.name,
                    &param.value,
                    "The URL appears to contain a credit card number",
                ));
            }
            if EMAIL_PATTERN.is_match(&param.value) {
                sink.raise(self.build_alert(
                    &param.name,
                    &param.value,
                    "The URL appears to contain an email address",
                ));
            }
            if US_SSN_PATTERN.is_match(&param.value) {
                sink.raise(self.build_alert(
                    &param.name,
                    &param.value,
                    "The URL appears to contain US Social Security Number(s)",
                ));
            }
        }
        Ok(())
    }

    fn boxed_clone(&self) -> Box<dyn PassiveRule> {
        Box::new(Self {
            metadata: self.metadata.clone(),
            threshold: self.threshold,
        })
    }

    fn example_alerts(&self) -> Vec<Alert> {
        vec![self.build_alert(
            "value",
            "351-25-9735",
            "The URL appears to contain US Social Security Number(s)",
        )]
    }
}
