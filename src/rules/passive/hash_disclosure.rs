//! Passive rule flagging known credential-hash signatures in traffic.
//!
//! An ordered signature table maps hash formats to their own risk and
//! confidence; the configured alert threshold sets the minimum confidence a
//! signature needs before its matches are raised. All matches are reported,
//! not just the first.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::ScanError;
use crate::models::alert::{Alert, Confidence, Risk};
use crate::models::http::HttpMessage;
use crate::rules::{
    AlertCollector, AlertThreshold, PassiveRule, RuleCategory, RuleMetadata, RuleStatus,
};

const PLUGIN_ID: i32 = 10097;
const EXAMPLE_MD5: &str = "21232F297A57A5A743894A0E4A801FC3";

struct HashSignature {
    pattern: Regex,
    description: &'static str,
    risk: Risk,
    confidence: Confidence,
    /// Matches directly preceded by this prefix are not hashes (e.g. session
    /// cookie values that happen to be 32 hex chars).
    exclude_prefix: Option<&'static str>,
}

impl HashSignature {
    fn new(pattern: &str, description: &'static str, risk: Risk, confidence: Confidence) -> Self {
        Self {
            pattern: Regex::new(pattern).expect("hash signature pattern"),
            description,
            risk,
            confidence,
            exclude_prefix: None,
        }
    }

    fn exclude_prefix(mut self, prefix: &'static str) -> Self {
        self.exclude_prefix = Some(prefix);
        self
    }
}

/// Ordered most-specific first: crypt-style prefixed formats, then the
/// bare-hex lengths that collide with ordinary digests.
static HASH_SIGNATURES: Lazy<Vec<HashSignature>> = Lazy::new(|| {
    vec![
        HashSignature::new(
            r"(?i)\$LM\$[a-f0-9]{16}",
            "LanMan / DES",
            Risk::High,
            Confidence::High,
        ),
        HashSignature::new(
            r"(?i)\$K4\$[a-f0-9]{16},",
            "Kerberos AFS DES",
            Risk::High,
            Confidence::High,
        ),
        HashSignature::new(
            r"(?i)\$2a\$05\$[a-z0-9+\-_./=]{53}",
            "OpenBSD Blowfish",
            Risk::High,
            Confidence::High,
        ),
        HashSignature::new(
            r"(?i)\$2y\$05\$[a-z0-9+\-_./=]{53}",
            "OpenBSD Blowfish",
            Risk::High,
            Confidence::High,
        ),
        HashSignature::new(
            r"\$1\$[./0-9A-Za-z]{0,8}\$[./0-9A-Za-z]{22}",
            "MD5 Crypt",
            Risk::High,
            Confidence::High,
        ),
        HashSignature::new(
            r"\$5\$[./0-9A-Za-z]{0,16}\$[./0-9A-Za-z]{43}",
            "SHA-256 Crypt",
            Risk::High,
            Confidence::High,
        ),
        HashSignature::new(
            r"\$5\$rounds=[0-9]+\$[./0-9A-Za-z]{0,16}\$[./0-9A-Za-z]{43}",
            "SHA-256 Crypt",
            Risk::High,
            Confidence::High,
        ),
        HashSignature::new(
            r"\$6\$[./0-9A-Za-z]{0,16}\$[./0-9A-Za-z]{86}",
            "SHA-512 Crypt",
            Risk::High,
            Confidence::High,
        ),
        HashSignature::new(
            r"\$6\$rounds=[0-9]+\$[./0-9A-Za-z]{0,16}\$[./0-9A-Za-z]{86}",
            "SHA-512 Crypt",
            Risk::High,
            Confidence::High,
        ),
        HashSignature::new(
            r"\$2\$[0-9]{2}\$[./0-9A-Za-z]{53}",
            "BCrypt",
            Risk::High,
            Confidence::High,
        ),
        HashSignature::new(
            r"\$2a\$[0-9]{2}\$[./0-9A-Za-z]{53}",
            "BCrypt",
            Risk::High,
            Confidence::High,
        ),
        HashSignature::new(
            r"\$3\$\$[0-9a-f]{32}",
            "NTLM",
            Risk::High,
            Confidence::High,
        ),
        HashSignature::new(
            r"\$NT\$[0-9a-f]{32}",
            "NTLM",
            Risk::High,
            Confidence::High,
        ),
        HashSignature::new(
            r"\b[0-9A-F]{48}\b",
            "Salted SHA-1",
            Risk::Low,
            Confidence::Low,
        ),
        // Bare hex digests occur in plenty of legitimate uses, hence the low
        // confidence.
        HashSignature::new(
            r"(?i)\b[0-9a-f]{128}\b",
            "SHA-512",
            Risk::Low,
            Confidence::Low,
        ),
        HashSignature::new(
            r"(?i)\b[0-9a-f]{96}\b",
            "SHA-384",
            Risk::Low,
            Confidence::Low,
        ),
        HashSignature::new(
            r"(?i)\b[0-9a-f]{64}\b",
            "SHA-256",
            Risk::Low,
            Confidence::Low,
        ),
        HashSignature::new(
            r"(?i)\b[0-9a-f]{56}\b",
            "SHA-224",
            Risk::Low,
            Confidence::Low,
        ),
        HashSignature::new(
            r"(?i)\b[0-9a-f]{40}\b",
            "SHA-1",
            Risk::Low,
            Confidence::Low,
        ),
        HashSignature::new(
            r"(?i)\b[0-9a-f]{32}\b",
            "MD4 / MD5",
            Risk::Low,
            Confidence::Low,
        )
        .exclude_prefix("jsessionid="),
    ]
});

/// Passive scan rule reporting disclosed password/credential hashes.
pub struct HashDisclosureRule {
    metadata: RuleMetadata,
    threshold: AlertThreshold,
}

impl HashDisclosureRule {
    pub fn new() -> Self {
        Self {
            metadata: RuleMetadata {
                id: PLUGIN_ID,
                name: "Hash Disclosure".to_string(),
                risk: Risk::Low,
                confidence: Confidence::Low,
                category: RuleCategory::InfoGather,
                cwe_id: 497,
                wasc_id: 13,
                tags: BTreeMap::from([
                    ("OWASP_2021_A04".to_string(), String::new()),
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

    fn check_for_hashes(&self, haystacks: &[&str], sink: &mut AlertCollector) {
        let minimum = self
            .threshold
            .minimum_confidence()
            .unwrap_or(Confidence::Low);

        for signature in HASH_SIGNATURES.iter() {
            if signature.confidence < minimum {
                continue;
            }
            for haystack in haystacks {
                for found in signature.pattern.find_iter(haystack) {
                    if let Some(prefix) = signature.exclude_prefix {
                        if has_prefix_before(haystack, found.start(), prefix) {
                            continue;
                        }
                    }
                    if found.as_str().is_empty() {
                        continue;
                    }
                    sink.raise(self.build_alert(found.as_str(), signature));
                    // Keep going: every disclosed hash is its own finding.
                }
            }
        }
    }

    fn build_alert(&self, evidence: &str, signature: &HashSignature) -> Alert {
        self.metadata
            .alert()
            .name(format!("{} - {}", self.metadata.name, signature.description))
            .risk(signature.risk)
            .confidence(signature.confidence)
            .description(format!(
                "A hash was disclosed by the web server - {}",
                signature.description
            ))
            .solution("Ensure hashes that are used to protect credentials or other resources are not leaked by the web server or database.")
            .evidence(evidence)
            .build()
    }
}

impl Default for HashDisclosureRule {
    fn default() -> Self {
        Self::new()
    }
}

/// Case-insensitive check for `prefix` immediately before `start`.
fn has_prefix_before(haystack: &str, start: usize, prefix: &str) -> bool {
    let Some(from) = start.checked_sub(prefix.len()) else {
        return false;
    };
    haystack
        .get(from..start)
        .map(|before| before.eq_ignore_ascii_case(prefix))
        .unwrap_or(false)
}

impl PassiveRule for HashDisclosureRule {
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
        let headers = msg.request.headers_as_string();
        self.check_for_hashes(&[&headers, &msg.request.body], sink);
        Ok(())
    }

    fn scan_response(
        &mut self,
        msg: &HttpMessage,
        _id: u64,
        _html: Option<&scraper::Html>,
        sink: &mut AlertCollector,
    ) -> Result<(), ScanError> {
        let Some(response) = &msg.response else {
            return Ok(());
        };
        if !response.is_text() {
            return Ok(());
        }
        // Minified script bodies are full of long hex runs; only dig through
        // them when tuned all the way down.
        if msg.is_javascript() && self.threshold != AlertThreshold::Low {
            return Ok(());
        }
        let headers = response.headers_as_string();
        self.check_for_hashes(&[&headers, &response.body], sink);
        Ok(())
    }

    fn boxed_clone(&self) -> Box<dyn PassiveRule> {
        Box::new(Self {
            metadata: self.metadata.clone(),
            threshold: self.threshold,
        })
    }

    fn example_alerts(&self) -> Vec<Alert> {
        vec![self.build_alert(EXAMPLE_MD5, &HASH_SIGNATURES[HASH_SIGNATURES.len() - 1])]
    }
}
