//! Passive rule flagging script includes served from another domain.
//!
//! A `<script src>` pointing at a host other than the page's own is an
//! integrity risk unless the element carries a Subresource Integrity hash.
//! Hosts matching a configured trusted-domain pattern are skipped at Medium
//! and High thresholds; at Low the rule reports them anyway.

use std::collections::BTreeMap;

use regex::Regex;
use url::Url;

use crate::errors::ScanError;
use crate::models::alert::{Alert, Confidence, Risk};
use crate::models::http::HttpMessage;
use crate::rules::{
    AlertCollector, AlertThreshold, PassiveRule, RuleCategory, RuleMetadata, RuleStatus,
};

const PLUGIN_ID: i32 = 10017;

/// Passive scan rule reporting cross-domain JavaScript inclusion.
pub struct CrossDomainScriptRule {
    metadata: RuleMetadata,
    threshold: AlertThreshold,
    trusted_domains: Vec<Regex>,
}

impl CrossDomainScriptRule {
    pub fn new() -> Self {
        Self {
            metadata: RuleMetadata {
                id: PLUGIN_ID,
                name: "Cross-Domain JavaScript Source File Inclusion".to_string(),
                risk: Risk::Low,
                confidence: Confidence::Medium,
                category: RuleCategory::BrowserSide,
                cwe_id: 829,
                wasc_id: 15,
                tags: BTreeMap::from([
                    ("OWASP_2021_A08".to_string(), String::new()),
                    ("OWASP_2017_A06".to_string(), String::new()),
                ]),
                status: RuleStatus::Release,
            },
            threshold: AlertThreshold::default(),
            trusted_domains: Vec::new(),
        }
    }

    pub fn boxed() -> Box<dyn PassiveRule> {
        Box::new(Self::new())
    }

    /// Add a pattern for script URLs that are considered part of the target
    /// deployment (e.g. a CDN serving first-party assets).
    pub fn trust_domain(mut self, pattern: &str) -> Result<Self, ScanError> {
        let regex = Regex::new(pattern)
            .map_err(|e| ScanError::Validation(format!("invalid trusted domain pattern: {e}")))?;
        self.trusted_domains.push(regex);
        Ok(self)
    }

    fn is_trusted(&self, script_url: &str) -> bool {
        self.trusted_domains.iter().any(|p| p.is_match(script_url))
    }

    fn build_alert(&self, script_url: &str, element: &str) -> Alert {
        self.metadata
            .alert()
            .description(
                "The page includes one or more script files from a third-party domain.",
            )
            .solution(
                "Ensure JavaScript source files are loaded from only trusted sources, and the \
                 sources can't be controlled by end users of the application.",
            )
            .param(script_url)
            .evidence(element)
            .build()
    }
}

impl Default for CrossDomainScriptRule {
    fn default() -> Self {
        Self::new()
    }
}

impl PassiveRule for CrossDomainScriptRule {
    fn metadata(&self) -> &RuleMetadata {
        &self.metadata
    }

    fn alert_threshold(&self) -> AlertThreshold {
        self.threshold
    }

    fn set_alert_threshold(&mut self, threshold: AlertThreshold) {
        self.threshold = threshold;
    }

    fn scan_response(
        &mut self,
        msg: &HttpMessage,
        _id: u64,
        html: Option<&scraper::Html>,
        sink: &mut AlertCollector,
    ) -> Result<(), ScanError> {
        let Some(document) = html else {
            return Ok(());
        };
        let Some(page_host) = msg.request.host() else {
            return Ok(());
        };

        let selector = scraper::Selector::parse("script[src]")
            .map_err(|e| ScanError::Internal(format!("script selector: {e}")))?;
        for element in document.select(&selector) {
            let Some(src) = element.value().attr("src") else {
                continue;
            };
            // Relative sources resolve to the page's own host.
            let Ok(script_url) = Url::parse(src) else {
                continue;
            };
            let Some(script_host) = script_url.host_str() else {
                continue;
            };
            if script_host.eq_ignore_ascii_case(&page_host) {
                continue;
            }
            if element
                .value()
                .attr("integrity")
                .map(|v| !v.trim().is_empty())
                .unwrap_or(false)
            {
                continue;
            }
            if self.threshold != AlertThreshold::Low && self.is_trusted(src) {
                continue;
            }
            sink.raise(self.build_alert(src, &element.html()));
        }
        Ok(())
    }

    fn boxed_clone(&self) -> Box<dyn PassiveRule> {
        Box::new(Self {
            metadata: self.metadata.clone(),
            threshold: self.threshold,
            trusted_domains: self.trusted_domains.clone(),
        })
    }

    fn example_alerts(&self) -> Vec<Alert> {
        vec![self.build_alert(
            "https://cdn.example.org/app.js",
            r#"<script src="https://cdn.example.org/app.js"></script>"#,
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::http::{HttpRequest, HttpResponse};

    fn html_message(body: &str) -> HttpMessage {
        let mut msg = HttpMessage::new(HttpRequest::new("GET", "https://www.example.com/page"));
        let mut response = HttpResponse::new(200, body);
        response
            .headers
            .push(("Content-Type".to_string(), "text/html".to_string()));
        msg.response = Some(response);
        msg
    }

    fn scan(rule: &mut CrossDomainScriptRule, msg: &HttpMessage) -> Vec<Alert> {
        let document = msg
            .response
            .as_ref()
            .filter(|r| r.is_html())
            .map(|r| scraper::Html::parse_document(&r.body));
        let mut sink = AlertCollector::new();
        rule.scan_response(msg, 1, document.as_ref(), &mut sink)
            .unwrap();
        sink.take()
    }

    #[test]
    fn no_scripts_no_alerts() {
        let msg = html_message("<html><head></head><body>plain</body></html>");
        assert!(scan(&mut CrossDomainScriptRule::new(), &msg).is_empty());
    }

    #[test]
    fn same_domain_and_relative_scripts_ignored() {
        let msg = html_message(
            r#"<html><head>
            <script src="https://www.example.com/script1.js"></script>
            <script src="/assets/script2.js"></script>
            </head></html>"#,
        );
        assert!(scan(&mut CrossDomainScriptRule::new(), &msg).is_empty());
    }

    #[test]
    fn cross_domain_script_flagged() {
        let msg = html_message(
            r#"<html><head>
            <script src="https://www.otherdomain.com/script2.js"></script>
            </head></html>"#,
        );
        let alerts = scan(&mut CrossDomainScriptRule::new(), &msg);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].param, "https://www.otherdomain.com/script2.js");
        assert_eq!(alerts[0].risk, Risk::Low);
        assert_eq!(alerts[0].confidence, Confidence::Medium);
        assert!(alerts[0].evidence.contains("script2.js"));
    }

    #[test]
    fn integrity_attribute_trusted() {
        let msg = html_message(
            r#"<html><head>
            <script src="https://www.otherdomain.com/script2.js"
                    integrity="sha384-OgVRvuATP1z7JjHLkuOU7Xw704+h835Lr+6QL9UvYjZE3Ipu6Tp75j7Bh/kR0JKI"></script>
            </head></html>"#,
        );
        assert!(scan(&mut CrossDomainScriptRule::new(), &msg).is_empty());
    }

    #[test]
    fn empty_integrity_still_flagged() {
        let msg = html_message(
            r#"<html><head>
            <script src="https://www.otherdomain.com/script2.js" integrity=""></script>
            </head></html>"#,
        );
        assert_eq!(scan(&mut CrossDomainScriptRule::new(), &msg).len(), 1);
    }

    #[test]
    fn trusted_domain_skipped_above_low_threshold() {
        let body = r#"<html><head>
            <script src="https://cdn.example.org/script2.js"></script>
            </head></html>"#;
        let mut rule = CrossDomainScriptRule::new()
            .trust_domain(r"https://cdn\.example\.org/.*")
            .unwrap();

        rule.set_alert_threshold(AlertThreshold::High);
        assert!(scan(&mut rule, &html_message(body)).is_empty());

        rule.set_alert_threshold(AlertThreshold::Medium);
        assert!(scan(&mut rule, &html_message(body)).is_empty());

        rule.set_alert_threshold(AlertThreshold::Low);
        assert_eq!(scan(&mut rule, &html_message(body)).len(), 1);
    }

    #[test]
    fn non_html_response_skipped() {
        let mut msg = html_message("<script src='https://evil.example.org/x.js'></script>");
        msg.response
            .as_mut()
            .unwrap()
            .headers
            .clear();
        // No document supplied for non-HTML content.
        assert!(scan(&mut CrossDomainScriptRule::new(), &msg).is_empty());
    }
}
