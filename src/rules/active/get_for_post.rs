//! Active rule checking whether a POST with form parameters is accepted as
//! an equivalent GET request.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::errors::ScanError;
use crate::models::alert::{Alert, AlertBuilder, Confidence, Risk};
use crate::models::http::{Param, ParamKind};
use crate::rules::{ActiveRule, RuleCategory, RuleMetadata, RuleStatus};
use crate::services::active_scan::ScanHost;
use crate::services::compare::ComparableResponse;

const PLUGIN_ID: i32 = 10058;

/// Required similarity for the GET and POST responses to be considered the
/// same.
const REQUIRED_SIMILARITY: f64 = 0.95;

/// Active scan rule transposing POST form parameters onto a GET request.
pub struct GetForPostRule {
    metadata: RuleMetadata,
}

impl GetForPostRule {
    pub fn new() -> Self {
        Self {
            metadata: RuleMetadata {
                id: PLUGIN_ID,
                name: "GET for POST".to_string(),
                risk: Risk::Info,
                confidence: Confidence::High,
                category: RuleCategory::Misc,
                cwe_id: 16,
                wasc_id: 20,
                tags: BTreeMap::from([
                    ("OWASP_2021_A04".to_string(), String::new()),
                    ("OWASP_2017_A06".to_string(), String::new()),
                ]),
                status: RuleStatus::Release,
            },
        }
    }

    pub fn boxed() -> Box<dyn ActiveRule> {
        Box::new(Self::new())
    }

    fn build_alert(&self, evidence: &str) -> AlertBuilder {
        self.metadata
            .alert()
            .description(
                "A request that was originally observed as a POST was also accepted as a GET. \
                 This issue does not represent a security weakness unto itself, however it may \
                 facilitate simplification of other attacks.",
            )
            .solution("Ensure that only POST is accepted where POST is expected.")
            .evidence(evidence)
    }
}

impl Default for GetForPostRule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActiveRule for GetForPostRule {
    fn metadata(&self) -> &RuleMetadata {
        &self.metadata
    }

    async fn scan(&mut self, host: &mut ScanHost) -> Result<(), ScanError> {
        // One request per URL, so check for a stop before the send.
        if host.is_stop() {
            tracing::debug!(rule = %self.metadata.name, "Scan rule stopping");
            return Ok(());
        }

        let base = host.base_msg().clone();
        let form_params = base.request.form_params();
        if !base.request.method.eq_ignore_ascii_case("POST") || form_params.is_empty() {
            // Not a POST or no form params, no reason to continue.
            return Ok(());
        }

        let mut probe = host.new_msg();
        probe.request.method = "GET".to_string();
        probe.request.body.clear();
        probe.request.remove_header("Content-Type");
        let url_params: Vec<Param> = form_params
            .iter()
            .map(|p| Param::new(p.name.clone(), p.value.clone(), ParamKind::Url))
            .collect();
        probe.request.set_url_params(&url_params);

        match host.send_and_receive(&mut probe).await {
            Ok(()) => {}
            Err(ScanError::Stopped) => return Err(ScanError::Stopped),
            Err(e) => {
                tracing::warn!(
                    rule = %self.metadata.name,
                    uri = %probe.request.uri,
                    error = %e,
                    "Probe failed, treating as inconclusive"
                );
                return Ok(());
            }
        }

        let base_response = ComparableResponse::from_message(&base, &[], "");
        let probe_response = ComparableResponse::from_message(&probe, &[], "");
        if base_response.compare_with(&probe_response) >= REQUIRED_SIMILARITY {
            let evidence = probe
                .response
                .as_ref()
                .map(|r| r.prime_header())
                .unwrap_or_default();
            host.raise(self.build_alert(&evidence));
        }
        Ok(())
    }

    fn example_alerts(&self) -> Vec<Alert> {
        vec![self.build_alert("HTTP/1.0 200").build()]
    }
}
