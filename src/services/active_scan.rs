//! Active scan engine: runs enabled rules in policy order against a base
//! message, each rule sending crafted variants through the transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use crate::errors::ScanError;
use crate::models::alert::{Alert, AlertBuilder};
use crate::models::http::HttpMessage;
use crate::models::tech::TechSet;
use crate::rules::{ActiveRule, AlertCollector, AttackStrength};
use crate::services::lifecycle::AlertPublisher;
use crate::services::transport::HttpSender;

/// Cooperative stop switch shared between a scan and its controller.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the scan to stop; honored before the next probe is sent.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A rule's view of the engine while scanning one target.
///
/// The host owns the base message, the probe budget for the current attack
/// strength, the stop flag, and the alerts the rule raises.
pub struct ScanHost {
    base: HttpMessage,
    transport: Arc<dyn HttpSender>,
    stop: StopHandle,
    max_probes: usize,
    probes_sent: usize,
    history_id: Option<i64>,
    tech: TechSet,
    collector: AlertCollector,
}

impl ScanHost {
    pub fn new(
        base: HttpMessage,
        transport: Arc<dyn HttpSender>,
        stop: StopHandle,
        strength: AttackStrength,
        tech: TechSet,
        history_id: Option<i64>,
    ) -> Self {
        Self {
            base,
            transport,
            stop,
            max_probes: strength.max_probes(),
            probes_sent: 0,
            history_id,
            tech,
            collector: AlertCollector::new(),
        }
    }

    /// The message being attacked, as originally observed.
    pub fn base_msg(&self) -> &HttpMessage {
        &self.base
    }

    /// Technologies the scan is allowed to assume; rules with per-variant
    /// applicability consult this before each attack flavor.
    pub fn tech(&self) -> &TechSet {
        &self.tech
    }

    /// Fresh variant of the base message: same request, no response yet.
    pub fn new_msg(&self) -> HttpMessage {
        HttpMessage::new(self.base.request.clone())
    }

    /// Rules must poll this before every send and return early when set.
    pub fn is_stop(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Probes still available to this rule under the configured strength.
    pub fn remaining_probes(&self) -> usize {
        self.max_probes.saturating_sub(self.probes_sent)
    }

    /// Send the variant and attach the received response to it.
    ///
    /// Transport failures bubble up for the rule to log and treat as
    /// inconclusive; they never carry a finding.
    pub async fn send_and_receive(&mut self, msg: &mut HttpMessage) -> Result<(), ScanError> {
        if self.is_stop() {
            return Err(ScanError::Stopped);
        }
        if self.remaining_probes() == 0 {
            return Err(ScanError::Validation(
                "probe budget exhausted for this target".to_string(),
            ));
        }
        self.probes_sent += 1;
        let response = self.transport.send(&msg.request).await?;
        msg.response = Some(response);
        Ok(())
    }

    /// Raise a finding, stamping the target URI and history reference when
    /// the rule did not set them.
    pub fn raise(&mut self, builder: AlertBuilder) {
        let mut alert = builder.build();
        if alert.uri.is_empty() {
            alert.uri = self.base.request.uri.clone();
        }
        if alert.history_id.is_none() {
            alert.history_id = self.history_id;
        }
        self.collector.raise(alert);
    }

    pub(crate) fn take_alerts(&mut self) -> Vec<Alert> {
        self.collector.take()
    }
}

/// Outcome counters for one target pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub rules_run: usize,
    pub rules_skipped: usize,
    pub alerts_raised: usize,
    pub rule_errors: usize,
    pub stopped: bool,
}

/// Drives the active rule set against targets.
pub struct ActiveScanner {
    rules: Vec<Box<dyn ActiveRule>>,
    transport: Arc<dyn HttpSender>,
    publisher: AlertPublisher,
    strength: AttackStrength,
    tech: TechSet,
    stop: StopHandle,
}

impl ActiveScanner {
    pub fn new(
        rules: Vec<Box<dyn ActiveRule>>,
        transport: Arc<dyn HttpSender>,
        publisher: AlertPublisher,
        strength: AttackStrength,
        tech: TechSet,
    ) -> Self {
        Self {
            rules,
            transport,
            publisher,
            strength,
            tech,
            stop: StopHandle::new(),
        }
    }

    /// Handle callers can use to stop the scan from another task.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Run every applicable rule against one target message.
    ///
    /// A rule whose declared tech targets do not intersect the configured
    /// set is skipped without sending anything. A failing rule is logged and
    /// the remaining rules still run.
    pub async fn scan_target(
        &mut self,
        base: &HttpMessage,
        history_id: Option<i64>,
    ) -> ScanSummary {
        let scan_id = Uuid::new_v4();
        tracing::debug!(%scan_id, uri = %base.request.uri, "Starting active scan pass");
        let mut summary = ScanSummary::default();

        for rule in &mut self.rules {
            if self.stop.is_stopped() {
                summary.stopped = true;
                break;
            }

            let name = rule.metadata().name.clone();
            if let Some(targets) = rule.targets() {
                if !self.tech.includes_any(&targets) {
                    tracing::debug!(rule = %name, "Tech not targeted, skipping rule");
                    summary.rules_skipped += 1;
                    continue;
                }
            }

            let mut host = ScanHost::new(
                base.clone(),
                self.transport.clone(),
                self.stop.clone(),
                self.strength,
                self.tech.clone(),
                history_id,
            );
            match rule.scan(&mut host).await {
                Ok(()) => summary.rules_run += 1,
                Err(ScanError::Stopped) => {
                    tracing::debug!(rule = %name, "Scan rule stopping");
                    summary.stopped = true;
                }
                Err(e) => {
                    tracing::warn!(
                        rule = %name,
                        uri = %base.request.uri,
                        error = %e,
                        "Active rule failed, continuing with next rule"
                    );
                    summary.rule_errors += 1;
                }
            }

            for alert in host.take_alerts() {
                match self.publisher.raise(alert).await {
                    Ok(_) => summary.alerts_raised += 1,
                    Err(e) => {
                        tracing::warn!(rule = %name, error = %e, "Failed to persist alert");
                    }
                }
            }

            if summary.stopped {
                break;
            }
        }

        summary
    }
}
