pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod rules;
pub mod services;

use errors::ScanError;
use rules::{AlertThreshold, RuleRegistry};

/// Registry with every built-in rule, passive rules tuned to `threshold`.
pub fn default_registry(threshold: AlertThreshold) -> Result<RuleRegistry, ScanError> {
    let mut registry = RuleRegistry::new();

    let passive: Vec<Box<dyn rules::PassiveRule>> = vec![
        rules::passive::HashDisclosureRule::boxed(),
        rules::passive::InfoDisclosureInUrlRule::boxed(),
        rules::passive::CrossDomainScriptRule::boxed(),
    ];
    for mut rule in passive {
        rule.set_alert_threshold(threshold);
        registry.register_passive(rule)?;
    }

    registry.register_active(rules::active::GetForPostRule::boxed())?;
    registry.register_active(rules::active::PhpCgiRceRule::boxed())?;

    Ok(registry)
}
