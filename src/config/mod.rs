use std::env;

use crate::models::tech::{Tech, TechSet};
use crate::rules::{AlertThreshold, AttackStrength};

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_url: String,
    pub passive_workers: usize,
    pub passive_queue_capacity: usize,
    pub alert_channel_capacity: usize,
    pub attack_strength: AttackStrength,
    pub alert_threshold: AlertThreshold,
    pub tech: TechSet,
    pub request_timeout_secs: u64,
    /// File of encoded global alert filters, one per line.
    pub global_filters_path: Option<String>,
    /// Target the bundled binary scans; unused by library consumers.
    pub target_url: Option<String>,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("HUNTSMAN_DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://huntsman.db?mode=rwc".to_string()),
            passive_workers: env::var("HUNTSMAN_PASSIVE_WORKERS")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .unwrap_or(4),
            passive_queue_capacity: env::var("HUNTSMAN_PASSIVE_QUEUE")
                .unwrap_or_else(|_| "128".to_string())
                .parse()
                .unwrap_or(128),
            alert_channel_capacity: env::var("HUNTSMAN_ALERT_CHANNEL")
                .unwrap_or_else(|_| "256".to_string())
                .parse()
                .unwrap_or(256),
            attack_strength: parse_or_default(
                "HUNTSMAN_ATTACK_STRENGTH",
                AttackStrength::default(),
            ),
            alert_threshold: parse_or_default(
                "HUNTSMAN_ALERT_THRESHOLD",
                AlertThreshold::default(),
            ),
            tech: parse_tech(env::var("HUNTSMAN_TECH").ok().as_deref()),
            request_timeout_secs: env::var("HUNTSMAN_REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .unwrap_or(20),
            global_filters_path: env::var("HUNTSMAN_GLOBAL_FILTERS").ok(),
            target_url: env::var("HUNTSMAN_TARGET").ok(),
        }
    }
}

fn parse_or_default<T>(var: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Debug,
{
    match env::var(var) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(var, raw, ?default, "Unparseable setting, using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Parse a comma-separated tech list; unknown entries are skipped with a
/// warning, an absent or empty list means all technologies.
fn parse_tech(raw: Option<&str>) -> TechSet {
    let Some(raw) = raw else {
        return TechSet::all();
    };
    let techs: Vec<Tech> = raw
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .filter_map(|s| match Tech::from_str_opt(s) {
            Some(tech) => Some(tech),
            None => {
                tracing::warn!(entry = s, "Unknown technology, skipping");
                None
            }
        })
        .collect();
    if techs.is_empty() {
        TechSet::all()
    } else {
        TechSet::of(techs)
    }
}
