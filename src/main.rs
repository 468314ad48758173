use std::sync::Arc;

use mimalloc::MiMalloc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use huntsman::config::EngineConfig;
use huntsman::db::sqlite::SqliteStore;
use huntsman::db::HistoryStore;
use huntsman::db::AlertStore;
use huntsman::models::http::{HttpMessage, HttpRequest};
use huntsman::services::active_scan::ActiveScanner;
use huntsman::services::alert_filter::GlobalAlertFilters;
use huntsman::services::lifecycle::{AlertPublisher, LifecycleCoordinator};
use huntsman::services::metrics::InMemoryMetrics;
use huntsman::services::passive_dispatch::PassiveDispatcher;
use huntsman::services::transport::{HttpSender, ReqwestSender};

// M-MIMALLOC-APP: Use mimalloc as global allocator for improved performance.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "huntsman=debug".into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = EngineConfig::from_env();
    let Some(target) = config.target_url.clone() else {
        anyhow::bail!("HUNTSMAN_TARGET must be set to the URL to scan");
    };
    tracing::info!(url = %target, "Starting huntsman scan");

    let store = Arc::new(SqliteStore::connect(&config.database_url).await?);
    let metrics = Arc::new(InMemoryMetrics::new());
    let (tx, rx) = mpsc::channel(config.alert_channel_capacity);
    let publisher = AlertPublisher::new(store.clone(), tx);

    let mut coordinator =
        LifecycleCoordinator::new(store.clone(), store.clone(), store.clone(), metrics.clone());
    if let Some(path) = &config.global_filters_path {
        coordinator.set_global_filters(GlobalAlertFilters::load(path));
    }
    let lifecycle = tokio::spawn(coordinator.run(rx));

    let registry = huntsman::default_registry(config.alert_threshold)?;
    let (passive_rules, active_rules) = registry.into_parts();
    let transport = Arc::new(ReqwestSender::new(config.request_timeout_secs)?);

    // Fetch the target once to obtain the base message, record it, feed it
    // to the passive pool, then drive the active rules against it.
    let mut base = HttpMessage::new(HttpRequest::new("GET", target));
    base.response = Some(transport.send(&base.request).await?);
    let history_id = store.record(&base).await?;

    let dispatcher = PassiveDispatcher::spawn(
        passive_rules,
        config.passive_workers,
        config.passive_queue_capacity,
        publisher.clone(),
    );
    dispatcher.enqueue(base.clone(), history_id).await;

    let mut scanner = ActiveScanner::new(
        active_rules,
        transport,
        publisher,
        config.attack_strength,
        config.tech.clone(),
    );
    let summary = scanner.scan_target(&base, Some(history_id)).await;
    tracing::info!(
        rules_run = summary.rules_run,
        rules_skipped = summary.rules_skipped,
        alerts_raised = summary.alerts_raised,
        rule_errors = summary.rule_errors,
        "Active scan finished"
    );

    dispatcher.shutdown().await;
    // All publisher clones are gone now; the lifecycle drains and stops.
    drop(scanner);
    lifecycle.await?;

    for alert in store.all_alerts().await? {
        tracing::info!(
            alert_id = alert.id,
            plugin_id = alert.plugin_id,
            name = %alert.name,
            risk = ?alert.risk,
            confidence = ?alert.confidence,
            uri = %alert.uri,
            "Alert"
        );
    }

    Ok(())
}
