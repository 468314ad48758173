pub mod active_scan;
pub mod alert_filter;
pub mod compare;
pub mod fingerprint;
pub mod lifecycle;
pub mod metrics;
pub mod passive_dispatch;
pub mod transport;
