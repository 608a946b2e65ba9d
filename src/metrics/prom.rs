use lazy_static::lazy_static;
use log::{info, warn};
use prometheus::{labels, register_gauge, Gauge};
use std::collections::HashMap;

use certinspect::Inspection;

lazy_static! {
    static ref CERTI_LEAF_EXPIRES_IN_SECONDS: Gauge = register_gauge!(
        "certi_leaf_expires_in_seconds",
        "seconds until the leaf certificate expires"
    )
    .unwrap();
    static ref CERTI_LEAF_EXPIRED: Gauge =
        register_gauge!("certi_leaf_expired", "1 when the leaf certificate has expired").unwrap();
    static ref CERTI_CHAIN_LENGTH: Gauge =
        register_gauge!("certi_chain_length", "certificates presented by the peer").unwrap();
}

/// Function to push metrics to prometheus
/// # Arguments
/// * `inspection` - Result of the inspection
/// * `prometheus_address` - Push gateway address
pub fn prometheus_metrics(inspection: &Inspection, prometheus_address: &str) {
    let grouping = record(inspection);
    let metric_families = prometheus::gather();
    let prometheus_client = prometheus::push_metrics(
        "certi",
        grouping,
        &format!("{}/metrics/job", prometheus_address),
        metric_families,
        None,
    );

    match prometheus_client {
        Ok(_) => info!("Pushed metrics to {}", prometheus_address),
        Err(e) => warn!("Failed to push metrics to prometheus: {}", e),
    }
}

/// Sets the gauges for `inspection` and returns the grouping labels to push them under.
fn record(inspection: &Inspection) -> HashMap<String, String> {
    if let Some(leaf) = inspection.leaf() {
        CERTI_LEAF_EXPIRES_IN_SECONDS.set(leaf.expires_in.num_seconds() as f64);
        CERTI_LEAF_EXPIRED.set(if leaf.is_expired() { 1.0 } else { 0.0 });
    }
    CERTI_CHAIN_LENGTH.set(inspection.chain.len() as f64);

    labels! {
        "instance".to_owned() => "certi".to_owned(),
        "host".to_owned() => inspection.hostname.to_owned(),
        "port".to_owned() => inspection.port.to_string(),
        "tls_version".to_owned() => inspection.tls_version.to_owned(),
        "cipher_suite".to_owned() => inspection.cipher_suite.to_owned(),
    }
}
