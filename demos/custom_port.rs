//! Inspection on non-standard ports with a custom timeout.
//!
//! Run with: cargo run --example custom_port

use certinspect::{InspectError, Inspector};
use std::time::Duration;

fn main() {
    println!("=== Custom Port Inspection ===\n");

    let inspector = Inspector::with_timeout(Duration::from_secs(3));

    for (host, port) in [("example.com", 443), ("github.com", 8443), ("example.com", 0)] {
        println!("Checking {}:{}...", host, port);
        match inspector.inspect(host, port) {
            Ok(inspection) => {
                println!("  ✓ {} certificate(s), TLS {}", inspection.chain.len(), inspection.tls_version);
                println!("  Leaf expires at {}", inspection.leaf_expires_at);
            }
            Err(InspectError::InvalidPort { port }) => {
                println!("  ✗ {} is not a usable port", port);
            }
            Err(e) => {
                println!("  ✗ Error: {}", e);
            }
        }
        println!();
    }
}
