//! Basic certificate chain inspection.
//!
//! Inspects a single host on the default port and prints the negotiated
//! parameters and the leaf certificate.
//!
//! Run with: cargo run --example basic_check

use certinspect::Inspector;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Basic TLS Certificate Inspection ===\n");

    let inspection = Inspector::new().inspect("google.com", 443)?;

    println!("Host: {} ({})", inspection.hostname, inspection.remote_addr);
    println!("TLS version: {}", inspection.tls_version);
    println!("Cipher suite: {}", inspection.cipher_suite);
    println!("Leaf expires at: {}", inspection.leaf_expires_at);
    println!("Leaf expired: {}", inspection.is_leaf_expired());
    println!();

    if let Some(leaf) = inspection.leaf() {
        println!("Subject: {}", leaf.subject);
        println!("Issuer: {}", leaf.issuer);
        println!("Days remaining: {}", leaf.expires_in.num_days());
        println!("Subject Alternative Names:");
        for entry in &leaf.san {
            println!("  - {}: {}", entry.kind, entry.value);
        }
    }

    Ok(())
}
