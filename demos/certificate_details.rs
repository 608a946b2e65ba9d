//! Detailed certificate chain listing.
//!
//! Walks every certificate the server presented, leaf first.
//!
//! Run with: cargo run --example certificate_details

use certinspect::Inspector;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Certificate Chain Details ===\n");

    let inspection = Inspector::new().inspect("github.com", 443)?;

    println!("┌─ {}:{} ({})", inspection.hostname, inspection.port, inspection.remote_addr);
    println!("├─ TLS {} / {}", inspection.tls_version, inspection.cipher_suite);
    println!("│");

    let last = inspection.chain.len() - 1;
    for (position, cert) in inspection.chain.iter().enumerate() {
        let prefix = if position == last { "└─" } else { "├─" };
        let indent = if position == last { "   " } else { "│  " };
        println!("{} Certificate #{}", prefix, position);
        println!("{}├─ Subject: {}", indent, cert.subject);
        println!("{}├─ Issuer: {}", indent, cert.issuer);
        println!("{}├─ Serial Number: {}", indent, cert.serial_number);
        println!("{}├─ Version: {}", indent, cert.version);
        println!("{}├─ Valid: {} .. {}", indent, cert.not_before, cert.not_after);
        println!("{}├─ Days Remaining: {}", indent, cert.expires_in.num_days());
        println!(
            "{}├─ Algorithms: {} / {}",
            indent, cert.public_key_algorithm, cert.signature_algorithm
        );
        println!("{}├─ CA: {}", indent, cert.is_ca);
        println!("{}└─ SANs: {}", indent, cert.san.len());
        if position != last {
            println!("│");
        }
    }

    Ok(())
}
