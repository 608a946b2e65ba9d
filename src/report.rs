//! Rendering of an inspection for the terminal.

use certinspect::config::OutputFormat;
use certinspect::{Certificate, Inspection};
use chrono::Duration as TimeDelta;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use std::fmt::Write;

pub fn render(inspection: &Inspection, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(inspection),
        OutputFormat::Text => Ok(text(inspection)),
        OutputFormat::Summary => Ok(summary(inspection)),
    }
}

fn text(inspection: &Inspection) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = writeln!(out, "Hostname: {}", inspection.hostname);
    let _ = writeln!(out, "Port: {}", inspection.port);
    let _ = writeln!(out, "Remote address: {}", inspection.remote_addr);
    let _ = writeln!(out, "TLS version: {}", inspection.tls_version);
    let _ = writeln!(out, "Cipher suite: {}", inspection.cipher_suite);
    let _ = writeln!(out, "Leaf expires at: {}", inspection.leaf_expires_at.to_rfc3339());
    let _ = writeln!(out, "Inspected at: {}", inspection.inspected_at.to_rfc3339());

    for (position, cert) in inspection.chain.iter().enumerate() {
        let _ = writeln!(out, "--------------------------------------");
        let _ = writeln!(out, "Certificate #{}", position);
        write_certificate(&mut out, cert);
    }
    out
}

fn write_certificate(out: &mut String, cert: &Certificate) {
    let _ = writeln!(out, "\tSubject: {}", cert.subject);
    let _ = writeln!(out, "\tIssuer: {}", cert.issuer);
    let _ = writeln!(out, "\tSerial number: {}", cert.serial_number);
    let _ = writeln!(out, "\tVersion: {}", cert.version);
    let _ = writeln!(out, "\tValid from: {}", cert.not_before.to_rfc3339());
    let _ = writeln!(out, "\tValid to: {}", cert.not_after.to_rfc3339());
    let _ = writeln!(out, "\tExpires in: {}", remaining(cert.expires_in));
    let _ = writeln!(out, "\tPublic key algorithm: {}", cert.public_key_algorithm);
    let _ = writeln!(out, "\tSignature algorithm: {}", cert.signature_algorithm);
    let _ = writeln!(out, "\tCA: {}", cert.is_ca);
    if !cert.san.is_empty() {
        let _ = writeln!(out, "\tSubject Alternative Names:");
        for entry in &cert.san {
            let _ = writeln!(out, "\t\t{}: {}", entry.kind, entry.value);
        }
    }
}

fn summary(inspection: &Inspection) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "#",
            "Subject",
            "Issuer",
            "Not After",
            "Expires In",
            "CA",
        ]);

    for (position, cert) in inspection.chain.iter().enumerate() {
        let color = if cert.is_expired() {
            Color::Red
        } else if cert.expires_in < TimeDelta::days(30) {
            Color::Yellow
        } else {
            Color::Green
        };
        table.add_row(vec![
            Cell::new(position),
            Cell::new(&cert.subject),
            Cell::new(&cert.issuer),
            Cell::new(cert.not_after.format("%Y-%m-%d %H:%M:%S UTC")),
            Cell::new(remaining(cert.expires_in)).fg(color),
            Cell::new(if cert.is_ca { "yes" } else { "no" }),
        ]);
    }

    format!(
        "{}:{} ({}) TLS {} {}\n{}",
        inspection.hostname,
        inspection.port,
        inspection.remote_addr,
        inspection.tls_version,
        inspection.cipher_suite,
        table
    )
}

/// Compact `"89d 4h 12m"` form of a signed duration.
fn remaining(delta: TimeDelta) -> String {
    let total = delta.num_seconds();
    let sign = if total < 0 { "-" } else { "" };
    let secs = total.unsigned_abs();
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;

    if days > 0 {
        format!("{}{}d {}h {}m", sign, days, hours, minutes)
    } else if hours > 0 {
        format!("{}{}h {}m", sign, hours, minutes)
    } else {
        format!("{}{}m {}s", sign, minutes, secs % 60)
    }
}
