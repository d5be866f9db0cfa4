//! Secret report formatting

use std::collections::BTreeMap;

use crate::secrets::{Finding, ValidationReport};

fn push_section(output: &mut Vec<String>, title: &str, marker: &str, findings: &[Finding]) {
    if findings.is_empty() {
        return;
    }
    output.push(String::new());
    output.push(format!("{} ({}):", title, findings.len()));
    for finding in findings {
        output.push(format!("  {} {}", marker, finding));
    }
}

/// Format a validation report with a one-line verdict at the top
pub fn format_validation_report(report: &ValidationReport) -> String {
    let mut output = vec![if report.is_valid() {
        "✓ All secrets pass the policy".to_string()
    } else {
        format!("✗ Secret validation failed with {} error(s)", report.errors.len())
    }];

    push_section(&mut output, "Errors", "✗", &report.errors);
    push_section(&mut output, "Warnings", "!", &report.warnings);
    push_section(&mut output, "Recommendations", "→", &report.recommendations);

    output.join("\n")
}

/// Names and lengths of generated secrets; values are never shown
pub fn format_generated_secrets(secrets: &BTreeMap<String, String>) -> String {
    let width = secrets.keys().map(String::len).max().unwrap_or(0);
    let mut output = vec![format!("✓ Generated {} secret(s)", secrets.len())];
    for (name, value) in secrets {
        output.push(format!(
            "  {:<width$}  {} characters",
            name,
            value.chars().count(),
            width = width
        ));
    }
    output.join("\n")
}
