//! Script Scanner — a two-tier (line/full-source) rule engine gating
//! agent-produced scripts before they are allowed to run.
//!
//! Intentionally not a security boundary: a blocklist that catches
//! accidental or low-effort malicious scripts, not a sandbox.

mod rules;

use std::fs;
use std::path::Path;

use crate::error::FabricError;
use rules::RuleSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Critical,
    Warn,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanFinding {
    pub rule_id: &'static str,
    pub severity: Severity,
    /// 1-based line number, or 0 for a whole-source finding.
    pub line_number: usize,
    pub snippet: String,
}

/// True iff any finding is critical — the gate the Manager uses to block
/// a server's activation.
pub fn has_critical(findings: &[ScanFinding]) -> bool {
    findings.iter().any(|f| f.severity == Severity::Critical)
}

/// Scans `path`, dispatching by extension. `.py` gets the Python rule set,
/// `.ts`/`.js` get the TS/JS rule set, anything else yields no findings and
/// no error.
pub fn scan(path: &Path) -> Result<Vec<ScanFinding>, FabricError> {
    let ruleset = match path.extension().and_then(|e| e.to_str()) {
        Some("py") => rules::python_ruleset(),
        Some("ts") | Some("js") => rules::ts_js_ruleset(),
        _ => return Ok(Vec::new()),
    };

    let source = fs::read_to_string(path).map_err(|e| FabricError::ScanIoError {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    Ok(scan_source(&source, &ruleset))
}

fn scan_source(source: &str, ruleset: &RuleSet) -> Vec<ScanFinding> {
    let mut findings = Vec::new();

    for (idx, line) in source.lines().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with(ruleset.comment_prefix) {
            continue;
        }
        for rule in &ruleset.line_rules {
            if rule.pattern.is_match(line) {
                findings.push(ScanFinding {
                    rule_id: rule.id,
                    severity: rule.severity,
                    line_number: idx + 1,
                    snippet: line.trim().to_string(),
                });
            }
        }
    }

    for rule in &ruleset.source_rules {
        let primary_hit = rule.primary.is_match(source);
        let fires = match &rule.secondary {
            Some(secondary) => primary_hit && secondary.is_match(source),
            None => primary_hit,
        };
        if fires {
            findings.push(ScanFinding {
                rule_id: rule.id,
                severity: rule.severity,
                line_number: 0,
                snippet: String::new(),
            });
        }
    }

    findings
}
