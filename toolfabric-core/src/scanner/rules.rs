//! Data-driven rule definitions for the Script Scanner.
//!
//! Adding or removing a rule is a data change, not a structural one: push
//! or remove an entry from the language's `RuleSet`.

use regex::Regex;

use super::Severity;

/// A line rule fires independently of every other rule for each
/// non-comment line of the source.
pub struct LineRule {
    pub id: &'static str,
    pub severity: Severity,
    pub pattern: Regex,
}

/// A source rule fires once against the whole file. With a `secondary`
/// pattern present, both `primary` and `secondary` must match somewhere in
/// the source (AND); without one, `primary` alone is sufficient.
pub struct SourceRule {
    pub id: &'static str,
    pub severity: Severity,
    pub primary: Regex,
    pub secondary: Option<Regex>,
}

pub struct RuleSet {
    pub comment_prefix: &'static str,
    pub line_rules: Vec<LineRule>,
    pub source_rules: Vec<SourceRule>,
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("rule pattern must be a valid regex")
}

pub fn python_ruleset() -> RuleSet {
    RuleSet {
        comment_prefix: "#",
        line_rules: vec![
            LineRule {
                id: "dangerous-exec",
                severity: Severity::Critical,
                pattern: re(r"\bsubprocess\.(Popen|call|run|check_call|check_output)\s*\("),
            },
            LineRule {
                id: "dangerous-exec",
                severity: Severity::Critical,
                pattern: re(r"\bos\.system\s*\("),
            },
            LineRule {
                id: "dangerous-exec",
                severity: Severity::Critical,
                pattern: re(r"\bos\.popen\s*\("),
            },
            LineRule {
                id: "dynamic-code",
                severity: Severity::Critical,
                pattern: re(r"\b(exec|eval)\s*\("),
            },
            LineRule {
                id: "dynamic-code",
                severity: Severity::Critical,
                pattern: re(r"\bcompile\s*\("),
            },
            LineRule {
                id: "dynamic-import",
                severity: Severity::Critical,
                pattern: re(r"__import__\s*\("),
            },
            LineRule {
                id: "dynamic-import",
                severity: Severity::Critical,
                pattern: re(r"\bimportlib\.import_module\s*\("),
            },
        ],
        source_rules: vec![
            SourceRule {
                id: "env-harvesting",
                severity: Severity::Critical,
                primary: re(r"\bos\.(environ|getenv)\b"),
                secondary: Some(re(
                    r"\brequests\.|urllib\.request|http\.client|\bsocket\.",
                )),
            },
            SourceRule {
                id: "potential-exfil",
                severity: Severity::Warn,
                primary: re(r"\bopen\s*\(|\.read\s*\("),
                secondary: Some(re(r"\brequests\.|urllib\.request|\bsocket\.")),
            },
            SourceRule {
                id: "obfuscated-code",
                severity: Severity::Warn,
                primary: re(r"\bbase64\."),
                secondary: Some(re(r"\b(exec|eval)\s*\(")),
            },
        ],
    }
}

pub fn ts_js_ruleset() -> RuleSet {
    RuleSet {
        comment_prefix: "//",
        line_rules: vec![
            LineRule {
                id: "dangerous-exec",
                severity: Severity::Critical,
                pattern: re(r"\bchild_process\b"),
            },
            LineRule {
                id: "dangerous-exec",
                severity: Severity::Critical,
                pattern: re(r"\bexecSync\s*\("),
            },
            LineRule {
                id: "dangerous-exec",
                severity: Severity::Critical,
                pattern: re(r"\bspawnSync\s*\("),
            },
            LineRule {
                id: "dynamic-code",
                severity: Severity::Critical,
                pattern: re(r"\beval\s*\("),
            },
            LineRule {
                id: "dynamic-code",
                severity: Severity::Critical,
                pattern: re(r"\bnew\s+Function\s*\("),
            },
            LineRule {
                id: "dynamic-code",
                severity: Severity::Critical,
                pattern: re(r"\bvm\.run\w*\s*\("),
            },
        ],
        source_rules: vec![
            SourceRule {
                id: "env-harvesting",
                severity: Severity::Critical,
                primary: re(r"\bprocess\.env\b"),
                secondary: Some(re(r"\bfetch\s*\(|\baxios\.|\bhttps?\.request\s*\(")),
            },
            SourceRule {
                id: "potential-exfil",
                severity: Severity::Warn,
                primary: re(r"\bfs\.readFile(Sync)?\s*\("),
                secondary: Some(re(r"\bfetch\s*\(|\baxios\.|\bhttps?\.request\s*\(")),
            },
        ],
    }
}
